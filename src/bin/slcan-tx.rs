//! Send a single frame through an slcan adapter.

mod common;

use anyhow::{Context, Result};
use clap::Parser;
use serial_can::Frame;
use std::process;

use common::BusArgs;

#[derive(Parser, Debug)]
#[command(version, about = "Send a single CAN frame through an slcan adapter")]
struct Cli {
    #[command(flatten)]
    bus: BusArgs,

    /// Frame identifier, decimal or 0x-prefixed hex
    #[arg(long, default_value = "0x123", value_parser = parse_id)]
    id: u32,

    /// Use a 29-bit identifier
    #[arg(short = 'x', long)]
    extended: bool,

    /// Payload as hex, up to 8 bytes (e.g. "11 22 33")
    #[arg(long, default_value = "1122334455667788")]
    data: String,
}

fn parse_id(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid identifier '{}': {}", s, e))
}

fn run(cli: &Cli) -> Result<()> {
    let data = hex::decode(cli.data.replace([' ', ':'], ""))
        .with_context(|| format!("Invalid payload '{}'", cli.data))?;
    let frame = Frame::from_raw(cli.id, cli.extended, &data)?;

    let mut bus = cli.bus.open()?;
    bus.send(&frame)?;
    println!("Sent message: {}", frame);

    bus.close()?;
    Ok(())
}

fn main() {
    common::init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
