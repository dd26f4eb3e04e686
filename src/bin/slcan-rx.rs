//! Print every frame seen on the bus for a fixed time.

mod common;

use anyhow::Result;
use clap::Parser;
use std::{
    process,
    time::{Duration, Instant},
};

use common::BusArgs;

#[derive(Parser, Debug)]
#[command(version, about = "Listen for CAN frames through an slcan adapter")]
struct Cli {
    #[command(flatten)]
    bus: BusArgs,

    /// How long to listen, in seconds
    #[arg(short, long, default_value_t = 10.0)]
    timeout: f64,
}

fn run(cli: &Cli) -> Result<()> {
    let timeout = Duration::try_from_secs_f64(cli.timeout)?;
    let mut bus = cli.bus.open()?;

    println!("Listening for CAN messages for {} seconds...", cli.timeout);

    let deadline = Instant::now() + timeout;
    let mut count = 0usize;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        if let Some(frame) = bus.receive(remaining)? {
            let ts = frame.timestamp().unwrap_or_default();
            println!("Received message: {:.6} {}", ts.as_secs_f64(), frame);
            count += 1;
        }
    }

    log::info!("{} frames received", count);
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
