//! Bench pattern for the LED counter board: toggles the LED frame and
//! cycles a handful of extended test frames on a fixed period.

mod common;

use anyhow::Result;
use clap::Parser;
use serial_can::{Bus, Frame};
use std::{process, thread, time::Duration};

use common::BusArgs;

const COUNTER_ID: u32 = 0x12345;
const FILL: [u8; 8] = [0x55, 0x44, 0x55, 0x44, 0x55, 0x44, 0x55, 0x44];

#[derive(Parser, Debug)]
#[command(version, about = "Send the LED blink test pattern through an slcan adapter")]
struct Cli {
    #[command(flatten)]
    bus: BusArgs,

    /// Number of pattern repetitions
    #[arg(long, default_value_t = 9)]
    cycles: u32,

    /// Pause after each frame, in milliseconds
    #[arg(long, default_value_t = 250)]
    period_ms: u64,

    /// Standard identifier the board's LED listens on
    #[arg(long, default_value_t = 0x10)]
    led_id: u16,
}

/// One repetition of the pattern.
fn cycle(led_id: u16) -> Result<Vec<Frame>> {
    Ok(vec![
        Frame::new_standard(led_id, &[0x00])?,
        Frame::new_standard(led_id, &[0x01])?,
        Frame::new_extended(COUNTER_ID, &[0x0C, 0x18])?,
        Frame::new_extended(COUNTER_ID, &[0x00, 0x06])?,
        Frame::new_extended(0x700, &FILL)?,
        Frame::new_extended(0x710, &FILL)?,
        Frame::new_extended(0x720, &FILL)?,
    ])
}

fn send(bus: &mut Bus, frame: &Frame) -> Result<()> {
    bus.send(frame)?;
    println!("Sent message: {}", frame);
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let period = Duration::from_millis(cli.period_ms);
    let pattern = cycle(cli.led_id)?;

    let mut bus = cli.bus.open()?;

    send(&mut bus, &Frame::new_extended(COUNTER_ID, &[0x0C, 0x18])?)?;
    send(&mut bus, &Frame::new_standard(cli.led_id, &[0x11])?)?;

    for _ in 0..cli.cycles {
        for frame in &pattern {
            send(&mut bus, frame)?;
            thread::sleep(period);
        }
    }

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
