//! Arguments and setup shared by the bench tools.

use anyhow::{Context, Result};
use clap::Args;
use serial_can::bus::DEFAULT_TTY_BAUDRATE;
use serial_can::{Bus, BusConfig};

/// Which adapter to use and how to start it.
#[derive(Args, Debug)]
pub struct BusArgs {
    /// Serial device of the slcan adapter (COM3, /dev/tty.usbmodem1, ...)
    #[arg(short, long, env = "SLCAN_DEVICE", default_value = "/dev/ttyACM1")]
    pub device: String,

    /// CAN bit rate in bit/s: 10000, 20000, 50000, 100000, 125000,
    /// 250000, 500000, 800000 or 1000000
    #[arg(short, long, env = "SLCAN_BITRATE", default_value_t = 125_000)]
    pub bitrate: u32,

    /// Serial line speed
    #[arg(long, default_value_t = DEFAULT_TTY_BAUDRATE)]
    pub tty_baudrate: u32,
}

impl BusArgs {
    pub fn config(&self) -> BusConfig {
        BusConfig {
            device: self.device.clone(),
            bitrate: self.bitrate,
            tty_baudrate: self.tty_baudrate,
        }
    }

    pub fn open(&self) -> Result<Bus> {
        Bus::open_with(&self.config())
            .with_context(|| format!("Opening slcan adapter on {}", self.device))
    }
}

/// Log to stderr, `info` unless RUST_LOG says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
