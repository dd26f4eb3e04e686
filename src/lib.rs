//! A Rust Serial Line CAN (slcan) library with a small blocking test
//! harness for bench work.
//!
//! The command encoders, frame type and response parser are `no_std`.
//! With the `std` feature (default) the [`bus`] module adds [`Bus`], which
//! opens an adapter on a serial port, sends frames and polls for incoming
//! ones with a timeout.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod error;
mod frame;
pub mod parse;

#[cfg(feature = "std")]
pub mod bus;

use core::fmt::Display;
use embedded_can::{Frame as _, Id};

#[cfg(feature = "std")]
pub use bus::{Bus, BusConfig, ConnectionError, Error, Transport};
pub use error::{FrameError, ParseError, UnsupportedBitrate};
pub use frame::{Frame, MAX_DATA_LEN};

/// Bitrate options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bitrate {
    Rate10kbit = 0,
    Rate20kbit = 1,
    Rate50kbit = 2,
    Rate100kbit = 3,
    Rate125kbit = 4,
    Rate250kbit = 5,
    Rate500kbit = 6,
    Rate800kbit = 7,
    Rate1000kbit = 8,
}

impl Bitrate {
    /// Pick the setup entry for a rate in bits per second.
    pub fn from_bps(bps: u32) -> Result<Self, UnsupportedBitrate> {
        use Bitrate::*;
        match bps {
            10_000 => Ok(Rate10kbit),
            20_000 => Ok(Rate20kbit),
            50_000 => Ok(Rate50kbit),
            100_000 => Ok(Rate100kbit),
            125_000 => Ok(Rate125kbit),
            250_000 => Ok(Rate250kbit),
            500_000 => Ok(Rate500kbit),
            800_000 => Ok(Rate800kbit),
            1_000_000 => Ok(Rate1000kbit),
            _ => Err(UnsupportedBitrate(bps)),
        }
    }

    /// Rate in bits per second.
    pub fn bps(self) -> u32 {
        use Bitrate::*;
        match self {
            Rate10kbit => 10_000,
            Rate20kbit => 20_000,
            Rate50kbit => 50_000,
            Rate100kbit => 100_000,
            Rate125kbit => 125_000,
            Rate250kbit => 250_000,
            Rate500kbit => 500_000,
            Rate800kbit => 800_000,
            Rate1000kbit => 1_000_000,
        }
    }
}

impl TryFrom<u32> for Bitrate {
    type Error = UnsupportedBitrate;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::from_bps(bps)
    }
}

impl Display for Bitrate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} kbit/s", self.bps() / 1000)
    }
}

/// Setup port command.
#[derive(Debug)]
pub struct Setup {
    pub bitrate: Bitrate,
}

impl Setup {
    pub fn new(bitrate: Bitrate) -> Self {
        Self { bitrate }
    }
}

impl Display for Setup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "S{:}\r", self.bitrate as u8)
    }
}

/// Open port command.
#[derive(Debug, Default)]
pub struct Open {}

impl Open {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for Open {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "O\r")
    }
}

/// Close port command.
#[derive(Debug, Default)]
pub struct Close {}

impl Close {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for Close {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "C\r")
    }
}

/// Transmit frame command.
#[derive(Debug)]
pub struct Transmit {
    frame: Frame,
}

impl Transmit {
    /// Fails if the foreign frame is longer than a classic CAN frame.
    pub fn new(frame: &impl embedded_can::Frame) -> Result<Self, FrameError> {
        Ok(Self {
            frame: Frame::from_foreign(frame)?,
        })
    }
}

impl From<Frame> for Transmit {
    fn from(frame: Frame) -> Self {
        Self { frame }
    }
}

impl Display for Transmit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let cmd = match (self.frame.is_extended(), self.frame.is_remote_frame()) {
            (false, false) => 't',
            (true, false) => 'T',
            (true, true) => 'R',
            (false, true) => 'r',
        };

        match self.frame.id() {
            Id::Standard(id) => write!(f, "{}{:03X}", cmd, id.as_raw())?,
            Id::Extended(id) => write!(f, "{}{:08X}", cmd, id.as_raw())?,
        }

        write!(f, "{}", self.frame.dlc())?;

        for byte in self.frame.data() {
            write!(f, "{:02X}", *byte)?;
        }

        write!(f, "\r")?;

        Ok(())
    }
}
