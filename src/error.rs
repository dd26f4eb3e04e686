//! Errors raised while building frames, picking a bit rate or decoding
//! lines from the adapter.

use thiserror::Error;

/// A frame that violates the classic CAN limits.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// More than eight payload bytes.
    #[error("payload of {0} bytes exceeds the 8 byte limit")]
    PayloadTooLong(usize),
    /// Identifier does not fit in 11 bits.
    #[error("standard identifier {0:#X} exceeds 0x7FF")]
    StandardIdOutOfRange(u32),
    /// Identifier does not fit in 29 bits.
    #[error("extended identifier {0:#X} exceeds 0x1FFFFFFF")]
    ExtendedIdOutOfRange(u32),
}

/// Bit rate outside the fixed slcan setup table.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unsupported bit rate: {0} bit/s")]
pub struct UnsupportedBitrate(pub u32);

/// A line from the adapter that could not be decoded into a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Not a frame line, or truncated.
    #[error("malformed slcan line")]
    Malformed,
    /// Well formed, but the frame itself is invalid.
    #[error(transparent)]
    Frame(#[from] FrameError),
}
