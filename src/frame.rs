use core::fmt;
use core::time::Duration;
use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::FrameError;

/// Largest payload of a classic CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// Serial CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    id: Id,
    remote: bool,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
    timestamp: Option<Duration>,
}

impl Frame {
    /// Data frame with an 11-bit identifier.
    pub fn new_standard(id: u16, data: &[u8]) -> Result<Self, FrameError> {
        Self::from_raw(u32::from(id), false, data)
    }

    /// Data frame with a 29-bit identifier.
    pub fn new_extended(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        Self::from_raw(id, true, data)
    }

    /// Data frame from a raw identifier, range checked against `extended`.
    pub fn from_raw(id: u32, extended: bool, data: &[u8]) -> Result<Self, FrameError> {
        Self::build(raw_id(id, extended)?, false, data.len(), data)
    }

    /// Remote frame from a raw identifier.
    pub fn remote_from_raw(id: u32, extended: bool, dlc: usize) -> Result<Self, FrameError> {
        Self::build(raw_id(id, extended)?, true, dlc, &[])
    }

    /// Copy of any `embedded_can` frame, re-checking its length.
    pub fn from_foreign(frame: &impl embedded_can::Frame) -> Result<Self, FrameError> {
        if frame.is_remote_frame() {
            Self::build(frame.id(), true, frame.dlc(), &[])
        } else {
            Self::build(frame.id(), false, frame.data().len(), frame.data())
        }
    }

    fn build(id: Id, remote: bool, dlc: usize, data: &[u8]) -> Result<Self, FrameError> {
        if dlc > MAX_DATA_LEN {
            return Err(FrameError::PayloadTooLong(dlc));
        }

        let mut data_all = [0; MAX_DATA_LEN];
        data_all[..data.len()].copy_from_slice(data);

        Ok(Self {
            id,
            remote,
            dlc: dlc as u8,
            data: data_all,
            timestamp: None,
        })
    }

    /// Raw identifier value, without the extended tag.
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => u32::from(id.as_raw()),
            Id::Extended(id) => id.as_raw(),
        }
    }

    /// Time of reception, if the frame came off the bus.
    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    /// Same frame, stamped with `timestamp`.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

fn raw_id(id: u32, extended: bool) -> Result<Id, FrameError> {
    if extended {
        ExtendedId::new(id)
            .map(Id::Extended)
            .ok_or(FrameError::ExtendedIdOutOfRange(id))
    } else {
        u16::try_from(id)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
            .ok_or(FrameError::StandardIdOutOfRange(id))
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::build(id.into(), false, data.len(), data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        Self::build(id.into(), true, dlc, &[]).ok()
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[0..self.dlc as usize]
        }
    }

    fn is_extended(&self) -> bool {
        match self.id {
            Id::Extended(_) => true,
            Id::Standard(_) => false,
        }
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }
}

/// candump style: `123 S [2] 0C 18`, `12345 X R [0]`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use embedded_can::Frame as _;

        match self.id {
            Id::Standard(id) => write!(f, "{:03X} S", id.as_raw())?,
            Id::Extended(id) => write!(f, "{:08X} X", id.as_raw())?,
        }

        if self.remote {
            write!(f, " R")?;
        }

        write!(f, " [{}]", self.dlc)?;

        for byte in self.data() {
            write!(f, " {:02X}", byte)?;
        }

        Ok(())
    }
}
