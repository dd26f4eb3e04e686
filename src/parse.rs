//! Decoding of the lines an slcan adapter sends back.
//!
//! Every response ends in a carriage return. Frame lines start with the
//! same letters used to transmit:
//!
//! ```text
//! t1230            standard, no data
//! t4563112233      standard, 3 bytes
//! T12ABCDEF2AA55   extended, 2 bytes
//! r1230 / R...     remote frames
//! ```
//!
//! Adapters put in timestamp mode (`Z1`) append four hex digits of
//! milliseconds. That suffix is accepted and dropped; the harness stamps
//! frames with host time instead.
//!
//! A bare carriage return acknowledges a command and a bell (`0x07`)
//! rejects one.

use nom::{
    bytes::complete::take_while_m_n,
    character::complete::one_of,
    combinator::{all_consuming, map_res, opt},
    IResult,
};

use crate::error::{FrameError, ParseError};
use crate::frame::{Frame, MAX_DATA_LEN};

/// Terminates every command and response.
pub const CR: u8 = b'\r';

/// Sent instead of a carriage return when a command fails.
pub const BELL: u8 = 0x07;

/// One decoded response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming<'a> {
    /// A frame seen on the bus.
    Frame(Frame),
    /// Empty line: the previous command was accepted.
    Ack,
    /// Anything else (version, status flags, `z` transmit acks...).
    Other(&'a str),
}

/// Classify a line with its trailing carriage return removed.
pub fn parse_line(line: &str) -> Result<Incoming<'_>, ParseError> {
    match line.chars().next() {
        None => Ok(Incoming::Ack),
        Some('t' | 'T' | 'r' | 'R') => parse_frame(line).map(Incoming::Frame),
        Some(_) => Ok(Incoming::Other(line)),
    }
}

/// Decode a single frame line.
pub fn parse_frame(line: &str) -> Result<Frame, ParseError> {
    let (mut rest, (kind, id, dlc)) = header(line).map_err(|_| ParseError::Malformed)?;

    let extended = kind.is_ascii_uppercase();
    let remote = matches!(kind, 'r' | 'R');
    let dlc = dlc as usize;

    if dlc > MAX_DATA_LEN {
        return Err(FrameError::PayloadTooLong(dlc).into());
    }

    let mut data = [0u8; MAX_DATA_LEN];
    if !remote {
        for byte in data.iter_mut().take(dlc) {
            let (next, value) = hex(2)(rest).map_err(|_| ParseError::Malformed)?;
            *byte = value as u8;
            rest = next;
        }
    }

    all_consuming(opt(hex(4)))(rest).map_err(|_| ParseError::Malformed)?;

    let frame = if remote {
        Frame::remote_from_raw(id, extended, dlc)?
    } else {
        Frame::from_raw(id, extended, &data[..dlc])?
    };

    Ok(frame)
}

fn header(input: &str) -> IResult<&str, (char, u32, u32)> {
    let (input, kind) = one_of("tTrR")(input)?;
    let width = if kind.is_ascii_uppercase() { 8 } else { 3 };
    let (input, id) = hex(width)(input)?;
    let (input, dlc) = hex(1)(input)?;

    Ok((input, (kind, id, dlc)))
}

/// Exactly `digits` hex characters.
fn hex<'a>(digits: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(
        take_while_m_n(digits, digits, |c: char| c.is_ascii_hexdigit()),
        |s: &str| u32::from_str_radix(s, 16),
    )
}
