//! Blocking slcan bus harness.
//!
//! A [`Bus`] owns a serial transport for the span of one bench run:
//! it is opened at a bit rate, used for a few sends and receives, and
//! closed. Closing is idempotent and also happens on drop.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serialport::SerialPort;
use thiserror::Error;

use crate::error::{FrameError, UnsupportedBitrate};
use crate::parse::{self, Incoming, BELL, CR};
use crate::{Bitrate, Close, Frame, Open, Setup, Transmit};

/// Serial line speed used when none is configured. USB CDC adapters
/// ignore it.
pub const DEFAULT_TTY_BAUDRATE: u32 = 115_200;

/// Bytes kept while waiting for a terminator before the buffer is
/// considered garbage.
const MAX_PENDING: usize = 256;

/// Failure to bring the adapter up.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The serial device could not be opened.
    #[error("unable to open '{device}': {source}")]
    Port {
        device: String,
        #[source]
        source: serialport::Error,
    },
    /// Bit rate outside the setup table.
    #[error(transparent)]
    Bitrate(#[from] UnsupportedBitrate),
    /// Writing the setup sequence failed.
    #[error("unable to configure adapter: {0}")]
    Configure(#[source] io::Error),
}

/// Errors from the bus harness.
#[derive(Error, Debug)]
pub enum Error {
    /// Device missing or bit rate misconfigured.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Writing a frame to the adapter failed.
    #[error("transmit failed: {0}")]
    Transmit(#[source] io::Error),
    /// Reading from the adapter failed.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
    /// The frame cannot be sent as classic CAN.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// The handle was already closed.
    #[error("bus is closed")]
    Closed,
}

/// Byte stream to an slcan adapter.
pub trait Transport: Read + Write {
    /// Longest time the next `read` may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Where and how to open the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Serial device, e.g. `/dev/ttyACM0` or `COM3`.
    pub device: String,
    /// CAN bit rate in bits per second.
    pub bitrate: u32,
    /// Serial line speed.
    pub tty_baudrate: u32,
}

impl BusConfig {
    pub fn new(device: impl Into<String>, bitrate: u32) -> Self {
        Self {
            device: device.into(),
            bitrate,
            tty_baudrate: DEFAULT_TTY_BAUDRATE,
        }
    }
}

/// An open slcan adapter.
pub struct Bus<T: Transport = Box<dyn SerialPort>> {
    transport: Option<T>,
    bitrate: Bitrate,
    pending: Vec<u8>,
    ready: VecDeque<Frame>,
}

impl Bus {
    /// Open the adapter at `device` and start it at `bitrate` bits per
    /// second.
    pub fn open(device: &str, bitrate: u32) -> Result<Self, Error> {
        Self::open_with(&BusConfig::new(device, bitrate))
    }

    pub fn open_with(config: &BusConfig) -> Result<Self, Error> {
        let bitrate = Bitrate::from_bps(config.bitrate).map_err(ConnectionError::from)?;

        let port = serialport::new(&config.device, config.tty_baudrate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|source| ConnectionError::Port {
                device: config.device.clone(),
                source,
            })?;

        info!("Opened {} at {}", config.device, bitrate);
        Bus::new(port, bitrate)
    }
}

impl<T: Transport> Bus<T> {
    /// Reset the adapter on `transport`, set the bit rate and open the
    /// CAN channel.
    pub fn new(mut transport: T, bitrate: Bitrate) -> Result<Self, Error> {
        let setup = format!("{}{}{}", Close::new(), Setup::new(bitrate), Open::new());
        transport
            .write_all(setup.as_bytes())
            .and_then(|_| transport.flush())
            .map_err(ConnectionError::Configure)?;

        debug!("Channel open at {}", bitrate);

        Ok(Self {
            transport: Some(transport),
            bitrate,
            pending: Vec::new(),
            ready: VecDeque::new(),
        })
    }

    pub fn bitrate(&self) -> Bitrate {
        self.bitrate
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Transmit one frame. Not retried on failure.
    pub fn send(&mut self, frame: &impl embedded_can::Frame) -> Result<(), Error> {
        let transmit = Transmit::new(frame)?;
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;

        transport
            .write_all(transmit.to_string().as_bytes())
            .and_then(|_| transport.flush())
            .map_err(Error::Transmit)?;

        debug!("Sent {:?}", transmit);
        Ok(())
    }

    /// Wait up to `timeout` for the next frame. `Ok(None)` means nothing
    /// arrived in time.
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<Frame>, Error> {
        if self.transport.is_none() {
            return Err(Error::Closed);
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 64];
        let mut polled = false;

        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            // At least one read, even with a zero timeout.
            if polled && Instant::now() >= deadline {
                return Ok(None);
            }
            polled = true;

            let remaining = deadline.saturating_duration_since(Instant::now());
            let transport = self.transport.as_mut().ok_or(Error::Closed)?;
            transport
                .set_read_timeout(remaining)
                .map_err(Error::Receive)?;

            match transport.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default();
                    self.pending.extend_from_slice(&chunk[..n]);
                    self.collect_frames(now);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(Error::Receive(e)),
            }
        }
    }

    /// Stop the CAN channel and release the transport. Does nothing on
    /// a closed bus.
    pub fn close(&mut self) -> Result<(), Error> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };

        self.pending.clear();
        self.ready.clear();
        transport
            .write_all(Close::new().to_string().as_bytes())
            .and_then(|_| transport.flush())
            .map_err(Error::Transmit)?;

        info!("Closed bus");
        Ok(())
    }

    /// Move every complete frame line out of the receive buffer, stamped
    /// with the time of the read that completed it.
    fn collect_frames(&mut self, stamp: Duration) {
        while let Some(pos) = self.pending.iter().position(|&b| b == CR || b == BELL) {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();

            if line[pos] == BELL {
                warn!("Adapter rejected a command");
                continue;
            }

            let Ok(text) = std::str::from_utf8(&line[..pos]) else {
                warn!("Dropping non-ASCII line: {:02X?}", &line[..pos]);
                continue;
            };

            match parse::parse_line(text) {
                Ok(Incoming::Frame(frame)) => self.ready.push_back(frame.with_timestamp(stamp)),
                Ok(Incoming::Ack) => {}
                Ok(Incoming::Other(resp)) => debug!("Response: {}", resp),
                Err(e) => warn!("Dropping line {:?}: {}", text, e),
            }
        }

        if self.pending.len() > MAX_PENDING {
            warn!("Discarding {} unterminated bytes", self.pending.len());
            self.pending.clear();
        }
    }
}

impl<T: Transport> Drop for Bus<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing bus: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted reads; writes are discarded.
    struct Script(VecDeque<Vec<u8>>);

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut bytes) = self.0.pop_front() else {
                return Err(ErrorKind::TimedOut.into());
            };

            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            if n < bytes.len() {
                self.0.push_front(bytes.split_off(n));
            }
            Ok(n)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Script {
        fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    fn bus(reads: &[&[u8]]) -> Bus<Script> {
        let script = Script(reads.iter().map(|r| r.to_vec()).collect());
        Bus::new(script, Bitrate::Rate125kbit).unwrap()
    }

    #[test]
    fn split_across_reads() {
        let mut bus = bus(&[b"t12", b"3211", b"22\r"]);
        let frame = bus.receive(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(frame.raw_id(), 0x123);
        assert!(frame.timestamp().is_some());
    }

    #[test]
    fn skips_acks_bells_and_junk() {
        let mut bus = bus(&[b"\r\x07z\r???\rt0101AA\r"]);
        let frame = bus.receive(Duration::ZERO).unwrap().unwrap();
        assert_eq!(frame.raw_id(), 0x010);
        assert_eq!(bus.receive(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn keeps_following_frames_buffered() {
        let mut bus = bus(&[b"t1000\rt2000\r"]);
        let first = bus.receive(Duration::ZERO).unwrap().unwrap();
        let second = bus.receive(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first.raw_id(), 0x100);
        assert_eq!(second.raw_id(), 0x200);
    }

    #[test]
    fn frames_from_one_read_share_a_timestamp() {
        let mut bus = bus(&[b"t1000\rt2000\r"]);
        let first = bus.receive(Duration::ZERO).unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = bus.receive(Duration::ZERO).unwrap().unwrap();
        assert!(first.timestamp().is_some());
        assert_eq!(first.timestamp(), second.timestamp());
    }

    #[test]
    fn unterminated_garbage_is_discarded() {
        let mut bus = bus(&[&[b'x'; MAX_PENDING + 1]]);
        assert_eq!(bus.receive(Duration::from_millis(20)).unwrap(), None);
        assert!(bus.pending.is_empty());
    }

    #[test]
    fn unsupported_bitrate_is_a_connection_error() {
        let err = Bus::open("/dev/null", 83_333).err().unwrap();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Bitrate(UnsupportedBitrate(83_333)))
        ));
    }
}
