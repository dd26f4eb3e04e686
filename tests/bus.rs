// Drives the bus harness over an in-memory adapter.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use embedded_can::Frame as _;
use serial_can::{Bitrate, Bus, ConnectionError, Error, Frame, FrameError, Transport};

#[derive(Default)]
struct Adapter {
    written: Vec<u8>,
    incoming: VecDeque<u8>,
    timeout: Duration,
    fail_writes: bool,
    fail_reads: bool,
    chatter: bool,
}

/// Cloneable handle so the test can look at the adapter after the bus
/// takes ownership.
#[derive(Clone, Default)]
struct Loopback(Rc<RefCell<Adapter>>);

impl Loopback {
    fn written(&self) -> String {
        String::from_utf8(self.0.borrow().written.clone()).unwrap()
    }

    fn clear_written(&self) {
        self.0.borrow_mut().written.clear();
    }

    fn feed(&self, bytes: &[u8]) {
        self.0.borrow_mut().incoming.extend(bytes);
    }
}

impl Read for Loopback {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut adapter = self.0.borrow_mut();
        if adapter.fail_reads {
            return Err(ErrorKind::BrokenPipe.into());
        }

        if adapter.incoming.is_empty() && adapter.chatter {
            drop(adapter);
            thread::sleep(Duration::from_millis(1));
            buf[..2].copy_from_slice(b"z\r");
            return Ok(2);
        }

        if adapter.incoming.is_empty() {
            let timeout = adapter.timeout;
            drop(adapter);
            thread::sleep(timeout);
            return Err(ErrorKind::TimedOut.into());
        }

        let n = buf.len().min(adapter.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(adapter.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for Loopback {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut adapter = self.0.borrow_mut();
        if adapter.fail_writes {
            return Err(ErrorKind::BrokenPipe.into());
        }
        adapter.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Loopback {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.0.borrow_mut().timeout = timeout;
        Ok(())
    }
}

fn open() -> (Bus<Loopback>, Loopback) {
    let adapter = Loopback::default();
    let bus = Bus::new(adapter.clone(), Bitrate::Rate125kbit).unwrap();
    adapter.clear_written();
    (bus, adapter)
}

#[test]
fn test_open_sequence() {
    let adapter = Loopback::default();
    let bus = Bus::new(adapter.clone(), Bitrate::Rate500kbit).unwrap();

    assert!(bus.is_open());
    assert_eq!(bus.bitrate(), Bitrate::Rate500kbit);
    assert_eq!(adapter.written(), "C\rS6\rO\r");
}

#[test]
fn test_open_write_failure() {
    let adapter = Loopback::default();
    adapter.0.borrow_mut().fail_writes = true;

    let err = Bus::new(adapter, Bitrate::Rate125kbit).err().unwrap();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::Configure(_))
    ));
}

#[test]
fn test_nonexistant_device() {
    let err = Bus::open("/dev/this-adapter-does-not-exist", 125_000)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Connection(ConnectionError::Port { .. })));
}

#[test]
fn test_send_standard_and_extended() {
    let (mut bus, adapter) = open();

    let frame = Frame::from_raw(0x123, false, &[0x11, 0x22, 0x33, 0x44]).unwrap();
    bus.send(&frame).unwrap();
    assert_eq!(adapter.written(), "t123411223344\r");

    adapter.clear_written();
    let frame = Frame::from_raw(0x123, true, &[0x11, 0x22, 0x33, 0x44]).unwrap();
    assert!(frame.is_extended());
    bus.send(&frame).unwrap();
    assert_eq!(adapter.written(), "T00000123411223344\r");
}

#[test]
fn test_oversized_payload_never_reaches_the_bus() {
    let (mut bus, adapter) = open();

    assert_eq!(
        Frame::new_standard(0x123, &[0; 9]),
        Err(FrameError::PayloadTooLong(9))
    );
    assert!(bus.send(&Frame::new_standard(0x123, &[0; 8]).unwrap()).is_ok());
    assert_eq!(adapter.written(), "t12380000000000000000\r");
}

#[test]
fn test_transmit_failure() {
    let (mut bus, adapter) = open();
    adapter.0.borrow_mut().fail_writes = true;

    let frame = Frame::new_standard(0x10, &[0x01]).unwrap();
    assert!(matches!(bus.send(&frame), Err(Error::Transmit(_))));
}

#[test]
fn test_receive_zero_timeout_returns_immediately() {
    let (mut bus, _adapter) = open();

    let start = Instant::now();
    assert_eq!(bus.receive(Duration::ZERO).unwrap(), None);
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_receive_waits_for_timeout() {
    let (mut bus, _adapter) = open();

    let start = Instant::now();
    assert_eq!(bus.receive(Duration::from_millis(50)).unwrap(), None);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_receive_deadline_under_non_frame_traffic() {
    let (mut bus, adapter) = open();
    adapter.0.borrow_mut().chatter = true;

    let start = Instant::now();
    assert_eq!(bus.receive(Duration::from_millis(50)).unwrap(), None);
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_receive_frame() {
    let (mut bus, adapter) = open();
    adapter.feed(b"\rT0001234520C18\r");

    let frame = bus.receive(Duration::from_secs(1)).unwrap().unwrap();
    assert!(frame.is_extended());
    assert_eq!(frame.raw_id(), 0x12345);
    assert_eq!(frame.data(), &[0x0C, 0x18]);
    assert!(frame.timestamp().is_some());
}

#[test]
fn test_receive_failure() {
    let (mut bus, adapter) = open();
    adapter.0.borrow_mut().fail_reads = true;

    assert!(matches!(
        bus.receive(Duration::ZERO),
        Err(Error::Receive(_))
    ));
}

#[test]
fn test_close_twice() {
    let (mut bus, adapter) = open();

    bus.close().unwrap();
    bus.close().unwrap();
    assert!(!bus.is_open());
    assert_eq!(adapter.written(), "C\r");
}

#[test]
fn test_no_reuse_after_close() {
    let (mut bus, _adapter) = open();
    bus.close().unwrap();

    let frame = Frame::new_standard(0x10, &[]).unwrap();
    assert!(matches!(bus.send(&frame), Err(Error::Closed)));
    assert!(matches!(bus.receive(Duration::ZERO), Err(Error::Closed)));
}

#[test]
fn test_drop_closes() {
    let (bus, adapter) = open();
    drop(bus);
    assert_eq!(adapter.written(), "C\r");
}
