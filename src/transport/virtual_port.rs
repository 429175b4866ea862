//! In-memory byte source for testing without hardware
//!
//! [`VirtualPort::pair`] returns the source handed to the pipeline and a
//! [`VirtualDevice`] handle that plays the device side: it feeds lines,
//! injects I/O errors or open failures, and observes what the pipeline did
//! (open/closed state, probe newlines written).

use super::{ByteSource, ReadOutcome};
use crate::error::{Result, SerialPlotError};
use crate::protocol::encode_frame;
use crate::types::{ConnectionState, Sample, SerialSettings};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
enum DeviceEvent {
    Line(String),
    Fail(String),
}

#[derive(Debug, Default)]
struct DeviceState {
    open: bool,
    open_count: u32,
    close_count: u32,
    fail_next_open: Option<String>,
    probe_count: u32,
    written: Vec<u8>,
}

fn lock(state: &Mutex<DeviceState>) -> MutexGuard<'_, DeviceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pipeline side of a virtual serial link
pub struct VirtualPort {
    shared: Arc<Mutex<DeviceState>>,
    events: Receiver<DeviceEvent>,
    state: ConnectionState,
    send_newline: bool,
}

/// Device side of a virtual serial link
#[derive(Clone)]
pub struct VirtualDevice {
    shared: Arc<Mutex<DeviceState>>,
    events: Sender<DeviceEvent>,
}

impl VirtualPort {
    /// Create a connected port/device pair
    pub fn pair() -> (VirtualPort, VirtualDevice) {
        let shared = Arc::new(Mutex::new(DeviceState::default()));
        let (tx, rx) = unbounded();
        (
            VirtualPort {
                shared: shared.clone(),
                events: rx,
                state: ConnectionState::Disconnected,
                send_newline: false,
            },
            VirtualDevice { shared, events: tx },
        )
    }
}

impl ByteSource for VirtualPort {
    fn open(&mut self, settings: &SerialSettings) -> Result<()> {
        let mut shared = lock(&self.shared);
        if shared.open {
            return Err(SerialPlotError::AlreadyOpen);
        }
        if let Some(message) = shared.fail_next_open.take() {
            return Err(SerialPlotError::Connection {
                port: settings.port.clone(),
                message,
            });
        }
        shared.open = true;
        shared.open_count += 1;
        drop(shared);

        self.send_newline = settings.send_newline;
        self.state = ConnectionState::Connected {
            port: settings.port.clone(),
            baud_rate: settings.baud_rate,
            timeout: settings.timeout,
        };
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<ReadOutcome> {
        {
            let mut shared = lock(&self.shared);
            if !shared.open {
                return Err(SerialPlotError::NotOpen);
            }
            if self.send_newline {
                shared.probe_count += 1;
                shared.written.push(b'\n');
            }
        }

        match self.events.recv_timeout(timeout) {
            Ok(DeviceEvent::Line(line)) => Ok(ReadOutcome::Line(line)),
            Ok(DeviceEvent::Fail(message)) => Err(SerialPlotError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                message,
            ))),
            Err(RecvTimeoutError::Timeout) => Ok(ReadOutcome::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(SerialPlotError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "virtual device dropped",
            ))),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut shared = lock(&self.shared);
        if !shared.open {
            return Err(SerialPlotError::NotOpen);
        }
        shared.written.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {
        let mut shared = lock(&self.shared);
        if shared.open {
            shared.open = false;
            shared.close_count += 1;
        }
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state.clone()
    }
}

impl VirtualDevice {
    /// Transmit a raw line; a `\n` is appended if missing
    pub fn send_line(&self, line: &str) {
        let mut line = line.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let _ = self.events.send(DeviceEvent::Line(line));
    }

    /// Transmit a sample as a checksummed frame
    pub fn send_sample(&self, sample: &Sample) {
        let _ = self.events.send(DeviceEvent::Line(encode_frame(sample)));
    }

    /// Make the next read fail as if the device was unplugged
    pub fn inject_io_error(&self, message: impl Into<String>) {
        let _ = self.events.send(DeviceEvent::Fail(message.into()));
    }

    /// Make the next `open` fail with a connection error
    pub fn fail_next_open(&self, message: impl Into<String>) {
        lock(&self.shared).fail_next_open = Some(message.into());
    }

    pub fn is_open(&self) -> bool {
        lock(&self.shared).open
    }

    pub fn open_count(&self) -> u32 {
        lock(&self.shared).open_count
    }

    pub fn close_count(&self) -> u32 {
        lock(&self.shared).close_count
    }

    /// Number of poll newlines written before reads
    pub fn probe_count(&self) -> u32 {
        lock(&self.shared).probe_count
    }

    /// Everything the pipeline wrote to the device
    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared).written.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SerialSettings {
        SerialSettings::new("virtual0", 115200).with_timeout(Duration::from_millis(20))
    }

    #[test]
    fn test_open_twice_fails_fast() {
        let (mut port, device) = VirtualPort::pair();
        port.open(&settings()).unwrap();
        assert!(matches!(
            port.open(&settings()),
            Err(SerialPlotError::AlreadyOpen)
        ));
        assert_eq!(device.open_count(), 1);
        assert!(port.is_open());
    }

    #[test]
    fn test_read_line_and_timeout() {
        let (mut port, device) = VirtualPort::pair();
        port.open(&settings()).unwrap();

        device.send_line("###1, a, 2###");
        assert_eq!(
            port.read_line(Duration::from_millis(20)).unwrap(),
            ReadOutcome::Line("###1, a, 2###\n".to_string())
        );
        assert_eq!(
            port.read_line(Duration::from_millis(5)).unwrap(),
            ReadOutcome::TimedOut
        );
    }

    #[test]
    fn test_probe_newline_written_before_each_read() {
        let (mut port, device) = VirtualPort::pair();
        port.open(&settings().with_send_newline(true)).unwrap();

        let _ = port.read_line(Duration::from_millis(1)).unwrap();
        let _ = port.read_line(Duration::from_millis(1)).unwrap();
        assert_eq!(device.probe_count(), 2);
        assert_eq!(device.written(), b"\n\n");
    }

    #[test]
    fn test_injected_failures() {
        let (mut port, device) = VirtualPort::pair();
        device.fail_next_open("device absent");
        assert!(matches!(
            port.open(&settings()),
            Err(SerialPlotError::Connection { .. })
        ));
        assert!(!device.is_open());

        port.open(&settings()).unwrap();
        device.inject_io_error("unplugged");
        let err = port.read_line(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_fatal_io());

        port.close();
        assert!(!device.is_open());
        assert_eq!(device.close_count(), 1);
    }
}
