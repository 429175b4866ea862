//! Serial port byte source backed by the `serialport` crate

use super::{ByteSource, LineBuffer, ReadOutcome};
use crate::error::{Result, SerialPlotError};
use crate::types::{ConnectionState, SerialSettings};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Size of a single read from the driver
const READ_CHUNK: usize = 256;

/// List the names of serial ports present on this machine
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// A real serial connection
pub struct SerialPortSource {
    port: Option<Box<dyn SerialPort>>,
    state: ConnectionState,
    send_newline: bool,
    buffer: LineBuffer,
}

impl SerialPortSource {
    pub fn new() -> Self {
        Self {
            port: None,
            state: ConnectionState::Disconnected,
            send_newline: false,
            buffer: LineBuffer::default(),
        }
    }

    /// Write the poll newline for half-duplex devices
    fn send_probe(port: &mut dyn SerialPort) -> Result<()> {
        port.write_all(b"\n")?;
        port.flush()?;
        Ok(())
    }
}

impl Default for SerialPortSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSource for SerialPortSource {
    fn open(&mut self, settings: &SerialSettings) -> Result<()> {
        if self.port.is_some() {
            return Err(SerialPlotError::AlreadyOpen);
        }

        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.timeout)
            .open()
            .map_err(|e| SerialPlotError::Connection {
                port: settings.port.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(
            "Opened serial port {} @ {} baud",
            settings.port,
            settings.baud_rate
        );
        self.port = Some(port);
        self.send_newline = settings.send_newline;
        self.buffer.clear();
        self.state = ConnectionState::Connected {
            port: settings.port.clone(),
            baud_rate: settings.baud_rate,
            timeout: settings.timeout,
        };
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<ReadOutcome> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(ReadOutcome::Line(line));
        }

        let port = self.port.as_mut().ok_or(SerialPlotError::NotOpen)?;
        if self.send_newline {
            Self::send_probe(port.as_mut())?;
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        port.set_timeout(timeout)?;

        loop {
            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    self.buffer.extend(&chunk[..n]);
                    if let Some(line) = self.buffer.next_line() {
                        return Ok(ReadOutcome::Line(line));
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(ReadOutcome::TimedOut),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(ReadOutcome::TimedOut);
            }
            port.set_timeout(deadline - now)?;
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialPlotError::NotOpen)?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            tracing::info!(
                "Closed serial port {}",
                port.name().unwrap_or_else(|| "<unnamed>".to_string())
            );
        }
        self.buffer.clear();
        self.state = ConnectionState::Disconnected;
    }

    fn state(&self) -> ConnectionState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_is_closed() {
        let source = SerialPortSource::new();
        assert!(!source.is_open());
        assert_eq!(source.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_read_without_open_fails() {
        let mut source = SerialPortSource::new();
        let err = source.read_line(Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, SerialPlotError::NotOpen));
        assert!(source.write(b"x").is_err());
    }

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let mut source = SerialPortSource::new();
        let settings = SerialSettings::new("/dev/serialplot-does-not-exist", 115200);
        match source.open(&settings) {
            Err(SerialPlotError::Connection { port, .. }) => {
                assert_eq!(port, "/dev/serialplot-does-not-exist")
            }
            other => panic!("expected connection error, got {:?}", other.err()),
        }
        assert!(!source.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut source = SerialPortSource::new();
        source.close();
        source.close();
        assert!(!source.is_open());
    }
}
