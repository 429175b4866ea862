//! Byte Source Adapter - abstraction over a serial-like connection
//!
//! This module provides a common trait for everything the reader worker
//! can pull lines from, enabling both real serial ports (via the
//! `serialport` crate) and an in-memory virtual device for testing.
//!
//! # Contract
//!
//! - At most one open connection per source; `open` on an open source fails
//!   with [`SerialPlotError::AlreadyOpen`](crate::error::SerialPlotError::AlreadyOpen).
//! - `read_line` expiring without a full line is [`ReadOutcome::TimedOut`],
//!   not an error.
//! - With [`SerialSettings::send_newline`] set, each blocking read is preceded
//!   by a single flushed `\n` to poll half-duplex devices.
//! - Lines are returned verbatim, terminator included.

pub mod line_buffer;
pub mod serial;
pub mod virtual_port;

pub use line_buffer::LineBuffer;
pub use serial::{list_ports, SerialPortSource};
pub use virtual_port::{VirtualDevice, VirtualPort};

use crate::error::Result;
use crate::types::{ConnectionState, SerialSettings};
use std::time::Duration;

/// Result of one read cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete raw line, terminator included
    Line(String),
    /// No complete line arrived within the timeout
    TimedOut,
}

/// Unified interface for line-oriented byte sources
///
/// Implementations must be `Send` so the source can be moved onto the
/// reader worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait ByteSource: Send {
    /// Open a connection
    fn open(&mut self, settings: &SerialSettings) -> Result<()>;

    /// Block for at most `timeout` waiting for one line
    fn read_line(&mut self, timeout: Duration) -> Result<ReadOutcome>;

    /// Write raw bytes to the device
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the connection; a no-op when already closed
    fn close(&mut self);

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Check if a connection is open
    fn is_open(&self) -> bool {
        self.state().is_connected()
    }
}
