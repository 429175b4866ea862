//! Error handling for the SerialPlot pipeline
//!
//! This module defines the error taxonomy shared by the byte source, the
//! reader worker, the controller and the configuration layer, together with
//! a Result alias for use throughout the crate.
//!
//! Malformed frames are deliberately *not* represented here: the frame
//! decoder reports them as [`crate::protocol::Decoded::Rejected`], and read
//! timeouts are [`crate::transport::ReadOutcome::TimedOut`].

use thiserror::Error;

/// Main error type for SerialPlot operations
#[derive(Error, Debug)]
pub enum SerialPlotError {
    /// Opening the serial device failed (bad port, permission, device absent)
    #[error("Failed to open {port}: {message}")]
    Connection { port: String, message: String },

    /// `open` was called on a byte source that already holds a connection
    #[error("Connection already open")]
    AlreadyOpen,

    /// A read or write was attempted without an open connection
    #[error("Connection not open")]
    NotOpen,

    /// A recording session is already active
    #[error("Already recording")]
    AlreadyRecording,

    /// Errors reported by the serial port driver
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to Rhai script compilation
    #[error("Script error: {0}")]
    Script(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SerialPlotError>,
    },
}

impl SerialPlotError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SerialPlotError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        SerialPlotError::Script(err.to_string())
    }

    /// Whether this error ends a streaming session (mid-stream read/write failure)
    pub fn is_fatal_io(&self) -> bool {
        match self {
            SerialPlotError::Io(_) | SerialPlotError::Serial(_) | SerialPlotError::NotOpen => {
                true
            }
            SerialPlotError::WithContext { source, .. } => source.is_fatal_io(),
            _ => false,
        }
    }
}

/// Result type alias for SerialPlot operations
pub type Result<T> = std::result::Result<T, SerialPlotError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SerialPlotError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SerialPlotError::from_rhai_error(e).with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SerialPlotError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SerialPlotError::Io(e).with_context(f()))
    }
}
