//! Core data types for SerialPlot
//!
//! This module contains the fundamental data structures shared by the
//! decoding pipeline and its consumers.
//!
//! # Main Types
//!
//! - [`Sample`] - A decoded `(timestamp, label, value)` triple
//! - [`Color`] - RGB color for a plotted label
//! - [`PlotEntry`] / [`PlotSpec`] - Which labels are rendered, in which order and color
//! - [`ConnectionState`] - Whether the byte source holds an open connection
//! - [`CollectionStats`] - Aggregate counters published by the reader worker

use crate::error::{Result, SerialPlotError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// A single decoded telemetry sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Timestamp as sent by the device
    pub timestamp: f64,
    /// Series label
    pub label: String,
    /// Measured value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: f64, label: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            label: label.into(),
            value,
        }
    }
}

/// RGB color used to draw a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Named colors accepted in configuration files
const NAMED_COLORS: &[(&str, Color)] = &[
    ("white", Color::rgb(255, 255, 255)),
    ("black", Color::rgb(0, 0, 0)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("lime", Color::rgb(0, 255, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("darkred", Color::rgb(139, 0, 0)),
    ("darkgreen", Color::rgb(0, 100, 0)),
    ("darkblue", Color::rgb(0, 0, 139)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("pink", Color::rgb(255, 192, 203)),
    ("brown", Color::rgb(165, 42, 42)),
];

impl Color {
    /// Color used for labels declared without one
    pub const DEFAULT: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`, `#rgb` or a named color (case-insensitive)
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return Self::parse_hex(hex)
                .ok_or_else(|| SerialPlotError::Config(format!("Invalid color '{}'", text)));
        }

        let lower = text.to_ascii_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, color)| *color)
            .ok_or_else(|| SerialPlotError::Config(format!("Unknown color name '{}'", text)))
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => Some(Self::rgb(
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            )),
            3 => {
                let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
                Some(Self::rgb(digit(0)?, digit(1)?, digit(2)?))
            }
            _ => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Color::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// One declared plot: a label and an optional color
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotEntry {
    pub label: String,
    pub color: Option<Color>,
}

impl PlotEntry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// The color to draw with, falling back to [`Color::DEFAULT`]
    pub fn resolved_color(&self) -> Color {
        self.color.unwrap_or_default()
    }
}

/// Ordered set of labels to render
///
/// A declared label with no samples renders as an empty trace; samples whose
/// label is not declared are stored but never rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotSpec {
    entries: Vec<PlotEntry>,
}

impl PlotSpec {
    /// Build a plot spec, rejecting duplicate labels
    pub fn new(entries: Vec<PlotEntry>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.label == entry.label) {
                return Err(SerialPlotError::Config(format!(
                    "Duplicate plot label '{}'",
                    entry.label
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PlotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|e| e.label == label)
    }
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    /// Port name (e.g. `COM3`, `/dev/ttyUSB0`)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout per cycle
    pub timeout: Duration,
    /// Write a newline before each blocking read (half-duplex devices)
    pub send_newline: bool,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            timeout: Duration::from_secs(1),
            send_newline: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_send_newline(mut self, send_newline: bool) -> Self {
        self.send_newline = send_newline;
        self
    }

    /// Reject settings no port could be opened with
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(SerialPlotError::Config("Serial port must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(SerialPlotError::Config("Baud rate must be positive".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(SerialPlotError::Config("Read timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Connection state of a byte source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected {
        port: String,
        baud_rate: u32,
        timeout: Duration,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    /// Display name for the state
    pub fn display_name(&self) -> String {
        match self {
            ConnectionState::Disconnected => "Disconnected".to_string(),
            ConnectionState::Connected {
                port, baud_rate, ..
            } => format!("Connected to {} @ {} baud", port, baud_rate),
        }
    }
}

/// Aggregate statistics for a recording session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Raw lines received from the byte source
    pub lines_received: u64,
    /// Lines that decoded into a stored sample
    pub samples_decoded: u64,
    /// Lines the decoder rejected
    pub lines_rejected: u64,
    /// Read cycles that produced no line
    pub read_timeouts: u64,
    /// Fatal I/O errors that ended a session
    pub io_errors: u64,
    /// Messages dropped because the UI queue was full
    pub dropped_messages: u64,
}

impl CollectionStats {
    /// Fraction of received lines that were rejected, in percent
    pub fn reject_rate(&self) -> f64 {
        if self.lines_received == 0 {
            0.0
        } else {
            (self.lines_rejected as f64 / self.lines_received as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_hex() {
        assert_eq!(Color::parse("#ff8000").unwrap(), Color::rgb(255, 128, 0));
        assert_eq!(Color::parse("#0f0").unwrap(), Color::rgb(0, 255, 0));
        assert!(Color::parse("#ff80").is_err());
        assert!(Color::parse("#gg0000").is_err());
    }

    #[test]
    fn test_color_parse_named() {
        assert_eq!(Color::parse("Red").unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(Color::parse(" cyan ").unwrap(), Color::rgb(0, 255, 255));
        assert!(Color::parse("not-a-color").is_err());
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::rgb(1, 2, 255).to_string(), "#0102ff");
    }

    #[test]
    fn test_plot_entry_default_color() {
        let entry = PlotEntry::new("temp");
        assert_eq!(entry.resolved_color(), Color::rgb(255, 255, 255));

        let entry = entry.with_color(Color::rgb(0, 0, 255));
        assert_eq!(entry.resolved_color(), Color::rgb(0, 0, 255));
    }

    #[test]
    fn test_plot_spec_rejects_duplicates() {
        let spec = PlotSpec::new(vec![PlotEntry::new("a"), PlotEntry::new("a")]);
        assert!(spec.is_err());

        let spec = PlotSpec::new(vec![PlotEntry::new("a"), PlotEntry::new("b")]).unwrap();
        assert_eq!(spec.len(), 2);
        assert!(spec.contains("b"));
        assert!(!spec.contains("c"));
    }

    #[test]
    fn test_serial_settings_validate() {
        assert!(SerialSettings::new("COM3", 9600).validate().is_ok());
        assert!(SerialSettings::new(" ", 9600).validate().is_err());
        assert!(SerialSettings::new("COM3", 0).validate().is_err());
        assert!(SerialSettings::new("COM3", 9600)
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_connection_state() {
        let state = ConnectionState::Connected {
            port: "COM3".to_string(),
            baud_rate: 115200,
            timeout: Duration::from_secs(1),
        };
        assert!(state.is_connected());
        assert!(state.display_name().contains("COM3"));
        assert!(!ConnectionState::Disconnected.is_connected());
    }

    #[test]
    fn test_reject_rate() {
        let stats = CollectionStats {
            lines_received: 4,
            lines_rejected: 1,
            ..Default::default()
        };
        assert!((stats.reject_rate() - 25.0).abs() < 1e-9);
        assert_eq!(CollectionStats::default().reject_rate(), 0.0);
    }
}
