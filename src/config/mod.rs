//! Configuration module for SerialPlot
//!
//! [`AppConfig`] is the user-editable TOML document: plot labels, serial
//! connection parameters and optional Rhai hooks. It is never applied
//! directly. [`AppConfig::compile`] validates every field and compiles the
//! scripts into a [`PipelineConfig`], so a config with any error leaves the
//! running pipeline untouched.
//!
//! # App Data Location
//!
//! The default config file lives in the platform data directory:
//! - **Linux**: `~/.local/share/dev.serialplot.serialplot-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.serialplot.serialplot-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.serialplot.serialplot-rs\config.toml`
//!
//! # Example
//!
//! ```toml
//! plot_labels = ["temp", { label = "rpm", color = "#ff8000" }]
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! timeout_secs = 0.5
//!
//! [protocol]
//! framing = "unchecked"
//! ```

use crate::error::{Result, SerialPlotError};
use crate::protocol::{Framing, Ingestor, LineDecoder, PostProcessor};
use crate::scripting::ScriptEngine;
use crate::types::{Color, PlotEntry, PlotSpec, SerialSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.serialplot.serialplot-rs";

/// Default config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default serial port
pub const DEFAULT_PORT: &str = "COM3";

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 192_500;

/// Default read timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 1.0;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        SerialPlotError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            SerialPlotError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Config Document ====================

/// One `plot_labels` entry: a bare label or a label with a color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlotLabelConfig {
    Label(String),
    Styled {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
}

impl PlotLabelConfig {
    pub fn label(&self) -> &str {
        match self {
            PlotLabelConfig::Label(label) | PlotLabelConfig::Styled { label, .. } => label,
        }
    }

    fn to_entry(&self) -> Result<PlotEntry> {
        let entry = PlotEntry::new(self.label());
        match self {
            PlotLabelConfig::Styled {
                color: Some(color), ..
            } => {
                let color = Color::parse(color).map_err(|e| {
                    SerialPlotError::Config(format!(
                        "Invalid color for plot label '{}': {}",
                        self.label(),
                        e
                    ))
                })?;
                Ok(entry.with_color(color))
            }
            _ => Ok(entry),
        }
    }
}

impl From<&str> for PlotLabelConfig {
    fn from(label: &str) -> Self {
        PlotLabelConfig::Label(label.to_string())
    }
}

/// `[serial]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_secs: f64,
    pub send_newline: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            send_newline: false,
        }
    }
}

impl SerialConfig {
    /// Validate and convert into connection settings
    pub fn to_settings(&self) -> Result<SerialSettings> {
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(SerialPlotError::Config(format!(
                "Serial timeout must be a positive number of seconds, got {}",
                self.timeout_secs
            )));
        }
        let timeout = Duration::try_from_secs_f64(self.timeout_secs)
            .map_err(|e| SerialPlotError::Config(format!("Invalid serial timeout: {}", e)))?;

        let settings = SerialSettings::new(self.port.clone(), self.baud_rate)
            .with_timeout(timeout)
            .with_send_newline(self.send_newline);
        settings.validate()?;
        Ok(settings)
    }
}

/// `[protocol]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Built-in framing, used when no `parse_script` is given
    pub framing: Framing,
    /// Rhai source defining `parse_line(line)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_script: Option<String>,
    /// Rhai source defining `process_line(ts, label, value)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_script: Option<String>,
}

/// The user-editable configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub plot_labels: Vec<PlotLabelConfig>,
    pub serial: SerialConfig,
    pub protocol: ProtocolConfig,
}

impl AppConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| SerialPlotError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Render the config as TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| {
                SerialPlotError::Serialization(format!("Failed to serialize config: {}", e))
            })
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SerialPlotError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Load the default config file, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SerialPlotError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| {
            SerialPlotError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Build the plot spec from `plot_labels`
    pub fn plot_spec(&self) -> Result<PlotSpec> {
        let entries = self
            .plot_labels
            .iter()
            .map(PlotLabelConfig::to_entry)
            .collect::<Result<Vec<_>>>()?;
        PlotSpec::new(entries)
    }

    /// Validate everything and compile the scripts
    ///
    /// Nothing is returned unless every field is valid.
    pub fn compile(&self, engine: &ScriptEngine) -> Result<PipelineConfig> {
        let plot_spec = self.plot_spec()?;
        let serial = self.serial.to_settings()?;

        let mut ingestor = match &self.protocol.parse_script {
            Some(source) => Ingestor::new(Arc::new(
                engine
                    .compile_decoder(source)
                    .map_err(|e| e.with_context("parse_script"))?,
            )),
            None => Ingestor::with_framing(self.protocol.framing),
        };
        if let Some(source) = &self.protocol.process_script {
            ingestor = ingestor.with_post_process(Arc::new(
                engine
                    .compile_post_processor(source)
                    .map_err(|e| e.with_context("process_script"))?,
            ));
        }

        Ok(PipelineConfig {
            plot_spec,
            serial,
            ingestor,
        })
    }
}

// ==================== Validated Config ====================

/// A validated configuration the controller can swap in as a whole
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub plot_spec: PlotSpec,
    pub serial: SerialSettings,
    pub ingestor: Ingestor,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            plot_spec: PlotSpec::default(),
            serial: SerialSettings::new(DEFAULT_PORT, DEFAULT_BAUD_RATE),
            ingestor: Ingestor::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(serial: SerialSettings) -> Self {
        Self {
            serial,
            ..Self::default()
        }
    }

    pub fn with_plot_spec(mut self, plot_spec: PlotSpec) -> Self {
        self.plot_spec = plot_spec;
        self
    }

    pub fn with_serial(mut self, serial: SerialSettings) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_framing(self, framing: Framing) -> Self {
        self.with_decoder(framing)
    }

    /// Use a custom decoder (e.g. a closure `Fn(&str) -> Decoded`)
    pub fn with_decoder(mut self, decoder: impl LineDecoder + 'static) -> Self {
        self.ingestor = self.ingestor.with_decoder(Arc::new(decoder));
        self
    }

    /// Use a post-process hook (e.g. a closure `Fn(Sample) -> Sample`)
    pub fn with_post_process(mut self, post_process: impl PostProcessor + 'static) -> Self {
        self.ingestor = self.ingestor.with_post_process(Arc::new(post_process));
        self
    }

    /// Validate the parts that are not checked on construction
    pub fn validate(&self) -> Result<()> {
        self.serial.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Decoded;
    use crate::types::Sample;

    const EXAMPLE: &str = r##"
plot_labels = ["temp", { label = "rpm", color = "#ff8000" }, { label = "v" }]

[serial]
port = "/dev/ttyUSB0"
baud_rate = 115200
timeout_secs = 0.5
send_newline = true

[protocol]
framing = "unchecked"
"##;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.serial.port, "COM3");
        assert_eq!(config.serial.baud_rate, 192_500);
        assert_eq!(config.serial.timeout_secs, 1.0);
        assert!(!config.serial.send_newline);
        assert_eq!(config.protocol.framing, Framing::Checksummed);
        assert!(config.plot_labels.is_empty());
    }

    #[test]
    fn test_parse_example() {
        let config = AppConfig::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.plot_labels.len(), 3);
        assert_eq!(config.plot_labels[1].label(), "rpm");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.protocol.framing, Framing::Unchecked);

        let compiled = config.compile(&ScriptEngine::new()).unwrap();
        let entries = compiled.plot_spec.entries();
        assert_eq!(entries[0].color, None);
        assert_eq!(entries[1].color, Some(Color::rgb(255, 128, 0)));
        assert_eq!(compiled.serial.timeout, Duration::from_millis(500));
        assert!(compiled.serial.send_newline);
        assert!(!compiled.ingestor.decode("###1, a, 2###").is_rejected());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_plot_labels_must_be_list() {
        let result = AppConfig::from_toml("plot_labels = \"temp\"");
        assert!(matches!(result, Err(SerialPlotError::Config(_))));
    }

    #[test]
    fn test_compile_rejects_invalid_fields() {
        let engine = ScriptEngine::new();
        let cases: [fn(&mut AppConfig); 9] = [
            |c: &mut AppConfig| c.serial.port = String::new(),
            |c: &mut AppConfig| c.serial.baud_rate = 0,
            |c: &mut AppConfig| c.serial.timeout_secs = 0.0,
            |c: &mut AppConfig| c.serial.timeout_secs = f64::NAN,
            |c: &mut AppConfig| c.plot_labels = vec!["a".into(), "a".into()],
            |c: &mut AppConfig| {
                c.plot_labels = vec![PlotLabelConfig::Styled {
                    label: "a".to_string(),
                    color: Some("not-a-color".to_string()),
                }]
            },
            |c: &mut AppConfig| {
                c.protocol.parse_script = Some("fn parse_line(line) {".to_string())
            },
            |c: &mut AppConfig| {
                c.protocol.parse_script = Some("fn decode(line) { () }".to_string())
            },
            |c: &mut AppConfig| {
                c.protocol.process_script = Some("fn process_line(x) { x }".to_string())
            },
        ];

        for (i, mutate) in cases.into_iter().enumerate() {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(config.compile(&engine).is_err(), "case {} compiled", i);
        }
    }

    #[test]
    fn test_compile_scripts() {
        let mut config = AppConfig::default();
        config.protocol.parse_script =
            Some(r#"fn parse_line(line) { [1.0, "x", 10.0] }"#.to_string());
        config.protocol.process_script =
            Some("fn process_line(ts, label, value) { [ts, label, value * 2.0] }".to_string());

        let compiled = config.compile(&ScriptEngine::new()).unwrap();
        assert_eq!(
            compiled.ingestor.decode("anything"),
            Decoded::Sample(Sample::new(1.0, "x", 20.0))
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = AppConfig::from_toml(EXAMPLE).unwrap();
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_pipeline_config_closures() {
        let config = PipelineConfig::default()
            .with_decoder(|line: &str| -> Decoded {
                match line.trim().parse::<f64>() {
                    Ok(v) => Decoded::Sample(Sample::new(0.0, "raw", v)),
                    Err(_) => Decoded::Rejected,
                }
            })
            .with_post_process(|mut s: Sample| {
                s.value += 1.0;
                s
            });

        assert_eq!(
            config.ingestor.decode("41\n"),
            Decoded::Sample(Sample::new(0.0, "raw", 42.0))
        );
        assert!(config.validate().is_ok());
    }
}
