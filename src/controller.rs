//! Pipeline Controller
//!
//! The single entry point the presentation side talks to. It owns the
//! shared store, the active [`PipelineConfig`] and the reader worker, and
//! turns worker messages into [`PipelineEvent`]s.
//!
//! Lifecycle rules:
//!
//! - At most one recording session is live. [`start_recording`] takes the
//!   store's live-writer lease synchronously, so a second call fails with
//!   [`SerialPlotError::AlreadyRecording`] before any port is touched.
//! - [`stop_recording`] ends the lease before asking the worker to close,
//!   so nothing from the old session reaches the store after it returns.
//! - [`clear`] and [`load_file`] stop recording first.
//! - [`apply_config`] swaps plot spec, connection parameters and hooks as a
//!   whole and never starts, stops or clears anything.
//!
//! [`start_recording`]: PipelineController::start_recording
//! [`stop_recording`]: PipelineController::stop_recording
//! [`clear`]: PipelineController::clear
//! [`load_file`]: PipelineController::load_file
//! [`apply_config`]: PipelineController::apply_config

use crate::backend::{ChangeListener, PipelineCommand, PipelineMessage, ReaderHandle};
use crate::config::{AppConfig, PipelineConfig};
use crate::error::{Result, SerialPlotError};
use crate::scripting::ScriptEngine;
use crate::session::{self, LoadSummary};
use crate::store::{PlotTrace, SeriesStore, SharedStore, StoreView};
use crate::transport::{ByteSource, SerialPortSource};
use crate::types::{CollectionStats, ConnectionState, PlotSpec, SerialSettings};
use std::collections::VecDeque;
use std::path::Path;

/// Message shown when a config is applied
pub const CONFIG_OK: &str = "Config OK!";

/// Notification for the presentation side
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Store contents changed since the last poll
    DataChanged,
    /// Connection opened, closed, failed or lost
    ConnectionStatus {
        state: ConnectionState,
        message: String,
        success: bool,
    },
    /// Result of applying a configuration
    ConfigApplied { message: String, success: bool },
    /// Periodic reader statistics
    Stats(CollectionStats),
    /// The reader worker has exited
    Shutdown,
}

pub struct PipelineController {
    store: SharedStore,
    config: PipelineConfig,
    engine: ScriptEngine,
    reader: ReaderHandle,
    connection_state: ConnectionState,
    stats: CollectionStats,
    pending: VecDeque<PipelineEvent>,
}

impl PipelineController {
    /// Create a controller reading from `source`
    pub fn new(config: PipelineConfig, source: Box<dyn ByteSource>) -> Result<Self> {
        config.validate()?;
        let store = SeriesStore::shared();
        let reader = ReaderHandle::spawn(source, store.clone(), config.ingestor.clone())?;
        tracing::debug!("Pipeline controller started");

        Ok(Self {
            store,
            config,
            engine: ScriptEngine::new(),
            reader,
            connection_state: ConnectionState::Disconnected,
            stats: CollectionStats::default(),
            pending: VecDeque::new(),
        })
    }

    /// Create a controller reading from a real serial port
    pub fn with_serial(config: PipelineConfig) -> Result<Self> {
        Self::new(config, Box::new(SerialPortSource::new()))
    }

    /// Start recording with explicit connection settings
    ///
    /// Fails with `AlreadyRecording` while a session is live. The port is
    /// opened asynchronously; the outcome arrives as a
    /// [`PipelineEvent::ConnectionStatus`].
    pub fn start_recording(&mut self, settings: SerialSettings) -> Result<()> {
        settings.validate()?;
        let session = self.store.begin_live_session()?;
        tracing::info!(
            "Starting recording on {} @ {} baud",
            settings.port,
            settings.baud_rate
        );
        if let Err(e) = self
            .reader
            .send(PipelineCommand::StartRecording { session, settings })
        {
            self.store.end_live_session(session);
            return Err(e);
        }
        Ok(())
    }

    /// Start recording with the configured connection settings
    pub fn start_recording_configured(&mut self) -> Result<()> {
        self.start_recording(self.config.serial.clone())
    }

    /// Stop recording. A no-op when nothing is recording.
    pub fn stop_recording(&mut self) -> Result<()> {
        let Some(session) = self.store.end_any_live_session() else {
            return Ok(());
        };
        tracing::debug!("Stopping recording session {}", session.as_u64());
        self.reader.send(PipelineCommand::StopRecording)
    }

    /// Whether a recording session is live
    pub fn is_recording(&self) -> bool {
        self.store.live_session().is_some()
    }

    /// Stop recording, then empty the store and the raw log
    pub fn clear(&mut self) -> Result<()> {
        let stopped = self.stop_recording();
        self.store.clear();
        self.reader.notifier().notify();
        stopped
    }

    /// Stop recording, then replace the store contents with a file's lines
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<LoadSummary> {
        self.stop_recording()?;
        let result = session::load_file(&self.store, &self.config.ingestor, path);
        self.reader.notifier().notify();
        result
    }

    /// Write the raw log verbatim to `path`
    pub fn save_raw_log(&self, path: impl AsRef<Path>) -> Result<()> {
        session::save_raw_log(&self.store, path)
    }

    /// Validate and compile a config document, then apply it as a whole
    ///
    /// On failure the previous configuration stays in effect. Either way a
    /// [`PipelineEvent::ConfigApplied`] is queued.
    pub fn apply_config(&mut self, config: &AppConfig) -> Result<()> {
        let result = config
            .compile(&self.engine)
            .and_then(|compiled| self.install_config(compiled));
        self.report_config(&result);
        result
    }

    /// Apply an already-built configuration
    pub fn apply_pipeline_config(&mut self, config: PipelineConfig) -> Result<()> {
        let result = self.install_config(config);
        self.report_config(&result);
        result
    }

    fn install_config(&mut self, config: PipelineConfig) -> Result<()> {
        config.validate()?;
        self.reader
            .send(PipelineCommand::SetIngestor(config.ingestor.clone()))?;
        self.config = config;
        // Plot spec may have changed
        self.reader.notifier().notify();
        Ok(())
    }

    fn report_config(&mut self, result: &Result<()>) {
        let event = match result {
            Ok(()) => {
                tracing::info!("Configuration applied");
                PipelineEvent::ConfigApplied {
                    message: CONFIG_OK.to_string(),
                    success: true,
                }
            }
            Err(e) => {
                tracing::warn!("Configuration rejected: {}", e);
                PipelineEvent::ConfigApplied {
                    message: e.to_string(),
                    success: false,
                }
            }
        };
        self.pending.push_back(event);
    }

    /// Write raw bytes to the open connection
    pub fn write(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        if !self.is_recording() {
            return Err(SerialPlotError::NotOpen);
        }
        self.reader.send(PipelineCommand::Write(bytes.into()))
    }

    /// Collect everything that happened since the last poll
    ///
    /// Any number of appends collapse into a single `DataChanged`.
    pub fn poll_events(&mut self) -> Vec<PipelineEvent> {
        for msg in self.reader.drain() {
            let event = match msg {
                PipelineMessage::ConnectionStatus {
                    state,
                    message,
                    success,
                } => {
                    self.connection_state = state.clone();
                    PipelineEvent::ConnectionStatus {
                        state,
                        message,
                        success,
                    }
                }
                PipelineMessage::Stats(stats) => {
                    self.stats = stats;
                    PipelineEvent::Stats(stats)
                }
                PipelineMessage::Shutdown => PipelineEvent::Shutdown,
            };
            self.pending.push_back(event);
        }

        let mut events: Vec<_> = self.pending.drain(..).collect();
        if self.reader.changes().take() {
            events.push(PipelineEvent::DataChanged);
        }
        events
    }

    /// One trace per plot spec entry, in declaration order
    pub fn plot_traces(&self) -> Vec<PlotTrace> {
        self.store.plot_traces(&self.config.plot_spec)
    }

    /// Read-only view of the store
    pub fn store(&self) -> StoreView {
        StoreView::new(self.store.clone())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn plot_spec(&self) -> &PlotSpec {
        &self.config.plot_spec
    }

    /// Connection state as of the last [`poll_events`](Self::poll_events)
    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection_state
    }

    /// Statistics as of the last [`poll_events`](Self::poll_events)
    pub fn stats(&self) -> CollectionStats {
        self.stats
    }

    /// The "data changed" listener, for hosts that block instead of polling
    pub fn changes(&self) -> &ChangeListener {
        self.reader.changes()
    }

    /// Stop recording and wait for the reader thread to exit
    ///
    /// The byte source is closed once this returns.
    pub fn shutdown(&mut self) {
        self.store.end_any_live_session();
        self.reader.shutdown();
        self.connection_state = ConnectionState::Disconnected;
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("connection_state", &self.connection_state)
            .field("recording", &self.is_recording())
            .field("plot_spec", &self.config.plot_spec)
            .finish_non_exhaustive()
    }
}
