//! Reader Worker Thread Implementation
//!
//! This module contains the loop that runs in a separate thread, owns the
//! byte source and feeds decoded samples into the shared store.
//!
//! # States
//!
//! - **Idle**: no open connection. The loop waits on the command queue in
//!   [`IDLE_INTERVAL`] increments instead of busy-waiting.
//! - **Streaming**: connection open. Each cycle drains pending commands, then
//!   blocks in `read_line` for at most the configured timeout. Every received
//!   line is raw-logged; lines that decode are appended to their series.
//!
//! # Error handling
//!
//! A read timeout is not an error. A fatal I/O error is logged and reported
//! once, the connection is closed and the loop returns to Idle so recording
//! can be retried. The loop itself only exits on `Shutdown` or when the
//! controller goes away.
//!
//! The worker never decides to open a connection on its own; it opens and
//! closes only in response to controller commands, or closes after a fatal
//! error on the session it was given.

use crate::backend::{ChangeNotifier, PipelineCommand, PipelineMessage};
use crate::error::SerialPlotError;
use crate::protocol::Ingestor;
use crate::store::{IngestOutcome, SessionId, SharedStore};
use crate::transport::{ByteSource, ReadOutcome};
use crate::types::{CollectionStats, ConnectionState, SerialSettings};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long the idle loop waits for a command before checking again
pub const IDLE_INTERVAL: Duration = Duration::from_millis(500);

/// How often statistics are published while streaming
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Reader loop state
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderState {
    Idle,
    Streaming {
        session: SessionId,
        settings: SerialSettings,
    },
}

impl ReaderState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ReaderState::Streaming { .. })
    }
}

/// The worker that runs the reader loop
pub struct ReaderWorker {
    /// Byte source; only opened/closed on controller request
    source: Box<dyn ByteSource>,
    /// Shared series store
    store: SharedStore,
    /// Decode -> post-process -> append path
    ingestor: Ingestor,
    /// Command receiver from the controller
    command_rx: Receiver<PipelineCommand>,
    /// Status sender to the controller
    message_tx: Sender<PipelineMessage>,
    /// Coalesced data-changed signal
    changes: ChangeNotifier,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Idle / Streaming
    state: ReaderState,
    /// Statistics for the current session
    stats: CollectionStats,
    /// Last time stats were sent
    last_stats_time: Instant,
}

impl ReaderWorker {
    /// Create a new reader worker
    pub fn new(
        source: Box<dyn ByteSource>,
        store: SharedStore,
        ingestor: Ingestor,
        command_rx: Receiver<PipelineCommand>,
        message_tx: Sender<PipelineMessage>,
        changes: ChangeNotifier,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            store,
            ingestor,
            command_rx,
            message_tx,
            changes,
            running,
            state: ReaderState::Idle,
            stats: CollectionStats::default(),
            last_stats_time: Instant::now(),
        }
    }

    /// Current loop state
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Reader worker started");

        while self.running.load(Ordering::SeqCst) {
            self.step();
        }

        // Cleanup
        if self.source.is_open() {
            self.source.close();
        }
        if let ReaderState::Streaming { session, .. } = self.state {
            self.store.end_live_session(session);
            self.state = ReaderState::Idle;
        }

        self.try_send_message(PipelineMessage::Shutdown);
        tracing::info!("Reader worker stopped");
    }

    /// One iteration of the loop
    fn step(&mut self) {
        match self.state.clone() {
            ReaderState::Idle => self.wait_for_command(IDLE_INTERVAL),
            ReaderState::Streaming { session, settings } => {
                self.process_commands();
                if self.state.is_streaming() && self.running.load(Ordering::SeqCst) {
                    self.read_cycle(session, settings.timeout);
                }
                if self.last_stats_time.elapsed() >= STATS_INTERVAL {
                    self.send_stats();
                    self.last_stats_time = Instant::now();
                }
            }
        }
    }

    /// Block for at most `timeout` waiting for the next command
    fn wait_for_command(&mut self, timeout: Duration) {
        match self.command_rx.recv_timeout(timeout) {
            Ok(cmd) => {
                self.handle_command(cmd);
                self.process_commands();
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Process pending commands without blocking
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: PipelineCommand) {
        match cmd {
            PipelineCommand::StartRecording { session, settings } => {
                self.start_streaming(session, settings);
            }
            PipelineCommand::StopRecording => {
                self.stop_streaming();
            }
            PipelineCommand::SetIngestor(ingestor) => {
                self.ingestor = ingestor;
                tracing::debug!("Decoder configuration updated");
            }
            PipelineCommand::Write(bytes) => {
                self.write(&bytes);
            }
            PipelineCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Open the byte source for `session`
    fn start_streaming(&mut self, session: SessionId, settings: SerialSettings) {
        if self.state.is_streaming() {
            self.stop_streaming();
        }

        match self.source.open(&settings) {
            Ok(()) => {
                let state = self.source.state();
                tracing::info!("Recording started: {}", state.display_name());
                self.stats = CollectionStats::default();
                self.last_stats_time = Instant::now();
                self.state = ReaderState::Streaming { session, settings };
                self.send_status(state.clone(), state.display_name(), true);
            }
            Err(e) => {
                tracing::warn!("Failed to start recording: {}", e);
                self.store.end_live_session(session);
                self.send_status(ConnectionState::Disconnected, e.to_string(), false);
            }
        }
    }

    /// Close the byte source and go idle
    fn stop_streaming(&mut self) {
        let ReaderState::Streaming { session, .. } = self.state else {
            return;
        };
        self.source.close();
        self.store.end_live_session(session);
        self.state = ReaderState::Idle;
        self.send_stats();
        tracing::info!("Recording stopped");
        self.send_status(
            ConnectionState::Disconnected,
            "Recording stopped".to_string(),
            true,
        );
    }

    /// Read one line and feed it through the ingest path
    fn read_cycle(&mut self, session: SessionId, timeout: Duration) {
        if !self.store.is_live(session) {
            // Lease ended by the controller; the stop command may still be queued
            self.stop_streaming();
            return;
        }

        match self.source.read_line(timeout) {
            Ok(ReadOutcome::Line(line)) => {
                self.stats.lines_received += 1;
                match self.ingestor.ingest_live(&self.store, session, line) {
                    IngestOutcome::Appended => {
                        self.stats.samples_decoded += 1;
                        self.changes.notify();
                    }
                    IngestOutcome::Rejected => {
                        self.stats.lines_rejected += 1;
                        tracing::trace!("Rejected line");
                        self.changes.notify();
                    }
                    IngestOutcome::Discarded => {}
                }
            }
            Ok(ReadOutcome::TimedOut) => {
                self.stats.read_timeouts += 1;
            }
            Err(e) => self.fail_session(session, e),
        }
    }

    /// Write bytes to the open connection
    fn write(&mut self, bytes: &[u8]) {
        let ReaderState::Streaming { session, .. } = self.state else {
            tracing::warn!("Write ignored: not recording");
            return;
        };
        if let Err(e) = self.source.write(bytes) {
            self.fail_session(session, e);
        }
    }

    /// End the session after a fatal I/O error
    fn fail_session(&mut self, session: SessionId, err: SerialPlotError) {
        tracing::error!("Serial I/O error, recording stopped: {}", err);
        self.stats.io_errors += 1;
        self.source.close();
        self.store.end_live_session(session);
        self.state = ReaderState::Idle;
        self.send_stats();
        self.send_status(
            ConnectionState::Disconnected,
            format!("Connection lost: {}", err),
            false,
        );
    }

    fn send_status(&mut self, state: ConnectionState, message: String, success: bool) {
        self.try_send_message(PipelineMessage::ConnectionStatus {
            state,
            message,
            success,
        });
    }

    fn send_stats(&mut self) {
        let stats = self.stats;
        self.try_send_message(PipelineMessage::Stats(stats));
    }

    /// Try to send a message, tracking dropped messages if queue is full
    ///
    /// The worker never blocks on a slow consumer.
    fn try_send_message(&mut self, msg: PipelineMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.stats.dropped_messages += 1;
        }
    }
}
