//! Backend module for the serial reader loop
//!
//! This module handles all serial I/O in a separate thread to keep the
//! presentation side responsive. It uses crossbeam channels for thread-safe
//! communication with the controller.
//!
//! # Architecture
//!
//! - [`PipelineCommand`] - Messages sent from the controller to the worker
//! - [`PipelineMessage`] - Status messages sent from the worker (connection, stats)
//! - [`ChangeNotifier`] / [`ChangeListener`] - Coalesced "data changed" signal
//! - [`ReaderWorker`] - The loop that owns the byte source and feeds the store
//! - [`ReaderHandle`] - Controller-side handle to the spawned worker thread
//!
//! Sample data itself never travels through the channels: the worker appends
//! to the shared [`SeriesStore`](crate::store::SeriesStore) and only signals
//! that something changed.

pub mod notify;
pub mod worker;

pub use notify::{change_channel, ChangeListener, ChangeNotifier};
pub use worker::{ReaderState, ReaderWorker, IDLE_INTERVAL};

use crate::error::{Result, SerialPlotError};
use crate::protocol::Ingestor;
use crate::store::{SessionId, SharedStore};
use crate::transport::ByteSource;
use crate::types::{CollectionStats, ConnectionState, SerialSettings};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Capacity of the controller -> worker command queue
const COMMAND_QUEUE_SIZE: usize = 256;

/// Capacity of the worker -> controller status queue
const MESSAGE_QUEUE_SIZE: usize = 10_000;

/// Message sent from the controller to the reader worker
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Open the byte source and stream into the store under `session`
    StartRecording {
        session: SessionId,
        settings: SerialSettings,
    },
    /// Close the byte source and go idle
    StopRecording,
    /// Replace the decode/post-process path
    SetIngestor(Ingestor),
    /// Write raw bytes to the open connection
    Write(Vec<u8>),
    /// Shutdown the worker
    Shutdown,
}

/// Message sent from the reader worker to the controller
#[derive(Debug, Clone)]
pub enum PipelineMessage {
    /// Connection opened, closed, failed or lost
    ConnectionStatus {
        state: ConnectionState,
        message: String,
        success: bool,
    },
    /// Statistics update
    Stats(CollectionStats),
    /// Worker is shutting down
    Shutdown,
}

/// Controller-side handle to a running reader worker
pub struct ReaderHandle {
    command_tx: Sender<PipelineCommand>,
    message_rx: Receiver<PipelineMessage>,
    changes: ChangeListener,
    notifier: ChangeNotifier,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Spawn a reader worker on its own thread
    pub fn spawn(
        source: Box<dyn ByteSource>,
        store: SharedStore,
        ingestor: Ingestor,
    ) -> Result<Self> {
        let (command_tx, command_rx) = bounded(COMMAND_QUEUE_SIZE);
        let (message_tx, message_rx) = bounded(MESSAGE_QUEUE_SIZE);
        let (notifier, changes) = change_channel();
        let running = Arc::new(AtomicBool::new(true));

        let mut worker = ReaderWorker::new(
            source,
            store,
            ingestor,
            command_rx,
            message_tx,
            notifier.clone(),
            running.clone(),
        );
        let thread = std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            command_tx,
            message_rx,
            changes,
            notifier,
            running,
            thread: Some(thread),
        })
    }

    /// Send a command to the worker
    pub fn send(&self, cmd: PipelineCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|_| SerialPlotError::Channel("Reader worker has stopped".to_string()))
    }

    /// Receive all pending status messages
    pub fn drain(&self) -> Vec<PipelineMessage> {
        self.message_rx.try_iter().collect()
    }

    /// The "data changed" listener
    pub fn changes(&self) -> &ChangeListener {
        &self.changes
    }

    /// A notifier for changes made outside the worker (load, clear)
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Whether the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the worker to stop and wait for its thread to exit
    ///
    /// The worker closes its byte source before exiting, so no I/O happens
    /// once this returns.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.command_tx.send(PipelineCommand::Shutdown);
        if thread.join().is_err() {
            tracing::error!("Reader worker panicked");
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
