//! Series Store - the single shared, append-only data store
//!
//! The store maps each label to its [`Series`] and keeps the verbatim
//! [`raw log`](SeriesStore::raw_log) of every line received or loaded.
//! The reader worker and the bulk loader write to it through the crate's
//! ingest path; the presentation side only ever gets a [`StoreView`].
//!
//! # Consistency
//!
//! All state lives behind one `RwLock`, so a reader never observes a torn
//! write: a snapshot sees a series either before or after an append, and a
//! store either before or after a `clear`. Readers get owned copies
//! ([`SeriesSnapshot`], [`PlotTrace`]), never references into the store.
//!
//! # Live sessions
//!
//! A recording holds a lease ([`SessionId`]). Live appends carry their lease
//! and are discarded if it has ended, which lets the controller stop a
//! session and immediately clear or reload without racing a late append
//! from the worker thread.

pub mod series;

pub use series::Series;

use crate::error::{Result, SerialPlotError};
use crate::types::{Color, PlotSpec, Sample};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to a store
pub type SharedStore = Arc<SeriesStore>;

/// Lease identifying one live recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// What happened to a recorded line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Raw line logged and sample appended
    Appended,
    /// Raw line logged, decoder rejected it
    Rejected,
    /// Nothing recorded: the live session had already ended
    Discarded,
}

impl IngestOutcome {
    /// Whether the store changed
    pub fn changed(self) -> bool {
        !matches!(self, IngestOutcome::Discarded)
    }
}

/// Owned copy of one series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSnapshot {
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl SeriesSnapshot {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl From<&Series> for SeriesSnapshot {
    fn from(series: &Series) -> Self {
        Self {
            timestamps: series.timestamps().to_vec(),
            values: series.values().to_vec(),
        }
    }
}

/// Render-ready data for one declared plot
#[derive(Debug, Clone, PartialEq)]
pub struct PlotTrace {
    pub label: String,
    pub color: Color,
    pub data: SeriesSnapshot,
}

#[derive(Debug, Default)]
struct StoreInner {
    series: HashMap<String, Series>,
    raw_log: Vec<String>,
    live_session: Option<SessionId>,
    next_session: u64,
}

impl StoreInner {
    fn record(&mut self, raw_line: String, sample: Option<Sample>) -> IngestOutcome {
        self.raw_log.push(raw_line);
        match sample {
            Some(sample) => {
                self.append(sample);
                IngestOutcome::Appended
            }
            None => IngestOutcome::Rejected,
        }
    }

    fn append(&mut self, sample: Sample) {
        self.series
            .entry(sample.label)
            .or_default()
            .push(sample.timestamp, sample.value);
    }
}

/// Label -> series mapping plus raw log
#[derive(Debug, Default)]
pub struct SeriesStore {
    inner: RwLock<StoreInner>,
}

impl SeriesStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind an `Arc`
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Mutation ====================

    /// Append a sample, creating its series on first use
    pub(crate) fn append(&self, sample: Sample) {
        self.write().append(sample);
    }

    /// Log a raw line and append its decoded sample, if any, in one step
    pub(crate) fn record(&self, raw_line: String, sample: Option<Sample>) -> IngestOutcome {
        self.write().record(raw_line, sample)
    }

    /// Like [`record`](Self::record), but only while `session` is the live session
    pub(crate) fn record_live(
        &self,
        session: SessionId,
        raw_line: String,
        sample: Option<Sample>,
    ) -> IngestOutcome {
        let mut inner = self.write();
        if inner.live_session != Some(session) {
            return IngestOutcome::Discarded;
        }
        inner.record(raw_line, sample)
    }

    /// Remove every series and the raw log
    pub(crate) fn clear(&self) {
        let mut inner = self.write();
        inner.series.clear();
        inner.raw_log.clear();
    }

    // ==================== Live session lease ====================

    /// Start a live session. Fails if one is already active.
    pub(crate) fn begin_live_session(&self) -> Result<SessionId> {
        let mut inner = self.write();
        if inner.live_session.is_some() {
            return Err(SerialPlotError::AlreadyRecording);
        }
        inner.next_session += 1;
        let session = SessionId(inner.next_session);
        inner.live_session = Some(session);
        Ok(session)
    }

    /// End `session` if it is still the live one. Returns whether it was.
    pub(crate) fn end_live_session(&self, session: SessionId) -> bool {
        let mut inner = self.write();
        if inner.live_session == Some(session) {
            inner.live_session = None;
            true
        } else {
            false
        }
    }

    /// End whichever session is live
    pub(crate) fn end_any_live_session(&self) -> Option<SessionId> {
        self.write().live_session.take()
    }

    /// The active live session, if any
    pub fn live_session(&self) -> Option<SessionId> {
        self.read().live_session
    }

    pub fn is_live(&self, session: SessionId) -> bool {
        self.read().live_session == Some(session)
    }

    // ==================== Snapshots ====================

    /// Copy of one series; empty if the label has no samples
    pub fn snapshot(&self, label: &str) -> SeriesSnapshot {
        self.read()
            .series
            .get(label)
            .map(SeriesSnapshot::from)
            .unwrap_or_default()
    }

    /// One trace per declared plot, in declaration order, taken under a single lock
    pub fn plot_traces(&self, spec: &PlotSpec) -> Vec<PlotTrace> {
        let inner = self.read();
        spec.entries()
            .iter()
            .map(|entry| PlotTrace {
                label: entry.label.clone(),
                color: entry.resolved_color(),
                data: inner
                    .series
                    .get(&entry.label)
                    .map(SeriesSnapshot::from)
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Number of samples stored for `label`
    pub fn series_len(&self, label: &str) -> usize {
        self.read().series.get(label).map_or(0, Series::len)
    }

    /// All labels with at least one sample, sorted
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.read().series.keys().cloned().collect();
        labels.sort();
        labels
    }

    /// Copy of the raw log
    pub fn raw_log(&self) -> Vec<String> {
        self.read().raw_log.clone()
    }

    pub fn raw_log_len(&self) -> usize {
        self.read().raw_log.len()
    }

    /// Write the raw log verbatim
    ///
    /// The log is copied first so the lock is not held during I/O.
    pub fn write_raw_log<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for line in self.raw_log() {
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.read();
        inner.series.is_empty() && inner.raw_log.is_empty()
    }
}

/// Read-only handle to a shared store
///
/// Handed to the presentation side; it can take snapshots but never mutate.
#[derive(Debug, Clone)]
pub struct StoreView {
    store: SharedStore,
}

impl StoreView {
    pub(crate) fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Copy of one series; empty if the label has no samples
    pub fn snapshot(&self, label: &str) -> SeriesSnapshot {
        self.store.snapshot(label)
    }

    /// One trace per declared plot, in declaration order
    pub fn plot_traces(&self, spec: &PlotSpec) -> Vec<PlotTrace> {
        self.store.plot_traces(spec)
    }

    pub fn series_len(&self, label: &str) -> usize {
        self.store.series_len(label)
    }

    /// All labels with at least one sample, sorted
    pub fn labels(&self) -> Vec<String> {
        self.store.labels()
    }

    /// Copy of the raw log
    pub fn raw_log(&self) -> Vec<String> {
        self.store.raw_log()
    }

    pub fn raw_log_len(&self) -> usize {
        self.store.raw_log_len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
