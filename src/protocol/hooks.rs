//! Pluggable decode and post-process functions
//!
//! The pipeline decodes every raw line through a [`LineDecoder`] and then,
//! for accepted samples only, through an optional [`PostProcessor`]. Both are
//! implemented for plain closures, so a host can plug in Rust functions
//! directly; [`crate::scripting`] provides Rhai-backed implementations.

use super::frame::{Decoded, Framing};
use crate::store::{IngestOutcome, SeriesStore, SessionId};
use crate::types::Sample;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Turns a raw line into a sample or a rejection
///
/// Should not panic; if it does, the [`Ingestor`] treats the line as rejected.
pub trait LineDecoder: Send + Sync {
    fn decode(&self, raw_line: &str) -> Decoded;
}

impl<F> LineDecoder for F
where
    F: Fn(&str) -> Decoded + Send + Sync,
{
    fn decode(&self, raw_line: &str) -> Decoded {
        self(raw_line)
    }
}

impl LineDecoder for Framing {
    fn decode(&self, raw_line: &str) -> Decoded {
        Framing::decode(*self, raw_line)
    }
}

/// Transforms an accepted sample before it is stored
///
/// A panicking post-processor leaves the sample unprocessed.
pub trait PostProcessor: Send + Sync {
    fn process(&self, sample: Sample) -> Sample;
}

impl<F> PostProcessor for F
where
    F: Fn(Sample) -> Sample + Send + Sync,
{
    fn process(&self, sample: Sample) -> Sample {
        self(sample)
    }
}

/// The decode -> post-process -> append path shared by live reads and file loads
#[derive(Clone)]
pub struct Ingestor {
    decoder: Arc<dyn LineDecoder>,
    post_process: Option<Arc<dyn PostProcessor>>,
}

impl Ingestor {
    /// Create an ingestor with a custom decoder
    pub fn new(decoder: Arc<dyn LineDecoder>) -> Self {
        Self {
            decoder,
            post_process: None,
        }
    }

    /// Create an ingestor using a built-in framing
    pub fn with_framing(framing: Framing) -> Self {
        Self::new(Arc::new(framing))
    }

    /// Replace the decoder, keeping any post-process hook
    pub fn with_decoder(mut self, decoder: Arc<dyn LineDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Attach a post-process hook
    pub fn with_post_process(mut self, post_process: Arc<dyn PostProcessor>) -> Self {
        self.post_process = Some(post_process);
        self
    }

    /// Decode a line and apply the post-process hook to accepted samples
    ///
    /// A panic inside either hook is contained here so the reader thread
    /// survives it.
    pub fn decode(&self, raw_line: &str) -> Decoded {
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| self.decoder.decode(raw_line)))
            .unwrap_or_else(|_| {
                tracing::warn!("Decoder panicked, line rejected");
                Decoded::Rejected
            });

        match decoded {
            Decoded::Sample(sample) => match &self.post_process {
                Some(post) => {
                    let unprocessed = sample.clone();
                    let processed = panic::catch_unwind(AssertUnwindSafe(|| post.process(sample)))
                        .unwrap_or_else(|_| {
                            tracing::warn!("Post-processor panicked, sample kept unprocessed");
                            unprocessed
                        });
                    Decoded::Sample(processed)
                }
                None => Decoded::Sample(sample),
            },
            Decoded::Rejected => Decoded::Rejected,
        }
    }

    /// Decode and record a line that was loaded from a file
    pub fn ingest(&self, store: &SeriesStore, raw_line: String) -> IngestOutcome {
        let decoded = self.decode(&raw_line);
        store.record(raw_line, decoded.into_sample())
    }

    /// Decode and record a line read during the live session `session`
    pub fn ingest_live(
        &self,
        store: &SeriesStore,
        session: SessionId,
        raw_line: String,
    ) -> IngestOutcome {
        let decoded = self.decode(&raw_line);
        store.record_live(session, raw_line, decoded.into_sample())
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::with_framing(Framing::default())
    }
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingestor")
            .field("post_process", &self.post_process.is_some())
            .finish_non_exhaustive()
    }
}
