//! Bulk Loader - replays a saved raw log through the live ingest path

use crate::error::{Result, ResultExt};
use crate::protocol::Ingestor;
use crate::store::{IngestOutcome, SeriesStore};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Counts from one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Lines read, including blank and rejected ones
    pub lines: usize,
    /// Lines that produced a sample
    pub samples: usize,
    /// Lines the decoder rejected
    pub rejected: usize,
}

/// Clear `store`, then replay every line of `reader` through `ingestor`
///
/// Lines keep their terminators so the raw log reproduces the input.
/// Blank lines, comments and a final unterminated line are each
/// decode-attempted like any other; none of them abort the load. Only an
/// I/O error from the reader does.
pub fn load<R: BufRead>(
    store: &SeriesStore,
    ingestor: &Ingestor,
    mut reader: R,
) -> Result<LoadSummary> {
    store.clear();

    let mut summary = LoadSummary::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        summary.lines += 1;
        match ingestor.ingest(store, line) {
            IngestOutcome::Appended => summary.samples += 1,
            IngestOutcome::Rejected => summary.rejected += 1,
            IngestOutcome::Discarded => {}
        }
    }

    tracing::debug!(
        "Replayed {} lines ({} samples, {} rejected)",
        summary.lines,
        summary.samples,
        summary.rejected
    );
    Ok(summary)
}

/// Load a raw log file into `store`
pub fn load_file(
    store: &SeriesStore,
    ingestor: &Ingestor,
    path: impl AsRef<Path>,
) -> Result<LoadSummary> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let summary = load(store, ingestor, BufReader::new(file))
        .with_context(|| format!("Failed to read {}", path.display()))?;
    tracing::info!(
        "Loaded {} ({} lines, {} samples)",
        path.display(),
        summary.lines,
        summary.samples
    );
    Ok(summary)
}
