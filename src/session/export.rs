//! Saving the raw log

use crate::error::{Result, ResultExt};
use crate::store::SeriesStore;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Write the raw log verbatim to `path`, replacing any existing file
pub fn save_raw_log(store: &SeriesStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    store
        .write_raw_log(BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(
        "Saved {} raw lines to {}",
        store.raw_log_len(),
        path.display()
    );
    Ok(())
}

/// Default file name for a save, stamped with the local time
pub fn default_save_name() -> PathBuf {
    PathBuf::from(format!(
        "serialplot-{}.txt",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}
