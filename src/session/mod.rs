//! Raw log persistence
//!
//! A saved file is the raw log written verbatim, one received line per line.
//! Loading it replays every line through the same [`Ingestor`] the reader
//! worker uses, so a reloaded file rebuilds the same series as the live
//! session that produced it.
//!
//! [`Ingestor`]: crate::protocol::Ingestor

pub mod export;
pub mod replay;

pub use export::{default_save_name, save_raw_log};
pub use replay::{load, load_file, LoadSummary};
