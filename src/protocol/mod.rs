//! Frame decoding for the telemetry line protocol
//!
//! This module is the pure part of the pipeline: it turns one raw text line
//! into a [`Sample`](crate::types::Sample) or a [`Decoded::Rejected`] marker.
//! It performs no I/O and keeps no state.
//!
//! # Framing
//!
//! - [`Framing::Checksummed`] (default): `###<CHK>#<ts>,<label>,<val>###`
//! - [`Framing::Unchecked`] (legacy): `###<ts>, <label>, <val>###`
//!
//! Malformed input never produces an error. Wrong sentinels, bad checksums,
//! wrong field counts and unparsable numbers all collapse into `Rejected`.
//!
//! # Hooks
//!
//! [`LineDecoder`] replaces the built-in framing, [`PostProcessor`] rewrites
//! accepted samples. [`Ingestor`] bundles both with the store append so live
//! and replayed data go through exactly the same path.

pub mod frame;
pub mod hooks;

pub use frame::{
    checksum, decode_checksummed, decode_unchecked, encode_frame, encode_legacy_frame, Decoded,
    Framing, SENTINEL,
};
pub use hooks::{Ingestor, LineDecoder, PostProcessor};
