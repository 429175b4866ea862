//! # SerialPlot-RS: Serial Telemetry Plotter Backend
//!
//! Reads line-framed telemetry from a serial device, decodes each line into
//! a `(timestamp, label, value)` sample and keeps per-label series ready for
//! plotting. Saved raw logs can be replayed through the same decode path.
//!
//! ## Architecture
//!
//! - **Protocol**: the `###...###` frame decoder plus pluggable decode and
//!   post-process hooks
//! - **Store**: per-label series and the verbatim raw log behind one lock
//! - **Transport**: the byte source abstraction over a serial port
//! - **Backend**: the reader loop on its own thread, driven by crossbeam
//!   channels
//! - **Session**: bulk loading and saving of raw logs
//! - **Controller**: the lifecycle API a UI or CLI drives
//!
//! ## Configuration
//!
//! The default config file lives in the platform data directory under
//! `dev.serialplot.serialplot-rs`; see [`config`].
//!
//! ## Example
//!
//! ```no_run
//! use serialplot_rs::{PipelineConfig, PipelineController, PipelineEvent, SerialSettings};
//!
//! fn main() -> serialplot_rs::Result<()> {
//!     let mut controller = PipelineController::with_serial(PipelineConfig::default())?;
//!     controller.start_recording(SerialSettings::new("/dev/ttyUSB0", 115200))?;
//!
//!     loop {
//!         for event in controller.poll_events() {
//!             if event == PipelineEvent::DataChanged {
//!                 for trace in controller.plot_traces() {
//!                     println!("{}: {} points", trace.label, trace.data.len());
//!                 }
//!             }
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod scripting;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use config::{AppConfig, PipelineConfig};
pub use controller::{PipelineController, PipelineEvent};
pub use error::{Result, ResultExt, SerialPlotError};
pub use protocol::{Decoded, Framing, Ingestor};
pub use scripting::ScriptEngine;
pub use store::{PlotTrace, SeriesStore, SharedStore, StoreView};
pub use types::{Color, ConnectionState, PlotEntry, PlotSpec, Sample, SerialSettings};
