//! Rhai scripting for custom line decoding and sample post-processing
//!
//! Two hooks can be supplied as scripts instead of Rust closures:
//!
//! - `parse_line(line)` replaces the built-in frame decoder. It receives the
//!   raw line (terminator included) and returns `[timestamp, label, value]`
//!   for a sample or `()` to reject the line.
//! - `process_line(timestamp, label, value)` runs after a successful decode
//!   and returns the `[timestamp, label, value]` that is actually stored.
//!
//! ## Helper Functions
//!
//! On top of the Rhai standard library the engine registers:
//!
//! - `checksum(payload)` - XOR of the payload's character codes
//! - `strip_frame(line)` - the payload between `###` sentinels, or `()`
//! - scaling helpers `clamp`, `lerp`, `map_range` and `pi()`
//!
//! ## Example Scripts
//!
//! A device that prints `label=value` with no timestamp:
//! ```rhai
//! fn parse_line(line) {
//!     let parts = line.split("=");
//!     if parts.len() != 2 { return (); }
//!     let label = parts[0];
//!     let value = parts[1];
//!     label.trim();
//!     value.trim();
//!     [0.0, label, parse_float(value)]
//! }
//! ```
//!
//! Scaling ADC counts to volts for a single channel:
//! ```rhai
//! fn process_line(ts, label, value) {
//!     if label == "adc" { [ts, "volts", value * 3.3 / 4095.0] } else { [ts, label, value] }
//! }
//! ```

mod engine;

pub use engine::{ScriptDecoder, ScriptEngine, ScriptPostProcessor};

use crate::error::{Result, ResultExt, SerialPlotError};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Name of the decoder hook function
pub const PARSE_FN: &str = "parse_line";

/// Name of the post-process hook function
pub const PROCESS_FN: &str = "process_line";

/// A compiled script
#[derive(Clone)]
pub struct CompiledScript {
    ast: Arc<AST>,
    source: String,
}

impl CompiledScript {
    /// Get the source code of this script
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the script defines `name` taking exactly `arity` parameters
    pub fn defines(&self, name: &str, arity: usize) -> bool {
        self.ast
            .iter_functions()
            .any(|f| f.name == name && f.params.len() == arity)
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("source", &self.source)
            .finish()
    }
}

/// Cache of compiled scripts keyed by source
#[derive(Default)]
pub struct ScriptCache {
    cache: HashMap<String, CompiledScript>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached script or compile and cache it
    pub fn get_or_compile(&mut self, engine: &Engine, source: &str) -> Result<CompiledScript> {
        if let Some(script) = self.cache.get(source) {
            return Ok(script.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| SerialPlotError::Script(format!("Compilation error: {}", e)))?;

        let script = CompiledScript {
            ast: Arc::new(ast),
            source: source.to_string(),
        };
        self.cache.insert(source.to_string(), script.clone());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Thread-safe script cache wrapper
pub type SharedScriptCache = Arc<RwLock<ScriptCache>>;

/// Fail unless the script defines `name` with `arity` parameters
pub(crate) fn require_fn(script: &CompiledScript, name: &str, arity: usize) -> Result<()> {
    if script.defines(name, arity) {
        Ok(())
    } else {
        Err(SerialPlotError::Script(format!(
            "Script must define fn {}({} argument{})",
            name,
            arity,
            if arity == 1 { "" } else { "s" }
        )))
    }
}

/// Run a script's top-level statements once
pub(crate) fn run_top_level(engine: &Engine, script: &CompiledScript) -> Result<()> {
    engine
        .run_ast(script.ast())
        .context("Script top-level evaluation failed")
}

/// Built-in scripts for common device formats
pub mod builtins {
    /// Decoder for the unchecked frame format, written as a script
    pub const UNCHECKED_FRAME: &str = r#"
fn parse_line(line) {
    let payload = strip_frame(line);
    if type_of(payload) != "string" { return (); }
    let fields = payload.split(",");
    if fields.len() != 3 { return (); }
    let ts = fields[0];
    let label = fields[1];
    let value = fields[2];
    ts.trim();
    label.trim();
    value.trim();
    [parse_float(ts), label, parse_float(value)]
}
"#;

    /// Decoder for bare `label=value` lines (timestamp 0)
    pub const KEY_VALUE: &str = r#"
fn parse_line(line) {
    let parts = line.split("=");
    if parts.len() != 2 { return (); }
    let label = parts[0];
    let value = parts[1];
    label.trim();
    value.trim();
    if label == "" { return (); }
    [0.0, label, parse_float(value)]
}
"#;

    /// Post-processor converting millisecond timestamps to seconds
    pub const MILLIS_TO_SECONDS: &str = r#"
fn process_line(ts, label, value) {
    [ts / 1000.0, label, value]
}
"#;

    /// All built-in decoder scripts with names
    pub fn decoders() -> Vec<(&'static str, &'static str)> {
        vec![("Unchecked frame", UNCHECKED_FRAME), ("Key = value", KEY_VALUE)]
    }

    /// All built-in post-process scripts with names
    pub fn post_processors() -> Vec<(&'static str, &'static str)> {
        vec![("Milliseconds to seconds", MILLIS_TO_SECONDS)]
    }
}
