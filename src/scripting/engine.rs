//! Rhai Script Engine Implementation
//!
//! Compiles user scripts into [`LineDecoder`] and [`PostProcessor`] hooks.
//! Compiled hooks share the engine through an `Arc` and can be moved onto
//! the reader thread.

use super::{require_fn, run_top_level, CompiledScript, ScriptCache, SharedScriptCache};
use super::{PARSE_FN, PROCESS_FN};
use crate::error::{Result, SerialPlotError};
use crate::protocol::frame::strip_sentinels;
use crate::protocol::{checksum, Decoded, LineDecoder, PostProcessor};
use crate::types::Sample;
use rhai::{Array, CallFnOptions, Dynamic, Engine, Scope};
use std::sync::{Arc, RwLock};

/// The script engine used to compile decode and post-process hooks
#[derive(Clone)]
pub struct ScriptEngine {
    engine: Arc<Engine>,
    cache: SharedScriptCache,
}

impl ScriptEngine {
    /// Create a new script engine with default configuration
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);

        Self {
            engine: Arc::new(engine),
            cache: Arc::new(RwLock::new(ScriptCache::new())),
        }
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(engine: &mut Engine) {
        // Hooks run once per line on the reader thread
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        // ===== Frame Helpers =====

        engine.register_fn("checksum", |payload: &str| checksum(payload) as i64);
        engine.register_fn("strip_frame", |line: &str| -> Dynamic {
            match strip_sentinels(line) {
                Some(payload) => payload.into(),
                None => Dynamic::UNIT,
            }
        });

        // ===== Scaling Helpers =====
        // sqrt, sin, abs and the like come from Rhai's standard package

        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));
        engine.register_fn("pi", || std::f64::consts::PI);
        engine.register_fn("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t);
        engine.register_fn(
            "map_range",
            |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );
    }

    /// Compile a script and cache it
    pub fn compile(&self, source: &str) -> Result<CompiledScript> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| SerialPlotError::Script(format!("Failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(&self.engine, source)
    }

    /// Compile a `parse_line(line)` script into a decoder
    pub fn compile_decoder(&self, source: &str) -> Result<ScriptDecoder> {
        let script = self.compile(source)?;
        require_fn(&script, PARSE_FN, 1)?;
        run_top_level(&self.engine, &script)?;
        Ok(ScriptDecoder {
            engine: self.engine.clone(),
            script,
        })
    }

    /// Compile a `process_line(ts, label, value)` script into a post-processor
    pub fn compile_post_processor(&self, source: &str) -> Result<ScriptPostProcessor> {
        let script = self.compile(source)?;
        require_fn(&script, PROCESS_FN, 3)?;
        run_top_level(&self.engine, &script)?;
        Ok(ScriptPostProcessor {
            engine: self.engine.clone(),
            script,
        })
    }

    /// Number of cached scripts
    pub fn cached_scripts(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cache_size", &self.cached_scripts())
            .finish()
    }
}

/// Top-level statements already ran at compile time
fn call_options() -> CallFnOptions<'static> {
    CallFnOptions::new().eval_ast(false)
}

/// Convert a script's `[ts, label, value]` array into a sample
fn sample_from_dynamic(result: Dynamic) -> Option<Sample> {
    let fields: [Dynamic; 3] = result.try_cast::<Array>()?.try_into().ok()?;
    let [timestamp, label, value] = fields;

    let label = if label.is_string() {
        label.into_string().ok()?
    } else if label.is_int() {
        label.to_string()
    } else {
        return None;
    };
    Some(Sample {
        timestamp: as_number(&timestamp)?,
        label,
        value: as_number(&value)?,
    })
}

fn as_number(value: &Dynamic) -> Option<f64> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as f64))
}

/// Decoder backed by a script's `parse_line` function
#[derive(Clone)]
pub struct ScriptDecoder {
    engine: Arc<Engine>,
    script: CompiledScript,
}

impl LineDecoder for ScriptDecoder {
    fn decode(&self, raw_line: &str) -> Decoded {
        let result = self.engine.call_fn_with_options::<Dynamic>(
            call_options(),
            &mut Scope::new(),
            self.script.ast(),
            PARSE_FN,
            (raw_line.to_string(),),
        );
        match result {
            Ok(value) if value.is_unit() => Decoded::Rejected,
            Ok(value) => sample_from_dynamic(value).into(),
            Err(e) => {
                tracing::trace!("parse_line failed: {}", e);
                Decoded::Rejected
            }
        }
    }
}

impl std::fmt::Debug for ScriptDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptDecoder")
            .field("source", &self.script.source())
            .finish()
    }
}

/// Post-processor backed by a script's `process_line` function
///
/// A failing call or a malformed return value keeps the sample as decoded.
#[derive(Clone)]
pub struct ScriptPostProcessor {
    engine: Arc<Engine>,
    script: CompiledScript,
}

impl PostProcessor for ScriptPostProcessor {
    fn process(&self, sample: Sample) -> Sample {
        let result = self.engine.call_fn_with_options::<Dynamic>(
            call_options(),
            &mut Scope::new(),
            self.script.ast(),
            PROCESS_FN,
            (sample.timestamp, sample.label.clone(), sample.value),
        );
        match result.map(sample_from_dynamic) {
            Ok(Some(processed)) => processed,
            Ok(None) => {
                tracing::trace!("process_line returned a malformed value, keeping sample");
                sample
            }
            Err(e) => {
                tracing::trace!("process_line failed: {}, keeping sample", e);
                sample
            }
        }
    }
}

impl std::fmt::Debug for ScriptPostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptPostProcessor")
            .field("source", &self.script.source())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;
    use crate::scripting::builtins;

    #[test]
    fn test_engine_creation() {
        let engine = ScriptEngine::new();
        assert_eq!(engine.cached_scripts(), 0);
    }

    #[test]
    fn test_decoder_accepts_array() {
        let engine = ScriptEngine::new();
        let decoder = engine
            .compile_decoder(r#"fn parse_line(line) { [1.5, "temp", 20] }"#)
            .unwrap();

        let sample = decoder.decode("anything\n").into_sample().unwrap();
        assert_eq!(sample, Sample::new(1.5, "temp", 20.0));
    }

    #[test]
    fn test_decoder_unit_rejects() {
        let engine = ScriptEngine::new();
        let decoder = engine
            .compile_decoder("fn parse_line(line) { () }")
            .unwrap();
        assert!(decoder.decode("###1, a, 2###").is_rejected());
    }

    #[test]
    fn test_decoder_malformed_result_rejects() {
        let engine = ScriptEngine::new();
        for body in ["[1.0, \"a\"]", "42", "[1.0, \"a\", \"x\"]", "[\"t\", \"a\", 1.0]"] {
            let decoder = engine
                .compile_decoder(&format!("fn parse_line(line) {{ {} }}", body))
                .unwrap();
            assert!(decoder.decode("line").is_rejected(), "accepted {}", body);
        }
    }

    #[test]
    fn test_decoder_runtime_error_rejects() {
        let engine = ScriptEngine::new();
        let decoder = engine
            .compile_decoder("fn parse_line(line) { [parse_float(line), \"a\", 1.0] }")
            .unwrap();
        assert!(decoder.decode("not a number").is_rejected());
    }

    #[test]
    fn test_decoder_operation_limit_rejects() {
        let engine = ScriptEngine::new();
        let decoder = engine
            .compile_decoder("fn parse_line(line) { loop { } }")
            .unwrap();
        assert!(decoder.decode("line").is_rejected());
    }

    #[test]
    fn test_decoder_requires_parse_line() {
        let engine = ScriptEngine::new();
        let err = engine.compile_decoder("fn parse(line) { () }").unwrap_err();
        assert!(matches!(err, SerialPlotError::Script(_)));
        assert!(engine.compile_decoder("fn parse_line(line) {").is_err());
    }

    #[test]
    fn test_top_level_error_fails_compile() {
        let engine = ScriptEngine::new();
        let result = engine.compile_decoder("undefined_fn(); fn parse_line(line) { () }");
        assert!(result.is_err());
    }

    #[test]
    fn test_builtin_unchecked_decoder() {
        let engine = ScriptEngine::new();
        let decoder = engine.compile_decoder(builtins::UNCHECKED_FRAME).unwrap();

        let sample = decoder.decode("###1, a, 2###\n").into_sample().unwrap();
        assert_eq!(sample, Sample::new(1.0, "a", 2.0));
        assert!(decoder.decode("###1, a###").is_rejected());
        assert!(decoder.decode("1, a, 2").is_rejected());
    }

    #[test]
    fn test_checksum_helper() {
        let engine = ScriptEngine::new();
        let decoder = engine
            .compile_decoder(
                r#"
fn parse_line(line) {
    let payload = strip_frame(line);
    if type_of(payload) != "string" { return (); }
    [0.0, "chk", checksum(payload)]
}
"#,
            )
            .unwrap();

        let sample = decoder.decode("###1,a,2###").into_sample().unwrap();
        assert_eq!(sample.value, checksum("1,a,2") as f64);
        assert!(decoder.decode(&encode_frame(&Sample::new(0.0, "x", 1.0))).into_sample().is_some());
    }

    #[test]
    fn test_post_processor_transforms() {
        let engine = ScriptEngine::new();
        let post = engine
            .compile_post_processor(builtins::MILLIS_TO_SECONDS)
            .unwrap();
        let out = post.process(Sample::new(1500.0, "a", 2.0));
        assert_eq!(out, Sample::new(1.5, "a", 2.0));
    }

    #[test]
    fn test_post_processor_error_keeps_sample() {
        let engine = ScriptEngine::new();
        let post = engine
            .compile_post_processor(r#"fn process_line(ts, label, value) { throw "boom"; }"#)
            .unwrap();
        let sample = Sample::new(1.0, "a", 2.0);
        assert_eq!(post.process(sample.clone()), sample);
    }

    #[test]
    fn test_post_processor_requires_three_args() {
        let engine = ScriptEngine::new();
        assert!(engine
            .compile_post_processor("fn process_line(ts, value) { [ts, \"a\", value] }")
            .is_err());
    }

    #[test]
    fn test_math_helpers() {
        let engine = ScriptEngine::new();
        let script = r#"
            fn parse_line(line) {
                let ts = sqrt(16.0) + lerp(0.0, 1.0, 0.5);
                let value = map_range(50.0, 0.0, 100.0, 0.0, 1000.0) + clamp(7.0, 0.0, 2.0);
                [ts, "m", value]
            }
        "#;
        let decoder = engine.compile_decoder(script).unwrap();
        let sample = decoder.decode("").into_sample().unwrap();
        assert_eq!(sample.timestamp, 4.5);
        assert_eq!(sample.value, 502.0);
    }

    #[test]
    fn test_hooks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScriptDecoder>();
        assert_send_sync::<ScriptPostProcessor>();
        assert_send_sync::<ScriptEngine>();
    }
}
