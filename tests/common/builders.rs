//! Test data builders for raw log files

use serialplot_rs::protocol::{encode_frame, encode_legacy_frame};
use serialplot_rs::Sample;
use std::path::{Path, PathBuf};

/// Builder for raw log text, one line per call
#[derive(Debug, Default)]
pub struct RawLogBuilder {
    text: String,
}

impl RawLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a checksummed frame
    pub fn frame(mut self, timestamp: f64, label: &str, value: f64) -> Self {
        self.text
            .push_str(&encode_frame(&Sample::new(timestamp, label, value)));
        self
    }

    /// Append an unchecked (legacy) frame
    pub fn legacy_frame(mut self, timestamp: f64, label: &str, value: f64) -> Self {
        self.text
            .push_str(&encode_legacy_frame(&Sample::new(timestamp, label, value)));
        self
    }

    /// Append `count` checksummed frames for `label` with timestamps 0..count
    pub fn frames(mut self, label: &str, count: usize) -> Self {
        for i in 0..count {
            self = self.frame(i as f64, label, i as f64 * 10.0);
        }
        self
    }

    /// Append an arbitrary line; `\n` is added if missing
    pub fn line(mut self, line: &str) -> Self {
        self.text.push_str(line);
        if !line.ends_with('\n') {
            self.text.push('\n');
        }
        self
    }

    /// Append text exactly as given
    pub fn raw(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    pub fn build(self) -> String {
        self.text
    }

    /// Write the text to `dir/name` and return the path
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.text).expect("Failed to write raw log");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_log_builder() {
        let text = RawLogBuilder::new()
            .line("# header")
            .legacy_frame(1.0, "a", 2.0)
            .raw("partial")
            .build();

        assert_eq!(text, "# header\n###1.0, a, 2.0###\npartial");
    }
}
