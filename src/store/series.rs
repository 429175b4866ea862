//! Per-label time series storage

/// Index-aligned timestamps and values for one label, in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    timestamps: Vec<f64>,
    values: Vec<f64>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one point. Both columns grow together.
    pub fn push(&mut self, timestamp: f64, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
