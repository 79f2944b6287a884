//! Aggregate statistics over batches of run results.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Minimum, mean and population standard deviation of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl RunStatistics {
    /// All fields but `count` are NaN for an empty batch.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return RunStatistics {
                count: 0,
                min: f64::NAN,
                mean: f64::NAN,
                std_dev: f64::NAN,
            };
        }

        RunStatistics {
            count: values.len(),
            min: Statistics::min(values),
            mean: Statistics::mean(values),
            std_dev: Statistics::population_std_dev(values),
        }
    }
}

impl std::fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MIN: {:.2}  AVG: {:.2}  STD: {:.2}  (n={})",
            self.min, self.mean, self.std_dev, self.count
        )
    }
}
