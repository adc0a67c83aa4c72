use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run one more detection pass when the first finds nothing
    pub retry_on_miss: bool,
    pub retry_delay_ms: u64,
    /// Upper bound on elements visited while looking for an opaque descendant
    pub max_descent_nodes: usize,
    pub extra_phrases: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            retry_on_miss: true,
            retry_delay_ms: 5000,
            max_descent_nodes: 5000,
            extra_phrases: Vec::new(),
        }
    }
}

impl DetectionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn without_retry(mut self) -> Self {
        self.retry_on_miss = false;
        self
    }
}
