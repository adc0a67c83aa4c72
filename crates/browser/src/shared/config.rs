use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub navigation: Duration,
    pub page_stable: Duration,
    pub check_interval: Duration,
    pub settle_delay: Duration,
    /// Consecutive quiet checks before the network counts as idle
    pub stable_checks: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation: Duration::from_millis(30000),
            page_stable: Duration::from_millis(30000),
            check_interval: Duration::from_millis(300),
            settle_delay: Duration::from_millis(1000),
            stable_checks: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn with_navigation(mut self, ms: u64) -> Self {
        self.navigation = Duration::from_millis(ms);
        self
    }

    pub fn with_page_stable(mut self, ms: u64) -> Self {
        self.page_stable = Duration::from_millis(ms);
        self
    }

    pub fn with_settle_delay(mut self, ms: u64) -> Self {
        self.settle_delay = Duration::from_millis(ms);
        self
    }

    pub fn fast() -> Self {
        Self {
            navigation: Duration::from_millis(20000),
            page_stable: Duration::from_millis(20000),
            check_interval: Duration::from_millis(200),
            settle_delay: Duration::from_millis(500),
            stable_checks: 3,
        }
    }

    pub fn patient() -> Self {
        Self {
            navigation: Duration::from_millis(60000),
            page_stable: Duration::from_millis(60000),
            check_interval: Duration::from_millis(500),
            settle_delay: Duration::from_millis(2000),
            stable_checks: 5,
        }
    }

    /// Looks a preset up by name (`default`, `fast`, `patient`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::default()),
            "fast" => Some(Self::fast()),
            "patient" => Some(Self::patient()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_by_name() {
        assert_eq!(TimeoutConfig::preset("Fast"), Some(TimeoutConfig::fast()));
        assert_eq!(TimeoutConfig::preset("patient"), Some(TimeoutConfig::patient()));
        assert!(TimeoutConfig::preset("glacial").is_none());
    }

    #[test]
    fn builders_override_fields() {
        let cfg = TimeoutConfig::fast().with_navigation(1234).with_settle_delay(0);
        assert_eq!(cfg.navigation, Duration::from_millis(1234));
        assert_eq!(cfg.settle_delay, Duration::ZERO);
        assert_eq!(cfg.page_stable, TimeoutConfig::fast().page_stable);
    }
}
