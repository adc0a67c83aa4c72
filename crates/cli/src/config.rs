use anyhow::{Context, Result};
use bannerscope_browser::TimeoutConfig;
use bannerscope_core::DeviceProfile;
use bannerscope_detector::DetectionConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Folder holding `selectors.json`
    pub store_path: String,
    pub concurrency: usize,
    pub audit_timeout_secs: u64,
    pub headless: bool,
    /// `desktop` or `mobile`
    pub device: String,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    /// Name of a timeout preset: `default`, `fast` or `patient`
    pub timeouts: String,
    pub screenshot_dir: Option<String>,
    pub detection: DetectionConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store_path: "bannerscope-data".to_string(),
            concurrency: 2,
            audit_timeout_secs: 120,
            headless: true,
            device: "desktop".to_string(),
            viewport_width: None,
            viewport_height: None,
            timeouts: "default".to_string(),
            screenshot_dir: None,
            detection: DetectionConfig::default(),
        }
    }
}

impl AuditConfig {
    pub fn device_profile(&self) -> Result<DeviceProfile> {
        let base = match self.device.trim().to_ascii_lowercase().as_str() {
            "desktop" => DeviceProfile::desktop(),
            "mobile" => DeviceProfile::mobile(),
            other => anyhow::bail!("unknown device '{}', expected desktop or mobile", other),
        };
        Ok(match (self.viewport_width, self.viewport_height) {
            (Some(w), Some(h)) => base.with_size(w, h),
            (None, None) => base,
            _ => anyhow::bail!("viewport_width and viewport_height must be set together"),
        })
    }

    pub fn timeout_config(&self) -> Result<TimeoutConfig> {
        TimeoutConfig::preset(&self.timeouts)
            .with_context(|| format!("unknown timeouts preset '{}'", self.timeouts))
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be > 0");
        }
        if self.audit_timeout_secs == 0 {
            anyhow::bail!("audit_timeout_secs must be > 0");
        }
        self.device_profile()?;
        self.timeout_config()?;
        Ok(())
    }
}

/// Reads and validates the config file; no path means built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AuditConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => AuditConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<AuditConfig> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.device_profile().unwrap(), DeviceProfile::desktop());
        assert!(config.detection.retry_on_miss);
        config.validate().unwrap();
    }

    #[test]
    fn file_values_override_defaults() {
        let config = parse_config(
            r#"
            store_path = "/var/lib/bannerscope"
            concurrency = 4
            device = "mobile"
            viewport_width = 390
            viewport_height = 844
            timeouts = "patient"

            [detection]
            retry_on_miss = false
            extra_phrases = ["Zustimmen"]
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, "/var/lib/bannerscope");
        assert_eq!(config.device_profile().unwrap().resolution(), "390x844");
        assert_eq!(config.timeout_config().unwrap(), TimeoutConfig::patient());
        assert!(!config.detection.retry_on_miss);
        assert_eq!(config.detection.retry_delay_ms, 5000);
        assert_eq!(config.detection.extra_phrases, ["Zustimmen"]);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse_config("concurrency = 0").unwrap().validate().is_err());
        assert!(parse_config("device = \"tablet\"").unwrap().validate().is_err());
        assert!(parse_config("timeouts = \"lazy\"").unwrap().validate().is_err());
        assert!(parse_config("viewport_width = 100").unwrap().validate().is_err());
        assert!(parse_config("concurrency = \"many\"").is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bannerscope.toml");
        std::fs::write(&path, "audit_timeout_secs = 30\nheadless = false\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.audit_timeout(), Duration::from_secs(30));
        assert!(!config.headless);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
