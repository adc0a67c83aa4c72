use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod error;
mod scope;
mod session;
mod style;
pub mod text;

pub use error::{AuditError, ErrorCategory};
pub use scope::{ScopeKey, normalize_target};
pub use session::{PageSession, SessionFactory};
pub use style::{ComputedStyle, color_alpha};
pub use text::fold_case;

/// Persisted selector for a scope key. Records are superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRecord {
    pub scope_key: String,
    pub selector: String,
    /// Hex digest of the banner screenshot taken when the selector was stored
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl SelectorRecord {
    pub fn new(scope_key: impl Into<String>, selector: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            scope_key: scope_key.into(),
            selector: selector.into(),
            fingerprint: fingerprint.into(),
            created_at: Utc::now(),
        }
    }
}

/// An element that mentioned a trigger phrase during one detection pass.
#[derive(Debug, Clone)]
pub struct Candidate<E> {
    pub element: E,
    pub matched_phrases: BTreeSet<String>,
    pub z_index: i64,
    pub is_opaque: bool,
    pub in_viewport: bool,
}

/// Identity of an element as far as selector building is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Lowercase tag name
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// 1-based position among element siblings, as `:nth-child()` counts
    pub sibling_index: usize,
}

/// Viewport and user agent an audit renders under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mobile: bool,
    pub user_agent: Option<String>,
}

impl DeviceProfile {
    pub fn desktop() -> Self {
        Self {
            name: "desktop".to_string(),
            width: 1920,
            height: 1080,
            mobile: false,
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36"
                    .to_string(),
            ),
        }
    }

    pub fn mobile() -> Self {
        Self {
            name: "mobile".to_string(),
            width: 360,
            height: 640,
            mobile: true,
            user_agent: Some(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1"
                    .to_string(),
            ),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// e.g. `1920x1080`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::desktop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_presets() {
        assert_eq!(DeviceProfile::desktop().resolution(), "1920x1080");
        let phone = DeviceProfile::mobile().with_size(390, 844);
        assert!(phone.mobile);
        assert_eq!(phone.resolution(), "390x844");
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = SelectorRecord::new("https://example.com/", "div#cookie", "ab12");
        let json = serde_json::to_string(&record).unwrap();
        let back: SelectorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
