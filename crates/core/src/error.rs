use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong, coarse enough to branch on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The target did not load
    Navigation,
    /// The execution context went away mid-query (page navigated or reloaded)
    ContextLost,
    /// An injected script threw
    ScriptExecution,
    /// A selector or handle no longer resolves
    ElementNotFound,
    /// Capturing pixels failed, or the element has no capturable box
    Screenshot,
    /// The driver or browser process misbehaved
    Browser,
    /// A deadline elapsed
    Timeout,
    /// Selector store failures
    Storage,
    /// The audit target is not a usable URL
    InvalidUrl,
    Unknown,
}

/// Error raised across the browser boundary and by the audit host.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("[{category:?}] {message}")]
pub struct AuditError {
    pub category: ErrorCategory,
    pub message: String,
    /// JSON details such as the URL or selector involved
    pub context: serde_json::Value,
    pub recoverable: bool,
    /// Suggested wait before trying again, in milliseconds
    pub retry_after_ms: Option<u64>,
}

impl AuditError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: serde_json::json!({}),
            recoverable: false,
            retry_after_ms: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    pub fn with_retry_delay(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self.recoverable = true;
        self
    }

    /// True for errors caused by the page changing underneath a query.
    pub fn is_transient(&self) -> bool {
        matches!(self.category, ErrorCategory::ContextLost)
    }

    pub fn navigation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Navigation, message).with_retry_delay(1500)
    }

    pub fn context_lost(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ContextLost, message).with_retry_delay(500)
    }

    pub fn script_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ScriptExecution, message)
    }

    pub fn element_not_found(selector: impl Into<String>) -> Self {
        let selector = selector.into();
        Self::new(ErrorCategory::ElementNotFound, format!("Element not found: {}", selector))
            .with_context(serde_json::json!({ "selector": selector }))
    }

    pub fn screenshot_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Screenshot, message)
    }

    pub fn browser_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Browser, message)
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message).with_retry_delay(2000)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Storage, message)
    }

    pub fn invalid_url(input: impl Into<String>) -> Self {
        let input = input.into();
        Self::new(ErrorCategory::InvalidUrl, format!("Invalid URL: {}", input))
            .with_context(serde_json::json!({ "input": input }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = AuditError::element_not_found("div#cookie");
        assert_eq!(err.to_string(), "[ElementNotFound] Element not found: div#cookie");
        assert_eq!(err.context["selector"], "div#cookie");
    }

    #[test]
    fn retry_delay_marks_recoverable() {
        let err = AuditError::script_error("boom");
        assert!(!err.recoverable);
        let err = err.with_retry_delay(250);
        assert!(err.recoverable);
        assert_eq!(err.retry_after_ms, Some(250));
    }

    #[test]
    fn only_context_loss_is_transient() {
        assert!(AuditError::context_lost("Execution context was destroyed").is_transient());
        assert!(!AuditError::navigation_error("net::ERR_NAME_NOT_RESOLVED").is_transient());
    }
}
