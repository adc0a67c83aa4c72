use bannerscope_core::AuditError;

const CONTEXT_LOST_MARKERS: &[&str] = &[
    "Cannot find context",
    "Execution context was destroyed",
    "Inspected target navigated or closed",
    "Could not find object with given id",
];

pub fn to_audit_error(e: impl std::fmt::Display, action: &str) -> AuditError {
    let s = e.to_string();
    if CONTEXT_LOST_MARKERS.iter().any(|m| s.contains(m)) {
        AuditError::context_lost(format!("{} lost its page context: {}", action, s))
    } else if s.contains("timeout") || s.contains("Timeout") {
        AuditError::timeout_error(format!("{} timed out: {}", action, s))
    } else if s.contains("navigation") || s.contains("Navigation") {
        AuditError::navigation_error(format!("{} navigation failed: {}", action, s))
    } else {
        AuditError::browser_error(format!("{} failed: {}", action, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bannerscope_core::ErrorCategory;

    #[test]
    fn classifies_driver_messages() {
        let lost = to_audit_error("Execution context was destroyed, most likely because of a navigation", "Query");
        assert_eq!(lost.category, ErrorCategory::ContextLost);
        assert!(lost.recoverable);

        assert_eq!(to_audit_error("Request timeout", "Goto").category, ErrorCategory::Timeout);
        assert_eq!(to_audit_error("websocket closed", "Style").category, ErrorCategory::Browser);
    }
}
