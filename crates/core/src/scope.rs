use serde::{Deserialize, Serialize};
use url::Url;

use crate::AuditError;

/// Cache partition a selector record is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    /// The full URL, e.g. `https://example.com/news?id=1`
    FullUrl(String),
    /// Subdomain + domain + TLD, e.g. `www.example.com`
    Hostname(String),
}

impl ScopeKey {
    pub fn full_url(url: &Url) -> Self {
        ScopeKey::FullUrl(url.as_str().to_string())
    }

    /// `None` for URLs without a host (`data:`, `file:` and the like).
    pub fn hostname(url: &Url) -> Option<Self> {
        url.host_str().map(|h| ScopeKey::Hostname(h.to_ascii_lowercase()))
    }

    /// Lookup order for a target: exact URL first, then its hostname.
    pub fn tiers(url: &Url) -> Vec<Self> {
        let mut keys = vec![Self::full_url(url)];
        keys.extend(Self::hostname(url));
        keys
    }

    pub fn as_str(&self) -> &str {
        match self {
            ScopeKey::FullUrl(s) | ScopeKey::Hostname(s) => s,
        }
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns user input into an audit target. Bare hosts get an `https://` prefix.
pub fn normalize_target(input: &str) -> Result<Url, AuditError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AuditError::invalid_url(input));
    }
    let candidate = if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate).map_err(|_| AuditError::invalid_url(input))?;
    if url.host_str().is_none() {
        return Err(AuditError::invalid_url(input));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https() {
        let url = normalize_target("example.com/path").unwrap();
        assert_eq!(url.as_str(), "https://example.com/path");
    }

    #[test]
    fn existing_scheme_is_kept() {
        let url = normalize_target("http://example.com").unwrap();
        assert_eq!(url.as_str(), "http://example.com/");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize_target("").is_err());
        assert!(normalize_target("http://").is_err());
        assert!(normalize_target("https://exa mple.com").is_err());
    }

    #[test]
    fn tiers_go_url_then_host() {
        let url = Url::parse("https://News.Example.com/a?b=1").unwrap();
        let tiers = ScopeKey::tiers(&url);
        assert_eq!(
            tiers,
            vec![
                ScopeKey::FullUrl("https://news.example.com/a?b=1".to_string()),
                ScopeKey::Hostname("news.example.com".to_string()),
            ]
        );
    }

    #[test]
    fn hostless_urls_have_one_tier() {
        let url = Url::parse("data:text/html,<p>hi</p>").unwrap();
        assert_eq!(ScopeKey::tiers(&url).len(), 1);
    }
}
