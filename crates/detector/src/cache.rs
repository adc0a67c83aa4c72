use bannerscope_core::{AuditError, PageSession, ScopeKey, SelectorRecord};
use bannerscope_storage::SelectorStore;

use crate::fingerprint::{self, Capture};

/// Outcome of re-checking a stored selector against the live page.
#[derive(Debug, Clone)]
pub enum Validity<E> {
    /// Resolves to an on-screen element that still renders identically
    Valid { element: E, capture: Capture },
    /// Matches nothing in any reachable document
    Unresolved,
    Offscreen,
    /// Renders differently than when it was stored
    Drifted { current: String },
}

impl<E> Validity<E> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid { .. })
    }
}

/// Selector records behind a [`SelectorStore`], with freshness checks.
pub struct SelectorCache<S> {
    store: S,
}

impl<S: SelectorStore> SelectorCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store_ref(&self) -> &S {
        &self.store
    }

    pub async fn lookup(&self, key: &ScopeKey) -> Result<Option<SelectorRecord>, AuditError> {
        self.store
            .latest(key.as_str())
            .await
            .map_err(|e| AuditError::storage_error(format!("lookup of {} failed: {:#}", key, e)))
    }

    /// Files a new authoritative record for `key`.
    pub async fn store(&self, key: &ScopeKey, selector: &str, fingerprint: &str) -> Result<SelectorRecord, AuditError> {
        let record = SelectorRecord::new(key.as_str(), selector, fingerprint);
        self.store
            .upsert(record.clone())
            .await
            .map_err(|e| AuditError::storage_error(format!("write of {} failed: {:#}", key, e)))?;
        tracing::debug!(key = %key, selector, "selector stored");
        Ok(record)
    }

    /// Re-resolves the record and compares a fresh fingerprint. DOM errors make
    /// the record unresolved.
    pub async fn check<P: PageSession>(&self, record: &SelectorRecord, page: &P) -> Validity<P::Element> {
        let verdict = match check_record(record, page).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::debug!(error = %e, selector = %record.selector, "validation query failed");
                Validity::Unresolved
            }
        };
        if !verdict.is_valid() {
            tracing::info!(key = %record.scope_key, selector = %record.selector, reason = reason(&verdict), "cached selector rejected");
        }
        verdict
    }

    pub async fn is_valid<P: PageSession>(&self, record: &SelectorRecord, page: &P) -> bool {
        self.check(record, page).await.is_valid()
    }
}

fn reason<E>(verdict: &Validity<E>) -> &'static str {
    match verdict {
        Validity::Valid { .. } => "valid",
        Validity::Unresolved => "unresolved",
        Validity::Offscreen => "offscreen",
        Validity::Drifted { .. } => "drifted",
    }
}

/// The first match for `selector` in each document, main document first.
pub async fn resolve_all<P: PageSession>(page: &P, selector: &str) -> Result<Vec<P::Element>, AuditError> {
    let mut found = Vec::new();
    for document in page.documents().await? {
        if let Some(element) = page.query_selector(&document, selector).await? {
            found.push(element);
        }
    }
    Ok(found)
}

/// Valid if any document's match passes; otherwise the verdict for the
/// first match.
async fn check_record<P: PageSession>(record: &SelectorRecord, page: &P) -> Result<Validity<P::Element>, AuditError> {
    let mut verdict = Validity::Unresolved;
    for element in resolve_all(page, &record.selector).await? {
        let current = check_element(record, page, element).await?;
        if current.is_valid() {
            return Ok(current);
        }
        if matches!(verdict, Validity::Unresolved) {
            verdict = current;
        }
    }
    Ok(verdict)
}

async fn check_element<P: PageSession>(
    record: &SelectorRecord,
    page: &P,
    element: P::Element,
) -> Result<Validity<P::Element>, AuditError> {
    if !page.intersects_viewport(&element).await? {
        return Ok(Validity::Offscreen);
    }
    let capture = fingerprint::capture(page, &element).await?;
    if capture.digest != record.fingerprint {
        return Ok(Validity::Drifted { current: capture.digest });
    }
    Ok(Validity::Valid { element, capture })
}
