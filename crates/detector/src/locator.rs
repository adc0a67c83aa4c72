use bannerscope_core::{PageSession, ScopeKey, SelectorRecord};
use bannerscope_storage::SelectorStore;
use serde::Serialize;
use std::time::Instant;
use url::Url;

use crate::cache::{SelectorCache, Validity};
use crate::config::DetectionConfig;
use crate::lexicon::Lexicon;
use crate::{collector, fingerprint, ranker, synthesizer};

/// Where the reported selector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    CachedUrl,
    CachedHost,
    Detected,
    /// An overlay was found but no unique selector could be built for it
    Unselectable,
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerOutcome {
    pub url: String,
    pub selector: Option<String>,
    pub fingerprint: Option<String>,
    pub source: OutcomeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub duration_ms: u64,
    /// PNG of the banner, or of the visible page when there is none
    #[serde(skip)]
    pub screenshot: Vec<u8>,
}

impl BannerOutcome {
    pub fn found(&self) -> bool {
        self.selector.is_some()
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }
}

/// One detection pass: the overlay element, if any, and its selector.
struct Pass<E> {
    element: Option<E>,
    selector: String,
}

impl<E> Pass<E> {
    fn empty() -> Self {
        Self { element: None, selector: String::new() }
    }

    fn has_selector(&self) -> bool {
        !self.selector.is_empty()
    }
}

/// Sequences cache lookup, validation, fresh detection and the cache write
/// for one page at a time. Shared across concurrent audits.
pub struct BannerLocator<S> {
    cache: SelectorCache<S>,
    phrases: Vec<String>,
    config: DetectionConfig,
}

impl<S: SelectorStore> BannerLocator<S> {
    pub fn new(store: S, lexicon: Lexicon, config: DetectionConfig) -> Self {
        let phrases = lexicon.with_extra(config.extra_phrases.iter().cloned()).folded_phrases();
        Self { cache: SelectorCache::new(store), phrases, config }
    }

    pub fn cache(&self) -> &SelectorCache<S> {
        &self.cache
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub async fn locate<P: PageSession>(&self, page: &P, url: &Url) -> BannerOutcome {
        let started = Instant::now();

        if let Some(outcome) = self.from_cache(page, url).await {
            return finish(outcome, started);
        }

        let mut pass = self.detect(page).await;
        if !pass.has_selector() && self.config.retry_on_miss {
            tracing::info!(url = %url, delay_ms = self.config.retry_delay_ms, "no banner yet, retrying once");
            tokio::time::sleep(self.config.retry_delay()).await;
            pass = self.detect(page).await;
        }

        let outcome = self.report_detection(page, url, pass).await;
        finish(outcome, started)
    }

    async fn from_cache<P: PageSession>(&self, page: &P, url: &Url) -> Option<BannerOutcome> {
        for key in ScopeKey::tiers(url) {
            let record = match self.cache.lookup(&key).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "cache lookup failed, treating as miss");
                    continue;
                }
            };
            if let Validity::Valid { capture, .. } = self.cache.check(&record, page).await {
                let source = match key {
                    ScopeKey::FullUrl(_) => OutcomeSource::CachedUrl,
                    ScopeKey::Hostname(_) => OutcomeSource::CachedHost,
                };
                tracing::info!(url = %url, key = %key, selector = %record.selector, "cached selector still valid");
                return Some(cached_outcome(url, record, source, capture.bytes));
            }
        }
        None
    }

    async fn detect<P: PageSession>(&self, page: &P) -> Pass<P::Element> {
        let candidates = collector::collect(page, &self.phrases).await;
        let Some(element) = ranker::rank(page, &candidates, self.config.max_descent_nodes).await else {
            return Pass::empty();
        };
        let selector = synthesizer::synthesize(page, &element).await;
        Pass { element: Some(element), selector }
    }

    async fn report_detection<P: PageSession>(&self, page: &P, url: &Url, pass: Pass<P::Element>) -> BannerOutcome {
        let mut outcome = BannerOutcome {
            url: url.to_string(),
            selector: None,
            fingerprint: None,
            source: OutcomeSource::NotFound,
            resolution: None,
            duration_ms: 0,
            screenshot: Vec::new(),
        };

        let Some(element) = pass.element else {
            tracing::info!(url = %url, "no consent banner detected");
            outcome.screenshot = page_screenshot(page).await;
            return outcome;
        };
        if pass.selector.is_empty() {
            outcome.source = OutcomeSource::Unselectable;
            outcome.screenshot = match fingerprint::capture(page, &element).await {
                Ok(capture) => capture.bytes,
                Err(_) => page_screenshot(page).await,
            };
            return outcome;
        }

        outcome.source = OutcomeSource::Detected;
        match fingerprint::capture(page, &element).await {
            Ok(capture) => {
                // Full URL and hostname
                for key in ScopeKey::tiers(url) {
                    if let Err(e) = self.cache.store(&key, &pass.selector, &capture.digest).await {
                        tracing::warn!(error = %e, key = %key, "could not cache selector");
                    }
                }
                outcome.fingerprint = Some(capture.digest);
                outcome.screenshot = capture.bytes;
            }
            Err(e) => {
                tracing::warn!(error = %e, selector = %pass.selector, "banner not capturable, selector left uncached");
                outcome.screenshot = page_screenshot(page).await;
            }
        }
        tracing::info!(url = %url, selector = %pass.selector, "consent banner detected");
        outcome.selector = Some(pass.selector);
        outcome
    }
}

fn cached_outcome(url: &Url, record: SelectorRecord, source: OutcomeSource, screenshot: Vec<u8>) -> BannerOutcome {
    BannerOutcome {
        url: url.to_string(),
        selector: Some(record.selector),
        fingerprint: Some(record.fingerprint),
        source,
        resolution: None,
        duration_ms: 0,
        screenshot,
    }
}

async fn page_screenshot<P: PageSession>(page: &P) -> Vec<u8> {
    match page.screenshot_page().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "page screenshot failed");
            Vec::new()
        }
    }
}

fn finish(mut outcome: BannerOutcome, started: Instant) -> BannerOutcome {
    outcome.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    outcome
}
