use async_trait::async_trait;
use bannerscope_core::{AuditError, ComputedStyle, NodeInfo, PageSession, ScopeKey};
use bannerscope_detector::{
    BannerLocator, DetectionConfig, Lexicon, OutcomeSource, SelectorCache, StaticElement, StaticPage, Validity,
    collector, fingerprint, synthesizer,
};
use bannerscope_storage::{MemoryStore, SelectorStore};
use std::sync::Arc;
use url::Url;

const ROOT: StaticElement = StaticElement { document: 0, index: 0 };

const BANNER: &str = r#"<html><body><main>Article</main><div id="cookie" style="z-index:9999;background:#fff">Accept cookies</div></body></html>"#;

/// A snapshot whose named calls fail the way a page that navigated mid-query does.
struct FailingPage {
    inner: StaticPage,
    failing: &'static [&'static str],
}

impl FailingPage {
    fn new(html: &str, failing: &'static [&'static str]) -> Self {
        Self { inner: StaticPage::new(html), failing }
    }

    fn check(&self, call: &str) -> Result<(), AuditError> {
        if self.failing.contains(&call) {
            return Err(AuditError::context_lost(format!("{} failed: Execution context was destroyed", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl PageSession for FailingPage {
    type Element = StaticElement;

    async fn documents(&self) -> Result<Vec<StaticElement>, AuditError> {
        self.check("documents")?;
        self.inner.documents().await
    }

    async fn find_by_text(&self, document: &StaticElement, phrases: &[String]) -> Result<Vec<StaticElement>, AuditError> {
        self.check("find_by_text")?;
        self.inner.find_by_text(document, phrases).await
    }

    async fn query_selector(&self, document: &StaticElement, selector: &str) -> Result<Option<StaticElement>, AuditError> {
        self.check("query_selector")?;
        self.inner.query_selector(document, selector).await
    }

    async fn matches_uniquely(&self, element: &StaticElement, selector: &str) -> Result<bool, AuditError> {
        self.check("matches_uniquely")?;
        self.inner.matches_uniquely(element, selector).await
    }

    async fn node_info(&self, element: &StaticElement) -> Result<NodeInfo, AuditError> {
        self.check("node_info")?;
        self.inner.node_info(element).await
    }

    async fn parent(&self, element: &StaticElement) -> Result<Option<StaticElement>, AuditError> {
        self.check("parent")?;
        self.inner.parent(element).await
    }

    async fn children(&self, element: &StaticElement) -> Result<Vec<StaticElement>, AuditError> {
        self.check("children")?;
        self.inner.children(element).await
    }

    async fn computed_style(&self, element: &StaticElement) -> Result<ComputedStyle, AuditError> {
        self.check("computed_style")?;
        self.inner.computed_style(element).await
    }

    async fn intersects_viewport(&self, element: &StaticElement) -> Result<bool, AuditError> {
        self.check("intersects_viewport")?;
        self.inner.intersects_viewport(element).await
    }

    async fn text_content(&self, element: &StaticElement) -> Result<String, AuditError> {
        self.check("text_content")?;
        self.inner.text_content(element).await
    }

    async fn screenshot_element(&self, element: &StaticElement) -> Result<Vec<u8>, AuditError> {
        self.check("screenshot_element")?;
        self.inner.screenshot_element(element).await
    }

    async fn screenshot_page(&self) -> Result<Vec<u8>, AuditError> {
        self.check("screenshot_page")?;
        self.inner.screenshot_page().await
    }

    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, AuditError> {
        self.check("evaluate")?;
        self.inner.evaluate(expression).await
    }
}

fn phrases() -> Vec<String> {
    Lexicon::builtin().folded_phrases()
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn healthy_wrapper_still_collects() {
    let page = FailingPage::new(BANNER, &[]);
    assert!(!collector::collect(&page, &phrases()).await.is_empty());
}

#[tokio::test]
async fn text_query_error_gives_an_empty_pass() {
    let page = FailingPage::new(BANNER, &["find_by_text"]);
    assert!(collector::collect(&page, &phrases()).await.is_empty());
}

#[tokio::test]
async fn node_info_error_gives_an_empty_pass() {
    let page = FailingPage::new(BANNER, &["node_info"]);
    assert!(collector::collect(&page, &phrases()).await.is_empty());
}

#[tokio::test]
async fn dom_error_during_synthesis_gives_empty_selector() {
    let page = FailingPage::new(BANNER, &["matches_uniquely"]);
    let banner = page.inner.query_selector(&ROOT, "div#cookie").await.unwrap().unwrap();
    assert_eq!(synthesizer::synthesize(&page, &banner).await, "");

    let page = FailingPage::new(BANNER, &["node_info"]);
    assert_eq!(synthesizer::synthesize(&page, &banner).await, "");
}

#[tokio::test]
async fn query_error_during_validation_is_unresolved() {
    let healthy = StaticPage::new(BANNER);
    let banner = healthy.query_selector(&ROOT, "div#cookie").await.unwrap().unwrap();
    let digest = fingerprint::fingerprint(&healthy, &banner).await.unwrap();

    let cache = SelectorCache::new(MemoryStore::new());
    let key = ScopeKey::full_url(&url("https://example.com/"));
    let record = cache.store(&key, "div#cookie", &digest).await.unwrap();
    assert!(cache.is_valid(&record, &healthy).await);

    let page = FailingPage::new(BANNER, &["query_selector"]);
    assert!(matches!(cache.check(&record, &page).await, Validity::Unresolved));
}

#[tokio::test]
async fn overlay_without_provable_selector_is_unselectable() {
    let store = Arc::new(MemoryStore::new());
    let locator = BannerLocator::new(store.clone(), Lexicon::builtin(), DetectionConfig::default().without_retry());
    let page = FailingPage::new(BANNER, &["matches_uniquely"]);

    let outcome = locator.locate(&page, &url("https://example.com/")).await;
    assert_eq!(outcome.source, OutcomeSource::Unselectable);
    assert!(outcome.selector.is_none());
    assert!(outcome.fingerprint.is_none());
    assert!(String::from_utf8_lossy(&outcome.screenshot).contains("Accept cookies"));
    assert!(store.latest("https://example.com/").await.unwrap().is_none());
    assert!(store.latest("example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn broken_page_degrades_to_not_found() {
    let locator = BannerLocator::new(MemoryStore::new(), Lexicon::builtin(), DetectionConfig::default().without_retry());
    let page = FailingPage::new(BANNER, &["documents", "screenshot_page"]);

    let outcome = locator.locate(&page, &url("https://example.com/")).await;
    assert_eq!(outcome.source, OutcomeSource::NotFound);
    assert!(outcome.screenshot.is_empty());
}
