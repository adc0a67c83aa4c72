use async_trait::async_trait;
use url::Url;

use crate::{AuditError, ComputedStyle, DeviceProfile, NodeInfo};

/// A rendered page owned by exactly one audit.
///
/// Element handles are only meaningful for the session that produced them and
/// stop resolving once the page navigates or closes. Implementations must not
/// mutate the page.
#[async_trait]
pub trait PageSession: Send + Sync {
    type Element: Clone + Send + Sync + std::fmt::Debug;

    /// Root element of the main document followed by the roots of every
    /// reachable same-origin frame. Cross-origin frames are skipped.
    async fn documents(&self) -> Result<Vec<Self::Element>, AuditError>;

    /// Elements of `document` whose own or descendant text contains one of the
    /// case-folded `phrases`.
    async fn find_by_text(
        &self,
        document: &Self::Element,
        phrases: &[String],
    ) -> Result<Vec<Self::Element>, AuditError>;

    /// First element in `document` matching `selector`. Invalid selectors match nothing.
    async fn query_selector(
        &self,
        document: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>, AuditError>;

    /// Whether `selector` matches exactly one element of the element's own
    /// document and that element is `element`.
    async fn matches_uniquely(&self, element: &Self::Element, selector: &str) -> Result<bool, AuditError>;

    async fn node_info(&self, element: &Self::Element) -> Result<NodeInfo, AuditError>;

    async fn parent(&self, element: &Self::Element) -> Result<Option<Self::Element>, AuditError>;

    /// Element children in document order.
    async fn children(&self, element: &Self::Element) -> Result<Vec<Self::Element>, AuditError>;

    async fn computed_style(&self, element: &Self::Element) -> Result<ComputedStyle, AuditError>;

    async fn intersects_viewport(&self, element: &Self::Element) -> Result<bool, AuditError>;

    async fn text_content(&self, element: &Self::Element) -> Result<String, AuditError>;

    /// PNG bytes of the element's bounding box.
    async fn screenshot_element(&self, element: &Self::Element) -> Result<Vec<u8>, AuditError>;

    /// PNG bytes of the visible viewport.
    async fn screenshot_page(&self) -> Result<Vec<u8>, AuditError>;

    /// Evaluates a read-only expression and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value, AuditError>;
}

/// Opens and tears down page sessions, one per audit.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: PageSession + 'static;

    /// Opens a fresh session, navigated to `url` and settled.
    async fn open(&self, url: &Url, device: &DeviceProfile) -> Result<Self::Session, AuditError>;

    /// Tears the session down. Outstanding queries on it fail on their own.
    async fn close(&self, session: Self::Session);
}
