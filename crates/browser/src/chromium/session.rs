use async_trait::async_trait;
use bannerscope_core::text::{translate_from, translate_to};
use bannerscope_core::{AuditError, ComputedStyle, NodeInfo, PageSession};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams, Viewport};
use chromiumoxide::cdp::js_protocol::runtime::{
    CallArgument, CallFunctionOnParams, EvaluateParams, ExceptionDetails, GetPropertiesParams, RemoteObject,
    RemoteObjectId,
};
use chromiumoxide::page::Page;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::shared::{js, to_audit_error};

/// Handle to a live element, valid for the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromiumElement {
    object_id: RemoteObjectId,
}

/// One audited page. Owns its tab; dropping the session without closing it
/// leaves the tab to the browser's shutdown.
pub struct ChromiumSession {
    page: Page,
}

/// Element box in top-level viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl BoundingBox {
    pub fn intersects_viewport(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x < self.viewport_width
            && self.y < self.viewport_height
            && self.x + self.width > 0.0
            && self.y + self.height > 0.0
    }

    /// The visible part of the box, `None` when nothing of it is on screen.
    pub fn visible_clip(&self) -> Option<Viewport> {
        if !self.intersects_viewport() {
            return None;
        }
        let left = self.x.max(0.0);
        let top = self.y.max(0.0);
        let right = (self.x + self.width).min(self.viewport_width);
        let bottom = (self.y + self.height).min(self.viewport_height);
        Some(Viewport { x: left, y: top, width: right - left, height: bottom - top, scale: 1.0 })
    }
}

fn exception_error(details: &ExceptionDetails, action: &str) -> AuditError {
    let description = details
        .exception
        .as_ref()
        .and_then(|e| e.description.clone())
        .unwrap_or_else(|| details.text.clone());
    match to_audit_error(&description, action) {
        lost if lost.is_transient() => lost,
        _ => AuditError::script_error(format!("{} script threw: {}", action, description)),
    }
}

impl ChromiumSession {
    pub(crate) fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub(crate) fn into_page(self) -> Page {
        self.page
    }

    async fn call_on(
        &self,
        element: &ChromiumElement,
        function: &str,
        args: Vec<Value>,
        by_value: bool,
        action: &str,
    ) -> Result<RemoteObject, AuditError> {
        let mut params = CallFunctionOnParams::new(function);
        params.object_id = Some(element.object_id.clone());
        params.arguments = Some(args.into_iter().map(|v| CallArgument::builder().value(v).build()).collect());
        params.return_by_value = Some(by_value);
        params.await_promise = Some(false);

        let returns = self.page.execute(params).await.map_err(|e| to_audit_error(e, action))?.result;
        if let Some(details) = &returns.exception_details {
            return Err(exception_error(details, action));
        }
        Ok(returns.result)
    }

    async fn call_value<T: DeserializeOwned>(
        &self,
        element: &ChromiumElement,
        function: &str,
        args: Vec<Value>,
        action: &str,
    ) -> Result<T, AuditError> {
        let object = self.call_on(element, function, args, true, action).await?;
        serde_json::from_value(object.value.unwrap_or(Value::Null))
            .map_err(|e| AuditError::script_error(format!("{} returned unexpected data: {}", action, e)))
    }

    async fn call_element(
        &self,
        element: &ChromiumElement,
        function: &str,
        args: Vec<Value>,
        action: &str,
    ) -> Result<Option<ChromiumElement>, AuditError> {
        let object = self.call_on(element, function, args, false, action).await?;
        // `null` comes back without an object id
        Ok(object.object_id.map(|object_id| ChromiumElement { object_id }))
    }

    async fn call_elements(
        &self,
        element: &ChromiumElement,
        function: &str,
        args: Vec<Value>,
        action: &str,
    ) -> Result<Vec<ChromiumElement>, AuditError> {
        let object = self.call_on(element, function, args, false, action).await?;
        match object.object_id {
            Some(array) => self.array_elements(array, action).await,
            None => Ok(Vec::new()),
        }
    }

    /// Unpacks a remote JS array of elements, preserving index order.
    async fn array_elements(&self, array: RemoteObjectId, action: &str) -> Result<Vec<ChromiumElement>, AuditError> {
        let mut params = GetPropertiesParams::new(array);
        params.own_properties = Some(true);
        let properties = self.page.execute(params).await.map_err(|e| to_audit_error(e, action))?.result;

        let mut indexed: Vec<(usize, RemoteObjectId)> = properties
            .result
            .into_iter()
            .filter_map(|p| {
                let index = p.name.parse::<usize>().ok()?;
                let object_id = p.value?.object_id?;
                Some((index, object_id))
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, object_id)| ChromiumElement { object_id }).collect())
    }

    pub async fn bounding_box(&self, element: &ChromiumElement) -> Result<BoundingBox, AuditError> {
        self.call_value(element, js::element::BOUNDING_BOX, vec![], "BoundingBox").await
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    type Element = ChromiumElement;

    async fn documents(&self) -> Result<Vec<ChromiumElement>, AuditError> {
        let mut params = EvaluateParams::new(js::text::DOCUMENT_ROOTS);
        params.return_by_value = Some(false);
        let returns = self.page.execute(params).await.map_err(|e| to_audit_error(e, "Documents"))?.result;
        if let Some(details) = &returns.exception_details {
            return Err(exception_error(details, "Documents"));
        }
        match returns.result.object_id {
            Some(array) => self.array_elements(array, "Documents").await,
            None => Ok(Vec::new()),
        }
    }

    async fn find_by_text(&self, document: &ChromiumElement, phrases: &[String]) -> Result<Vec<ChromiumElement>, AuditError> {
        let args = vec![json!(phrases), json!(translate_from()), json!(translate_to())];
        self.call_elements(document, js::text::FIND_BY_TEXT, args, "FindByText").await
    }

    async fn query_selector(&self, document: &ChromiumElement, selector: &str) -> Result<Option<ChromiumElement>, AuditError> {
        self.call_element(document, js::element::QUERY_SELECTOR, vec![json!(selector)], "QuerySelector").await
    }

    async fn matches_uniquely(&self, element: &ChromiumElement, selector: &str) -> Result<bool, AuditError> {
        self.call_value(element, js::element::MATCHES_UNIQUELY, vec![json!(selector)], "MatchesUniquely").await
    }

    async fn node_info(&self, element: &ChromiumElement) -> Result<NodeInfo, AuditError> {
        self.call_value(element, js::element::NODE_INFO, vec![], "NodeInfo").await
    }

    async fn parent(&self, element: &ChromiumElement) -> Result<Option<ChromiumElement>, AuditError> {
        self.call_element(element, js::element::PARENT_ELEMENT, vec![], "Parent").await
    }

    async fn children(&self, element: &ChromiumElement) -> Result<Vec<ChromiumElement>, AuditError> {
        self.call_elements(element, js::element::CHILD_ELEMENTS, vec![], "Children").await
    }

    async fn computed_style(&self, element: &ChromiumElement) -> Result<ComputedStyle, AuditError> {
        self.call_value(element, js::element::COMPUTED_STYLE, vec![], "ComputedStyle").await
    }

    async fn intersects_viewport(&self, element: &ChromiumElement) -> Result<bool, AuditError> {
        Ok(self.bounding_box(element).await?.intersects_viewport())
    }

    async fn text_content(&self, element: &ChromiumElement) -> Result<String, AuditError> {
        self.call_value(element, js::text::TEXT_CONTENT, vec![], "TextContent").await
    }

    async fn screenshot_element(&self, element: &ChromiumElement) -> Result<Vec<u8>, AuditError> {
        let clip = self
            .bounding_box(element)
            .await?
            .visible_clip()
            .ok_or_else(|| AuditError::screenshot_error("element has no visible box"))?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(clip)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| AuditError::screenshot_error(format!("Element screenshot failed: {}", e)))
    }

    async fn screenshot_page(&self) -> Result<Vec<u8>, AuditError> {
        let params = CaptureScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| AuditError::screenshot_error(format!("Page screenshot failed: {}", e)))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, AuditError> {
        let result = self
            .page
            .evaluate(expression.to_string())
            .await
            .map_err(|e| to_audit_error(e, "Evaluate"))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f64, y: f64, width: f64, height: f64) -> BoundingBox {
        BoundingBox { x, y, width, height, viewport_width: 1920.0, viewport_height: 1080.0 }
    }

    #[test]
    fn viewport_intersection() {
        assert!(bbox(0.0, 980.0, 1920.0, 100.0).intersects_viewport());
        assert!(bbox(-50.0, -50.0, 100.0, 100.0).intersects_viewport());
        assert!(!bbox(0.0, 1080.0, 1920.0, 100.0).intersects_viewport());
        assert!(!bbox(-9999.0, 0.0, 100.0, 100.0).intersects_viewport());
        assert!(!bbox(10.0, 10.0, 0.0, 100.0).intersects_viewport());
    }

    #[test]
    fn clip_is_cut_to_viewport() {
        let clip = bbox(-20.0, 1000.0, 200.0, 200.0).visible_clip().unwrap();
        assert_eq!((clip.x, clip.y, clip.width, clip.height), (0.0, 1000.0, 180.0, 80.0));
        assert!(bbox(0.0, 2000.0, 10.0, 10.0).visible_clip().is_none());
    }

    #[test]
    fn box_parses_from_script_output() {
        let value = json!({ "x": 1.5, "y": 2, "width": 300, "height": 40, "viewportWidth": 360, "viewportHeight": 640 });
        let parsed: BoundingBox = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.width, 300.0);
        assert_eq!(parsed.viewport_height, 640.0);
    }
}
