//! Offline [`PageSession`] over HTML snapshots.
//!
//! Only inline `style` attributes are honoured and layout is approximated:
//! an element is off screen when it or an ancestor is hidden, or when an inline
//! `top`/`left` pushes it a full viewport away. Screenshots are the element's
//! serialised markup, so any change to the banner's markup changes its digest.

use async_trait::async_trait;
use bannerscope_core::{AuditError, ComputedStyle, DeviceProfile, NodeInfo, PageSession, SessionFactory, fold_case};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;
use url::Url;

/// Element `index` (document order, `<html>` first) of snapshot `document`
/// (0 is the main document, then frames in insertion order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticElement {
    pub document: usize,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct StaticPage {
    documents: Vec<String>,
    viewport: (f64, f64),
    latency: Option<Duration>,
}

fn elements(html: &Html) -> Vec<ElementRef<'_>> {
    html.root_element().descendants().filter_map(ElementRef::wrap).collect()
}

fn same_node(a: &ElementRef<'_>, b: &ElementRef<'_>) -> bool {
    <ElementRef<'_> as Deref>::deref(a).id() == <ElementRef<'_> as Deref>::deref(b).id()
}

fn position(all: &[ElementRef<'_>], element: &ElementRef<'_>) -> Option<usize> {
    all.iter().position(|e| same_node(e, element))
}

fn declarations(element: &ElementRef<'_>) -> Vec<(String, String)> {
    element
        .value()
        .attr("style")
        .unwrap_or_default()
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(prop, value)| (prop.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

fn style_of(element: &ElementRef<'_>) -> ComputedStyle {
    let mut style = ComputedStyle::default();
    for (prop, value) in declarations(element) {
        match prop.as_str() {
            "z-index" => style.z_index = value,
            "background-color" => style.background_color = value,
            "background-image" => style.background_image = value,
            "background" if value.contains("url(") || value.contains("gradient(") => style.background_image = value,
            "background" => style.background_color = value,
            "display" => style.display = value,
            _ => {}
        }
    }
    style
}

fn px(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").trim().parse().ok()
}

fn pushed_away(element: &ElementRef<'_>, (width, height): (f64, f64)) -> bool {
    declarations(element).iter().any(|(prop, value)| {
        let limit = match prop.as_str() {
            "left" => width,
            "top" => height,
            _ => return false,
        };
        px(value).is_some_and(|offset| offset >= limit || offset <= -limit)
    })
}

fn hidden(element: &ElementRef<'_>) -> bool {
    element.value().attr("hidden").is_some() || style_of(element).display.eq_ignore_ascii_case("none")
}

fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { documents: vec![html.into()], viewport: (1920.0, 1080.0), latency: None }
    }

    /// Adds a same-origin frame document.
    pub fn with_frame(mut self, html: impl Into<String>) -> Self {
        self.documents.push(html.into());
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (f64::from(width), f64::from(height));
        self
    }

    /// Delays every `documents()` call, standing in for a slow page.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn source(&self, document: usize) -> Result<&str, AuditError> {
        self.documents
            .get(document)
            .map(String::as_str)
            .ok_or_else(|| AuditError::context_lost(format!("no document {}", document)))
    }

    /// Parses the element's document and hands the element to `f`.
    fn with_element<T>(&self, element: &StaticElement, f: impl FnOnce(&[ElementRef<'_>], ElementRef<'_>) -> T) -> Result<T, AuditError> {
        let html = Html::parse_document(self.source(element.document)?);
        let all = elements(&html);
        let target = *all
            .get(element.index)
            .ok_or_else(|| AuditError::context_lost(format!("element {} is gone", element.index)))?;
        Ok(f(&all, target))
    }

    fn select_all(&self, document: usize, selector: &str) -> Result<Vec<usize>, AuditError> {
        let Ok(selector) = Selector::parse(selector) else {
            return Ok(Vec::new());
        };
        let html = Html::parse_document(self.source(document)?);
        let all = elements(&html);
        Ok(html.select(&selector).filter_map(|e| position(&all, &e)).collect())
    }

    fn visible(&self, element: &StaticElement) -> Result<bool, AuditError> {
        let viewport = self.viewport;
        self.with_element(element, |_, target| {
            let mut current = Some(target);
            while let Some(el) = current {
                if hidden(&el) || pushed_away(&el, viewport) {
                    return false;
                }
                current = el.parent().and_then(ElementRef::wrap);
            }
            true
        })
    }
}

#[async_trait]
impl PageSession for StaticPage {
    type Element = StaticElement;

    async fn documents(&self) -> Result<Vec<StaticElement>, AuditError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok((0..self.documents.len()).map(|document| StaticElement { document, index: 0 }).collect())
    }

    async fn find_by_text(&self, document: &StaticElement, phrases: &[String]) -> Result<Vec<StaticElement>, AuditError> {
        let html = Html::parse_document(self.source(document.document)?);
        Ok(elements(&html)
            .iter()
            .enumerate()
            .filter(|(_, el)| {
                let text = fold_case(&text_of(el));
                phrases.iter().any(|p| text.contains(p.as_str()))
            })
            .map(|(index, _)| StaticElement { document: document.document, index })
            .collect())
    }

    async fn query_selector(&self, document: &StaticElement, selector: &str) -> Result<Option<StaticElement>, AuditError> {
        Ok(self
            .select_all(document.document, selector)?
            .first()
            .map(|&index| StaticElement { document: document.document, index }))
    }

    async fn matches_uniquely(&self, element: &StaticElement, selector: &str) -> Result<bool, AuditError> {
        Ok(self.select_all(element.document, selector)? == [element.index])
    }

    async fn node_info(&self, element: &StaticElement) -> Result<NodeInfo, AuditError> {
        self.with_element(element, |_, target| {
            let value = target.value();
            let sibling_index = match target.parent() {
                Some(parent) => parent
                    .children()
                    .filter_map(ElementRef::wrap)
                    .position(|e| same_node(&e, &target))
                    .map_or(1, |i| i + 1),
                None => 1,
            };
            NodeInfo {
                tag: value.name().to_ascii_lowercase(),
                id: value.id().map(str::to_string),
                classes: value.classes().map(str::to_string).collect(),
                sibling_index,
            }
        })
    }

    async fn parent(&self, element: &StaticElement) -> Result<Option<StaticElement>, AuditError> {
        let document = element.document;
        self.with_element(element, |all, target| {
            target
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| position(all, &p))
                .map(|index| StaticElement { document, index })
        })
    }

    async fn children(&self, element: &StaticElement) -> Result<Vec<StaticElement>, AuditError> {
        let document = element.document;
        self.with_element(element, |all, target| {
            target
                .children()
                .filter_map(ElementRef::wrap)
                .filter_map(|c| position(all, &c))
                .map(|index| StaticElement { document, index })
                .collect()
        })
    }

    async fn computed_style(&self, element: &StaticElement) -> Result<ComputedStyle, AuditError> {
        self.with_element(element, |_, target| style_of(&target))
    }

    async fn intersects_viewport(&self, element: &StaticElement) -> Result<bool, AuditError> {
        self.visible(element)
    }

    async fn text_content(&self, element: &StaticElement) -> Result<String, AuditError> {
        self.with_element(element, |_, target| text_of(&target))
    }

    async fn screenshot_element(&self, element: &StaticElement) -> Result<Vec<u8>, AuditError> {
        if !self.visible(element)? {
            return Err(AuditError::screenshot_error("element has no visible box"));
        }
        self.with_element(element, |_, target| target.html().into_bytes())
    }

    async fn screenshot_page(&self) -> Result<Vec<u8>, AuditError> {
        let html = Html::parse_document(self.source(0)?);
        Ok(html.root_element().html().into_bytes())
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value, AuditError> {
        Err(AuditError::script_error("static snapshots do not run scripts"))
    }
}

/// Serves registered snapshots by URL.
#[derive(Debug, Clone, Default)]
pub struct StaticPageFactory {
    pages: HashMap<String, StaticPage>,
}

impl StaticPageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &Url, page: StaticPage) -> Self {
        self.pages.insert(url.as_str().to_string(), page);
        self
    }
}

#[async_trait]
impl SessionFactory for StaticPageFactory {
    type Session = StaticPage;

    async fn open(&self, url: &Url, device: &DeviceProfile) -> Result<StaticPage, AuditError> {
        self.pages
            .get(url.as_str())
            .cloned()
            .map(|page| page.with_viewport(device.width, device.height))
            .ok_or_else(|| {
                AuditError::navigation_error(format!("no snapshot for {}", url))
                    .with_context(serde_json::json!({ "url": url.as_str() }))
            })
    }

    async fn close(&self, _session: StaticPage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_styles_become_computed_styles() {
        let page = StaticPage::new(
            r#"<div id="a" style="z-index: 10; background: #fff">x</div><div id="b" style="background:url(x.png)">y</div>"#,
        );
        let a = page.query_selector(&StaticElement { document: 0, index: 0 }, "#a").await.unwrap().unwrap();
        let style = page.computed_style(&a).await.unwrap();
        assert_eq!(style.effective_z_index(), 10);
        assert!(style.is_opaque());

        let b = page.query_selector(&StaticElement { document: 0, index: 0 }, "#b").await.unwrap().unwrap();
        assert!(page.computed_style(&b).await.unwrap().is_opaque());
    }

    #[tokio::test]
    async fn hidden_and_displaced_elements_are_offscreen() {
        let page = StaticPage::new(
            r#"<div id="shown">a</div><div hidden><p id="inner">b</p></div><div id="far" style="left:-9999px">c</div><div id="none" style="display:none">d</div>"#,
        );
        let root = StaticElement { document: 0, index: 0 };
        for (selector, expected) in [("#shown", true), ("#inner", false), ("#far", false), ("#none", false)] {
            let el = page.query_selector(&root, selector).await.unwrap().unwrap();
            assert_eq!(page.intersects_viewport(&el).await.unwrap(), expected, "{selector}");
        }
    }

    #[tokio::test]
    async fn tree_navigation_follows_document_order() {
        let page = StaticPage::new("<ul><li>a</li><li class=\"x y\">b</li></ul>");
        let root = StaticElement { document: 0, index: 0 };
        let li = page.query_selector(&root, "li.x").await.unwrap().unwrap();
        let info = page.node_info(&li).await.unwrap();
        assert_eq!(info.tag, "li");
        assert_eq!(info.classes, ["x", "y"]);
        assert_eq!(info.sibling_index, 2);

        let ul = page.parent(&li).await.unwrap().unwrap();
        assert_eq!(page.node_info(&ul).await.unwrap().tag, "ul");
        assert_eq!(page.children(&ul).await.unwrap().len(), 2);
        assert!(page.parent(&root).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_selectors_match_nothing() {
        let page = StaticPage::new("<p>a</p>");
        let root = StaticElement { document: 0, index: 0 };
        assert!(page.query_selector(&root, "p[").await.unwrap().is_none());
        assert!(!page.matches_uniquely(&root, ">>").await.unwrap());
        assert!(page.evaluate("1 + 1").await.is_err());
    }
}
