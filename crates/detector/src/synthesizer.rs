use bannerscope_core::{AuditError, NodeInfo, PageSession};
use std::fmt::Write;

/// Serialises `ident` as a CSS identifier, escaping whatever a bare token
/// cannot hold (CSSOM "serialize an identifier").
pub fn css_escape(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            '0'..='9' if i == 0 || (i == 1 && chars[0] == '-') => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

fn non_empty_id(info: &NodeInfo) -> Option<&str> {
    info.id.as_deref().filter(|id| !id.is_empty())
}

fn class_suffix(info: &NodeInfo) -> String {
    info.classes
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| format!(".{}", css_escape(c)))
        .collect()
}

/// Local selector attempts for one element, narrowest last: `tag#id`, then
/// the same with every class appended. A bare element yields just its tag.
pub fn local_selectors(info: &NodeInfo) -> Vec<String> {
    let tag = css_escape(&info.tag);
    let id = non_empty_id(info).map(|id| format!("#{}", css_escape(id))).unwrap_or_default();
    let classes = class_suffix(info);

    let mut attempts = Vec::new();
    if !id.is_empty() {
        attempts.push(format!("{tag}{id}"));
    }
    if !classes.is_empty() {
        attempts.push(format!("{tag}{id}{classes}"));
    }
    if attempts.is_empty() {
        attempts.push(tag);
    }
    attempts
}

/// Tag, id and classes of one element, never positional.
pub fn local_selector(info: &NodeInfo) -> String {
    format!(
        "{}{}{}",
        css_escape(&info.tag),
        non_empty_id(info).map(|id| format!("#{}", css_escape(id))).unwrap_or_default(),
        class_suffix(info)
    )
}

/// [`local_selector`] pinned to its sibling position. The document element
/// has no siblings and stays unpinned.
pub fn positional_selector(info: &NodeInfo) -> String {
    let local = local_selector(info);
    if info.tag == "html" || info.sibling_index == 0 {
        return local;
    }
    format!("{}:nth-child({})", local, info.sibling_index)
}

/// Shortest stable selector that matches only `element`, or an empty string
/// when no attempt can be proven unique. DOM errors also yield an empty string.
pub async fn synthesize<P: PageSession>(page: &P, element: &P::Element) -> String {
    match try_synthesize(page, element).await {
        Ok(Some(selector)) => {
            tracing::debug!(selector = %selector, "selector synthesized");
            selector
        }
        Ok(None) => {
            tracing::warn!("no unique selector for element");
            String::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "selector synthesis failed");
            String::new()
        }
    }
}

async fn try_synthesize<P: PageSession>(page: &P, element: &P::Element) -> Result<Option<String>, AuditError> {
    let info = page.node_info(element).await?;

    for attempt in local_selectors(&info) {
        if page.matches_uniquely(element, &attempt).await? {
            return Ok(Some(attempt));
        }
    }

    if let Some(selector) = chain(page, element, &info, local_selector).await? {
        return Ok(Some(selector));
    }
    tracing::debug!("structural chain not unique, falling back to positions");
    chain(page, element, &info, positional_selector).await
}

/// Grows `step(ancestor) > ...` upward from `element` until the chain is unique
/// or the document root has been added.
async fn chain<P: PageSession>(
    page: &P,
    element: &P::Element,
    info: &NodeInfo,
    step: fn(&NodeInfo) -> String,
) -> Result<Option<String>, AuditError> {
    let mut selector = step(info);
    if page.matches_uniquely(element, &selector).await? {
        return Ok(Some(selector));
    }

    let mut current = page.parent(element).await?;
    while let Some(ancestor) = current {
        let ancestor_info = page.node_info(&ancestor).await?;
        selector = format!("{} > {}", step(&ancestor_info), selector);
        if page.matches_uniquely(element, &selector).await? {
            return Ok(Some(selector));
        }
        current = page.parent(&ancestor).await?;
    }
    Ok(None)
}
