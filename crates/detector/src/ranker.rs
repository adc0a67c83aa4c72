use bannerscope_core::{AuditError, Candidate, PageSession};

/// Tags never descended into while looking for an opaque banner body.
const SKIPPED_TAGS: &[&str] = &["style", "script", "link", "meta"];

/// Viewport candidates sharing the highest stacking order. Empty when that
/// order is not above page content.
pub fn top_stacked<E>(candidates: &[Candidate<E>]) -> Vec<&Candidate<E>> {
    let eligible: Vec<&Candidate<E>> = candidates.iter().filter(|c| c.in_viewport).collect();
    let Some(max) = eligible.iter().map(|c| c.z_index).max() else {
        return Vec::new();
    };
    if max <= 0 {
        return Vec::new();
    }
    eligible.into_iter().filter(|c| c.z_index == max).collect()
}

/// First opaque winner in evaluation order, otherwise the first winner.
pub fn pick_opaque<'a, E>(winners: &[&'a Candidate<E>]) -> Option<&'a Candidate<E>> {
    winners
        .iter()
        .find(|c| c.is_opaque)
        .or_else(|| winners.first())
        .copied()
}

/// Replaces a transparent wrapper with its first opaque, visible descendant.
///
/// Walks the subtree depth-first in document order with an explicit stack,
/// visiting at most `max_nodes` elements. Returns `None` when nothing qualifies.
pub async fn refine_opaque<P: PageSession>(
    page: &P,
    root: &P::Element,
    max_nodes: usize,
) -> Result<Option<P::Element>, AuditError> {
    let mut stack: Vec<P::Element> = page.children(root).await?.into_iter().rev().collect();
    let mut visited = 0usize;

    while let Some(element) = stack.pop() {
        if visited >= max_nodes {
            tracing::debug!(max_nodes, "opaque descent exhausted its budget");
            return Ok(None);
        }
        visited += 1;

        let info = page.node_info(&element).await?;
        if SKIPPED_TAGS.contains(&info.tag.as_str()) {
            continue;
        }
        if page.computed_style(&element).await?.is_opaque() && page.intersects_viewport(&element).await? {
            tracing::debug!(tag = %info.tag, visited, "opaque descendant found");
            return Ok(Some(element));
        }
        stack.extend(page.children(&element).await?.into_iter().rev());
    }
    Ok(None)
}

/// Picks the single most probable consent overlay, or `None` when no
/// candidate asserts itself above page content.
pub async fn rank<P: PageSession>(
    page: &P,
    candidates: &[Candidate<P::Element>],
    max_descent_nodes: usize,
) -> Option<P::Element> {
    let winners = top_stacked(candidates);
    let chosen = pick_opaque(&winners)?;
    tracing::debug!(
        z_index = chosen.z_index,
        tied = winners.len(),
        opaque = chosen.is_opaque,
        phrases = ?chosen.matched_phrases,
        "overlay chosen"
    );

    if chosen.is_opaque {
        return Some(chosen.element.clone());
    }
    match refine_opaque(page, &chosen.element, max_descent_nodes).await {
        Ok(Some(descendant)) => Some(descendant),
        Ok(None) => Some(chosen.element.clone()),
        Err(e) => {
            tracing::warn!(error = %e, "opaque descent failed, keeping wrapper");
            Some(chosen.element.clone())
        }
    }
}
