use bannerscope_core::{AuditError, Candidate, PageSession, fold_case};
use std::collections::BTreeSet;

/// Elements that hold the whole page or never render; they always contain the
/// trigger text of a banner and are never the banner itself.
pub const NON_CANDIDATE_TAGS: &[&str] = &[
    "html", "head", "body", "script", "style", "noscript", "template", "title", "meta", "link",
];

/// Gathers every element in the main document and its same-origin frames whose
/// text mentions a trigger phrase.
///
/// `phrases` must already be case-folded. A query that throws (typically because
/// the page navigated mid-pass) yields an empty pass instead of an error.
pub async fn collect<P: PageSession>(page: &P, phrases: &[String]) -> Vec<Candidate<P::Element>> {
    match try_collect(page, phrases).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!(error = %e, "candidate query failed, treating pass as empty");
            Vec::new()
        }
    }
}

async fn try_collect<P: PageSession>(page: &P, phrases: &[String]) -> Result<Vec<Candidate<P::Element>>, AuditError> {
    let documents = page.documents().await?;
    let mut candidates = Vec::new();

    for (frame, document) in documents.iter().enumerate() {
        let matches = page.find_by_text(document, phrases).await?;
        tracing::debug!(frame, matches = matches.len(), "text matches");

        for element in matches {
            let info = page.node_info(&element).await?;
            if NON_CANDIDATE_TAGS.contains(&info.tag.as_str()) {
                continue;
            }

            let text = fold_case(&page.text_content(&element).await?);
            let matched_phrases: BTreeSet<String> =
                phrases.iter().filter(|p| text.contains(p.as_str())).cloned().collect();
            let style = page.computed_style(&element).await?;
            let in_viewport = page.intersects_viewport(&element).await?;

            candidates.push(Candidate {
                element,
                matched_phrases,
                z_index: style.effective_z_index(),
                is_opaque: style.is_opaque(),
                in_viewport,
            });
        }
    }

    tracing::debug!(
        total = candidates.len(),
        in_viewport = candidates.iter().filter(|c| c.in_viewport).count(),
        "collected candidates"
    );
    Ok(candidates)
}
