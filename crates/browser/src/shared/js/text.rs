/// Evaluated as an expression; yields the root element of the main document and
/// of every same-origin frame, breadth-first. Cross-origin frames expose no
/// `contentDocument` and drop out.
pub const DOCUMENT_ROOTS: &str = r#"
(() => {
    const roots = [];
    const queue = [document];
    while (queue.length) {
        const doc = queue.shift();
        if (doc.documentElement) roots.push(doc.documentElement);
        for (const frame of doc.querySelectorAll('iframe, frame')) {
            try {
                const inner = frame.contentDocument;
                if (inner) queue.push(inner);
            } catch (e) {}
        }
    }
    return roots;
})()
"#;

/// Called on a document root. Returns every element whose own or descendant
/// text contains one of `phrases` after translate()-folding with `upper`/`lower`.
pub const FIND_BY_TEXT: &str = r#"
function(phrases, upper, lower) {
    const doc = this.ownerDocument || this;
    const literal = (s) => s.includes("'")
        ? "concat('" + s.split("'").join("', \"'\", '") + "')"
        : "'" + s + "'";
    const expression = phrases
        .map((p) => `//*[contains(translate(string(descendant-or-self::*), '${upper}', '${lower}'), ${literal(p)})]`)
        .join(' | ');
    const found = [];
    if (!expression) return found;
    const snapshot = doc.evaluate(expression, doc, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    for (let i = 0; i < snapshot.snapshotLength; i++) {
        found.push(snapshot.snapshotItem(i));
    }
    return found;
}
"#;

pub const TEXT_CONTENT: &str = r#"
function() {
    return this.textContent || '';
}
"#;
