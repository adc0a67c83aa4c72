pub const NODE_INFO: &str = r#"
function() {
    const parent = this.parentElement;
    return {
        tag: this.tagName.toLowerCase(),
        id: this.id || null,
        classes: Array.from(this.classList),
        siblingIndex: parent ? Array.prototype.indexOf.call(parent.children, this) + 1 : 1
    };
}
"#;

pub const PARENT_ELEMENT: &str = r#"
function() {
    return this.parentElement;
}
"#;

pub const CHILD_ELEMENTS: &str = r#"
function() {
    return Array.from(this.children);
}
"#;

pub const COMPUTED_STYLE: &str = r#"
function() {
    const style = this.ownerDocument.defaultView.getComputedStyle(this);
    return {
        zIndex: style.zIndex,
        backgroundColor: style.backgroundColor,
        backgroundImage: style.backgroundImage,
        display: style.display
    };
}
"#;

/// Bounding box in top-level viewport coordinates, summing the offsets of
/// every frame the element is nested in.
pub const BOUNDING_BOX: &str = r#"
function() {
    const rect = this.getBoundingClientRect();
    let x = rect.left;
    let y = rect.top;
    let win = this.ownerDocument.defaultView;
    while (win && win.frameElement) {
        const frameRect = win.frameElement.getBoundingClientRect();
        x += frameRect.left;
        y += frameRect.top;
        win = win.parent;
    }
    const top = window.top;
    return {
        x: x,
        y: y,
        width: rect.width,
        height: rect.height,
        viewportWidth: top.innerWidth,
        viewportHeight: top.innerHeight
    };
}
"#;

pub const MATCHES_UNIQUELY: &str = r#"
function(selector) {
    try {
        const matches = this.ownerDocument.querySelectorAll(selector);
        return matches.length === 1 && matches[0] === this;
    } catch (e) {
        return false;
    }
}
"#;

/// Called on a document root.
pub const QUERY_SELECTOR: &str = r#"
function(selector) {
    try {
        return this.ownerDocument.querySelector(selector);
    } catch (e) {
        return null;
    }
}
"#;
