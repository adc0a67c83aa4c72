//! Case folding shared by every text matcher.
//!
//! Browser-side matching runs through XPath `translate()`, which only folds the
//! letters it is given. Rust-side folding must map exactly the same letters so a
//! phrase folded here matches page text folded there.

/// Uppercase letters folded besides ASCII, position-aligned with [`FOLD_LOWER`].
pub const FOLD_UPPER: &str = "ÅÄÖÆØÜÉÈÀÇÑ";
/// Lowercase counterparts of [`FOLD_UPPER`].
pub const FOLD_LOWER: &str = "åäöæøüéèàçñ";

/// The full translate() source alphabet: ASCII uppercase followed by [`FOLD_UPPER`].
pub fn translate_from() -> String {
    format!("ABCDEFGHIJKLMNOPQRSTUVWXYZ{}", FOLD_UPPER)
}

/// The full translate() target alphabet, aligned with [`translate_from`].
pub fn translate_to() -> String {
    format!("abcdefghijklmnopqrstuvwxyz{}", FOLD_LOWER)
}

pub fn fold_case(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                return c.to_ascii_lowercase();
            }
            match FOLD_UPPER.chars().position(|u| u == c) {
                Some(i) => FOLD_LOWER.chars().nth(i).unwrap_or(c),
                None => c,
            }
        })
        .collect()
}
