use serde::{Deserialize, Serialize};

/// The subset of computed style the ranker looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyle {
    pub z_index: String,
    pub background_color: String,
    pub background_image: String,
    pub display: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            z_index: "auto".to_string(),
            background_color: "rgba(0, 0, 0, 0)".to_string(),
            background_image: "none".to_string(),
            display: "block".to_string(),
        }
    }
}

impl ComputedStyle {
    /// Resolved stacking order; `auto` and anything unparsable count as 0.
    pub fn effective_z_index(&self) -> i64 {
        self.z_index.trim().parse::<i64>().unwrap_or(0)
    }

    /// A background counts as opaque when its color has full alpha or when any
    /// background image is set.
    pub fn is_opaque(&self) -> bool {
        let image = self.background_image.trim();
        if !image.is_empty() && !image.eq_ignore_ascii_case("none") {
            return true;
        }
        color_alpha(&self.background_color).is_some_and(|a| a >= 1.0)
    }
}

/// Alpha channel of a CSS color value, `None` if the value is not understood.
///
/// Handles the forms computed styles produce (`rgb()`, `rgba()`, including slash
/// syntax) as well as hex notation and `transparent`. Other keywords are named
/// colors and therefore opaque.
pub fn color_alpha(value: &str) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }
    if value == "transparent" {
        return Some(0.0);
    }
    if let Some(hex) = value.strip_prefix('#') {
        return hex_alpha(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return functional_alpha(args);
    }
    if value.contains('(') {
        // color(), hsl(), lab() and friends: only the alpha component matters
        let args = value.split_once('(')?.1.strip_suffix(')')?;
        return functional_alpha(args);
    }
    if value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(1.0);
    }
    None
}

fn functional_alpha(args: &str) -> Option<f64> {
    let alpha = if let Some((_, alpha)) = args.split_once('/') {
        Some(alpha)
    } else {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        match parts.len() {
            4 => Some(parts[3]),
            3 => None,
            _ => {
                // space-separated without slash has no alpha
                return if args.split_whitespace().count() >= 3 { Some(1.0) } else { None };
            }
        }
    };
    match alpha {
        None => Some(1.0),
        Some(raw) => parse_alpha(raw.trim()),
    }
}

fn parse_alpha(raw: &str) -> Option<f64> {
    if let Some(pct) = raw.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|p| p / 100.0);
    }
    raw.parse::<f64>().ok()
}

fn hex_alpha(hex: &str) -> Option<f64> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 | 6 => Some(1.0),
        4 => u8::from_str_radix(&hex[3..4].repeat(2), 16).ok().map(|a| f64::from(a) / 255.0),
        8 => u8::from_str_radix(&hex[6..8], 16).ok().map(|a| f64::from(a) / 255.0),
        _ => None,
    }
}
