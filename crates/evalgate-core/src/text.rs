#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let Some((clip_idx, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let mut out = text[..clip_idx].to_string();
    out.push_str("...");
    out
}

/// Lower-cases and collapses every run of non-alphanumeric characters into a
/// single `_`, so the result is safe inside a synthesized identifier.
#[must_use]
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

#[must_use]
pub fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_text_preserves_utf8_char_boundaries() {
        let input = "\u{645}\u{631}\u{62D}\u{628}\u{627} hello";
        let clipped = truncate_text(input, 5);
        assert_eq!(clipped, "\u{645}\u{631}\u{62D}\u{628}\u{627}...");
    }

    #[test]
    fn truncate_text_returns_original_when_input_fits_limit() {
        assert_eq!(truncate_text("hello", 5), "hello");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Plan Change / Upgrade "), "plan_change_upgrade");
        assert_eq!(slugify("BILLING"), "billing");
        assert_eq!(slugify("--"), "unknown");
    }

    #[test]
    fn non_blank_drops_whitespace_only_values() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" ar ")).as_deref(), Some("ar"));
        assert_eq!(non_blank(None), None);
    }
}
