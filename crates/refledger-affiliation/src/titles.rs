//! Title normalization and fuzzy comparison.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid regex"));

/// Normalize a title to lowercase alphanumerics for comparison.
pub fn normalize_title(title: &str) -> String {
    let ascii: String = title.nfkd().filter(|c| c.is_ascii()).collect();
    NON_ALNUM.replace_all(&ascii, "").to_lowercase()
}

/// Fuzzy title comparison (95% similarity threshold on the normalized
/// forms). Used to confirm that a search hit is actually the requested
/// paper before spending further lookups on it.
pub fn titles_match(title_a: &str, title_b: &str) -> bool {
    let norm_a = normalize_title(title_a);
    let norm_b = normalize_title(title_b);
    if norm_a.is_empty() || norm_b.is_empty() {
        return false;
    }
    rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars()) >= 0.95
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_basic() {
        assert_eq!(normalize_title("Cybernetics: Or Control!"), "cyberneticsorcontrol");
    }

    #[test]
    fn exact_titles_match() {
        assert!(titles_match("On Computable Numbers", "On Computable Numbers"));
    }

    #[test]
    fn minor_variation_matches() {
        assert!(titles_match(
            "On Computable Numbers, with an Application",
            "On computable numbers with an application"
        ));
    }

    #[test]
    fn different_titles_do_not_match() {
        assert!(!titles_match("On Computable Numbers", "A Theory of Everything Else"));
    }

    #[test]
    fn empty_title_never_matches() {
        assert!(!titles_match("", "Something"));
    }
}
