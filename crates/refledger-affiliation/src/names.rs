//! Author name normalization and matching.

use unicode_normalization::UnicodeNormalization;

/// Normalize an author name for comparison.
///
/// "Surname, Initials" forms are reordered to "Initials Surname" first, so
/// `"Wiener, N."` and `"N. Wiener"` normalize identically. Then: NFKD
/// decomposition stripped to ASCII, lowercase, punctuation replaced by
/// spaces, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim();
    let reordered = match name.split_once(',') {
        Some((surname, given)) if !given.trim().is_empty() => {
            format!("{} {}", given.trim(), surname.trim())
        }
        _ => name.to_string(),
    };

    let ascii: String = reordered.nfkd().filter(|c| c.is_ascii()).collect();
    ascii
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether two author names refer to the same person.
///
/// After normalization, names match when they are equal, when one contains
/// the other, or when surnames (last tokens) are equal and the first-token
/// initials agree — or either name is surname-only.
pub fn authors_match(a: &str, b: &str) -> bool {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb || na.contains(&nb) || nb.contains(&na) {
        return true;
    }

    let ta: Vec<&str> = na.split(' ').collect();
    let tb: Vec<&str> = nb.split(' ').collect();
    let (sa, sb) = (ta.last().unwrap(), tb.last().unwrap());
    if sa != sb {
        return false;
    }

    // Surname-only on either side is an accepted match.
    if ta.len() == 1 || tb.len() == 1 {
        return true;
    }

    let ia = ta[0].chars().next();
    let ib = tb[0].chars().next();
    ia.is_some() && ia == ib
}

/// Find the first name in `candidates` matching `target`.
pub fn find_matching_author<'a, I>(target: &str, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .position(|c| authors_match(target, c))
}
