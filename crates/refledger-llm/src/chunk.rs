//! Splitting long document text into model-sized chunks.

/// Split `text` into sequential chunks of at most `budget` characters.
///
/// The split point is moved to a paragraph boundary (`"\n\n"`) when one
/// exists within `slack` characters of the ideal point; otherwise the text
/// is cut at exactly `budget` characters. Chunks concatenate back to the
/// original text.
pub fn split_text(text: &str, budget: usize, slack: usize) -> Vec<String> {
    if text.chars().count() <= budget {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    loop {
        if rest.chars().count() <= budget {
            if !rest.is_empty() {
                chunks.push(rest.to_string());
            }
            break;
        }

        let ideal = byte_index_of_char(rest, budget);
        let cut = find_paragraph_break(rest, ideal, slack).unwrap_or(ideal);
        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_string());
        rest = tail;
    }
    chunks
}

/// Byte index of the `n`-th character (or the end of the string).
fn byte_index_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Look for a `"\n\n"` within `slack` characters either side of `ideal`
/// (a byte index on a char boundary). Returns the byte index just after
/// the boundary, preferring the break closest to the ideal point.
fn find_paragraph_break(s: &str, ideal: usize, slack: usize) -> Option<usize> {
    // slack is in characters; paragraph breaks are ASCII so a byte window
    // can only be wider than the character window, never narrower.
    let lo = ideal.saturating_sub(slack * 4).max(1);
    let hi = (ideal + slack * 4).min(s.len());
    let lo = snap_to_boundary(s, lo);
    let hi = snap_to_boundary(s, hi);

    let window = &s[lo..hi];
    let mut best: Option<usize> = None;
    let mut offset = 0;
    while let Some(pos) = window[offset..].find("\n\n") {
        let abs = lo + offset + pos + 2;
        // Verify the break really is within `slack` characters of ideal.
        let dist = char_distance(s, abs.min(ideal), abs.max(ideal));
        if dist <= slack {
            match best {
                Some(b) if char_distance(s, b.min(ideal), b.max(ideal)) <= dist => {}
                _ => best = Some(abs),
            }
        }
        offset += pos + 1;
    }
    best.filter(|&b| b > 0 && b < s.len())
}

fn snap_to_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i.min(s.len())
}

fn char_distance(s: &str, lo: usize, hi: usize) -> usize {
    s[lo..hi].chars().count()
}
