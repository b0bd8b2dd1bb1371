//! Suggestion Engine - "Did you mean" for unknown names
//!
//! Similarity is the matching-blocks ratio `2 * M / T`, where `M` is the
//! number of characters covered by the recursive longest-common-substring
//! decomposition of the two strings and `T` is their combined length.
//! Comparison is case-sensitive.

/// Threshold used for data column names.
pub const COLUMN_THRESHOLD: f64 = 0.6;

/// Threshold used for symbolic names (geoms, themes, coords, stats, scales, templates).
pub const NAME_THRESHOLD: f64 = 0.5;

/// Similarity in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common run inside the window; earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run_len[j + 1] = length of the common run ending at a[i-1], b[j]
    let mut prev = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut current = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                current[j - blo + 1] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        prev = current;
    }
    (best_i, best_j, best_size)
}

/// Closest vocabulary entry scoring at least `threshold`.
///
/// Ties keep the earliest entry, so the result is stable for a given vocabulary order.
pub fn suggest<'a, S: AsRef<str>>(
    query: &str,
    vocabulary: &'a [S],
    threshold: f64,
) -> Option<&'a str> {
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in vocabulary {
        let candidate = candidate.as_ref();
        let score = similarity(query, candidate);
        if score < threshold {
            continue;
        }
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(name, _)| name)
}

/// Sorted, de-duplicated copy of a vocabulary for display.
pub fn sorted_vocabulary<S: AsRef<str>>(vocabulary: &[S]) -> Vec<String> {
    let mut names: Vec<String> = vocabulary.iter().map(|s| s.as_ref().to_string()).collect();
    names.sort();
    names.dedup();
    names
}

/// Message for a column the data does not have. Columns are listed in data order.
pub fn format_column_error(column: &str, available: &[String]) -> String {
    let mut message = format!("Column '{}' not found in data.", column);
    if let Some(suggestion) = suggest(column, available, COLUMN_THRESHOLD) {
        message.push_str(&format!("\n\nDid you mean: '{}'?", suggestion));
    }
    message.push_str(&format!("\n\nAvailable columns: {}", available.join(", ")));
    message
}

/// Generic "unknown name" message: offending value, suggestion, sorted vocabulary.
pub fn format_unknown<S: AsRef<str>>(
    label: &str,
    value: &str,
    vocabulary: &[S],
    threshold: f64,
) -> String {
    let mut message = format!("Unknown {}: '{}'", label, value);
    if let Some(suggestion) = suggest(value, vocabulary, threshold) {
        message.push_str(&format!("\n\nDid you mean: '{}'?", suggestion));
    }
    message.push_str(&format!(
        "\n\nAvailable {}s: {}",
        label,
        sorted_vocabulary(vocabulary).join(", ")
    ));
    message
}

pub fn format_geom_error<S: AsRef<str>>(geom: &str, available: &[S]) -> String {
    format_unknown("geometry type", geom, available, NAME_THRESHOLD)
}

pub fn format_theme_error<S: AsRef<str>>(theme: &str, available: &[S]) -> String {
    format_unknown("theme", theme, available, NAME_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn columns() -> Vec<String> {
        ["age", "height", "weight", "category", "value"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_similarity_known_values() {
        assert_relative_eq!(similarity("abcd", "bcde"), 0.75);
        assert_relative_eq!(similarity("hieght", "height"), 10.0 / 12.0);
        assert_relative_eq!(similarity("", ""), 1.0);
        assert_relative_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_column_typos() {
        let cols = columns();
        assert_eq!(suggest("hieght", &cols, COLUMN_THRESHOLD), Some("height"));
        assert_eq!(suggest("Age", &cols, COLUMN_THRESHOLD), Some("age"));
        assert_eq!(suggest("categoy", &cols, COLUMN_THRESHOLD), Some("category"));
        assert_eq!(suggest("zzz", &cols, COLUMN_THRESHOLD), None);
    }

    #[test]
    fn test_empty_vocabulary() {
        let empty: Vec<String> = vec![];
        assert_eq!(suggest("anything", &empty, 0.0), None);
    }

    #[test]
    fn test_tie_keeps_first() {
        let vocab = ["ab", "ba"];
        assert_eq!(suggest("a", &vocab, 0.1), Some("ab"));
    }

    #[test]
    fn test_column_error_message() {
        let msg = format_column_error("hieght", &columns());
        assert!(msg.contains("Column 'hieght' not found"));
        assert!(msg.contains("Did you mean: 'height'?"));
        assert!(msg.contains("Available columns: age, height, weight, category, value"));
    }

    #[test]
    fn test_geom_error_sorted_vocabulary() {
        let msg = format_geom_error("ponit", &["point", "line", "bar"]);
        assert!(msg.contains("Unknown geometry type: 'ponit'"));
        assert!(msg.contains("Did you mean: 'point'?"));
        assert!(msg.ends_with("Available geometry types: bar, line, point"));
    }
}
