// Highlighted snippet generation

/// Default maximum snippet length in characters.
pub const DEFAULT_SNIPPET_LEN: usize = 200;

/// Minimum term length considered for highlighting.
const MIN_TERM_LEN: usize = 3;

/// Highlight marker opening tag.
const MARK_OPEN: &str = "<mark>";

/// Highlight marker closing tag.
const MARK_CLOSE: &str = "</mark>";

/// Build a highlighted snippet of `body` for the given query.
///
/// The body is truncated to `max_len` characters (with a trailing ellipsis
/// when cut), then query terms of at least three characters are wrapped in
/// `<mark>` tags, case-insensitively. Markers do not count toward the
/// length budget.
pub fn generate_snippet(body: &str, query: &str, max_len: usize) -> String {
    let truncated = truncate_chars(body, max_len);
    let terms = highlight_terms(query);
    if terms.is_empty() {
        return truncated;
    }
    highlight(&truncated, &terms)
}

/// Query terms eligible for highlighting, longest first so overlapping
/// shorter terms never split a longer match.
fn highlight_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .collect();
    terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
    terms.dedup();
    terms
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len).collect();
    format!("{cut}...")
}

/// Wrap every non-overlapping term occurrence with highlight markers.
fn highlight(text: &str, terms: &[String]) -> String {
    let lower = text.to_lowercase();

    // Collect byte ranges of matches, earliest first, skipping overlaps.
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for term in terms {
        let mut from = 0;
        while let Some(pos) = lower[from..].find(term.as_str()) {
            let start = from + pos;
            let end = start + term.len();
            if !ranges.iter().any(|(s, e)| start < *e && end > *s) {
                ranges.push((start, end));
            }
            from = end;
        }
    }
    ranges.sort_by_key(|(start, _)| *start);

    if ranges.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + ranges.len() * 16);
    let mut cursor = 0;
    for (start, end) in ranges {
        // Byte offsets from the lowercase string can fall inside multi-byte
        // characters of the original; skip those matches rather than panic.
        if !text.is_char_boundary(start) || !text.is_char_boundary(end) || start < cursor {
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(MARK_OPEN);
        out.push_str(&text[start..end]);
        out.push_str(MARK_CLOSE);
        cursor = end;
    }
    out.push_str(&text[cursor..]);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlights_query_terms() {
        let snippet = generate_snippet(
            "We chose a database migration strategy last year",
            "database migration",
            200,
        );
        assert_eq!(
            snippet,
            "We chose a <mark>database</mark> <mark>migration</mark> strategy last year"
        );
    }

    #[test]
    fn test_case_insensitive_highlighting() {
        let snippet = generate_snippet("Database first", "database", 200);
        assert_eq!(snippet, "<mark>Database</mark> first");
    }

    #[test]
    fn test_short_terms_not_highlighted() {
        let snippet = generate_snippet("go to the db now", "go db", 200);
        // Both terms are under three characters
        assert_eq!(snippet, "go to the db now");
    }

    #[test]
    fn test_truncation_with_ellipsis() {
        let body = "x".repeat(300);
        let snippet = generate_snippet(&body, "nothing", 200);
        assert_eq!(snippet.chars().count(), 203);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_no_truncation_when_short() {
        let snippet = generate_snippet("short body", "missing", 200);
        assert_eq!(snippet, "short body");
    }

    #[test]
    fn test_repeated_term_highlighted_each_time() {
        let snippet = generate_snippet("cache the cache", "cache", 200);
        assert_eq!(snippet, "<mark>cache</mark> the <mark>cache</mark>");
    }

    #[test]
    fn test_overlapping_terms_prefer_longer() {
        let snippet = generate_snippet("migrations everywhere", "migrations migration", 200);
        assert_eq!(snippet, "<mark>migrations</mark> everywhere");
    }
}
