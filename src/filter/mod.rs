pub mod cancel;
pub mod engine;
pub mod string_filter;

/// Decides whether a line belongs to the filtered view
///
/// Receives the raw line text and the (already trimmed) filter text.
/// Implementations must be pure: the same inputs always give the same
/// answer, so re-applying a filter is idempotent.
pub trait LinePredicate: Send + Sync {
    fn matches(&self, line: &str, filter: &str) -> bool;
}

impl<F> LinePredicate for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, line: &str, filter: &str) -> bool {
        self(line, filter)
    }
}

/// Normalize user-entered filter text; `None` means "no filter"
pub fn normalize_filter(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
