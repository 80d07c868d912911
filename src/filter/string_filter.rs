use super::LinePredicate;

/// Case-insensitive substring containment, the default log search
///
/// ASCII input is compared byte-wise without allocating; anything else
/// falls back to full Unicode lowercasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsIgnoreCase;

impl LinePredicate for ContainsIgnoreCase {
    fn matches(&self, line: &str, filter: &str) -> bool {
        if filter.is_empty() {
            return true;
        }
        if line.is_ascii() && filter.is_ascii() {
            let needle = filter.as_bytes();
            return line
                .as_bytes()
                .windows(needle.len())
                .any(|window| window.eq_ignore_ascii_case(needle));
        }
        line.to_lowercase().contains(&filter.to_lowercase())
    }
}

/// Exact, case-sensitive substring containment
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsExact;

impl LinePredicate for ContainsExact {
    fn matches(&self, line: &str, filter: &str) -> bool {
        memchr::memmem::find(line.as_bytes(), filter.as_bytes()).is_some()
    }
}
