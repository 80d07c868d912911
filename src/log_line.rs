/// Log level detected from a line's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Severity {
    #[default]
    Unknown,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// One materialized line of a log file
///
/// Immutable once built. Holds the raw text plus fields derived from it for
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    text: String,
    severity: Severity,
}

impl LogLine {
    pub fn new(text: &str) -> Self {
        Self {
            severity: detect_severity(text),
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// First level keyword in the line, matched case-insensitively on word
/// boundaries. ANSI CSI sequences are skipped in place.
pub fn detect_severity(line: &str) -> Severity {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut after_ansi = false;

    while i < len {
        let b = bytes[i];

        if b == 0x1B {
            i += 1;
            if i < len && bytes[i] == b'[' {
                i += 1;
                while i < len && !(0x40..=0x7E).contains(&bytes[i]) {
                    i += 1;
                }
                if i < len {
                    i += 1;
                }
            }
            after_ansi = true;
            continue;
        }

        let at_boundary = after_ansi || i == 0 || !bytes[i - 1].is_ascii_alphabetic();
        after_ansi = false;

        if at_boundary {
            let found = match b | 0x20 {
                b'f' if eq_ci_word(bytes, i, b"fatal") => Some(Severity::Fatal),
                b'e' if eq_ci_word(bytes, i, b"error") => Some(Severity::Error),
                b'w' if eq_ci_word(bytes, i, b"warning") || eq_ci_word(bytes, i, b"warn") => {
                    Some(Severity::Warn)
                }
                b'i' if eq_ci_word(bytes, i, b"info") => Some(Severity::Info),
                b'd' if eq_ci_word(bytes, i, b"debug") => Some(Severity::Debug),
                b't' if eq_ci_word(bytes, i, b"trace") => Some(Severity::Trace),
                _ => None,
            };
            if let Some(severity) = found {
                return severity;
            }
        }

        i += 1;
    }

    Severity::Unknown
}

/// Case-insensitive keyword at `pos` followed by a non-letter or the end.
/// `needle` must be lowercase ASCII.
#[inline]
fn eq_ci_word(bytes: &[u8], pos: usize, needle: &[u8]) -> bool {
    let end = pos + needle.len();
    if end > bytes.len() {
        return false;
    }
    let same = bytes[pos..end]
        .iter()
        .zip(needle)
        .all(|(&b, &n)| b | 0x20 == n);
    same && (end == bytes.len() || !bytes[end].is_ascii_alphabetic())
}
