//! Config error types for tailpage.
//!
//! Errors render in Cargo style with the file location and, for unknown
//! fields, a suggestion.

use std::fmt;
use std::path::PathBuf;

use strsim::jaro_winkler;

use crate::config::types::KNOWN_FIELDS;

const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Error loading or parsing a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading the config file.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML parse error.
    Parse {
        path: PathBuf,
        message: String,
        line: Option<usize>,
        column: Option<usize>,
        suggestion: Option<String>,
    },

    /// Semantic error after parsing.
    Validation { path: PathBuf, message: String },
}

impl ConfigError {
    /// Build a parse error from a deserializer message, pulling out the
    /// location and suggesting a field name for unknown fields.
    pub fn parse(path: PathBuf, message: impl Into<String>) -> Self {
        let message = message.into();
        let line = number_after(&message, "line ");
        let column = number_after(&message, "column ");
        let suggestion = unknown_field(&message).and_then(suggest_field);
        ConfigError::Parse {
            path,
            message,
            line,
            column,
            suggestion,
        }
    }

    /// Format error in Cargo-style format.
    pub fn format_cargo_style(&self) -> String {
        match self {
            ConfigError::Io { path, source } => {
                format!(
                    "error: cannot read config file\n  --> {}\n  |\n  = {}\n",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse {
                path,
                message,
                line,
                column,
                suggestion,
            } => {
                let location = match (line, column) {
                    (Some(l), Some(c)) => format!("{}:{}:{}", path.display(), l, c),
                    (Some(l), None) => format!("{}:{}", path.display(), l),
                    _ => format!("{}", path.display()),
                };
                let mut output = format!("error: {}\n  --> {}\n  |\n", message, location);
                if let Some(suggestion) = suggestion {
                    output.push_str(&format!("  = help: did you mean `{}`?\n", suggestion));
                }
                output
            }
            ConfigError::Validation { path, message } => {
                format!("error: {}\n  --> {}\n  |\n", message, path.display())
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_cargo_style())
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Closest known field name to `name`, if any is close enough.
pub fn suggest_field(name: &str) -> Option<String> {
    KNOWN_FIELDS
        .iter()
        .map(|&known| (known, jaro_winkler(name, known)))
        .filter(|&(_, score)| score >= SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(known, _)| known.to_string())
}

/// Field name from an "unknown field `x`" message.
fn unknown_field(message: &str) -> Option<&str> {
    let rest = &message[message.find("unknown field")? + "unknown field".len()..];
    let rest = rest.trim_start().strip_prefix('`')?;
    Some(&rest[..rest.find('`')?])
}

fn number_after(message: &str, label: &str) -> Option<usize> {
    let rest = &message[message.find(label)? + label.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
