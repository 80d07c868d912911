pub mod error;
pub mod line_index;
pub mod mmap_reader;
pub mod stream_reader;

pub use error::SourceError;
pub use mmap_reader::MmapSource;
pub use stream_reader::StreamingSource;

use std::ops::{ControlFlow, Range};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Stamp a newly opened source. Stamps increase across the whole process,
/// so two sources never share one even when they read the same file.
pub fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Random-access, read-only view of the lines of one file.
///
/// Indices are zero-based and stable for the lifetime of a source. Dropping
/// the source releases its file handle and mapping.
pub trait LineSource: Send + Sync {
    /// Current number of lines. Growing sources rescan newly appended bytes.
    fn line_count(&self) -> Result<usize, SourceError>;

    /// Text of line `index`, without its terminator
    fn read_line(&self, index: usize) -> Result<String, SourceError>;

    /// Visit lines in `range` in order, stopping early when the visitor
    /// breaks. Used by filtering, where variants can avoid per-line
    /// allocation.
    fn scan_lines(
        &self,
        range: Range<usize>,
        visit: &mut dyn FnMut(usize, &str) -> ControlFlow<()>,
    ) -> Result<(), SourceError> {
        for index in range {
            let line = self.read_line(index)?;
            if visit(index, &line).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// File backing this source, if any
    fn path(&self) -> Option<&Path>;

    fn generation(&self) -> u64;

    /// Whether `line_count` may increase while the source is open
    fn is_growing(&self) -> bool {
        false
    }

    /// Whether `read_line` is cheap enough to fan a scan out across threads
    fn supports_parallel_scan(&self) -> bool {
        false
    }
}

/// Builds the next source for a collection. Called on a background thread.
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn LineSource>, SourceError> + Send + Sync>;

/// Source used when nothing is selected or opening the real file failed
#[derive(Debug)]
pub struct NullSource {
    generation: u64,
}

impl NullSource {
    pub fn new() -> Self {
        Self {
            generation: next_generation(),
        }
    }
}

impl Default for NullSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for NullSource {
    fn line_count(&self) -> Result<usize, SourceError> {
        Ok(0)
    }

    fn read_line(&self, index: usize) -> Result<String, SourceError> {
        Err(SourceError::IndexOutOfRange { index, count: 0 })
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Factory that always yields a [`NullSource`]
pub fn null_factory() -> SourceFactory {
    Arc::new(|| Ok(Box::new(NullSource::new()) as Box<dyn LineSource>))
}

/// Open `path` with the strategy its lifecycle calls for: streaming when it
/// is the file this process is appending to, memory-mapped otherwise.
pub fn open_source(path: &Path, active_log: Option<&Path>) -> Result<Box<dyn LineSource>, SourceError> {
    if active_log.is_some_and(|active| same_file_path(path, active)) {
        tracing::debug!(path = %path.display(), "Opening active log as streaming source");
        Ok(Box::new(StreamingSource::open(path)?))
    } else {
        tracing::debug!(path = %path.display(), "Opening log as memory-mapped source");
        Ok(Box::new(MmapSource::open(path)?))
    }
}

/// Compare two paths the way the platform's file system would.
///
/// Case-insensitive on Windows and macOS; `.` components are ignored
/// everywhere. Paths are not canonicalized, so the file need not exist.
pub fn same_file_path(a: &Path, b: &Path) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if cfg!(any(windows, target_os = "macos")) {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_null_source_is_empty() {
        let source = NullSource::new();
        assert_eq!(source.line_count().unwrap(), 0);
        assert!(matches!(
            source.read_line(0),
            Err(SourceError::IndexOutOfRange { index: 0, count: 0 })
        ));
        assert!(source.path().is_none());
        assert!(!source.is_growing());
    }

    #[test]
    fn test_generations_increase() {
        let a = NullSource::new();
        let b = NullSource::new();
        assert!(b.generation() > a.generation());
    }

    #[test]
    fn test_same_file_path_ignores_cur_dir() {
        assert!(same_file_path(
            Path::new("/logs/./app.txt"),
            Path::new("/logs/app.txt")
        ));
        assert!(!same_file_path(
            Path::new("/logs/app.txt"),
            Path::new("/logs/other.txt")
        ));
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn test_same_file_path_case_insensitive() {
        assert!(same_file_path(
            Path::new("/Logs/App_Logs_1.txt"),
            Path::new("/logs/app_logs_1.TXT")
        ));
    }

    #[test]
    fn test_open_source_picks_strategy() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "line")?;
        temp_file.flush()?;
        let path = temp_file.path();

        let streaming = open_source(path, Some(path))?;
        assert!(streaming.is_growing());

        let mapped = open_source(path, None)?;
        assert!(!mapped.is_growing());
        assert!(mapped.supports_parallel_scan());

        Ok(())
    }

    #[test]
    fn test_open_source_missing_file() {
        let result = open_source(Path::new("/definitely/not/here.txt"), None);
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[test]
    fn test_default_scan_lines_stops_on_break() {
        struct Three;
        impl LineSource for Three {
            fn line_count(&self) -> Result<usize, SourceError> {
                Ok(3)
            }
            fn read_line(&self, index: usize) -> Result<String, SourceError> {
                Ok(format!("line {}", index))
            }
            fn path(&self) -> Option<&Path> {
                None
            }
            fn generation(&self) -> u64 {
                0
            }
        }

        let mut seen = Vec::new();
        Three
            .scan_lines(0..3, &mut |i, line| {
                seen.push(line.to_string());
                if i == 1 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(seen, vec!["line 0", "line 1"]);
    }
}
