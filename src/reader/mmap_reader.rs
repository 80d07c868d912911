use super::line_index::{strip_terminator, LineIndex};
use super::{next_generation, LineSource, SourceError};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::ops::{ControlFlow, Range};
use std::path::{Path, PathBuf};

/// Memory-mapped source for log files that no longer change
///
/// The file is mapped read-only and scanned once at open time to record
/// every line boundary. After that, `read_line` only slices the mapping:
/// no further I/O, O(1) random access, and the OS decides which pages stay
/// resident.
///
/// The file must not be truncated while mapped. Rotated and closed logs
/// satisfy this; the file being written to uses [`StreamingSource`] instead.
///
/// # Truncation
///
/// A truncation under the mapping is not reported as a [`SourceError`]. On
/// Unix, reading a line past the new end of file touches pages that no
/// longer exist and the process receives `SIGBUS`. Only
/// [`StreamingSource`] detects a shrinking file (as
/// [`SourceError::Truncated`]).
///
/// [`StreamingSource`]: super::StreamingSource
pub struct MmapSource {
    path: PathBuf,

    /// `None` for empty files, which cannot be mapped on every platform
    mmap: Option<Mmap>,

    index: LineIndex,

    line_count: usize,

    generation: u64,
}

impl MmapSource {
    /// Map `path` and build its line index
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| SourceError::open(&path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| SourceError::open(&path, e))?
            .len();

        let mut index = LineIndex::new();

        if file_size == 0 {
            return Ok(Self {
                path,
                mmap: None,
                index,
                line_count: 0,
                generation: next_generation(),
            });
        }

        // SAFETY: the mapping is read-only and this source is only chosen for
        // files that are not modified while the session is open. Truncation
        // breaks that and faults on access (see the type docs).
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SourceError::open(&path, e))?;

        index.extend(&mmap[..], true);
        let line_count = index.complete_line_count(mmap.len() as u64);

        tracing::debug!(
            path = %path.display(),
            bytes = file_size,
            lines = line_count,
            index_bytes = index.memory_usage(),
            "Mapped log file"
        );

        Ok(Self {
            path,
            mmap: Some(mmap),
            index,
            line_count,
            generation: next_generation(),
        })
    }

    fn data(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Line `index` as text borrowed from the mapping when it is valid UTF-8
    fn line_text(&self, index: usize) -> Option<Cow<'_, str>> {
        if index >= self.line_count {
            return None;
        }
        let data = self.data();
        let (start, end) = self.index.span(index, data.len() as u64)?;
        let bytes = strip_terminator(&data[start as usize..end as usize]);
        Some(String::from_utf8_lossy(bytes))
    }
}

impl LineSource for MmapSource {
    fn line_count(&self) -> Result<usize, SourceError> {
        Ok(self.line_count)
    }

    fn read_line(&self, index: usize) -> Result<String, SourceError> {
        self.line_text(index)
            .map(Cow::into_owned)
            .ok_or(SourceError::IndexOutOfRange {
                index,
                count: self.line_count,
            })
    }

    fn scan_lines(
        &self,
        range: Range<usize>,
        visit: &mut dyn FnMut(usize, &str) -> ControlFlow<()>,
    ) -> Result<(), SourceError> {
        let end = range.end.min(self.line_count);
        for index in range.start..end {
            let Some(text) = self.line_text(index) else {
                break;
            };
            if visit(index, &text).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn supports_parallel_scan(&self) -> bool {
        true
    }
}
