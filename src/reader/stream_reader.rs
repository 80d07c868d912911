use super::line_index::{strip_terminator, LineIndex};
use super::{next_generation, LineSource, SourceError};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::{ControlFlow, Range};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Bytes read per step while indexing newly appended data
const SCAN_CHUNK_SIZE: usize = 64 * 1024;

/// Source for the log file this process is still appending to
///
/// Keeps byte offsets of every terminated line and extends them by scanning
/// only what was appended since the previous call. Lines are read back by
/// seeking the source's own handle, so nothing but the offsets is held in
/// memory.
///
/// A line whose terminator has not been written yet is not exposed: the
/// writer may still be in the middle of it. The line count therefore only
/// grows; a file that shrinks below the scanned prefix is reported as
/// [`SourceError::Truncated`].
///
/// `std::fs::File::open` already allows other writers on every platform
/// (on Windows it opens with read, write and delete sharing).
pub struct StreamingSource {
    path: PathBuf,
    state: Mutex<StreamState>,
    generation: u64,
}

struct StreamState {
    file: File,
    index: LineIndex,
    chunk: Vec<u8>,
}

impl StreamingSource {
    /// Open `path` and index what has been written so far
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| SourceError::open(&path, e))?;

        let source = Self {
            path,
            state: Mutex::new(StreamState {
                file,
                index: LineIndex::new(),
                chunk: vec![0; SCAN_CHUNK_SIZE],
            }),
            generation: next_generation(),
        };

        {
            let mut state = source.lock();
            source.rescan(&mut state)?;
            tracing::debug!(
                path = %source.path.display(),
                lines = state.index.terminated_lines(),
                "Opened streaming log source"
            );
        }

        Ok(source)
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        // A panic while holding the lock leaves the index consistent up to
        // its last completed push, so the state is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Index bytes appended since the last scan
    fn rescan(&self, state: &mut StreamState) -> Result<(), SourceError> {
        let StreamState { file, index, chunk } = state;

        let len = file
            .metadata()
            .map_err(|e| SourceError::read(&self.path, e))?
            .len();

        if len < index.scanned() {
            return Err(SourceError::Truncated {
                path: self.path.clone(),
                previous: index.scanned(),
                current: len,
            });
        }

        let before = index.terminated_lines();

        while index.scanned() < len {
            let want = ((len - index.scanned()) as usize).min(chunk.len());
            file.seek(SeekFrom::Start(index.scanned()))
                .map_err(|e| SourceError::read(&self.path, e))?;
            let got = file
                .read(&mut chunk[..want])
                .map_err(|e| SourceError::read(&self.path, e))?;
            if got == 0 {
                break;
            }
            if index.extend(&chunk[..got], false) == 0 {
                // Only a held-back `\r` is left; wait for the next byte
                break;
            }
        }

        let added = index.terminated_lines() - before;
        if added > 0 {
            tracing::trace!(path = %self.path.display(), added, "Indexed appended lines");
        }
        Ok(())
    }

    fn read_span(&self, state: &mut StreamState, start: u64, end: u64) -> Result<String, SourceError> {
        let mut buf = vec![0u8; (end - start) as usize];
        state
            .file
            .seek(SeekFrom::Start(start))
            .and_then(|_| state.file.read_exact(&mut buf))
            .map_err(|e| SourceError::read(&self.path, e))?;
        Ok(String::from_utf8_lossy(strip_terminator(&buf)).into_owned())
    }
}

impl LineSource for StreamingSource {
    fn line_count(&self) -> Result<usize, SourceError> {
        let mut state = self.lock();
        self.rescan(&mut state)?;
        Ok(state.index.terminated_lines())
    }

    fn read_line(&self, index: usize) -> Result<String, SourceError> {
        let mut state = self.lock();
        if index >= state.index.terminated_lines() {
            self.rescan(&mut state)?;
        }
        let count = state.index.terminated_lines();
        let (start, end) = match state.index.span(index, 0) {
            Some(span) if index < count => span,
            _ => return Err(SourceError::IndexOutOfRange { index, count }),
        };
        self.read_span(&mut state, start, end)
    }

    fn scan_lines(
        &self,
        range: Range<usize>,
        visit: &mut dyn FnMut(usize, &str) -> ControlFlow<()>,
    ) -> Result<(), SourceError> {
        let mut state = self.lock();
        if range.end > state.index.terminated_lines() {
            self.rescan(&mut state)?;
        }
        let end = range.end.min(state.index.terminated_lines());
        if range.start >= end {
            return Ok(());
        }

        let Some((first, _)) = state.index.span(range.start, 0) else {
            return Ok(());
        };
        state
            .file
            .seek(SeekFrom::Start(first))
            .map_err(|e| SourceError::read(&self.path, e))?;

        // One sequential pass through a buffered reader instead of a seek per line
        let StreamState { file, index, .. } = &mut *state;
        let mut reader = BufReader::new(&*file);
        let mut buf = Vec::new();
        for line in range.start..end {
            let Some((start, stop)) = index.span(line, 0) else {
                break;
            };
            buf.resize((stop - start) as usize, 0);
            reader
                .read_exact(&mut buf)
                .map_err(|e| SourceError::read(&self.path, e))?;
            let text = String::from_utf8_lossy(strip_terminator(&buf));
            if visit(line, &text).is_break() {
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

    fn is_growing(&self) -> bool {
        true
    }
}
