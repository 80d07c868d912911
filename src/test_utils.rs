use crate::reader::{next_generation, LineSource, SourceError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// In-memory line source for tests.
pub struct MemorySource {
    lines: Vec<String>,
    path: PathBuf,
    generation: u64,
    parallel: bool,
    fail_from: Option<usize>,
    _open: Option<OpenGuard>,
}

impl MemorySource {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            path: PathBuf::from("memory"),
            generation: next_generation(),
            parallel: false,
            fail_from: None,
            _open: None,
        }
    }

    pub fn from_strs(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|s| s.to_string()).collect())
    }

    /// Lines `prefix 0`, `prefix 1`, ...
    pub fn numbered(prefix: &str, count: usize) -> Self {
        Self::new((0..count).map(|i| format!("{} {}", prefix, i)).collect())
    }

    pub fn with_parallel_scan(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Reads of line `index` and beyond fail with an I/O error
    pub fn failing_from(mut self, index: usize) -> Self {
        self.fail_from = Some(index);
        self
    }

    /// Count this source as open in `counter` until it is dropped
    pub fn counted(mut self, counter: &OpenCounter) -> Self {
        self._open = Some(counter.open());
        self
    }
}

impl LineSource for MemorySource {
    fn line_count(&self) -> Result<usize, SourceError> {
        Ok(self.lines.len())
    }

    fn read_line(&self, index: usize) -> Result<String, SourceError> {
        if self.fail_from.is_some_and(|from| index >= from) {
            return Err(SourceError::read(
                &self.path,
                io::Error::new(io::ErrorKind::Other, "simulated read failure"),
            ));
        }
        self.lines
            .get(index)
            .cloned()
            .ok_or(SourceError::IndexOutOfRange {
                index,
                count: self.lines.len(),
            })
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn supports_parallel_scan(&self) -> bool {
        self.parallel
    }
}

/// Counts sources that are currently alive.
#[derive(Clone, Default)]
pub struct OpenCounter(Arc<AtomicUsize>);

impl OpenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> OpenGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        OpenGuard(Arc::clone(&self.0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Blocks factories until the test releases them.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}
