use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

/// Change to a watched log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Content was written (or the file was recreated)
    Modified,
    /// The file was deleted or renamed away
    Removed,
    Error(String),
}

/// Watches one log file and queues change notifications
pub struct LogWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    receiver: Receiver<WatchEvent>,
}

impl LogWatcher {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => match event.kind {
                    EventKind::Modify(notify::event::ModifyKind::Name(_)) | EventKind::Remove(_) => {
                        WatchEvent::Removed
                    }
                    EventKind::Modify(_) | EventKind::Create(_) => WatchEvent::Modified,
                    _ => return,
                },
                Err(e) => WatchEvent::Error(e.to_string()),
            };
            let _ = tx.send(event);
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Watching log file");

        Ok(Self {
            path,
            _watcher: watcher,
            receiver: rx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next queued event, without blocking
    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.receiver.try_recv().ok()
    }

    /// Every queued event, with runs of `Modified` collapsed into one
    pub fn drain(&self) -> Vec<WatchEvent> {
        let mut events: Vec<WatchEvent> = Vec::new();
        while let Some(event) = self.try_recv() {
            if event == WatchEvent::Modified && events.last() == Some(&WatchEvent::Modified) {
                continue;
            }
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::thread;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Poll until some event arrives; filesystem notifications are asynchronous
    fn poll_for_events(watcher: &LogWatcher, max_attempts: u32, interval_ms: u64) -> Vec<WatchEvent> {
        for _ in 0..max_attempts {
            let events = watcher.drain();
            if !events.is_empty() {
                return events;
            }
            thread::sleep(Duration::from_millis(interval_ms));
        }
        Vec::new()
    }

    #[test]
    fn test_watcher_creation() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let watcher = LogWatcher::new(temp_file.path())?;
        assert_eq!(watcher.path(), temp_file.path());
        Ok(())
    }

    #[test]
    fn test_watcher_fails_for_missing_file() {
        let result = LogWatcher::new("/path/that/definitely/does/not/exist/App_Logs_1.txt");
        assert!(result.is_err());
    }

    #[test]
    fn test_detects_append() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        let watcher = LogWatcher::new(&path)?;

        thread::sleep(Duration::from_millis(50));
        watcher.drain();

        let mut file = OpenOptions::new().append(true).open(&path)?;
        writeln!(file, "new line")?;
        file.flush()?;

        let events = poll_for_events(&watcher, 100, 10);
        assert!(events.contains(&WatchEvent::Modified), "got: {:?}", events);
        Ok(())
    }

    #[test]
    fn test_drain_collapses_repeated_writes() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        let watcher = LogWatcher::new(&path)?;

        thread::sleep(Duration::from_millis(50));
        watcher.drain();

        let mut file = OpenOptions::new().append(true).open(&path)?;
        for i in 0..5 {
            writeln!(file, "line {}", i)?;
            file.flush()?;
        }
        thread::sleep(Duration::from_millis(200));

        let events = watcher.drain();
        let modified = events.iter().filter(|e| **e == WatchEvent::Modified).count();
        assert!(modified <= 1, "got: {:?}", events);
        Ok(())
    }
}
