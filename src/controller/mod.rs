pub mod debounce;

pub use debounce::Debouncer;

use crate::collection::{CollectionEvent, IncrementalLogCollection};
use crate::config::ViewerConfig;
use crate::discovery::{self, LogFile};
use crate::filter::string_filter::ContainsIgnoreCase;
use crate::filter::LinePredicate;
use crate::log_line::LogLine;
use crate::reader::{null_factory, open_source, same_file_path, SourceFactory};
use crate::watcher::{LogWatcher, WatchEvent};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the viewer is busy with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    SwitchingFile,
    Filtering,
}

/// Factory opening `path` the way its lifecycle calls for: streaming when it
/// is the active log, memory-mapped otherwise.
pub fn source_factory(path: PathBuf, active_log: Option<PathBuf>) -> SourceFactory {
    Arc::new(move || open_source(&path, active_log.as_deref()))
}

/// Drives one log view: file selection, debounced search, live refresh of
/// the active log.
///
/// Time is passed in by the caller so the debounce can be driven from an
/// event loop or a test clock alike.
pub struct LogViewController {
    collection: IncrementalLogCollection<LogLine>,
    debounce: Debouncer<String>,
    app_name: Option<String>,
    logs_dir: Option<PathBuf>,
    active_log: Option<PathBuf>,
    watch_enabled: bool,
    log_files: Vec<LogFile>,
    selected: Option<PathBuf>,
    search_text: String,
    watcher: Option<LogWatcher>,
    state: ViewState,
    disposed: bool,
}

impl LogViewController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self::with_predicate(config, Arc::new(ContainsIgnoreCase))
    }

    pub fn with_predicate(config: &ViewerConfig, predicate: Arc<dyn LinePredicate>) -> Self {
        Self {
            collection: IncrementalLogCollection::new(
                null_factory(),
                predicate,
                Arc::new(LogLine::new),
                config.page_size,
            ),
            debounce: Debouncer::new(config.debounce),
            app_name: config.app_name.clone(),
            logs_dir: config.logs_dir.clone(),
            active_log: config.active_log.clone(),
            watch_enabled: config.watch,
            log_files: Vec::new(),
            selected: None,
            search_text: String::new(),
            watcher: None,
            state: ViewState::Idle,
            disposed: false,
        }
    }

    /// Find the app's log files and select the newest. Returns how many
    /// were found.
    pub fn load_log_files(&mut self) -> Result<usize> {
        if self.disposed {
            return Ok(0);
        }
        let dir = self
            .logs_dir
            .clone()
            .context("No logs directory configured")?;
        let app = self.app_name.clone().context("No app name configured")?;

        self.log_files = discovery::find_log_files(&dir, &app)?;
        tracing::info!(dir = %dir.display(), count = self.log_files.len(), "Loaded log file list");

        if let Some(newest) = self.log_files.first().map(|f| f.path.clone()) {
            self.select_file(Some(newest));
        }
        Ok(self.log_files.len())
    }

    /// Switch the view to `path`, or to nothing.
    ///
    /// The current search text carries over to the new file.
    pub fn select_file(&mut self, path: Option<PathBuf>) {
        if self.disposed {
            return;
        }
        self.debounce.cancel();
        self.stop_watching();
        self.collection.clear_all_data();
        self.selected = path.clone();

        let Some(path) = path else {
            self.collection.update_source_factory(null_factory());
            self.state = ViewState::Idle;
            tracing::debug!("Selection cleared");
            return;
        };

        tracing::info!(path = %path.display(), "Selecting log file");
        self.collection.apply_filter(Some(&self.search_text));
        self.collection
            .update_source_factory(source_factory(path.clone(), self.active_log.clone()));
        self.collection.load();
        self.state = ViewState::SwitchingFile;

        if self.watch_enabled && self.is_active_log(&path) {
            self.start_watching(&path);
        }
    }

    /// Record new search text; it is applied once typing pauses for the
    /// debounce window.
    pub fn set_search_text(&mut self, text: &str, now: Instant) {
        if self.disposed {
            return;
        }
        self.search_text = text.to_string();
        self.debounce.push(text.trim().to_string(), now);
    }

    /// Request the next page of the current view
    pub fn load_more(&mut self) -> bool {
        !self.disposed && self.collection.load_more()
    }

    /// Pick up lines appended to the active log. Needed when no watcher
    /// runs; returns `false` when the selected file does not grow.
    pub fn refresh(&mut self) -> bool {
        !self.disposed && self.collection.refresh()
    }

    /// Fire an elapsed debounce, forward watcher notifications, and apply
    /// finished background work. Returns the collection's events.
    pub fn pump(&mut self, now: Instant) -> Vec<CollectionEvent> {
        if self.disposed {
            return Vec::new();
        }

        if let Some(text) = self.debounce.poll(now) {
            tracing::debug!(filter = %text, "Applying search text");
            self.collection.apply_filter(Some(&text));
            if self.collection.is_loading() && self.state == ViewState::Idle {
                self.state = ViewState::Filtering;
            }
        }

        self.forward_watch_events();

        let events = self.collection.pump();
        self.update_state();
        events
    }

    /// Pump until nothing is in flight, or `timeout` passes
    pub fn wait_settled(&mut self, timeout: Duration) -> Vec<CollectionEvent> {
        let events = self.collection.wait_settled(timeout);
        self.update_state();
        events
    }

    /// Text of the visible lines at `positions`, one per line, in view order
    pub fn copy_lines(&self, positions: &[usize]) -> String {
        let mut positions = positions.to_vec();
        positions.sort_unstable();
        positions.dedup();

        let items = self.collection.items();
        let mut out = String::new();
        for line in positions.iter().filter_map(|&p| items.get(p)) {
            out.push_str(line.text());
            out.push('\n');
        }
        out
    }

    /// Cancel pending search input and release the current file's data.
    /// The selection is kept so it can be reloaded.
    pub fn cleanup_session(&mut self) {
        if self.disposed {
            return;
        }
        self.debounce.cancel();
        self.stop_watching();
        self.collection.clear_all_data();
        self.search_text.clear();
        self.state = ViewState::Idle;
        tracing::debug!("Session cleaned up");
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.debounce.cancel();
        self.stop_watching();
        self.collection.dispose();
        self.state = ViewState::Idle;
        self.disposed = true;
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn lines(&self) -> &[LogLine] {
        self.collection.items()
    }

    pub fn collection(&self) -> &IncrementalLogCollection<LogLine> {
        &self.collection
    }

    pub fn log_files(&self) -> &[LogFile] {
        &self.log_files
    }

    pub fn selected_file(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// When the pending search text fires, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.next_deadline()
    }

    fn is_active_log(&self, path: &Path) -> bool {
        self.active_log
            .as_deref()
            .is_some_and(|active| same_file_path(path, active))
    }

    fn start_watching(&mut self, path: &Path) {
        match LogWatcher::new(path) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Live refresh disabled"),
        }
    }

    fn stop_watching(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            tracing::debug!(path = %watcher.path().display(), "Stopped watching");
        }
    }

    fn forward_watch_events(&mut self) {
        let Some(watcher) = &self.watcher else {
            return;
        };
        for event in watcher.drain() {
            match event {
                WatchEvent::Modified => {
                    self.collection.refresh();
                }
                WatchEvent::Removed => {
                    tracing::warn!(path = %watcher.path().display(), "Active log removed");
                }
                WatchEvent::Error(e) => {
                    tracing::warn!(error = %e, "File watcher error");
                }
            }
        }
    }

    fn update_state(&mut self) {
        if !self.collection.is_loading() {
            self.state = ViewState::Idle;
        }
    }
}

impl Drop for LogViewController {
    fn drop(&mut self) {
        self.dispose();
    }
}
