pub mod event;
pub mod page;

pub use event::CollectionEvent;
pub use page::{ItemFactory, PageLines, PageLoader, PageRequest, View};

use crate::filter::cancel::{OpToken, Supersession};
use crate::filter::engine::FilterEngine;
use crate::filter::{normalize_filter, LinePredicate};
use crate::reader::{LineSource, NullSource, SourceError, SourceFactory};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long `wait_settled` blocks on the queue between settle checks
const SETTLE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Load,
    Filter,
    Page,
    Refresh,
}

#[derive(Debug)]
struct InFlight {
    token: OpToken,
    kind: OpKind,
}

/// Filter the user asked for versus the one the view reflects
#[derive(Debug, Default)]
struct FilterState {
    requested: Option<String>,
    applied: Option<String>,
}

/// Result of a background operation, applied by `pump`
struct Completion<T> {
    token: OpToken,
    outcome: Outcome<T>,
}

enum Outcome<T> {
    Loaded {
        source: Arc<dyn LineSource>,
        view: View,
        total: usize,
        items: Vec<T>,
        filter: Option<String>,
    },
    Filtered {
        view: View,
        total: usize,
        items: Vec<T>,
        filter: Option<String>,
    },
    Page(Vec<T>),
    Grew {
        total: usize,
        matches: Option<Vec<usize>>,
    },
    Failed(SourceError),
}

/// Counts workers that have not yet returned, including superseded ones
struct WorkerGuard(Arc<AtomicUsize>);

impl WorkerGuard {
    fn new(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A paginated, filterable view over one line source
///
/// All I/O (opening, scanning, filtering, materializing) runs on the rayon
/// pool. Results come back over a channel and are applied only by
/// [`pump`](Self::pump) and friends, so the visible items have a single
/// writer: whoever holds `&mut self`.
///
/// Every operation takes a fresh [`OpToken`]; issuing one supersedes the
/// previous. Superseded workers drop their results (and any source they
/// opened) instead of applying them.
pub struct IncrementalLogCollection<T> {
    factory: SourceFactory,
    predicate: Arc<dyn LinePredicate>,
    loader: PageLoader<T>,

    source: Option<Arc<dyn LineSource>>,
    view: View,
    /// Source lines the view accounts for
    total: usize,
    items: Vec<T>,
    filter: FilterState,

    ops: Supersession,
    current: Option<InFlight>,
    refresh_pending: bool,
    loading: bool,
    disposed: bool,

    tx: Sender<Completion<T>>,
    rx: Receiver<Completion<T>>,
    workers: Arc<AtomicUsize>,
    events: Vec<CollectionEvent>,
}

impl<T: Send + 'static> IncrementalLogCollection<T> {
    pub fn new(
        factory: SourceFactory,
        predicate: Arc<dyn LinePredicate>,
        item_factory: ItemFactory<T>,
        page_size: usize,
    ) -> Self {
        let (tx, rx) = channel();
        Self {
            factory,
            predicate,
            loader: PageLoader::new(item_factory, page_size),
            source: None,
            view: View::default(),
            total: 0,
            items: Vec::new(),
            filter: FilterState::default(),
            ops: Supersession::new(),
            current: None,
            refresh_pending: false,
            loading: false,
            disposed: false,
            tx,
            rx,
            workers: Arc::new(AtomicUsize::new(0)),
            events: Vec::new(),
        }
    }

    /// Replace the factory used by the next `load`. Opens nothing.
    pub fn update_source_factory(&mut self, factory: SourceFactory) {
        if self.disposed {
            return;
        }
        self.factory = factory;
    }

    /// Open a fresh source and show its first page.
    ///
    /// Supersedes whatever is in flight and releases the installed source
    /// before the new one is opened, so at most one source is alive once
    /// superseded workers have exited.
    pub fn load(&mut self) {
        if self.disposed {
            return;
        }

        let token = self.begin(OpKind::Load);
        self.release_source();
        self.reset_items();

        let factory = Arc::clone(&self.factory);
        let predicate = Arc::clone(&self.predicate);
        let loader = self.loader.clone();
        let filter = self.filter.requested.clone();
        tracing::debug!(op = token.id(), filter = ?filter, "Loading source");

        self.spawn(token, move |token| {
            let source: Arc<dyn LineSource> = Arc::from(factory()?);
            if token.is_superseded() {
                tracing::trace!(op = token.id(), "Closing source opened for superseded load");
                return Ok(None);
            }

            let total = source.line_count()?;
            let Some(view) = build_view(&*source, &*predicate, filter.as_deref(), total, token)?
            else {
                return Ok(None);
            };
            let lines = view.lines_for(loader.next_request(0));
            let Some(items) = loader.materialize(&*source, &lines, token)? else {
                return Ok(None);
            };

            Ok(Some(Outcome::Loaded {
                source,
                view,
                total,
                items,
                filter,
            }))
        });
    }

    /// Materialize the next page. Returns `false` when nothing was started.
    pub fn load_more(&mut self) -> bool {
        if self.disposed || self.current.is_some() {
            return false;
        }
        let Some(source) = self.source.clone() else {
            return false;
        };
        let lines = self.view.lines_for(self.loader.next_request(self.items.len()));
        if lines.is_empty() {
            return false;
        }

        let token = self.begin(OpKind::Page);
        let loader = self.loader.clone();
        tracing::debug!(op = token.id(), start = self.items.len(), "Loading page");

        self.spawn(token, move |token| {
            Ok(loader.materialize(&*source, &lines, token)?.map(Outcome::Page))
        });
        true
    }

    /// Narrow the view to lines matching `text`; empty text removes the filter.
    pub fn apply_filter(&mut self, text: Option<&str>) {
        if self.disposed {
            return;
        }

        let filter = normalize_filter(text);
        self.filter.requested = filter.clone();

        if matches!(&self.current, Some(InFlight { kind: OpKind::Load, .. })) {
            // Picked up when the load completes
            tracing::debug!(filter = ?filter, "Deferring filter until load completes");
            return;
        }
        let Some(source) = self.source.clone() else {
            return;
        };
        if self.current.is_none() && self.filter.applied == filter && !source.is_growing() {
            tracing::trace!(filter = ?filter, "Filter already applied");
            return;
        }

        self.start_filter(source, filter);
    }

    fn start_filter(&mut self, source: Arc<dyn LineSource>, filter: Option<String>) {
        let token = self.begin(OpKind::Filter);
        let predicate = Arc::clone(&self.predicate);
        let loader = self.loader.clone();
        tracing::debug!(op = token.id(), filter = ?filter, "Applying filter");

        self.spawn(token, move |token| {
            let total = source.line_count()?;
            let Some(view) = build_view(&*source, &*predicate, filter.as_deref(), total, token)?
            else {
                return Ok(None);
            };
            let lines = view.lines_for(loader.next_request(0));
            let Some(items) = loader.materialize(&*source, &lines, token)? else {
                return Ok(None);
            };
            Ok(Some(Outcome::Filtered {
                view,
                total,
                items,
                filter,
            }))
        });
    }

    /// Pick up lines appended to a growing source.
    ///
    /// Returns `false` when the source does not grow. While another
    /// operation is in flight the refresh is queued behind it.
    pub fn refresh(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        let Some(source) = self.source.clone() else {
            return false;
        };
        if !source.is_growing() {
            return false;
        }
        if self.current.is_some() {
            self.refresh_pending = true;
            return true;
        }

        self.refresh_pending = false;
        let token = self.begin(OpKind::Refresh);
        let predicate = Arc::clone(&self.predicate);
        let filter = self.filter.applied.clone();
        let scanned = self.total;
        tracing::trace!(op = token.id(), scanned, "Refreshing growing source");

        self.spawn(token, move |token| {
            let total = source.line_count()?;
            let matches = match filter.as_deref() {
                Some(f) if total > scanned => {
                    match FilterEngine::scan(&*source, &*predicate, f, scanned..total, token)? {
                        Some(found) => Some(found),
                        None => return Ok(None),
                    }
                }
                Some(_) => Some(Vec::new()),
                None => None,
            };
            Ok(Some(Outcome::Grew { total, matches }))
        });
        true
    }

    /// Drop the source and every visible item, and forget paging and filter
    /// state. Anything in flight is superseded.
    pub fn clear_all_data(&mut self) {
        if self.disposed {
            return;
        }
        self.ops.invalidate();
        self.current = None;
        self.refresh_pending = false;
        self.release_source();
        self.reset_items();
        self.items.shrink_to_fit();
        self.filter = FilterState::default();
        tracing::debug!("Cleared collection");
    }

    /// Clear everything; later calls become no-ops
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear_all_data();
        self.disposed = true;
        self.sync_loading();
    }

    /// Apply every completion already queued and return the events produced
    pub fn pump(&mut self) -> Vec<CollectionEvent> {
        if self.disposed {
            while self.rx.try_recv().is_ok() {}
            return std::mem::take(&mut self.events);
        }
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
        }
        self.sync_loading();
        std::mem::take(&mut self.events)
    }

    /// Like [`pump`](Self::pump), but wait up to `timeout` for the first
    /// completion when none is queued
    pub fn pump_blocking(&mut self, timeout: Duration) -> Vec<CollectionEvent> {
        if !self.disposed {
            if let Ok(completion) = self.rx.recv_timeout(timeout) {
                self.apply(completion);
            }
        }
        self.pump()
    }

    /// Pump until nothing is in flight and every worker, superseded ones
    /// included, has exited; or until `timeout` passes.
    pub fn wait_settled(&mut self, timeout: Duration) -> Vec<CollectionEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        loop {
            events.extend(self.pump());
            if self.is_settled() {
                // Workers send before exiting, so their results are queued
                events.extend(self.pump());
                if self.is_settled() {
                    break;
                }
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(workers = self.workers.load(Ordering::SeqCst), "Collection did not settle");
                break;
            }
            match self.rx.recv_timeout(SETTLE_POLL.min(deadline - now)) {
                Ok(completion) if !self.disposed => self.apply(completion),
                Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        events
    }

    fn is_settled(&self) -> bool {
        self.current.is_none() && self.workers.load(Ordering::SeqCst) == 0
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while the view has lines not yet materialized and no load or
    /// filter is about to replace it
    pub fn has_more_items(&self) -> bool {
        let replacing = matches!(
            &self.current,
            Some(InFlight {
                kind: OpKind::Load | OpKind::Filter,
                ..
            })
        );
        !self.disposed && self.source.is_some() && !replacing && self.items.len() < self.view.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Filter most recently requested, trimmed
    pub fn filter_text(&self) -> Option<&str> {
        self.filter.requested.as_deref()
    }

    /// Filter the visible items currently reflect
    pub fn applied_filter(&self) -> Option<&str> {
        self.filter.applied.as_deref()
    }

    /// Generation of the installed source, if any
    pub fn source_generation(&self) -> Option<u64> {
        self.source.as_ref().map(|s| s.generation())
    }

    /// Source lines the view accounts for
    pub fn total_lines(&self) -> usize {
        self.total
    }

    /// Lines in the view, materialized or not
    pub fn view_len(&self) -> usize {
        self.view.len()
    }

    /// Workers still running, superseded ones included
    pub fn active_workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    fn begin(&mut self, kind: OpKind) -> OpToken {
        let token = self.ops.issue();
        if let Some(previous) = self.current.take() {
            tracing::trace!(op = previous.token.id(), kind = ?previous.kind, "Superseded");
        }
        self.current = Some(InFlight {
            token: token.clone(),
            kind,
        });
        if !self.loading {
            self.loading = true;
            self.events.push(CollectionEvent::LoadingChanged(true));
        }
        token
    }

    /// Emit the trailing `LoadingChanged(false)` once nothing is in flight
    fn sync_loading(&mut self) {
        if self.loading && self.current.is_none() {
            self.loading = false;
            self.events.push(CollectionEvent::LoadingChanged(false));
        }
    }

    fn spawn<F>(&self, token: OpToken, job: F)
    where
        F: FnOnce(&OpToken) -> Result<Option<Outcome<T>>, SourceError> + Send + 'static,
    {
        let tx = self.tx.clone();
        let guard = WorkerGuard::new(&self.workers);

        rayon::spawn(move || {
            let _guard = guard;
            let outcome = match catch_unwind(AssertUnwindSafe(|| job(&token))) {
                Ok(Ok(Some(outcome))) => outcome,
                Ok(Ok(None)) => {
                    tracing::trace!(op = token.id(), "Dropping superseded result");
                    return;
                }
                Ok(Err(e)) => Outcome::Failed(e),
                Err(panic) => Outcome::Failed(SourceError::Panicked(panic_message(&*panic))),
            };
            if token.is_superseded() {
                tracing::trace!(op = token.id(), "Dropping superseded result");
                return;
            }
            let _ = tx.send(Completion { token, outcome });
        });
    }

    fn apply(&mut self, completion: Completion<T>) {
        let kind = match &self.current {
            Some(op) if op.token == completion.token => op.kind,
            _ => {
                tracing::trace!(op = completion.token.id(), "Discarding stale completion");
                return;
            }
        };
        self.current = None;
        let loaded = matches!(completion.outcome, Outcome::Loaded { .. });

        match completion.outcome {
            Outcome::Loaded {
                source,
                view,
                total,
                items,
                filter,
            } => {
                tracing::debug!(lines = total, visible = view.len(), "Source loaded");
                self.source = Some(source);
                self.view = view;
                self.total = total;
                self.filter.applied = filter;
                self.append_items(items);
            }
            Outcome::Filtered {
                view,
                total,
                items,
                filter,
            } => {
                tracing::debug!(filter = ?filter, matches = view.len(), "Filter applied");
                self.view = view;
                self.total = total;
                self.filter.applied = filter;
                self.reset_items();
                self.append_items(items);
            }
            Outcome::Page(items) => self.append_items(items),
            Outcome::Grew { total, matches } => {
                if total > self.total {
                    let exhausted = self.items.len() == self.view.len();
                    self.view.grow(total, matches);
                    self.total = total;
                    self.events.push(CollectionEvent::SourceGrew { total });
                    if exhausted && self.items.len() < self.view.len() {
                        self.load_more();
                    }
                }
            }
            Outcome::Failed(error) => self.fail(kind, error),
        }

        self.chain_followups(loaded);
    }

    fn fail(&mut self, kind: OpKind, error: SourceError) {
        tracing::warn!(kind = ?kind, error = %error, "Collection operation failed");
        // A refresh that hits a rotated or truncated file has lost the lines
        // on screen too
        let source_lost = match kind {
            OpKind::Load | OpKind::Page => true,
            OpKind::Refresh => error.is_io(),
            OpKind::Filter => false,
        };
        if source_lost {
            self.source = Some(Arc::new(NullSource::new()));
            self.view = View::default();
            self.total = 0;
            self.refresh_pending = false;
            self.reset_items();
        }
        self.events.push(CollectionEvent::Error(error));
    }

    /// Start work that was waiting on the operation that just finished.
    /// A filter requested mid-load runs only after a successful load.
    fn chain_followups(&mut self, loaded: bool) {
        if self.current.is_some() {
            return;
        }
        let Some(source) = self.source.clone() else {
            return;
        };
        if loaded && self.filter.requested != self.filter.applied {
            let filter = self.filter.requested.clone();
            self.start_filter(source, filter);
        } else if self.refresh_pending {
            self.refresh();
        }
    }

    fn append_items(&mut self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        let start = self.items.len();
        let count = items.len();
        self.items.extend(items);
        self.events.push(CollectionEvent::ItemsAppended { start, count });
    }

    fn reset_items(&mut self) {
        self.items.clear();
        self.events.push(CollectionEvent::Reset);
    }

    fn release_source(&mut self) {
        if let Some(source) = self.source.take() {
            tracing::trace!(generation = source.generation(), "Releasing source");
        }
        self.view = View::default();
        self.total = 0;
    }
}

impl<T> Drop for IncrementalLogCollection<T> {
    fn drop(&mut self) {
        self.ops.invalidate();
    }
}

fn build_view(
    source: &dyn LineSource,
    predicate: &dyn LinePredicate,
    filter: Option<&str>,
    total: usize,
    token: &OpToken,
) -> Result<Option<View>, SourceError> {
    match filter {
        None => Ok(Some(View::Unfiltered { total })),
        Some(f) => Ok(FilterEngine::scan(source, predicate, f, 0..total, token)?.map(View::Filtered)),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
