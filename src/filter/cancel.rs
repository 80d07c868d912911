use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Issues operation stamps; issuing a new one supersedes all earlier ones
///
/// Work that cannot be interrupted mid-read (opening and scanning a file)
/// checks its [`OpToken`] before and during the work and after it finishes,
/// and throws its results away once a newer token exists.
#[derive(Clone, Debug, Default)]
pub struct Supersession {
    latest: Arc<AtomicU64>,
}

impl Supersession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token, making every outstanding one stale
    pub fn issue(&self) -> OpToken {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        OpToken {
            id,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Make every outstanding token stale without issuing a new one
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handle identifying one load, page, filter or refresh operation
///
/// Cloning yields another handle to the same stamp.
#[derive(Clone, Debug)]
pub struct OpToken {
    id: u64,
    latest: Arc<AtomicU64>,
}

impl OpToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True while no newer token has been issued
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }

    pub fn is_superseded(&self) -> bool {
        !self.is_current()
    }
}

impl PartialEq for OpToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.latest, &other.latest)
    }
}

impl Eq for OpToken {}
