//! Shared state handed to every handler.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub connections: Arc<ConnectionTracker>,
    pub app_name: String,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, app_name: impl Into<String>) -> Self {
        Self {
            orchestrator,
            connections: Arc::new(ConnectionTracker::default()),
            app_name: app_name.into(),
        }
    }
}

/// Counts open WebSocket connections.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicUsize,
    total: AtomicU64,
}

impl ConnectionTracker {
    /// Register a connection; it is released when the guard drops.
    pub fn connect(self: &Arc<Self>) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        let id = self.total.fetch_add(1, Ordering::SeqCst) + 1;
        ConnectionGuard {
            tracker: self.clone(),
            id,
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
    id: u64,
}

impl ConnectionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let tracker = Arc::new(ConnectionTracker::default());
        let first = tracker.connect();
        let second = tracker.connect();
        assert_eq!(tracker.active(), 2);
        assert_eq!(second.id(), 2);

        drop(first);
        assert_eq!(tracker.active(), 1);
        drop(second);
        assert_eq!(tracker.active(), 0);
        assert_eq!(tracker.total(), 2);
    }
}
