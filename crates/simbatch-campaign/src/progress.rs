use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;

/// Receives progress updates from campaign workers.
///
/// Called concurrently from worker threads; `completed` values are unique and
/// each one is the counter value right after that run finished.
pub trait ProgressObserver: Send + Sync {
    /// Called once before any job starts.
    fn on_start(&self, _total: usize) {}

    /// Called after each run finished, whatever its outcome.
    fn on_advance(&self, completed: usize, total: usize);
}

/// Completion counter shared by every worker of one campaign execution.
#[derive(Default)]
pub struct Progress {
    completed: AtomicUsize,
    total: usize,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl Progress {
    /// Creates a counter for `total` runs.
    pub fn new(total: usize, observers: Vec<Arc<dyn ProgressObserver>>) -> Self {
        for observer in &observers {
            observer.on_start(total);
        }
        Self {
            completed: AtomicUsize::new(0),
            total,
            observers,
        }
    }

    /// Records one finished run and notifies observers.
    pub fn advance(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        for observer in &self.observers {
            observer.on_advance(completed, self.total);
        }
        completed
    }

    /// Number of runs finished so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Number of runs in the campaign.
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Observer emitting one `info` event per finished run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_start(&self, total: usize) {
        info!(total, "running all simulation cases");
    }

    fn on_advance(&self, completed: usize, total: usize) {
        info!(completed, total, "run finished");
    }
}
