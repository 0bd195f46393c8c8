//! Runner status
//!
//! `Idle` between batches, `Running` while one is in progress. The batch
//! driver is the only writer; everyone else gets a read-only
//! [`StatusHandle`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Idle,
    Running,
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerStatus::Idle => write!(f, "Idle"),
            RunnerStatus::Running => write!(f, "Running"),
        }
    }
}

/// Writable status, owned by the batch driver.
#[derive(Debug, Default)]
pub(crate) struct StatusCell {
    running: Arc<AtomicBool>,
}

impl StatusCell {
    pub(crate) fn handle(&self) -> StatusHandle {
        StatusHandle { running: Arc::clone(&self.running) }
    }

    /// Mark the runner busy until the returned guard is dropped.
    pub(crate) fn enter(&self) -> StatusGuard<'_> {
        self.running.store(true, Ordering::SeqCst);
        tracing::debug!("runner status: Running");
        StatusGuard { cell: self }
    }
}

/// Resets the status to `Idle` on drop, unwinding included.
pub(crate) struct StatusGuard<'a> {
    cell: &'a StatusCell,
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.cell.running.store(false, Ordering::SeqCst);
        tracing::debug!("runner status: Idle");
    }
}

/// Read-only view of the runner status.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    running: Arc<AtomicBool>,
}

impl StatusHandle {
    pub fn get(&self) -> RunnerStatus {
        if self.running.load(Ordering::SeqCst) {
            RunnerStatus::Running
        } else {
            RunnerStatus::Idle
        }
    }
}
