//! Caller-supplied cancellation.
//!
//! Checked between collection items and between batch-directory files, the
//! only unbounded-iteration points in the pipeline. A cancelled run returns
//! the partial result accumulated so far.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheap clonable cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
