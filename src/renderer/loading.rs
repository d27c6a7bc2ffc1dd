//! Outstanding-load bookkeeping shared between the frame loop and workers

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Count of loads still in flight; rendering waits until it reaches zero
#[derive(Clone, Debug, Default)]
pub struct LoadingCounter {
    count: Arc<AtomicUsize>,
}

impl LoadingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a load; the returned ticket releases it exactly once
    #[must_use]
    pub fn begin(&self) -> LoadingTicket {
        self.count.fetch_add(1, Ordering::AcqRel);
        LoadingTicket {
            counter: Some(self.clone()),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.count() > 0
    }

    /// Forget all outstanding loads; late tickets then release nothing
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    fn release(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// One outstanding load. Completing or dropping it decrements the counter.
#[derive(Debug)]
pub struct LoadingTicket {
    counter: Option<LoadingCounter>,
}

impl LoadingTicket {
    pub fn complete(mut self) {
        if let Some(counter) = self.counter.take() {
            counter.release();
        }
    }
}

impl Drop for LoadingTicket {
    fn drop(&mut self) {
        if let Some(counter) = self.counter.take() {
            counter.release();
        }
    }
}
