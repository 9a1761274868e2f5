use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared abort flag, checked between crawl iterations and between probes.
/// In-flight requests are never interrupted.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
