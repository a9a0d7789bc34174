use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable stop request shared between the batch loop and whoever wants it
/// to stop (a Ctrl+C handler, a test). Checked only at chunk and file
/// boundaries, so a stop never leaves a half-written chunk behind.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
