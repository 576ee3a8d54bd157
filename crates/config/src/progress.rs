use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Liveness hook ticked periodically during spills and merges.
///
/// It carries no cancellation signal. A panicking callback is caught and
/// logged; it never aborts the operation that ticked it.
#[derive(Clone)]
pub struct Progress {
    f: Arc<dyn Fn() + Send + Sync>,
}

impl Progress {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Invokes the callback, swallowing any panic it raises.
    pub fn tick(&self) {
        if catch_unwind(AssertUnwindSafe(|| (self.f)())).is_err() {
            log::warn!("progress callback panicked; ignoring");
        }
    }

    /// Ticks `p` if present. Convenience for call sites holding an `Option`.
    pub fn tick_opt(p: Option<&Progress>) {
        if let Some(p) = p {
            p.tick();
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Progress(..)")
    }
}
