//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Owner side of a cancellation flag.
///
/// Cloneable handles observe the flag via [`AbortSignal`]. Aborting is
/// idempotent and sticky.
#[derive(Debug, Default)]
pub struct AbortController {
    flag: Arc<AtomicBool>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that work should stop at the next checkpoint.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// A shareable observer for this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Observer side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    /// A signal that never fires, for callers that do not cancel.
    pub fn never() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Error out if the signal has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
