use crate::error::{AnalysisError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation signal with an optional deadline
///
/// Cloned handles share the same flag; cancelling one cancels all of them.
/// Long loops call [`check`](Self::check) once per iteration.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that only trips on an explicit [`cancel`](Self::cancel)
    pub fn never() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A signal that also trips once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True after `cancel()` or once the deadline has passed
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancelled.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Error out of `operation` if the signal has tripped
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            tracing::warn!("{} cancelled", operation);
            return Err(AnalysisError::Cancelled { operation });
        }
        Ok(())
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
