//! Cooperative cancellation for long-running proof generation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ComplianceError, Result};

/// Shared flag checked between account blocks
///
/// Clones observe the same flag. Cancelling is idempotent and cannot be undone.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the token has been cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ComplianceError::Cancelled)
        } else {
            Ok(())
        }
    }
}
