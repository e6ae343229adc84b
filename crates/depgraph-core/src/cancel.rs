//! Cooperative cancellation between request phases.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::AnalysisError;

/// Cloneable cancellation flag shared between a caller and a running request.
///
/// The engine only looks at it between phases (build, analyze, plan), never
/// inside an algorithm, so a cancelled request never leaves partial state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with [`AnalysisError::Cancelled`] if cancellation was requested
    /// before `phase` starts.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::Cancelled`] naming `phase`.
    pub fn check(&self, phase: &str) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            tracing::debug!(phase, "request cancelled");
            return Err(AnalysisError::Cancelled {
                phase: phase.to_string(),
            });
        }
        Ok(())
    }
}
