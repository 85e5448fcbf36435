//! Scoped ownership of the working tree.
//!
//! The pre-run state is captured before any checkout and restored after the
//! scope ends, whether the body returned, failed, was cancelled or panicked.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{DtmError, DtmResult, StepError};
use crate::types::WorktreeState;
use crate::vcs::Vcs;

/// Exclusive handle on the working tree for the duration of one run.
pub struct WorktreeGuard {
    vcs: Arc<dyn Vcs>,
    original: WorktreeState,
    released: bool,
}

impl WorktreeGuard {
    /// Capture the current state. Fails before anything is mutated.
    pub async fn acquire(vcs: Arc<dyn Vcs>, cancel: &CancellationToken) -> DtmResult<Self> {
        let original = vcs.current_state(cancel).await.map_err(|e| match e {
            StepError::Cancelled => DtmError::Cancelled,
            other => DtmError::StateUnavailable {
                message: other.to_string(),
            },
        })?;
        debug!(state = %original, "captured working tree state");
        Ok(Self {
            vcs,
            original,
            released: false,
        })
    }

    pub fn original(&self) -> &WorktreeState {
        &self.original
    }

    /// Restore the captured state.
    ///
    /// Runs with its own token: restoration is not subject to cancellation.
    /// A failure is logged and returned as a warning message.
    pub async fn release(mut self) -> Option<String> {
        self.released = true;
        let target = self.original.target().to_string();
        match self.vcs.checkout(&target, &CancellationToken::new()).await {
            Ok(()) => {
                debug!(state = %self.original, "restored working tree");
                None
            }
            Err(e) => {
                let err = StepError::RestoreFailed {
                    target,
                    message: e.to_string(),
                };
                warn!(error = %err, "working tree was not restored");
                Some(err.to_string())
            }
        }
    }
}

impl Drop for WorktreeGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                state = %self.original,
                "working tree guard dropped without restore; tree may be left at a historical point"
            );
        }
    }
}

/// Value produced inside a worktree scope, plus any restoration warning.
#[derive(Debug)]
pub struct Scoped<T> {
    pub value: T,
    pub original: WorktreeState,
    pub restore_warning: Option<String>,
}

/// Run `body` while holding the working tree, restoring it afterwards.
///
/// A body error is returned as-is after restoration; a restoration failure
/// never replaces it. A panic in `body` is resumed after restoration.
pub async fn scoped<T, F>(
    vcs: Arc<dyn Vcs>,
    cancel: &CancellationToken,
    body: F,
) -> DtmResult<Scoped<T>>
where
    F: Future<Output = DtmResult<T>>,
{
    let guard = WorktreeGuard::acquire(vcs, cancel).await?;
    let original = guard.original().clone();
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let restore_warning = guard.release().await;

    match outcome {
        Ok(Ok(value)) => Ok(Scoped {
            value,
            original,
            restore_warning,
        }),
        Ok(Err(e)) => Err(e),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
