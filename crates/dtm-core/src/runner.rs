//! Run controller: drives the build step over a selected sequence of points.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build_step::BuildStep;
use crate::error::{DtmError, DtmResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::types::{BuildResult, HistoricalPoint, WorktreeState};
use crate::worktree::scoped;

/// Outcome of one run: every point's result in input order.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<BuildResult>,
    /// Working tree state captured before the run (and restored after it).
    pub original_state: WorktreeState,
    /// Set when the working tree could not be restored.
    pub restore_warning: Option<String>,
}

impl RunOutcome {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

pub struct RunController {
    step: BuildStep,
    progress: Option<ProgressSink>,
}

impl RunController {
    pub fn new(step: BuildStep) -> Self {
        Self {
            step,
            progress: None,
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Build every point in order, one at a time, and restore the working tree.
    ///
    /// Per-point failures are recorded and never stop the loop; `skip_failed`
    /// only lowers their log level.
    pub async fn run(
        &self,
        points: &[HistoricalPoint],
        skip_failed: bool,
        cancel: &CancellationToken,
    ) -> DtmResult<RunOutcome> {
        let vcs = self.step.vcs().clone();
        let scope = scoped(vcs, cancel, self.build_all(points, skip_failed, cancel)).await?;

        let outcome = RunOutcome {
            results: scope.value,
            original_state: scope.original,
            restore_warning: scope.restore_warning,
        };
        info!(
            points = outcome.results.len(),
            failed = outcome.failed_count(),
            "run complete"
        );
        Ok(outcome)
    }

    async fn build_all(
        &self,
        points: &[HistoricalPoint],
        skip_failed: bool,
        cancel: &CancellationToken,
    ) -> DtmResult<Vec<BuildResult>> {
        let total = points.len();
        let mut results = Vec::with_capacity(total);

        for (i, point) in points.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!(done = i, total, "run cancelled");
                return Err(DtmError::Cancelled);
            }
            if let Some(sink) = &self.progress {
                sink(ProgressEvent {
                    current: i + 1,
                    total,
                    point: point.short_id().to_string(),
                    message: point.message.clone(),
                });
            }

            let result = self.step.build(point, cancel).await?;
            if let Some(error) = result.error() {
                if skip_failed {
                    debug!(point = %point.short_id(), error = %error, "build failed, skipping");
                } else {
                    warn!(point = %point.short_id(), error = %error, "build failed");
                }
            }
            results.push(result);
        }

        Ok(results)
    }
}
