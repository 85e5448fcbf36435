//! Version-control collaborator.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::types::{HistoricalPoint, WorktreeState};

pub mod git;

pub use git::GitCli;

/// Read and write access to a versioned working tree.
///
/// Every long-running call observes `cancel`; implementations return
/// [`StepError::Cancelled`] when it fires.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Root of the working tree, used as the build context.
    fn workdir(&self) -> &Path;

    /// Resolve a branch, tag or commit name to a full commit identity.
    async fn resolve_ref(&self, name: &str, cancel: &CancellationToken)
        -> Result<String, StepError>;

    /// Walk ancestry from `from`, optionally restricted to commits touching `path_filter`.
    async fn enumerate_ancestry(
        &self,
        from: &str,
        path_filter: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Vec<HistoricalPoint>, StepError>;

    /// Metadata for one commit.
    async fn describe_point(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<HistoricalPoint, StepError> {
        self.enumerate_ancestry(id, None, cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StepError::RefNotFound {
                name: id.to_string(),
            })
    }

    /// Where HEAD currently is.
    async fn current_state(&self, cancel: &CancellationToken)
        -> Result<WorktreeState, StepError>;

    /// Move the working tree to `target` (a commit identity or branch name).
    async fn checkout(&self, target: &str, cancel: &CancellationToken) -> Result<(), StepError>;
}
