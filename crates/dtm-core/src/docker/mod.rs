//! Image build collaborator.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::types::{HistoryEntry, ImageInfo};

pub mod cli;

pub use cli::DockerCli;

/// One image build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Build context directory.
    pub context: PathBuf,

    /// Build file path, relative to `context`.
    pub build_file: PathBuf,

    /// Tag to give the resulting image.
    pub tag: String,

    /// Disable layer cache reuse for this build.
    pub no_cache: bool,
}

/// Builds, measures and removes images.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, request: &BuildRequest, cancel: &CancellationToken)
        -> Result<(), StepError>;

    /// Total size and layer identities of a built image.
    async fn inspect(&self, tag: &str, cancel: &CancellationToken)
        -> Result<ImageInfo, StepError>;

    /// Layer history in build order (base layer first). Best-effort.
    async fn history(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<HistoryEntry>, StepError>;

    /// Remove an image. Best-effort.
    async fn remove(&self, tag: &str, cancel: &CancellationToken) -> Result<(), StepError>;
}
