//! Build and measure the image for one historical point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BuildPolicy;
use crate::docker::{BuildRequest, ImageBuilder};
use crate::error::{DtmError, DtmResult, StepError};
use crate::types::{BuildResult, FailureStage, HistoricalPoint, LayerRecord, Measurement};
use crate::vcs::Vcs;

/// Characters of the point identity kept in the image tag.
pub const TAG_ID_LEN: usize = 12;

/// Derive the temporary image tag for a point: `<prefix>:<first 12 hex chars>`.
pub fn artifact_tag(prefix: &str, point_id: &str) -> String {
    let id: String = point_id
        .chars()
        .take(TAG_ID_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    format!("{}:{id}", prefix.to_ascii_lowercase())
}

/// Checkout → build → measure → remove, for one point at a time.
#[derive(Clone)]
pub struct BuildStep {
    vcs: Arc<dyn Vcs>,
    builder: Arc<dyn ImageBuilder>,
    build_file: PathBuf,
    policy: BuildPolicy,
}

impl BuildStep {
    pub fn new(
        vcs: Arc<dyn Vcs>,
        builder: Arc<dyn ImageBuilder>,
        build_file: impl Into<PathBuf>,
        policy: BuildPolicy,
    ) -> Self {
        Self {
            vcs,
            builder,
            build_file: build_file.into(),
            policy,
        }
    }

    pub fn vcs(&self) -> &Arc<dyn Vcs> {
        &self.vcs
    }

    pub fn build_file(&self) -> &std::path::Path {
        &self.build_file
    }

    /// Examine one point.
    ///
    /// Checkout, build and inspect failures are folded into the returned
    /// result. Only cancellation is returned as an error.
    pub async fn build(
        &self,
        point: &HistoricalPoint,
        cancel: &CancellationToken,
    ) -> DtmResult<BuildResult> {
        if let Err(e) = self.vcs.checkout(&point.id, cancel).await {
            return fold_failure(point, FailureStage::Checkout, e);
        }

        let tag = artifact_tag(&self.policy.tag_prefix, &point.id);
        let request = BuildRequest {
            context: self.vcs.workdir().to_path_buf(),
            build_file: self.build_file.clone(),
            tag: tag.clone(),
            no_cache: self.policy.no_cache,
        };

        let measured = self.build_and_measure(&request, cancel).await;
        self.remove_image(&tag, cancel).await;

        match measured {
            Ok(measurement) => {
                info!(
                    point = %point.short_id(),
                    size = measurement.size,
                    layers = measurement.layer_count,
                    build_secs = measurement.build_time.as_secs_f64(),
                    "built"
                );
                Ok(BuildResult::built(point.clone(), measurement))
            }
            Err((stage, e)) => fold_failure(point, stage, e),
        }
    }

    async fn build_and_measure(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<Measurement, (FailureStage, StepError)> {
        let started = Instant::now();
        self.builder
            .build(request, cancel)
            .await
            .map_err(|e| (FailureStage::Build, e))?;
        let build_time = started.elapsed();

        let info = self
            .builder
            .inspect(&request.tag, cancel)
            .await
            .map_err(|e| (FailureStage::Inspect, e))?;

        let layers = match self.builder.history(&request.tag, cancel).await {
            Ok(entries) => entries
                .iter()
                .map(|h| LayerRecord::new(&h.created_by, h.size))
                .collect(),
            Err(StepError::Cancelled) => return Err((FailureStage::Inspect, StepError::Cancelled)),
            Err(e) => {
                warn!(tag = %request.tag, error = %e, "layer history unavailable");
                Vec::new()
            }
        };

        Ok(Measurement {
            size: info.total_size,
            build_time,
            layer_count: info.layer_ids.len(),
            layers,
        })
    }

    async fn remove_image(&self, tag: &str, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            debug!(tag, "cancelled, skipping image removal");
            return;
        }
        if let Err(e) = self.builder.remove(tag, cancel).await {
            warn!(tag, error = %e, "failed to remove image");
        }
    }
}

fn fold_failure(
    point: &HistoricalPoint,
    stage: FailureStage,
    err: StepError,
) -> DtmResult<BuildResult> {
    if err.is_cancelled() {
        return Err(DtmError::Cancelled);
    }
    debug!(point = %point.short_id(), %stage, error = %err, "point failed");
    Ok(BuildResult::failed(point.clone(), stage, err.to_string()))
}
