//! Two-ref image comparison.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::build_step::BuildStep;
use crate::config::CompareConfig;
use crate::docker::DockerCli;
use crate::error::{DtmError, DtmResult};
use crate::types::{short_id, BuildResult, HistoricalPoint, WorktreeState};
use crate::vcs::GitCli;
use crate::worktree::scoped;

/// Measurements of one side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// The reference as given (branch, tag or commit).
    pub name: String,
    /// Short commit id the reference resolved to.
    pub commit: String,
    pub size_mb: f64,
    pub layers: usize,
    /// Seconds.
    pub build_time: f64,
}

impl BranchInfo {
    fn from_result(name: &str, result: &BuildResult) -> Self {
        Self {
            name: name.to_string(),
            commit: result.point.short_id().to_string(),
            size_mb: result.size_mb(),
            layers: result.layer_count(),
            build_time: result.build_time().as_secs_f64(),
        }
    }
}

/// Differences are B minus A; percentages are relative to A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub branch_a: BranchInfo,
    pub branch_b: BranchInfo,
    #[serde(rename = "size_diff_mb")]
    pub size_diff: f64,
    pub size_diff_percent: f64,
    pub layers_diff: i64,
    pub build_time_diff: f64,
    pub build_time_diff_percent: f64,
    #[serde(skip)]
    pub original_state: Option<WorktreeState>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub restore_warning: Option<String>,
}

impl ComparisonResult {
    pub fn between(a: BranchInfo, b: BranchInfo) -> Self {
        let size_diff = b.size_mb - a.size_mb;
        let build_time_diff = b.build_time - a.build_time;
        Self {
            size_diff,
            size_diff_percent: percent_of(size_diff, a.size_mb),
            layers_diff: b.layers as i64 - a.layers as i64,
            build_time_diff,
            build_time_diff_percent: percent_of(build_time_diff, a.build_time),
            branch_a: a,
            branch_b: b,
            original_state: None,
            restore_warning: None,
        }
    }
}

fn percent_of(diff: f64, base: f64) -> f64 {
    if base > 0.0 {
        diff / base * 100.0
    } else {
        0.0
    }
}

pub struct Comparer {
    step: BuildStep,
}

impl Comparer {
    pub fn new(step: BuildStep) -> Self {
        Self { step }
    }

    /// Use the `git` and `docker` command line tools.
    pub fn from_config(config: &CompareConfig) -> Self {
        Self::new(BuildStep::new(
            Arc::new(GitCli::new(&config.repo_path)),
            Arc::new(DockerCli::new()),
            &config.dockerfile,
            config.policy.clone(),
        ))
    }

    /// Build `a` and `b` once each and report the differences.
    ///
    /// Both refs are resolved against the tree as the caller left it, so
    /// `HEAD`-relative names mean the same thing for either side. Both builds
    /// then happen under one working tree scope. A side that does not build
    /// is an error.
    pub async fn compare(
        &self,
        a: &str,
        b: &str,
        cancel: &CancellationToken,
    ) -> DtmResult<ComparisonResult> {
        let point_a = self.resolve(a, cancel).await?;
        let point_b = self.resolve(b, cancel).await?;

        let vcs = self.step.vcs().clone();
        let scope = scoped(vcs, cancel, async {
            let info_a = self.measure(a, &point_a, cancel).await?;
            let info_b = self.measure(b, &point_b, cancel).await?;
            Ok::<_, DtmError>(ComparisonResult::between(info_a, info_b))
        })
        .await?;

        let mut result = scope.value;
        result.original_state = Some(scope.original);
        result.restore_warning = scope.restore_warning;
        info!(
            a,
            b,
            size_diff_mb = result.size_diff,
            layers_diff = result.layers_diff,
            "compared"
        );
        Ok(result)
    }

    async fn resolve(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> DtmResult<HistoricalPoint> {
        let vcs = self.step.vcs();
        let id = vcs
            .resolve_ref(reference, cancel)
            .await
            .map_err(DtmError::from_history)?;
        vcs.describe_point(&id, cancel)
            .await
            .map_err(DtmError::from_history)
    }

    async fn measure(
        &self,
        reference: &str,
        point: &HistoricalPoint,
        cancel: &CancellationToken,
    ) -> DtmResult<BranchInfo> {
        let result = self.step.build(point, cancel).await?;
        if let Some(message) = result.error() {
            return Err(DtmError::Build {
                reference: format!("{reference} ({})", short_id(&point.id)),
                message,
            });
        }
        Ok(BranchInfo::from_result(reference, &result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, size_mb: f64, layers: usize, build_time: f64) -> BranchInfo {
        BranchInfo {
            name: name.into(),
            commit: "abcdef12".into(),
            size_mb,
            layers,
            build_time,
        }
    }

    #[test]
    fn test_diffs_are_b_minus_a() {
        let r = ComparisonResult::between(
            info("main", 200.0, 10, 40.0),
            info("feat", 150.0, 12, 50.0),
        );
        assert!((r.size_diff - -50.0).abs() < 1e-9);
        assert!((r.size_diff_percent - -25.0).abs() < 1e-9);
        assert_eq!(r.layers_diff, 2);
        assert!((r.build_time_diff - 10.0).abs() < 1e-9);
        assert!((r.build_time_diff_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_gives_zero_percent() {
        let r = ComparisonResult::between(info("a", 0.0, 0, 0.0), info("b", 10.0, 1, 1.0));
        assert_eq!(r.size_diff_percent, 0.0);
        assert_eq!(r.build_time_diff_percent, 0.0);
    }

    #[test]
    fn test_json_field_names() {
        let r = ComparisonResult::between(info("a", 1.0, 1, 1.0), info("b", 2.0, 1, 1.0));
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("size_diff_mb").is_some());
        assert!(v["branch_a"].get("size_mb").is_some());
        assert!(v.get("restore_warning").is_none());
    }
}
