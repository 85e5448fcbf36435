//! Threshold bisection over a materialized commit range.
//!
//! The search assumes the threshold crossing is monotonic over the range in
//! search order (once exceeded, it stays exceeded). That property is the
//! caller's to guarantee; it is not verified here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::build_step::BuildStep;
use crate::config::BisectConfig;
use crate::docker::DockerCli;
use crate::error::{DtmError, DtmResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::types::{BuildResult, HistoricalPoint, Measurement, WorktreeState, BYTES_PER_MB};
use crate::vcs::{GitCli, Vcs};
use crate::worktree::scoped;

/// Size and/or build time limits. A probe exceeding either one is "bad".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    pub size_mb: Option<f64>,
    pub time_secs: Option<f64>,
}

impl Thresholds {
    /// Build from raw values where `0` (or less) means "not configured".
    pub fn from_raw(size_mb: f64, time_secs: f64) -> DtmResult<Self> {
        let t = Self {
            size_mb: (size_mb > 0.0).then_some(size_mb),
            time_secs: (time_secs > 0.0).then_some(time_secs),
        };
        if t.size_mb.is_none() && t.time_secs.is_none() {
            return Err(DtmError::NoThreshold);
        }
        Ok(t)
    }

    pub fn exceeded_by(&self, m: &Measurement) -> bool {
        let size = self.size_mb.is_some_and(|limit| m.size_mb() > limit);
        let time = self
            .time_secs
            .is_some_and(|limit| m.build_time.as_secs_f64() > limit);
        size || time
    }
}

/// What one probe said about its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The build failed; says nothing about the threshold.
    Inconclusive,
    Within,
    Exceeds,
}

/// Test oracle driven by [`binary_search`].
#[async_trait]
pub trait Oracle: Send {
    async fn probe(&mut self, index: usize) -> DtmResult<Verdict>;
}

/// Where the search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Earliest index observed to exceed the threshold.
    pub first_bad: Option<usize>,
    pub probes: usize,
}

/// Closed-range binary search over `0..len`.
///
/// Inconclusive probes move the lower bound up without recording a
/// candidate, so a failed build is never reported as the regression point.
pub async fn binary_search(len: usize, oracle: &mut dyn Oracle) -> DtmResult<SearchOutcome> {
    let mut low: isize = 0;
    let mut high: isize = len as isize - 1;
    let mut first_bad = None;
    let mut probes = 0;

    while low <= high {
        let mid = low + (high - low) / 2;
        probes += 1;
        match oracle.probe(mid as usize).await? {
            Verdict::Inconclusive => low = mid + 1,
            Verdict::Exceeds => {
                first_bad = Some(mid as usize);
                high = mid - 1;
            }
            Verdict::Within => low = mid + 1,
        }
    }

    Ok(SearchOutcome { first_bad, probes })
}

/// The located regression point.
#[derive(Debug, Clone, Serialize)]
pub struct Regression {
    pub point: HistoricalPoint,
    pub size: u64,
    pub size_mb: f64,
    pub build_time_seconds: f64,
}

/// Result of a bisect run.
#[derive(Debug, Clone, Serialize)]
pub struct BisectReport {
    pub regression: Regression,
    pub probes: usize,
    pub range_len: usize,
    #[serde(skip)]
    pub original_state: Option<WorktreeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_warning: Option<String>,
}

/// Bisector endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Range {
    /// Known-good end; defaults to the oldest commit touching the build file.
    pub good: Option<String>,
    /// Known-bad end; defaults to HEAD.
    pub bad: Option<String>,
}

/// Materialize the range oldest → newest.
///
/// Walks ancestry from the bad end (restricted to `path_filter`) until the
/// good end is reached; the good end must appear in that walk.
pub async fn materialize_range(
    vcs: &dyn Vcs,
    range: &Range,
    path_filter: Option<&Path>,
    cancel: &CancellationToken,
) -> DtmResult<Vec<HistoricalPoint>> {
    let end = vcs
        .resolve_ref(range.bad.as_deref().unwrap_or("HEAD"), cancel)
        .await
        .map_err(DtmError::from_history)?;

    let walk = vcs
        .enumerate_ancestry(&end, path_filter, cancel)
        .await
        .map_err(DtmError::from_history)?;

    let start = match &range.good {
        Some(good) => vcs
            .resolve_ref(good, cancel)
            .await
            .map_err(DtmError::from_history)?,
        None => walk
            .last()
            .map(|oldest| oldest.id.clone())
            .ok_or_else(|| DtmError::RangeStartNotFound {
                good: "(oldest commit touching the build file)".to_string(),
            })?,
    };

    let mut points = Vec::new();
    let mut found_start = false;
    for point in walk {
        let is_start = point.id == start;
        points.push(point);
        if is_start {
            found_start = true;
            break;
        }
    }
    if !found_start {
        return Err(DtmError::RangeStartNotFound { good: start });
    }

    points.reverse();
    Ok(points)
}

/// Uses the build step as the oracle over a materialized range.
struct BuildOracle<'a> {
    points: &'a [HistoricalPoint],
    step: &'a BuildStep,
    thresholds: Thresholds,
    cancel: &'a CancellationToken,
    progress: Option<&'a ProgressSink>,
    bad: HashMap<usize, BuildResult>,
}

#[async_trait]
impl Oracle for BuildOracle<'_> {
    async fn probe(&mut self, index: usize) -> DtmResult<Verdict> {
        let point = &self.points[index];
        if let Some(sink) = self.progress {
            sink(ProgressEvent {
                current: index + 1,
                total: self.points.len(),
                point: point.short_id().to_string(),
                message: point.message.clone(),
            });
        }

        let result = self.step.build(point, self.cancel).await?;
        let verdict = match result.measurement() {
            None => Verdict::Inconclusive,
            Some(m) if self.thresholds.exceeded_by(m) => Verdict::Exceeds,
            Some(_) => Verdict::Within,
        };
        debug!(
            point = %point.short_id(),
            ?verdict,
            size_mb = result.size_mb(),
            build_secs = result.build_time().as_secs_f64(),
            "probed"
        );
        if verdict == Verdict::Exceeds {
            self.bad.insert(index, result);
        }
        Ok(verdict)
    }
}

pub struct Bisector {
    step: BuildStep,
    thresholds: Thresholds,
    progress: Option<ProgressSink>,
}

impl Bisector {
    pub fn new(step: BuildStep, thresholds: Thresholds) -> Self {
        Self {
            step,
            thresholds,
            progress: None,
        }
    }

    /// Use the `git` and `docker` command line tools.
    pub fn from_config(config: &BisectConfig) -> DtmResult<Self> {
        let thresholds =
            Thresholds::from_raw(config.size_threshold_mb, config.time_threshold_secs)?;
        let step = BuildStep::new(
            Arc::new(GitCli::new(&config.repo_path)),
            Arc::new(DockerCli::new()),
            &config.dockerfile,
            config.policy.clone(),
        );
        Ok(Self::new(step, thresholds))
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Materialize the range and search it, restoring the working tree afterwards.
    pub async fn find_regression(
        &self,
        range: &Range,
        cancel: &CancellationToken,
    ) -> DtmResult<BisectReport> {
        let vcs = self.step.vcs().clone();
        let points =
            materialize_range(vcs.as_ref(), range, Some(self.step.build_file()), cancel).await?;
        if points.len() < 2 {
            return Err(DtmError::RangeTooSmall { len: points.len() });
        }
        info!(commits = points.len(), "bisecting");

        let scope = scoped(vcs, cancel, self.search(&points, cancel)).await?;
        let mut report = scope.value?;
        report.original_state = Some(scope.original);
        report.restore_warning = scope.restore_warning;
        Ok(report)
    }

    /// Search an already materialized oldest → newest range.
    ///
    /// The outer error is fatal; the inner one is the "no regression" outcome,
    /// kept separate so it still goes through working tree restoration.
    async fn search(
        &self,
        points: &[HistoricalPoint],
        cancel: &CancellationToken,
    ) -> DtmResult<DtmResult<BisectReport>> {
        let mut oracle = BuildOracle {
            points,
            step: &self.step,
            thresholds: self.thresholds,
            cancel,
            progress: self.progress.as_ref(),
            bad: HashMap::new(),
        };
        let outcome = binary_search(points.len(), &mut oracle).await?;

        let Some(index) = outcome.first_bad else {
            return Ok(Err(DtmError::NoRegression));
        };
        let Some(result) = oracle.bad.remove(&index) else {
            return Ok(Err(DtmError::NoRegression));
        };
        let build_time: Duration = result.build_time();
        info!(point = %result.point.short_id(), probes = outcome.probes, "regression located");

        Ok(Ok(BisectReport {
            regression: Regression {
                size: result.size(),
                size_mb: result.size() as f64 / BYTES_PER_MB,
                build_time_seconds: build_time.as_secs_f64(),
                point: result.point,
            },
            probes: outcome.probes,
            range_len: points.len(),
            original_state: None,
            restore_warning: None,
        }))
    }
}
