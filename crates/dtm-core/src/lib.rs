//! Historical build-and-compare engine for container images.
//!
//! Rebuilds the image defined by a repository's build file at successive
//! commits, measures every build, and derives:
//!
//! - per-commit size deltas that skip over failed builds
//! - a per-instruction layer table across commits
//! - the largest size increase and decrease
//! - the first commit crossing a size or build-time threshold (bisection)
//!
//! The working tree is checked out at each commit in turn and always put back
//! where it was when the run started.
//!
//! # Quick Start
//!
//! ```no_run
//! use dtm_core::{AnalyzeConfig, Report, ReportFormat, TimeMachine};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AnalyzeConfig::from_env().with_max_commits(10);
//! let analysis = TimeMachine::from_config(config)
//!     .run(&CancellationToken::new())
//!     .await?;
//!
//! let report = Report::from_analysis(&analysis);
//! dtm_core::report::render(&report, ReportFormat::Table, &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Collaborators
//!
//! Version control and image building sit behind the [`Vcs`] and
//! [`ImageBuilder`] traits. [`GitCli`] and [`DockerCli`] drive the `git` and
//! `docker` command line tools.

pub mod bisect;
pub mod build_step;
pub mod compare;
pub mod config;
pub mod diff;
pub mod docker;
pub mod error;
mod exec;
pub mod layers;
pub mod progress;
pub mod report;
pub mod runner;
pub mod selector;
pub mod timemachine;
pub mod types;
pub mod vcs;
pub mod worktree;

pub use bisect::{BisectReport, Bisector, Range, Regression, Thresholds};
pub use build_step::{artifact_tag, BuildStep};
pub use compare::{BranchInfo, Comparer, ComparisonResult};
pub use config::{AnalyzeConfig, BisectConfig, BuildPolicy, CompareConfig};
pub use diff::{compute_size_diffs, find_insights, Insight, Insights};
pub use docker::{BuildRequest, DockerCli, ImageBuilder};
pub use error::{DtmError, DtmResult, StepError};
pub use layers::{build_layer_table, LayerCell, LayerComparisonRow, LayerTable, LAYER_ABSENT};
pub use progress::{stderr_progress_sink, ProgressEvent, ProgressSink};
pub use report::{Report, ReportFormat, Summary};
pub use runner::{RunController, RunOutcome};
pub use selector::{PointSelector, Selection};
pub use timemachine::{Analysis, TimeMachine};
pub use types::{
    BuildOutcome, BuildResult, FailureStage, HistoricalPoint, HistoryEntry, ImageInfo,
    LayerRecord, Measurement, WorktreeState,
};
pub use vcs::{GitCli, Vcs};
pub use worktree::{scoped, Scoped, WorktreeGuard};
