//! Full history analysis: select → build each point → diff → layer table → insights.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::build_step::BuildStep;
use crate::config::AnalyzeConfig;
use crate::diff::{compute_size_diffs, find_insights, Insights};
use crate::docker::{DockerCli, ImageBuilder};
use crate::error::DtmResult;
use crate::layers::{build_layer_table, LayerTable};
use crate::progress::ProgressSink;
use crate::runner::RunController;
use crate::selector::{parse_optional_bound, PointSelector, Selection};
use crate::types::{BuildResult, WorktreeState};
use crate::vcs::{GitCli, Vcs};

/// Everything an analysis run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// One result per selected point, in selection order (newest first).
    pub results: Vec<BuildResult>,
    pub layers: LayerTable,
    pub insights: Insights,
    #[serde(skip)]
    pub original_state: Option<WorktreeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_warning: Option<String>,
}

pub struct TimeMachine {
    config: AnalyzeConfig,
    vcs: Arc<dyn Vcs>,
    builder: Arc<dyn ImageBuilder>,
    progress: Option<ProgressSink>,
}

impl TimeMachine {
    pub fn new(config: AnalyzeConfig, vcs: Arc<dyn Vcs>, builder: Arc<dyn ImageBuilder>) -> Self {
        Self {
            config,
            vcs,
            builder,
            progress: None,
        }
    }

    /// Use the `git` and `docker` command line tools.
    pub fn from_config(config: AnalyzeConfig) -> Self {
        let vcs = Arc::new(GitCli::new(&config.repo_path));
        Self::new(config, vcs, Arc::new(DockerCli::new()))
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    pub async fn run(&self, cancel: &CancellationToken) -> DtmResult<Analysis> {
        let selection = Selection {
            reference: self.config.reference.clone(),
            since: parse_optional_bound(self.config.since.as_deref())?,
            until: parse_optional_bound(self.config.until.as_deref())?,
            max_count: self.config.max_commits,
            path_filter: None,
        };

        let points = PointSelector::new(self.vcs.clone())
            .select(&selection, cancel)
            .await?;
        info!(commits = points.len(), "analyzing");

        let step = BuildStep::new(
            self.vcs.clone(),
            self.builder.clone(),
            &self.config.dockerfile,
            self.config.policy.clone(),
        );
        let mut controller = RunController::new(step);
        if let Some(sink) = &self.progress {
            controller = controller.with_progress(sink.clone());
        }
        let outcome = controller
            .run(&points, self.config.skip_failed, cancel)
            .await?;

        let mut results = outcome.results;
        compute_size_diffs(&mut results);
        let layers = build_layer_table(&results);
        let insights = find_insights(&results);

        Ok(Analysis {
            results,
            layers,
            insights,
            original_state: Some(outcome.original_state),
            restore_warning: outcome.restore_warning,
        })
    }
}
