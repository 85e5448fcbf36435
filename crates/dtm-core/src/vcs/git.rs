//! `Vcs` backed by the `git` command line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Vcs;
use crate::error::StepError;
use crate::exec::{failure_detail, run_command};
use crate::types::{HistoricalPoint, WorktreeState};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%aI%x1f%s%x1e";

/// Git working tree driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            program: "git".to_string(),
        }
    }

    /// Use a specific git binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C").arg(&self.workdir);
        cmd
    }

    async fn rev_parse_commit(
        &self,
        candidate: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, StepError> {
        let mut cmd = self.git();
        cmd.args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("{candidate}^{{commit}}"));
        match run_command(cmd, cancel).await {
            Ok(out) => Ok(Some(out.trim().to_string())),
            Err(StepError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn log(
        &self,
        from: &str,
        max_count: Option<usize>,
        path_filter: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Vec<HistoricalPoint>, StepError> {
        let mut cmd = self.git();
        cmd.args(["log", LOG_FORMAT]);
        if let Some(n) = max_count {
            cmd.arg(format!("--max-count={n}"));
        }
        cmd.arg(from);
        if let Some(path) = path_filter {
            cmd.arg("--").arg(path);
        }
        let out = run_command(cmd, cancel).await.map_err(|e| match e {
            StepError::CommandFailed { .. } => StepError::Malformed {
                what: "history".into(),
                message: failure_detail(&e),
            },
            other => other,
        })?;
        parse_log(&out)
    }
}

#[async_trait]
impl Vcs for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn resolve_ref(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, StepError> {
        let candidates = [
            name.to_string(),
            format!("refs/heads/{name}"),
            format!("refs/tags/{name}"),
        ];
        for candidate in &candidates {
            if let Some(id) = self.rev_parse_commit(candidate, cancel).await? {
                debug!(reference = name, id = %id, "resolved reference");
                return Ok(id);
            }
        }
        Err(StepError::RefNotFound {
            name: name.to_string(),
        })
    }

    async fn enumerate_ancestry(
        &self,
        from: &str,
        path_filter: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Vec<HistoricalPoint>, StepError> {
        self.log(from, None, path_filter, cancel).await
    }

    async fn describe_point(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<HistoricalPoint, StepError> {
        self.log(id, Some(1), None, cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StepError::RefNotFound {
                name: id.to_string(),
            })
    }

    async fn current_state(
        &self,
        cancel: &CancellationToken,
    ) -> Result<WorktreeState, StepError> {
        let mut cmd = self.git();
        cmd.args(["symbolic-ref", "--quiet", "--short", "HEAD"]);
        match run_command(cmd, cancel).await {
            Ok(out) if !out.trim().is_empty() => {
                return Ok(WorktreeState::Branch(out.trim().to_string()))
            }
            Ok(_) | Err(StepError::CommandFailed { .. }) => {}
            Err(e) => return Err(e),
        }

        let mut cmd = self.git();
        cmd.args(["rev-parse", "--verify", "HEAD"]);
        let out = run_command(cmd, cancel).await?;
        Ok(WorktreeState::Detached(out.trim().to_string()))
    }

    async fn checkout(&self, target: &str, cancel: &CancellationToken) -> Result<(), StepError> {
        let mut cmd = self.git();
        // `--` keeps a same-named path from being read as a pathspec.
        cmd.args(["checkout", "--quiet", target, "--"]);
        run_command(cmd, cancel).await.map_err(|e| match e {
            StepError::CommandFailed { .. } => StepError::CheckoutFailed {
                target: target.to_string(),
                message: failure_detail(&e),
            },
            other => other,
        })?;
        Ok(())
    }
}

/// Parse `git log` output produced with [`LOG_FORMAT`].
fn parse_log(out: &str) -> Result<Vec<HistoricalPoint>, StepError> {
    let mut points = Vec::new();
    for record in out.split(RECORD_SEP) {
        let record = record.trim_matches(|c: char| c == '\n' || c == '\r');
        if record.is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.splitn(4, FIELD_SEP).collect();
        let [id, author, date, message] = fields.as_slice() else {
            return Err(StepError::Malformed {
                what: "git log record".into(),
                message: format!("expected 4 fields, got {}", fields.len()),
            });
        };
        let date = DateTime::parse_from_rfc3339(date.trim())
            .map_err(|e| StepError::Malformed {
                what: "commit date".into(),
                message: format!("{date}: {e}"),
            })?
            .with_timezone(&Utc);
        points.push(HistoricalPoint {
            id: id.trim().to_string(),
            message: message.trim().to_string(),
            author: author.to_string(),
            date,
        });
    }
    Ok(points)
}
