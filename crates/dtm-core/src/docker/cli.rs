//! `ImageBuilder` backed by the `docker` command line.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BuildRequest, ImageBuilder};
use crate::error::StepError;
use crate::exec::{failure_detail, run_command};
use crate::types::{HistoryEntry, ImageInfo};

/// Docker daemon driven through the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }

    /// Use a specific docker-compatible binary (e.g. `podman`).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn docker(&self) -> Command {
        Command::new(&self.program)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectDoc {
    size: u64,
    #[serde(default, rename = "RootFS")]
    root_fs: Option<RootFs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RootFs {
    #[serde(default)]
    layers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoryLine {
    #[serde(default)]
    created_by: String,
    size: serde_json::Value,
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let mut cmd = self.docker();
        cmd.arg("build")
            .arg("-f")
            .arg(request.context.join(&request.build_file))
            .arg("-t")
            .arg(&request.tag);
        if request.no_cache {
            cmd.arg("--no-cache");
        }
        cmd.arg(&request.context);

        debug!(tag = %request.tag, no_cache = request.no_cache, "docker build");
        run_command(cmd, cancel).await.map_err(|e| match e {
            StepError::CommandFailed { .. } => StepError::BuildFailed {
                message: failure_detail(&e),
            },
            other => other,
        })?;
        Ok(())
    }

    async fn inspect(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<ImageInfo, StepError> {
        let mut cmd = self.docker();
        cmd.args(["image", "inspect", "--format", "{{json .}}", tag]);
        let out = run_command(cmd, cancel).await.map_err(|e| match e {
            StepError::CommandFailed { .. } => StepError::InspectFailed {
                message: failure_detail(&e),
            },
            other => other,
        })?;
        parse_inspect(&out)
    }

    async fn history(
        &self,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<HistoryEntry>, StepError> {
        let mut cmd = self.docker();
        cmd.args([
            "history",
            "--no-trunc",
            "--human=false",
            "--format",
            "{{json .}}",
            tag,
        ]);
        let out = run_command(cmd, cancel).await.map_err(|e| match e {
            StepError::CommandFailed { .. } => StepError::HistoryUnavailable {
                message: failure_detail(&e),
            },
            other => other,
        })?;
        parse_history(&out)
    }

    async fn remove(&self, tag: &str, cancel: &CancellationToken) -> Result<(), StepError> {
        let mut cmd = self.docker();
        cmd.args(["rmi", "--force", tag]);
        run_command(cmd, cancel).await.map_err(|e| match e {
            StepError::CommandFailed { .. } => StepError::RemoveFailed {
                tag: tag.to_string(),
                message: failure_detail(&e),
            },
            other => other,
        })?;
        Ok(())
    }
}

fn parse_inspect(out: &str) -> Result<ImageInfo, StepError> {
    let doc: InspectDoc =
        serde_json::from_str(out.trim()).map_err(|e| StepError::InspectFailed {
            message: format!("unreadable inspect output: {e}"),
        })?;
    Ok(ImageInfo {
        total_size: doc.size,
        layer_ids: doc.root_fs.map(|r| r.layers).unwrap_or_default(),
    })
}

/// Parse `docker history` JSON lines. Docker lists the newest layer first;
/// the result is returned base layer first.
fn parse_history(out: &str) -> Result<Vec<HistoryEntry>, StepError> {
    let mut entries = Vec::new();
    for line in out.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: HistoryLine =
            serde_json::from_str(line).map_err(|e| StepError::HistoryUnavailable {
                message: format!("unreadable history line: {e}"),
            })?;
        let size = match &parsed.size {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => parse_size(s),
            _ => None,
        }
        .ok_or_else(|| StepError::HistoryUnavailable {
            message: format!("unreadable layer size: {}", parsed.size),
        })?;
        entries.push(HistoryEntry {
            created_by: parsed.created_by,
            size,
        });
    }
    entries.reverse();
    Ok(entries)
}

/// Parse a byte count as printed by docker: either raw bytes (`"1234"`) or a
/// decimal-unit size (`"77.8MB"`, `"0B"`, `"1.2kB"`).
fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.trim().parse().ok()?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        _ => return None,
    };
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}
