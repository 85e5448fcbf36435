//! Data model shared by the engine, the collaborators and the reports.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the abbreviated point identity shown in logs and reports.
pub const SHORT_ID_LEN: usize = 8;

/// Bytes per MiB, the unit used by thresholds and reports.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One addressable version of the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Full commit hash.
    pub id: String,

    /// Commit subject line.
    pub message: String,

    /// Author name.
    pub author: String,

    /// Authorship timestamp.
    pub date: DateTime<Utc>,
}

impl HistoricalPoint {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Abbreviate a point identity for display.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Where the working tree was before a run started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum WorktreeState {
    /// HEAD attached to a branch.
    Branch(String),
    /// Detached HEAD at a commit.
    Detached(String),
}

impl WorktreeState {
    /// The name to hand back to `checkout` to restore this state.
    pub fn target(&self) -> &str {
        match self {
            Self::Branch(name) | Self::Detached(name) => name,
        }
    }
}

impl std::fmt::Display for WorktreeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "branch {}", name),
            Self::Detached(id) => write!(f, "detached {}", short_id(id)),
        }
    }
}

/// One sized layer of a built image, keyed by its normalized instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Instruction text with shell-wrapper prefixes removed.
    pub identity: String,
    pub size: u64,
}

impl LayerRecord {
    pub fn new(created_by: &str, size: u64) -> Self {
        Self {
            identity: normalize_instruction(created_by),
            size,
        }
    }
}

/// Normalize a raw `created_by` instruction into a layer identity.
///
/// Two layers are "the same" across points when their identities are equal.
/// This is a textual match, not a content hash.
pub fn normalize_instruction(created_by: &str) -> String {
    let cmd = created_by.strip_prefix("/bin/sh -c ").unwrap_or(created_by);
    let cmd = cmd.strip_prefix("#(nop) ").unwrap_or(cmd);
    cmd.trim().to_string()
}

/// Image metadata returned by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageInfo {
    pub total_size: u64,
    pub layer_ids: Vec<String>,
}

/// One entry of an image's layer history, as reported by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub created_by: String,
    pub size: u64,
}

/// What a successful build measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Image size in bytes.
    pub size: u64,

    /// Wall-clock duration of the build call.
    #[serde(with = "duration_secs", rename = "build_time_seconds")]
    pub build_time: Duration,

    pub layer_count: usize,

    /// Per-layer breakdown; empty when history was unavailable.
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
}

impl Measurement {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / BYTES_PER_MB
    }
}

/// Stage of the build step at which a point failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Checkout,
    Build,
    Inspect,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Checkout => "checkout",
            Self::Build => "build",
            Self::Inspect => "inspect",
        };
        f.write_str(s)
    }
}

/// Tagged outcome of one build step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Built(Measurement),
    Failed { stage: FailureStage, message: String },
}

/// Result of examining one historical point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub point: HistoricalPoint,
    pub outcome: BuildOutcome,

    /// Size change in bytes relative to the nearest older successful result.
    /// Filled in by [`compute_size_diffs`](crate::diff::compute_size_diffs).
    #[serde(default)]
    pub size_diff: i64,
}

impl BuildResult {
    pub fn built(point: HistoricalPoint, measurement: Measurement) -> Self {
        Self {
            point,
            outcome: BuildOutcome::Built(measurement),
            size_diff: 0,
        }
    }

    pub fn failed(point: HistoricalPoint, stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            point,
            outcome: BuildOutcome::Failed {
                stage,
                message: message.into(),
            },
            size_diff: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Built(_))
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match &self.outcome {
            BuildOutcome::Built(m) => Some(m),
            BuildOutcome::Failed { .. } => None,
        }
    }

    /// Image size in bytes; zero for failed results.
    pub fn size(&self) -> u64 {
        self.measurement().map_or(0, |m| m.size)
    }

    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / BYTES_PER_MB
    }

    /// Build duration; zero for failed results.
    pub fn build_time(&self) -> Duration {
        self.measurement().map_or(Duration::ZERO, |m| m.build_time)
    }

    /// Layer count; zero for failed results.
    pub fn layer_count(&self) -> usize {
        self.measurement().map_or(0, |m| m.layer_count)
    }

    pub fn layers(&self) -> &[LayerRecord] {
        self.measurement().map_or(&[], |m| m.layers.as_slice())
    }

    /// Error text for failed results, prefixed with the failing stage.
    pub fn error(&self) -> Option<String> {
        match &self.outcome {
            BuildOutcome::Built(_) => None,
            BuildOutcome::Failed { stage, message } => Some(format!("{stage}: {message}")),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
