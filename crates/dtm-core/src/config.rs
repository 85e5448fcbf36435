//! Run configuration.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `DTM_REPO` | Repository path (default: `.`) |
//! | `DTM_DOCKERFILE` | Build file relative to the repository root (default: `Dockerfile`) |
//! | `DTM_MAX_COMMITS` | Maximum commits to analyze, `0` = all (default: 20) |
//! | `DTM_NO_CACHE` | Disable builder cache reuse between candidates |
//! | `DTM_TAG_PREFIX` | Repository part of the temporary image tag (default: `dtm-analysis`) |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_repo_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_max_commits() -> usize {
    20
}

fn default_tag_prefix() -> String {
    "dtm-analysis".to_string()
}

/// Make `raw` usable as the repository part of a docker tag.
///
/// Lower-cases it and turns anything outside `[a-z0-9._/-]` into `-`. Falls
/// back to the default prefix when nothing usable is left.
pub fn sanitize_tag_prefix(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '.' | '_' | '/' | '-' => c,
            _ => '-',
        })
        .collect();
    let trimmed = mapped.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if trimmed.is_empty() {
        default_tag_prefix()
    } else {
        trimmed.to_string()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// How each candidate image is built and named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPolicy {
    /// Repository part of the temporary image tag.
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Disable layer cache reuse so every candidate is measured from fresh layers.
    #[serde(default)]
    pub no_cache: bool,
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self {
            tag_prefix: default_tag_prefix(),
            no_cache: false,
        }
    }
}

impl BuildPolicy {
    pub fn from_env() -> Self {
        Self {
            tag_prefix: std::env::var("DTM_TAG_PREFIX")
                .map(|v| sanitize_tag_prefix(&v))
                .unwrap_or_else(|_| default_tag_prefix()),
            no_cache: env_flag("DTM_NO_CACHE").unwrap_or(false),
        }
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }
}

/// Configuration for a history analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    /// Build file relative to the repository root.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,

    /// Branch, tag or commit to walk from. `None` means the current HEAD.
    #[serde(default)]
    pub reference: Option<String>,

    /// Inclusive lower date bound (`YYYY-MM-DD` or RFC 3339).
    #[serde(default)]
    pub since: Option<String>,

    /// Exclusive upper date bound (`YYYY-MM-DD` or RFC 3339).
    #[serde(default)]
    pub until: Option<String>,

    /// Maximum commits to analyze after date filtering; `0` means all.
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,

    /// Log failed builds at debug level instead of warning. Never changes control flow.
    #[serde(default)]
    pub skip_failed: bool,

    #[serde(default)]
    pub policy: BuildPolicy,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            dockerfile: default_dockerfile(),
            reference: None,
            since: None,
            until: None,
            max_commits: default_max_commits(),
            skip_failed: false,
            policy: BuildPolicy::default(),
        }
    }
}

impl AnalyzeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            repo_path: std::env::var("DTM_REPO")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_repo_path()),
            dockerfile: std::env::var("DTM_DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_dockerfile()),
            max_commits: std::env::var("DTM_MAX_COMMITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_commits),
            policy: BuildPolicy::from_env(),
            ..Self::default()
        }
    }

    pub fn with_repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = path.into();
        self
    }

    pub fn with_dockerfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.dockerfile = path.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_max_commits(mut self, max: usize) -> Self {
        self.max_commits = max;
        self
    }

    pub fn with_date_range(mut self, since: Option<String>, until: Option<String>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn with_skip_failed(mut self, skip: bool) -> Self {
        self.skip_failed = skip;
        self
    }

    pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Configuration for a regression bisect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BisectConfig {
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,

    /// Size threshold in MiB; `0` disables it.
    #[serde(default)]
    pub size_threshold_mb: f64,

    /// Build time threshold in seconds; `0` disables it.
    #[serde(default)]
    pub time_threshold_secs: f64,

    /// Known-good end of the range. Defaults to the oldest commit touching the build file.
    #[serde(default)]
    pub good: Option<String>,

    /// Known-bad end of the range. Defaults to HEAD.
    #[serde(default)]
    pub bad: Option<String>,

    #[serde(default)]
    pub policy: BuildPolicy,
}

impl Default for BisectConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            dockerfile: default_dockerfile(),
            size_threshold_mb: 0.0,
            time_threshold_secs: 0.0,
            good: None,
            bad: None,
            policy: BuildPolicy::default(),
        }
    }
}

impl BisectConfig {
    pub fn from_env() -> Self {
        Self {
            repo_path: std::env::var("DTM_REPO")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_repo_path()),
            dockerfile: std::env::var("DTM_DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_dockerfile()),
            policy: BuildPolicy::from_env(),
            ..Self::default()
        }
    }

    pub fn with_size_threshold_mb(mut self, mb: f64) -> Self {
        self.size_threshold_mb = mb;
        self
    }

    pub fn with_time_threshold_secs(mut self, secs: f64) -> Self {
        self.time_threshold_secs = secs;
        self
    }

    pub fn with_range(mut self, good: Option<String>, bad: Option<String>) -> Self {
        self.good = good;
        self.bad = bad;
        self
    }
}

/// Configuration for comparing two references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareConfig {
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,

    #[serde(default)]
    pub policy: BuildPolicy,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            dockerfile: default_dockerfile(),
            policy: BuildPolicy::default(),
        }
    }
}

impl CompareConfig {
    pub fn from_env() -> Self {
        let analyze = AnalyzeConfig::from_env();
        Self {
            repo_path: analyze.repo_path,
            dockerfile: analyze.dockerfile,
            policy: analyze.policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let cfg = AnalyzeConfig::default();
        assert_eq!(cfg.repo_path, PathBuf::from("."));
        assert_eq!(cfg.dockerfile, PathBuf::from("Dockerfile"));
        assert_eq!(cfg.max_commits, 20);
        assert!(!cfg.policy.no_cache);
        assert_eq!(cfg.policy.tag_prefix, "dtm-analysis");
    }

    #[test]
    #[serial]
    fn test_from_env_overrides_defaults() {
        std::env::set_var("DTM_REPO", "/src/app");
        std::env::set_var("DTM_MAX_COMMITS", "5");
        std::env::set_var("DTM_NO_CACHE", "true");
        let cfg = AnalyzeConfig::from_env();
        std::env::remove_var("DTM_REPO");
        std::env::remove_var("DTM_MAX_COMMITS");
        std::env::remove_var("DTM_NO_CACHE");

        assert_eq!(cfg.repo_path, PathBuf::from("/src/app"));
        assert_eq!(cfg.max_commits, 5);
        assert!(cfg.policy.no_cache);
        assert_eq!(cfg.dockerfile, PathBuf::from("Dockerfile"));
    }

    #[test]
    fn test_sanitize_tag_prefix() {
        assert_eq!(sanitize_tag_prefix("dtm-analysis"), "dtm-analysis");
        assert_eq!(sanitize_tag_prefix("MyTeam/DTM"), "myteam/dtm");
        assert_eq!(sanitize_tag_prefix(" ci build:x "), "ci-build-x");
        assert_eq!(sanitize_tag_prefix("--Cache--"), "cache");
        assert_eq!(sanitize_tag_prefix("::"), "dtm-analysis");
        assert_eq!(sanitize_tag_prefix(""), "dtm-analysis");
    }

    #[test]
    #[serial]
    fn test_tag_prefix_from_env_is_sanitized() {
        std::env::set_var("DTM_TAG_PREFIX", "Nightly Builds");
        let policy = BuildPolicy::from_env();
        std::env::remove_var("DTM_TAG_PREFIX");
        assert_eq!(policy.tag_prefix, "nightly-builds");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_unparseable_numbers() {
        std::env::set_var("DTM_MAX_COMMITS", "many");
        let cfg = AnalyzeConfig::from_env();
        std::env::remove_var("DTM_MAX_COMMITS");
        assert_eq!(cfg.max_commits, 20);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let cfg: AnalyzeConfig = serde_json::from_str(r#"{"max_commits": 0}"#).unwrap();
        assert_eq!(cfg.max_commits, 0);
        assert_eq!(cfg.dockerfile, PathBuf::from("Dockerfile"));
    }
}
