//! Size deltas between successive successful builds, and the bloat /
//! optimization summary derived from them.

use serde::{Deserialize, Serialize};

use crate::types::{BuildResult, BYTES_PER_MB};

/// Fill `size_diff` for every successful result.
///
/// `results` is newest first. Each successful result is compared with the
/// nearest successful result after it (the next older one); failed results
/// are skipped and keep a zero delta, as does the oldest successful result.
pub fn compute_size_diffs(results: &mut [BuildResult]) {
    for i in 0..results.len() {
        if !results[i].is_success() {
            results[i].size_diff = 0;
            continue;
        }
        let older = results[i + 1..]
            .iter()
            .find(|r| r.is_success())
            .map(BuildResult::size);
        results[i].size_diff = match older {
            Some(older) => results[i].size() as i64 - older as i64,
            None => 0,
        };
    }
}

/// One summary fact: a point and its size delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub point_id: String,
    pub message: String,
    /// Signed delta in bytes.
    pub size_diff: i64,
}

impl Insight {
    fn from_result(r: &BuildResult) -> Self {
        Self {
            point_id: r.point.id.clone(),
            message: r.point.message.clone(),
            size_diff: r.size_diff,
        }
    }

    /// Absolute delta in MiB.
    pub fn size_diff_mb(&self) -> f64 {
        self.size_diff.unsigned_abs() as f64 / BYTES_PER_MB
    }
}

/// Largest increase and largest decrease across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloat: Option<Insight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<Insight>,
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        self.bloat.is_none() && self.optimization.is_none()
    }
}

/// Find the largest positive and largest negative delta. Ties go to the
/// first occurrence. Fewer than two successful results yield no facts.
pub fn find_insights(results: &[BuildResult]) -> Insights {
    let successful = results.iter().filter(|r| r.is_success()).count();
    if successful < 2 {
        return Insights::default();
    }

    let mut bloat: Option<&BuildResult> = None;
    let mut optimization: Option<&BuildResult> = None;
    for r in results.iter().filter(|r| r.is_success()) {
        if r.size_diff > bloat.map_or(0, |b| b.size_diff) {
            bloat = Some(r);
        }
        if r.size_diff < optimization.map_or(0, |o| o.size_diff) {
            optimization = Some(r);
        }
    }

    Insights {
        bloat: bloat.map(Insight::from_result),
        optimization: optimization.map(Insight::from_result),
    }
}
