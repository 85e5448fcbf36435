//! Point selection: which commits a run examines, in ancestry order.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DtmError, DtmResult};
use crate::types::HistoricalPoint;
use crate::vcs::Vcs;

/// Selection criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Branch, tag or commit. `None` (or empty) walks from HEAD.
    pub reference: Option<String>,
    /// Inclusive lower bound on authorship time.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on authorship time.
    pub until: Option<DateTime<Utc>>,
    /// Cap on retained points after date filtering; `0` means unlimited.
    pub max_count: usize,
    /// Only commits touching this path.
    pub path_filter: Option<PathBuf>,
}

pub struct PointSelector {
    vcs: Arc<dyn Vcs>,
}

impl PointSelector {
    pub fn new(vcs: Arc<dyn Vcs>) -> Self {
        Self { vcs }
    }

    /// Resolve the reference and enumerate, filter, de-duplicate and cap its ancestry.
    ///
    /// Order is whatever the version-control collaborator walks; it is not re-sorted by date.
    pub async fn select(
        &self,
        selection: &Selection,
        cancel: &CancellationToken,
    ) -> DtmResult<Vec<HistoricalPoint>> {
        let reference = selection
            .reference
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("HEAD");

        let from = self
            .vcs
            .resolve_ref(reference, cancel)
            .await
            .map_err(DtmError::from_history)?;

        let points = self
            .vcs
            .enumerate_ancestry(&from, selection.path_filter.as_deref(), cancel)
            .await
            .map_err(DtmError::from_history)?;
        let walked = points.len();

        let selected = filter_points(points, selection);
        debug!(reference, walked, selected = selected.len(), "selected points");
        Ok(selected)
    }
}

/// Apply date bounds, identity de-duplication and the count cap, in that order.
pub fn filter_points(points: Vec<HistoricalPoint>, selection: &Selection) -> Vec<HistoricalPoint> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for point in points {
        if selection.since.is_some_and(|since| point.date < since) {
            continue;
        }
        if selection.until.is_some_and(|until| point.date >= until) {
            continue;
        }
        if !seen.insert(point.id.clone()) {
            continue;
        }
        out.push(point);
        if selection.max_count > 0 && out.len() >= selection.max_count {
            break;
        }
    }
    out
}

/// Parse a date bound: `YYYY-MM-DD` (UTC midnight) or RFC 3339.
pub fn parse_date_bound(value: &str) -> DtmResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| DtmError::InvalidDate {
            value: value.to_string(),
        })
}

/// Parse an optional date bound.
pub fn parse_optional_bound(value: Option<&str>) -> DtmResult<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(parse_date_bound)
        .transpose()
}
