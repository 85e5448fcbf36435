use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Report, Summary};
use crate::diff::Insights;
use crate::error::DtmResult;
use crate::types::BuildResult;

#[derive(Serialize)]
struct JsonResult<'a> {
    commit_hash: &'a str,
    commit_message: &'a str,
    author: &'a str,
    date: DateTime<Utc>,
    image_size: u64,
    size_mb: f64,
    build_time_seconds: f64,
    layer_count: usize,
    size_diff: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a BuildResult> for JsonResult<'a> {
    fn from(r: &'a BuildResult) -> Self {
        Self {
            commit_hash: &r.point.id,
            commit_message: &r.point.message,
            author: &r.point.author,
            date: r.point.date,
            image_size: r.size(),
            size_mb: r.size_mb(),
            build_time_seconds: r.build_time().as_secs_f64(),
            layer_count: r.layer_count(),
            size_diff: r.size_diff,
            error: r.error(),
        }
    }
}

#[derive(Serialize)]
struct JsonLayerCell<'a> {
    commit_hash: &'a str,
    /// Bytes, or -1 when the commit has no such layer.
    size: i64,
}

#[derive(Serialize)]
struct JsonLayerRow<'a> {
    instruction: &'a str,
    sizes: Vec<JsonLayerCell<'a>>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Summary,
    results: Vec<JsonResult<'a>>,
    layers: Vec<JsonLayerRow<'a>>,
    insights: &'a Insights,
}

pub fn write_json(report: &Report<'_>, out: &mut dyn Write) -> DtmResult<()> {
    let doc = JsonReport {
        summary: report.summary,
        results: report.results.iter().map(JsonResult::from).collect(),
        layers: report
            .layers
            .rows
            .iter()
            .map(|row| JsonLayerRow {
                instruction: &row.identity,
                sizes: row
                    .cells
                    .iter()
                    .map(|c| JsonLayerCell {
                        commit_hash: &c.point_id,
                        size: c.raw(),
                    })
                    .collect(),
            })
            .collect(),
        insights: report.insights,
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}
