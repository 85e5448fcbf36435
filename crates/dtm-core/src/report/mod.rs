//! Report rendering for analysis runs.

pub mod csv;
pub mod json;
pub mod markdown;
pub mod table;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Serialize;

use crate::diff::Insights;
use crate::error::{DtmError, DtmResult};
use crate::layers::LayerTable;
use crate::timemachine::Analysis;
use crate::types::{BuildResult, BYTES_PER_MB};

/// Output format of an analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [Self::Table, Self::Json, Self::Csv, Self::Markdown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = DtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(DtmError::Report {
                message: format!(
                    "unknown format {other:?} (expected one of: table, json, csv, markdown)"
                ),
            }),
        }
    }
}

/// Headline numbers over the successful results of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub analyzed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Oldest successful build, MiB.
    pub first_size_mb: Option<f64>,
    /// Newest successful build, MiB.
    pub last_size_mb: Option<f64>,
    pub total_change_mb: Option<f64>,
    pub average_build_seconds: Option<f64>,
}

impl Summary {
    /// `results` is newest first.
    pub fn of(results: &[BuildResult]) -> Self {
        let ok: Vec<&BuildResult> = results.iter().filter(|r| r.is_success()).collect();
        let last = ok.first().map(|r| r.size_mb());
        let first = ok.last().map(|r| r.size_mb());
        let average = (!ok.is_empty()).then(|| {
            ok.iter().map(|r| r.build_time().as_secs_f64()).sum::<f64>() / ok.len() as f64
        });
        Self {
            analyzed: results.len(),
            succeeded: ok.len(),
            failed: results.len() - ok.len(),
            first_size_mb: first,
            last_size_mb: last,
            total_change_mb: first.zip(last).map(|(f, l)| l - f),
            average_build_seconds: average,
        }
    }
}

/// Everything a renderer needs, borrowed from an [`Analysis`].
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub results: &'a [BuildResult],
    pub layers: &'a LayerTable,
    pub insights: &'a Insights,
    pub summary: Summary,
}

impl<'a> Report<'a> {
    pub fn new(results: &'a [BuildResult], layers: &'a LayerTable, insights: &'a Insights) -> Self {
        Self {
            results,
            layers,
            insights,
            summary: Summary::of(results),
        }
    }

    pub fn from_analysis(analysis: &'a Analysis) -> Self {
        Self::new(&analysis.results, &analysis.layers, &analysis.insights)
    }
}

/// Render `report` in `format` to `out`.
pub fn render(report: &Report<'_>, format: ReportFormat, out: &mut dyn Write) -> DtmResult<()> {
    match format {
        ReportFormat::Table => table::write_table(report, out),
        ReportFormat::Json => json::write_json(report, out),
        ReportFormat::Csv => csv::write_csv(report, out),
        ReportFormat::Markdown => markdown::write_markdown(report, out),
    }
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Signed MiB with explicit sign, e.g. `+12.30`.
pub(crate) fn signed_mb(bytes: i64) -> String {
    format!("{:+.2}", bytes as f64 / BYTES_PER_MB)
}

/// Layer cell for display: MiB, or `-` when absent.
pub(crate) fn layer_cell(raw: i64) -> String {
    if raw < 0 {
        "-".to_string()
    } else {
        format!("{:.2}", raw as f64 / BYTES_PER_MB)
    }
}
