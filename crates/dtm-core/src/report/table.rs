use std::io::Write;

use super::{layer_cell, signed_mb, Report};
use crate::diff::Insight;
use crate::error::DtmResult;
use crate::progress::truncate;
use crate::types::short_id;

const MESSAGE_WIDTH: usize = 40;
const INSTRUCTION_WIDTH: usize = 50;

pub fn write_table(report: &Report<'_>, out: &mut dyn Write) -> DtmResult<()> {
    writeln!(out, "Docker Image Evolution")?;
    writeln!(out, "{}", "=".repeat(22))?;
    writeln!(out)?;
    writeln!(
        out,
        "{:<10} {:<10} {:>10} {:>10} {:>7} {:>10}  {}",
        "COMMIT", "DATE", "SIZE (MB)", "DIFF (MB)", "LAYERS", "BUILD (s)", "MESSAGE"
    )?;

    for r in report.results {
        let id = r.point.short_id();
        let date = r.point.date.format("%Y-%m-%d");
        let message = truncate(&r.point.message, MESSAGE_WIDTH);
        match r.error() {
            None => writeln!(
                out,
                "{:<10} {:<10} {:>10.2} {:>10} {:>7} {:>10.1}  {}",
                id,
                date,
                r.size_mb(),
                signed_mb(r.size_diff),
                r.layer_count(),
                r.build_time().as_secs_f64(),
                message
            )?,
            Some(error) => writeln!(
                out,
                "{:<10} {:<10} {:>10} {:>10} {:>7} {:>10}  {} (FAILED: {})",
                id,
                date,
                "-",
                "-",
                "-",
                "-",
                message,
                truncate(&error, MESSAGE_WIDTH)
            )?,
        }
    }

    let s = &report.summary;
    writeln!(out)?;
    writeln!(
        out,
        "Analyzed {} commits: {} built, {} failed",
        s.analyzed, s.succeeded, s.failed
    )?;
    if let (Some(first), Some(last), Some(change)) =
        (s.first_size_mb, s.last_size_mb, s.total_change_mb)
    {
        writeln!(
            out,
            "Size: {:.2} MB -> {:.2} MB ({:+.2} MB)",
            first, last, change
        )?;
    }

    if !report.insights.is_empty() {
        writeln!(out)?;
        writeln!(out, "Insights")?;
        if let Some(b) = &report.insights.bloat {
            write_insight(out, "Largest increase", b, '+')?;
        }
        if let Some(o) = &report.insights.optimization {
            write_insight(out, "Largest decrease", o, '-')?;
        }
    }

    if !report.layers.is_empty() {
        writeln!(out)?;
        writeln!(out, "Layer sizes (MB, '-' = not present)")?;
        write!(out, "{:<width$}", "INSTRUCTION", width = INSTRUCTION_WIDTH)?;
        for id in &report.layers.points {
            write!(out, " {:>10}", short_id(id))?;
        }
        writeln!(out)?;
        for row in &report.layers.rows {
            write!(
                out,
                "{:<width$}",
                truncate(&row.identity, INSTRUCTION_WIDTH),
                width = INSTRUCTION_WIDTH
            )?;
            for cell in &row.cells {
                write!(out, " {:>10}", layer_cell(cell.raw()))?;
            }
            writeln!(out)?;
        }
    }

    Ok(())
}

fn write_insight(out: &mut dyn Write, label: &str, insight: &Insight, sign: char) -> DtmResult<()> {
    writeln!(
        out,
        "  {}: {}{:.2} MB at {} ({})",
        label,
        sign,
        insight.size_diff_mb(),
        short_id(&insight.point_id),
        truncate(&insight.message, MESSAGE_WIDTH)
    )?;
    Ok(())
}
