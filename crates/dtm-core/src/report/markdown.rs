use std::io::Write;

use super::{layer_cell, signed_mb, Report};
use crate::error::DtmResult;
use crate::progress::truncate;
use crate::types::short_id;

pub fn write_markdown(report: &Report<'_>, out: &mut dyn Write) -> DtmResult<()> {
    let s = &report.summary;
    writeln!(out, "# Docker Image Evolution Report")?;
    writeln!(out)?;
    writeln!(out, "## Summary")?;
    writeln!(out)?;
    writeln!(out, "- **Commits analyzed:** {}", s.analyzed)?;
    writeln!(out, "- **Successful builds:** {}", s.succeeded)?;
    writeln!(out, "- **Failed builds:** {}", s.failed)?;
    if let (Some(first), Some(last), Some(change)) =
        (s.first_size_mb, s.last_size_mb, s.total_change_mb)
    {
        writeln!(out, "- **Initial size:** {first:.2} MB")?;
        writeln!(out, "- **Final size:** {last:.2} MB")?;
        writeln!(out, "- **Total change:** {change:+.2} MB")?;
    }
    if let Some(avg) = s.average_build_seconds {
        writeln!(out, "- **Average build time:** {avg:.1} s")?;
    }

    writeln!(out)?;
    writeln!(out, "## Builds")?;
    writeln!(out)?;
    writeln!(
        out,
        "| Commit | Date | Size (MB) | Diff (MB) | Layers | Build (s) | Message |"
    )?;
    writeln!(out, "|---|---|---:|---:|---:|---:|---|")?;
    for r in report.results {
        let message = escape(&truncate(&r.point.message, 60));
        let date = r.point.date.format("%Y-%m-%d");
        match r.error() {
            None => writeln!(
                out,
                "| `{}` | {} | {:.2} | {} | {} | {:.1} | {} |",
                r.point.short_id(),
                date,
                r.size_mb(),
                signed_mb(r.size_diff),
                r.layer_count(),
                r.build_time().as_secs_f64(),
                message
            )?,
            Some(error) => writeln!(
                out,
                "| `{}` | {} | - | - | - | - | {} **(failed: {})** |",
                r.point.short_id(),
                date,
                message,
                escape(&error)
            )?,
        }
    }

    if !report.insights.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Insights")?;
        writeln!(out)?;
        if let Some(b) = &report.insights.bloat {
            writeln!(
                out,
                "- **Largest increase:** +{:.2} MB in `{}` ({})",
                b.size_diff_mb(),
                short_id(&b.point_id),
                escape(&b.message)
            )?;
        }
        if let Some(o) = &report.insights.optimization {
            writeln!(
                out,
                "- **Largest decrease:** -{:.2} MB in `{}` ({})",
                o.size_diff_mb(),
                short_id(&o.point_id),
                escape(&o.message)
            )?;
        }
    }

    if !report.layers.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Layers")?;
        writeln!(out)?;
        write!(out, "| Instruction |")?;
        for id in &report.layers.points {
            write!(out, " `{}` |", short_id(id))?;
        }
        writeln!(out)?;
        write!(out, "|---|")?;
        for _ in &report.layers.points {
            write!(out, "---:|")?;
        }
        writeln!(out)?;
        for row in &report.layers.rows {
            write!(out, "| `{}` |", escape(&truncate(&row.identity, 80)))?;
            for cell in &row.cells {
                write!(out, " {} |", layer_cell(cell.raw()))?;
            }
            writeln!(out)?;
        }
    }

    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
