use std::io::Write;

use super::Report;
use crate::error::DtmResult;

const HEADER: &str = concat!(
    "commit_hash,date,author,message,",
    "image_size,size_mb,size_diff,build_time_seconds,layer_count,error"
);

/// One row per result. Failed results carry zeros and the error text.
pub fn write_csv(report: &Report<'_>, out: &mut dyn Write) -> DtmResult<()> {
    writeln!(out, "{HEADER}")?;
    for r in report.results {
        writeln!(
            out,
            "{},{},{},{},{},{:.2},{},{:.2},{},{}",
            r.point.id,
            r.point.date.to_rfc3339(),
            quote(&r.point.author),
            quote(&r.point.message),
            r.size(),
            r.size_mb(),
            r.size_diff,
            r.build_time().as_secs_f64(),
            r.layer_count(),
            quote(&r.error().unwrap_or_default()),
        )?;
    }
    Ok(())
}

/// RFC 4180 field quoting.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
