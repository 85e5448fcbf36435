use dtm_core::{stderr_progress_sink, BisectConfig, BisectReport, Bisector, DtmError, Range};
use tokio_util::sync::CancellationToken;

use super::{overlay_repo, warn_restore};
use crate::cli::args::{BisectArgs, SummaryFormat};
use crate::exit_codes;

pub async fn run(args: BisectArgs, cancel: &CancellationToken) -> anyhow::Result<i32> {
    let config = config_from(&args, BisectConfig::from_env());
    let bisector = Bisector::from_config(&config)?.with_progress(stderr_progress_sink());
    let range = Range {
        good: config.good.clone(),
        bad: config.bad.clone(),
    };

    eprintln!("Bisecting {} in {}", config.dockerfile.display(), config.repo_path.display());
    let report = match bisector.find_regression(&range, cancel).await {
        Ok(report) => report,
        Err(DtmError::NoRegression) => {
            println!("No regression found: every commit in the range is within the thresholds");
            return Ok(exit_codes::EXIT_FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    warn_restore(report.restore_warning.as_deref());

    match args.format {
        SummaryFormat::Table => print!("{}", render_text(&report)),
        SummaryFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(exit_codes::EXIT_SUCCESS)
}

fn config_from(args: &BisectArgs, mut config: BisectConfig) -> BisectConfig {
    overlay_repo(
        &args.repo,
        &mut config.repo_path,
        &mut config.dockerfile,
        &mut config.policy,
    );
    config
        .with_size_threshold_mb(args.size_threshold)
        .with_time_threshold_secs(args.time_threshold)
        .with_range(args.good.clone(), args.bad.clone())
}

fn render_text(report: &BisectReport) -> String {
    let r = &report.regression;
    format!(
        concat!(
            "Found regression at commit: {} ({})\n",
            "  Author: {}\n",
            "  Date: {}\n",
            "  Size: {:.2} MB\n",
            "  Build time: {:.1}s\n",
            "  Tested {} of {} commits\n",
        ),
        r.point.short_id(),
        r.point.message,
        r.point.author,
        r.point.date.format("%Y-%m-%d %H:%M"),
        r.size_mb,
        r.build_time_seconds,
        report.probes,
        report.range_len,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dtm_core::{HistoricalPoint, Regression};

    #[test]
    fn text_names_the_regressing_commit() {
        let report = BisectReport {
            regression: Regression {
                point: HistoricalPoint {
                    id: "abcdef0123456789abcdef0123456789abcdef01".into(),
                    message: "Add toolchain".into(),
                    author: "Dev".into(),
                    date: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
                },
                size: 600 * 1024 * 1024,
                size_mb: 600.0,
                build_time_seconds: 12.34,
            },
            probes: 3,
            range_len: 8,
            original_state: None,
            restore_warning: None,
        };

        let text = render_text(&report);

        assert!(text.starts_with("Found regression at commit: abcdef01 (Add toolchain)\n"));
        assert!(text.contains("Date: 2024-03-01 09:30"));
        assert!(text.contains("Size: 600.00 MB"));
        assert!(text.contains("Build time: 12.3s"));
        assert!(text.contains("Tested 3 of 8 commits"));
    }
}
