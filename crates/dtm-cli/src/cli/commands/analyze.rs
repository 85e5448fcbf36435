use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use dtm_core::report::render;
use dtm_core::{stderr_progress_sink, AnalyzeConfig, Report, TimeMachine};
use tokio_util::sync::CancellationToken;

use super::{overlay_repo, warn_restore};
use crate::cli::args::AnalyzeArgs;
use crate::exit_codes;

pub async fn run(args: AnalyzeArgs, cancel: &CancellationToken) -> anyhow::Result<i32> {
    let config = config_from(&args, AnalyzeConfig::from_env());
    eprintln!("Analyzing repository: {}", config.repo_path.display());
    eprintln!("Dockerfile: {}", config.dockerfile.display());

    let analysis = TimeMachine::from_config(config)
        .with_progress(stderr_progress_sink())
        .run(cancel)
        .await?;
    warn_restore(analysis.restore_warning.as_deref());

    let report = Report::from_analysis(&analysis);
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            render(&report, args.format, &mut out)?;
            out.flush()?;
            eprintln!("Report saved to: {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            render(&report, args.format, &mut out)?;
            out.flush()?;
        }
    }
    Ok(exit_codes::EXIT_SUCCESS)
}

fn config_from(args: &AnalyzeArgs, mut config: AnalyzeConfig) -> AnalyzeConfig {
    overlay_repo(
        &args.repo,
        &mut config.repo_path,
        &mut config.dockerfile,
        &mut config.policy,
    );
    if let Some(reference) = &args.branch {
        config = config.with_reference(reference.clone());
    }
    if let Some(max) = args.max_commits {
        config = config.with_max_commits(max);
    }
    config
        .with_date_range(args.since.clone(), args.until.clone())
        .with_skip_failed(args.skip_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(argv: &[&str]) -> AnalyzeArgs {
        match Cli::try_parse_from(argv).unwrap().cmd {
            Command::Analyze(args) => args,
            other => panic!("expected analyze, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_environment_values() {
        let base = AnalyzeConfig::default()
            .with_repo_path("/from/env")
            .with_max_commits(7);
        let args = parse(&[
            "dtm", "analyze", "-r", "/from/flag", "-n", "3", "--no-cache", "-b", "develop",
        ]);

        let config = config_from(&args, base);

        assert_eq!(config.repo_path, PathBuf::from("/from/flag"));
        assert_eq!(config.dockerfile, PathBuf::from("Dockerfile"));
        assert_eq!(config.max_commits, 3);
        assert_eq!(config.reference.as_deref(), Some("develop"));
        assert!(config.policy.no_cache);
    }

    #[test]
    fn unset_flags_keep_environment_values() {
        let base = AnalyzeConfig::default()
            .with_repo_path("/from/env")
            .with_max_commits(7);
        let args = parse(&["dtm", "analyze", "--since", "2024-01-01"]);

        let config = config_from(&args, base);

        assert_eq!(config.repo_path, PathBuf::from("/from/env"));
        assert_eq!(config.max_commits, 7);
        assert_eq!(config.since.as_deref(), Some("2024-01-01"));
        assert_eq!(config.until, None);
        assert!(!config.policy.no_cache);
    }
}
