use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dtm_core::ReportFormat;

const ANALYZE_EXAMPLES: &str = concat!(
    "Examples:\n",
    "  dtm analyze\n",
    "  dtm analyze --branch develop -n 50\n",
    "  dtm analyze --since 2024-01-01 --until 2024-12-31 --format json -o metrics.json",
);

const BISECT_EXAMPLES: &str = concat!(
    "Examples:\n",
    "  dtm bisect --size-threshold 500\n",
    "  dtm bisect --time-threshold 120 --good v1.0 --bad main",
);

const COMPARE_EXAMPLES: &str = concat!(
    "Examples:\n",
    "  dtm compare --branch-a main --branch-b feature/slim\n",
    "  dtm compare -a v1.0 -b v2.0 --format json",
);

#[derive(Parser, Debug)]
#[command(
    name = "dtm",
    version,
    about = "Docker Time Machine: track how a Docker image evolves across git history"
)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the image at each commit and report size, layer and build time changes
    #[command(after_help = ANALYZE_EXAMPLES)]
    Analyze(AnalyzeArgs),
    /// Find the commit where image size or build time first crossed a threshold
    #[command(after_help = BISECT_EXAMPLES)]
    Bisect(BisectArgs),
    /// Build two branches or tags and compare their images
    #[command(after_help = COMPARE_EXAMPLES)]
    Compare(CompareArgs),
}

/// Repository and build options shared by every command.
///
/// Unset options fall back to `DTM_*` environment variables, then defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct RepoArgs {
    /// Path to git repository [env: DTM_REPO] [default: .]
    #[arg(short = 'r', long = "repo")]
    pub repo: Option<PathBuf>,

    /// Path to Dockerfile relative to repo root [env: DTM_DOCKERFILE] [default: Dockerfile]
    #[arg(short = 'd', long)]
    pub dockerfile: Option<PathBuf>,

    /// Build without layer cache so every commit is measured from scratch [env: DTM_NO_CACHE]
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Output format: table, json, csv, markdown
    #[arg(short = 'f', long, default_value = "table")]
    pub format: ReportFormat,

    /// Maximum commits to analyze, 0 = all [env: DTM_MAX_COMMITS] [default: 20]
    #[arg(short = 'n', long)]
    pub max_commits: Option<usize>,

    /// Branch, tag or commit to analyze (default: current HEAD)
    #[arg(short = 'b', long)]
    pub branch: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Only commits authored on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    /// Only commits authored before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub until: Option<String>,

    /// Log failed builds quietly; they are still listed in the report
    #[arg(long)]
    pub skip_failed: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BisectArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Size threshold in MB (0 = off)
    #[arg(long, default_value_t = 0.0)]
    pub size_threshold: f64,

    /// Build time threshold in seconds (0 = off)
    #[arg(long, default_value_t = 0.0)]
    pub time_threshold: f64,

    /// Known-good commit (default: oldest commit touching the Dockerfile)
    #[arg(long)]
    pub good: Option<String>,

    /// Known-bad commit (default: HEAD)
    #[arg(long)]
    pub bad: Option<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = SummaryFormat::Table)]
    pub format: SummaryFormat,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// First branch or tag
    #[arg(short = 'a', long, default_value = "main")]
    pub branch_a: String,

    /// Second branch or tag
    #[arg(short = 'b', long)]
    pub branch_b: String,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = SummaryFormat::Table)]
    pub format: SummaryFormat,
}

/// Output of single-result commands.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_defaults() {
        let cli = Cli::try_parse_from(["dtm", "analyze"]).unwrap();
        let Command::Analyze(args) = cli.cmd else {
            panic!("expected analyze");
        };
        assert_eq!(args.format, ReportFormat::Table);
        assert_eq!(args.max_commits, None);
        assert!(args.repo.repo.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn analyze_short_flags() {
        let cli = Cli::try_parse_from([
            "dtm", "analyze", "-r", "/src", "-d", "build/Dockerfile", "-f", "markdown", "-n", "5",
            "-b", "develop", "-o", "out.md", "-v",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.cmd else {
            panic!("expected analyze");
        };
        assert_eq!(args.repo.repo, Some(PathBuf::from("/src")));
        assert_eq!(args.repo.dockerfile, Some(PathBuf::from("build/Dockerfile")));
        assert_eq!(args.format, ReportFormat::Markdown);
        assert_eq!(args.max_commits, Some(5));
        assert_eq!(args.branch.as_deref(), Some("develop"));
        assert!(cli.verbose);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["dtm", "analyze", "--format", "chart"]).is_err());
    }

    #[test]
    fn compare_requires_branch_b() {
        let err = Cli::try_parse_from(["dtm", "compare"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["dtm", "compare", "-b", "feature"]).unwrap();
        let Command::Compare(args) = cli.cmd else {
            panic!("expected compare");
        };
        assert_eq!(args.branch_a, "main");
        assert_eq!(args.branch_b, "feature");
        assert_eq!(args.format, SummaryFormat::Table);
    }

    #[test]
    fn bisect_thresholds() {
        let cli = Cli::try_parse_from([
            "dtm",
            "bisect",
            "--size-threshold",
            "500",
            "--good",
            "v1.0",
        ])
        .unwrap();
        let Command::Bisect(args) = cli.cmd else {
            panic!("expected bisect");
        };
        assert_eq!(args.size_threshold, 500.0);
        assert_eq!(args.time_threshold, 0.0);
        assert_eq!(args.good.as_deref(), Some("v1.0"));
        assert_eq!(args.bad, None);
    }
}
