pub mod analyze;
pub mod bisect;
pub mod compare;

use std::path::PathBuf;

use dtm_core::BuildPolicy;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Command, RepoArgs};

pub async fn dispatch(cli: Cli, cancel: &CancellationToken) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Analyze(args) => analyze::run(args, cancel).await,
        Command::Bisect(args) => bisect::run(args, cancel).await,
        Command::Compare(args) => compare::run(args, cancel).await,
    }
}

/// Flags win over the environment-derived values they shadow.
pub(crate) fn overlay_repo(
    args: &RepoArgs,
    repo_path: &mut PathBuf,
    dockerfile: &mut PathBuf,
    policy: &mut BuildPolicy,
) {
    if let Some(repo) = &args.repo {
        *repo_path = repo.clone();
    }
    if let Some(file) = &args.dockerfile {
        *dockerfile = file.clone();
    }
    if args.no_cache {
        policy.no_cache = true;
    }
}

pub(crate) fn warn_restore(warning: Option<&str>) {
    if let Some(w) = warning {
        tracing::warn!(warning = %w, "working tree was not restored");
        eprintln!("warning: {w}");
    }
}
