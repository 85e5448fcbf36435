use dtm_core::{BranchInfo, CompareConfig, Comparer, ComparisonResult};
use tokio_util::sync::CancellationToken;

use super::{overlay_repo, warn_restore};
use crate::cli::args::{CompareArgs, SummaryFormat};
use crate::exit_codes;

pub async fn run(args: CompareArgs, cancel: &CancellationToken) -> anyhow::Result<i32> {
    let mut config = CompareConfig::from_env();
    overlay_repo(
        &args.repo,
        &mut config.repo_path,
        &mut config.dockerfile,
        &mut config.policy,
    );

    eprintln!("Comparing branches: {} vs {}", args.branch_a, args.branch_b);
    let result = Comparer::from_config(&config)
        .compare(&args.branch_a, &args.branch_b, cancel)
        .await?;
    warn_restore(result.restore_warning.as_deref());

    match args.format {
        SummaryFormat::Table => print!("{}", render_text(&result)),
        SummaryFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(exit_codes::EXIT_SUCCESS)
}

fn branch_block(label: &str, info: &BranchInfo) -> String {
    format!(
        "{label}: {} ({})\n  Size: {:.2} MB\n  Layers: {}\n  Build time: {:.2}s\n",
        info.name, info.commit, info.size_mb, info.layers, info.build_time
    )
}

fn render_text(result: &ComparisonResult) -> String {
    let mut out = String::new();
    out.push_str(&branch_block("Branch A", &result.branch_a));
    out.push('\n');
    out.push_str(&branch_block("Branch B", &result.branch_b));
    out.push('\n');
    out.push_str("Differences (B - A):\n");
    out.push_str(&format!(
        "  Size: {:+.2} MB ({:+.1}%)\n",
        result.size_diff, result.size_diff_percent
    ));
    out.push_str(&format!("  Layers: {:+}\n", result.layers_diff));
    out.push_str(&format!(
        "  Build time: {:+.2}s ({:+.1}%)\n",
        result.build_time_diff, result.build_time_diff_percent
    ));
    out
}
