//! Cancellable execution of external programs.

use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StepError;

/// Number of trailing stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Run `cmd` to completion and return its stdout.
///
/// The child is killed if `cancel` fires first. A non-zero exit status maps to
/// [`StepError::CommandFailed`] carrying the tail of stderr.
pub(crate) async fn run_command(
    mut cmd: Command,
    cancel: &CancellationToken,
) -> Result<String, StepError> {
    let command_line = describe(&cmd);
    if cancel.is_cancelled() {
        return Err(StepError::Cancelled);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = %command_line, "spawning");
    let child = cmd.spawn().map_err(|e| StepError::Spawn {
        program: program_name(&cmd),
        message: e.to_string(),
    })?;

    let output = tokio::select! {
        out = child.wait_with_output() => out.map_err(|e| StepError::Spawn {
            program: program_name(&cmd),
            message: e.to_string(),
        })?,
        _ = cancel.cancelled() => {
            debug!(command = %command_line, "cancelled, killing child");
            return Err(StepError::Cancelled);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StepError::CommandFailed {
            command: command_line,
            status: output.status.to_string(),
            stderr: tail_lines(&stderr, STDERR_TAIL_LINES),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Message text of a failed command, without the command line itself.
pub(crate) fn failure_detail(err: &StepError) -> String {
    match err {
        StepError::CommandFailed { status, stderr, .. } if stderr.is_empty() => status.clone(),
        StepError::CommandFailed { stderr, .. } => stderr.clone(),
        other => other.to_string(),
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

fn describe(cmd: &Command) -> String {
    let std = cmd.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().into_owned()];
    parts.extend(std.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn tail_lines(text: &str, max: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines_keeps_last_non_empty() {
        let text = "a\n\nb\nc\n\n";
        assert_eq!(tail_lines(text, 2), "b\nc");
        assert_eq!(tail_lines(text, 10), "a\nb\nc");
        assert_eq!(tail_lines("", 3), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_success_and_failure() {
        let cancel = CancellationToken::new();

        let mut ok = Command::new("sh");
        ok.args(["-c", "echo hello"]);
        assert_eq!(run_command(ok, &cancel).await.unwrap().trim(), "hello");

        let mut bad = Command::new("sh");
        bad.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_command(bad, &cancel).await.unwrap_err();
        match &err {
            StepError::CommandFailed {
                command, stderr, ..
            } => {
                assert_eq!(command, "sh -c echo boom >&2; exit 3");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(failure_detail(&err), "boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_honours_cancellation() {
        let cancel = CancellationToken::new();
        let mut slow = Command::new("sh");
        slow.args(["-c", "sleep 30"]);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = run_command(slow, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cancel = CancellationToken::new();
        let cmd = Command::new("dtm-definitely-not-a-real-program");
        let err = run_command(cmd, &cancel).await.unwrap_err();
        assert!(matches!(err, StepError::Spawn { .. }));
    }
}
