//! Process exit codes. Part of the CLI contract.

pub const EXIT_SUCCESS: i32 = 0;
/// Bisect found no regression, or a compared ref failed to build.
pub const EXIT_FAILURE: i32 = 1;
/// Bad arguments: unknown ref, invalid date, missing threshold.
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Repository or tooling problem: not a git repo, unreadable history, I/O.
pub const EXIT_ENVIRONMENT_ERROR: i32 = 3;
/// Interrupted (Ctrl-C).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for an error that escaped a command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<dtm_core::DtmError>() {
        Some(e) => e.exit_code(),
        None if err.downcast_ref::<std::io::Error>().is_some() => EXIT_ENVIRONMENT_ERROR,
        None => EXIT_CONFIG_ERROR,
    }
}
