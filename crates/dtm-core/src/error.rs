//! Error types for the build-and-compare engine.

/// Failure reported by a collaborator (version control or image builder).
///
/// These never abort a run on their own: the build step folds them into the
/// per-point [`BuildResult`](crate::types::BuildResult). Only the run-level
/// callers decide which of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// Reference could not be resolved to a commit.
    #[error("reference not found: {name}")]
    RefNotFound { name: String },

    /// Working tree could not be moved to the requested point.
    #[error("checkout of {target} failed: {message}")]
    CheckoutFailed { target: String, message: String },

    /// Working tree could not be moved back to the pre-run state.
    #[error("restore to {target} failed: {message}")]
    RestoreFailed { target: String, message: String },

    /// Image build exited unsuccessfully.
    #[error("build failed: {message}")]
    BuildFailed { message: String },

    /// Built image could not be inspected.
    #[error("inspect failed: {message}")]
    InspectFailed { message: String },

    /// Layer history is unavailable for an image.
    #[error("history unavailable: {message}")]
    HistoryUnavailable { message: String },

    /// Image could not be removed.
    #[error("remove of {tag} failed: {message}")]
    RemoveFailed { tag: String, message: String },

    /// External program could not be started.
    #[error("failed to start `{program}`: {message}")]
    Spawn { program: String, message: String },

    /// External program exited with a non-zero status.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Collaborator output could not be parsed.
    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },

    /// Cancellation was requested while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl StepError {
    /// Whether the error was caused by a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Run-level errors. Any of these aborts the operation with no partial results.
#[derive(Debug, thiserror::Error)]
pub enum DtmError {
    /// Reference resolution failed.
    #[error("reference not found: {name}")]
    RefNotFound { name: String },

    /// Pre-run working tree state could not be read.
    #[error("cannot read working tree state: {message}")]
    StateUnavailable { message: String },

    /// History could not be enumerated.
    #[error("cannot enumerate history: {message}")]
    History { message: String },

    /// Date bound could not be parsed.
    #[error("invalid date {value:?}: expected YYYY-MM-DD or RFC 3339")]
    InvalidDate { value: String },

    /// The good end of a bisect range is not an ancestor of the bad end.
    #[error("start commit {good} not found in history")]
    RangeStartNotFound { good: String },

    /// Bisect range has fewer than two points.
    #[error("need at least 2 commits to bisect, found {len}")]
    RangeTooSmall { len: usize },

    /// Bisect was asked to run without a size or time threshold.
    #[error("no threshold configured: set a size or build time threshold")]
    NoThreshold,

    /// Bisect finished without any probe exceeding the threshold.
    #[error("no regression found in the commit range")]
    NoRegression,

    /// A comparison side could not be built.
    #[error("build of {reference} failed: {message}")]
    Build { reference: String, message: String },

    /// Cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,

    /// Report could not be rendered.
    #[error("report error: {message}")]
    Report { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DtmError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Input / configuration issues
            Self::RefNotFound { .. } => 2,
            Self::InvalidDate { .. } => 2,
            Self::NoThreshold => 2,
            Self::RangeStartNotFound { .. } => 2,
            Self::RangeTooSmall { .. } => 2,

            // Environment issues
            Self::StateUnavailable { .. } => 3,
            Self::History { .. } => 3,
            Self::Io(_) => 3,
            Self::Report { .. } => 3,

            // Outcome
            Self::NoRegression => 1,
            Self::Build { .. } => 1,

            Self::Cancelled => 130,
        }
    }

    /// Lift a collaborator failure that happened outside any per-point step.
    pub(crate) fn from_history(err: StepError) -> Self {
        match err {
            StepError::Cancelled => Self::Cancelled,
            StepError::RefNotFound { name } => Self::RefNotFound { name },
            other => Self::History {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for DtmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Report {
            message: err.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type DtmResult<T> = Result<T, DtmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_lift_keeps_ref_and_cancel() {
        let err = DtmError::from_history(StepError::RefNotFound {
            name: "nope".into(),
        });
        assert!(matches!(err, DtmError::RefNotFound { ref name } if name == "nope"));

        let err = DtmError::from_history(StepError::Cancelled);
        assert!(matches!(err, DtmError::Cancelled));

        let err = DtmError::from_history(StepError::Spawn {
            program: "git".into(),
            message: "not found".into(),
        });
        assert!(matches!(err, DtmError::History { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
