//! Progress reporting for build loops. The controller emits one event before
//! each point is built; the CLI consumes them via a sink.

use std::sync::Arc;

/// One progress update.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// 1-based position of the point about to be built.
    pub current: usize,
    pub total: usize,
    /// Abbreviated identity of the point.
    pub point: String,
    /// Commit subject of the point.
    pub message: String,
}

/// Sink for progress events.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Format a single progress line for display.
#[must_use]
pub fn format_progress_line(ev: &ProgressEvent) -> String {
    format!(
        "[{}/{}] {} {}",
        ev.current,
        ev.total,
        ev.point,
        truncate(&ev.message, 60)
    )
}

/// Returns a sink that prints progress lines to stderr.
pub fn stderr_progress_sink() -> ProgressSink {
    Arc::new(|ev: ProgressEvent| eprintln!("{}", format_progress_line(&ev)))
}

/// Truncate to at most `max` characters, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
