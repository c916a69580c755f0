//! CLI theme and styling.

use colored::Colorize;

use harbor_core::RuntimeState;
use harbor_runtime::RuntimeStats;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("{}: {}", key.bold(), value)
    }

    /// Format a lifecycle state, colored by health.
    pub(crate) fn state(state: RuntimeState) -> String {
        match state {
            RuntimeState::Loading => state.as_str().blue().to_string(),
            RuntimeState::Running => state.as_str().green().to_string(),
            RuntimeState::Suspended => state.as_str().yellow().to_string(),
            RuntimeState::Crashed => state.as_str().red().bold().to_string(),
            RuntimeState::Terminated => state.as_str().dimmed().to_string(),
        }
    }

    /// One-line summary of instance counts.
    pub(crate) fn stats(stats: &RuntimeStats) -> String {
        format!(
            "{} running, {} suspended, {} crashed, {} terminated ({} crashes total)",
            stats.running, stats.suspended, stats.crashed, stats.terminated, stats.total_crashes
        )
        .dimmed()
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_keeps_wire_name() {
        colored::control::set_override(false);
        assert_eq!(Theme::state(RuntimeState::Crashed), "CRASHED");
        assert_eq!(Theme::kv("appId", "core.files"), "appId: core.files");
    }
}
