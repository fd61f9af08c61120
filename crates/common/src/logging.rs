//! Logging and tracing initialization.
//!
//! Everything is written to stderr; stdout is reserved for reports.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Workspace targets that follow the configured level.
const WORKSPACE_TARGETS: [&str; 5] = [
    "aimtune",
    "aimtune_common",
    "aimtune_session_model",
    "aimtune_frame_source",
    "aimtune_analysis_core",
];

/// Expand a bare level into per-crate directives, leaving dependencies at
/// `warn`. Strings that already contain directives are used as given.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    std::iter::once("warn".to_string())
        .chain(WORKSPACE_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        // Batch sessions run on blocking workers; thread names tell them apart.
        builder
            .compact()
            .with_target(false)
            .with_thread_names(true)
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_is_scoped_to_workspace() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("aimtune_analysis_core=debug"));
        assert!(directives.contains("aimtune=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn explicit_directives_pass_through() {
        assert_eq!(
            filter_directives("aimtune_frame_source=trace,info"),
            "aimtune_frame_source=trace,info"
        );
    }
}
