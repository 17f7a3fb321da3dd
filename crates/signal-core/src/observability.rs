//! Process-wide tracing setup for block hosts.
//!
//! Blocks only emit `tracing` events (`event = "email.send_failed"`, `domain`, `block_type`, ...);
//! the host calls [`init_observability`] once to decide where they go.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const ENABLED_VAR: &str = "SIGNAL_BLOCKS_OBSERVABILITY_ENABLED";
const LEVEL_VAR: &str = "SIGNAL_BLOCKS_LOG_LEVEL";
const JSON_PATH_VAR: &str = "SIGNAL_BLOCKS_JSON_LOG_PATH";
const DEFAULT_LOG_FILE: &str = "signal-blocks.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Where and how much to log, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilitySettings {
    pub enabled: bool,
    /// Filter directive from `SIGNAL_BLOCKS_LOG_LEVEL`; `RUST_LOG` applies when unset or invalid.
    pub level: Option<String>,
    /// JSONL output file. Console (stderr) when `None`.
    pub json_log_path: Option<PathBuf>,
}

impl ObservabilitySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            enabled: lookup(ENABLED_VAR)
                .and_then(|v| parse_bool_env(&v))
                .unwrap_or(true),
            level: lookup(LEVEL_VAR).filter(|v| !v.trim().is_empty()),
            json_log_path: lookup(JSON_PATH_VAR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = EnvFilter::try_new(level)
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Split a log path into (directory, file name) for the appender.
fn log_file_target(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file)
}

/// Initialize logging once per process from [`ObservabilitySettings::from_env`].
///
/// - `SIGNAL_BLOCKS_OBSERVABILITY_ENABLED`: `0`/`false`/`off` disables logging (default on).
/// - `SIGNAL_BLOCKS_LOG_LEVEL`: filter directive, e.g. `debug` or `signal_blocks=trace`.
/// - `SIGNAL_BLOCKS_JSON_LOG_PATH`: write JSONL to this file instead of the console.
/// - `RUST_LOG`: fallback filter.
///
/// Console output goes to stderr so stdout stays free for command results.
pub fn init_observability() {
    INIT.get_or_init(|| install(&ObservabilitySettings::from_env()));
}

fn install(settings: &ObservabilitySettings) {
    if !settings.enabled {
        return;
    }
    let filter = settings.env_filter();
    match &settings.json_log_path {
        Some(path) => {
            let (dir, file) = log_file_target(path);
            let _ = std::fs::create_dir_all(&dir);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(tracing_appender::rolling::never(dir, file));
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init();
        }
        None => {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> ObservabilitySettings {
        ObservabilitySettings::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    #[test]
    fn defaults_to_enabled_console_logging() {
        assert_eq!(
            settings(&[]),
            ObservabilitySettings {
                enabled: true,
                level: None,
                json_log_path: None,
            }
        );
    }

    #[test]
    fn reads_flag_level_and_path() {
        let s = settings(&[
            (ENABLED_VAR, " Off "),
            (LEVEL_VAR, "debug"),
            (JSON_PATH_VAR, "logs/run.jsonl"),
        ]);
        assert!(!s.enabled);
        assert_eq!(s.level.as_deref(), Some("debug"));
        assert_eq!(s.json_log_path, Some(PathBuf::from("logs/run.jsonl")));
    }

    #[test]
    fn unrecognised_flag_keeps_logging_on() {
        assert!(settings(&[(ENABLED_VAR, "maybe")]).enabled);
        assert!(settings(&[(JSON_PATH_VAR, "  ")]).json_log_path.is_none());
    }

    #[test]
    fn log_file_target_defaults_directory() {
        assert_eq!(
            log_file_target(Path::new("run.jsonl")),
            (PathBuf::from("."), "run.jsonl".to_string())
        );
        assert_eq!(
            log_file_target(Path::new("/var/log/blocks/run.jsonl")),
            (PathBuf::from("/var/log/blocks"), "run.jsonl".to_string())
        );
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
    }
}
