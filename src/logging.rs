//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and to a file through a non-blocking writer.
//! `HANDBOOK_RAG_LOG_FILE` selects the file (`off` disables file logging); otherwise
//! `logs/handbook-rag.log` is used. Credentials never appear in log fields;
//! [`crate::credentials::ApiKey`] redacts itself.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "HANDBOOK_RAG_LOG_FILE";
const LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "handbook-rag.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Disabled,
    File(PathBuf),
    DefaultFile,
}

impl LogTarget {
    fn from_env_value(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            None | Some("") => Self::DefaultFile,
            Some(value) if value.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(value) => Self::File(PathBuf::from(value)),
        }
    }
}

/// Configure tracing subscribers for stdout and file logging.
///
/// Respects `RUST_LOG` for filtering (defaults to `info`). The file layer is skipped when the
/// log file cannot be opened. A global guard keeps the writer alive for the process lifetime.
/// Calling this twice leaves the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = LogTarget::from_env_value(std::env::var(LOG_FILE_ENV).ok());
    let installed = match configure_file_writer(&target) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).try_init()
        }
        None => registry.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

fn configure_file_writer(target: &LogTarget) -> Option<NonBlocking> {
    let file = match target {
        LogTarget::Disabled => return None,
        LogTarget::File(path) => std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
            .ok()?,
        LogTarget::DefaultFile => {
            if let Err(err) = std::fs::create_dir_all(LOG_DIR) {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            let appender = tracing_appender::rolling::never(LOG_DIR, DEFAULT_LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            return Some(non_blocking);
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_target_follows_env_value() {
        assert_eq!(LogTarget::from_env_value(None), LogTarget::DefaultFile);
        assert_eq!(LogTarget::from_env_value(Some("  ".into())), LogTarget::DefaultFile);
        assert_eq!(LogTarget::from_env_value(Some("OFF".into())), LogTarget::Disabled);
        assert_eq!(
            LogTarget::from_env_value(Some("/tmp/rag.log".into())),
            LogTarget::File(PathBuf::from("/tmp/rag.log"))
        );
    }

    #[test]
    fn disabled_target_has_no_writer() {
        assert!(configure_file_writer(&LogTarget::Disabled).is_none());
    }
}
