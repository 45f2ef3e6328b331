//! File logging for the `taghl` binary.
//!
//! Library code only emits `tracing` events; this module decides where they
//! land. Logs roll daily as `taghl.log.<date>` under the cache log directory
//! (`<cache>/taghl/logs`), or `<tmp>/taghl/logs` when that cannot be created.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use taghl::kernel::services::adapters::ensure_log_dir;

const LOG_FILE_PREFIX: &str = "taghl.log";
const DEFAULT_FILTER: &str = "taghl=info";

/// Keeps the background writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

fn resolve_log_dir() -> Option<PathBuf> {
    ensure_log_dir()
        .or_else(|_| -> std::io::Result<PathBuf> {
            let dir = std::env::temp_dir().join("taghl").join("logs");
            std::fs::create_dir_all(&dir)?;
            Ok(dir)
        })
        .ok()
}

/// Install the global subscriber: `RUST_LOG` (default `taghl=info`) over a
/// non-blocking daily file appender, plus a panic hook that logs the panic.
///
/// Returns `None` when no log directory is usable or a subscriber is already
/// installed; the binary then runs without file logs.
pub fn init() -> Option<LoggingGuard> {
    let log_dir = resolve_log_dir()?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init();
    if installed.is_err() {
        return None;
    }

    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "taghl panicked");
    }));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        log_dir = %log_dir.display(),
        "taghl logging started"
    );

    Some(LoggingGuard {
        _guard: guard,
        log_dir,
    })
}

#[cfg(test)]
#[path = "../tests/unit/logging.rs"]
mod tests;
