//! Logging initialisation for vsphere-inventory.
//!
//! When `VSPHERE_INVENTORY_LOG` is set to `1`, logs are also written to
//! `vsphere-inventory.log` in the log directory (see [`crate::paths`]).
//! Otherwise only stderr output (filtered by `RUST_LOG`) is enabled.
//!
//! Returns a guard that must be kept alive for the duration of the process
//! so that buffered log lines are flushed on exit.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::paths::InventoryPaths;

pub const LOG_ENV: &str = "VSPHERE_INVENTORY_LOG";
pub const LOG_FILE: &str = "vsphere-inventory.log";

pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialise the global tracing subscriber. Call once from `main`.
///
/// `verbose` raises the default stderr level from `warn` to `info`;
/// `RUST_LOG` overrides both.
pub fn init(verbose: bool) -> LogGuard {
    let default_level = if verbose || file_logging_enabled() { "info" } else { "warn" };
    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut setup_error = None;
    let file_guard = if file_logging_enabled() {
        let paths = log_paths();
        if let Err(e) = paths.ensure() {
            setup_error = Some(format!("could not create {}: {e}", paths.logs.display()));
        }
        let file_appender = tracing_appender::rolling::never(&paths.logs, LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

        tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();

        None
    };

    // Only reportable once a subscriber exists.
    if let Some(error) = setup_error {
        warn!(error = %error, "file logging unavailable");
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

fn file_logging_enabled() -> bool {
    std::env::var(LOG_ENV).as_deref() == Ok("1")
}

/// Resolved paths, or a temp-dir fallback when `HOME` is unset.
fn log_paths() -> InventoryPaths {
    InventoryPaths::resolve().unwrap_or_else(|| {
        let fallback = std::env::temp_dir().join(crate::paths::APP_NAME);
        InventoryPaths {
            config: fallback.join("config"),
            logs: fallback.join("logs"),
        }
    })
}
