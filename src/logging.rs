use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide tracing subscriber: stderr for interactive
/// visibility plus a non-blocking rolling file appender under the
/// persistence root (the teacher debounces writes to its queue-state
/// sidecar file; here the same "don't block the hot path on disk I/O"
/// discipline applies to logging instead).
///
/// The returned `WorkerGuard` must be kept alive for the lifetime of the
/// process; dropping it flushes and stops the background writer thread.
pub fn init(root: &Path) -> anyhow::Result<WorkerGuard> {
    let log_dir = root.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "subcontrol.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}
