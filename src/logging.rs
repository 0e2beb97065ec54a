use std::env;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/photo-archiver.log";

/// Per-file decisions (skips, orphans, queued copies) are logged at debug
/// level by the library, so `--verbose` opens that up on stdout.
fn stdout_directives(verbose: bool) -> &'static str {
    if verbose {
        "photo_archiver=debug,info"
    } else {
        "info"
    }
}

/// Log to stdout and to `LOG_FILE_PATH`. Keep the returned guard alive
/// until exit so the file writer gets flushed.
///
/// `TRACING_LEVEL` overrides the stdout filter, `FILE_TRACING_LEVEL` the
/// file filter. The log file keeps the per-file decisions even without
/// `--verbose`.
pub fn init_logger(verbose: bool) -> impl Drop {
    let stdout_filter = env::var("TRACING_LEVEL")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(stdout_directives(verbose)));
    let file_filter = env::var("FILE_TRACING_LEVEL")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(stdout_directives(true)));

    let log_file_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

    let file_appender = tracing_appender::rolling::never("./", log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .without_time()
                .with_ansi(true)
                .with_filter(stdout_filter),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .init();

    debug!(verbose, "Tracing is configured for stdout and file logging.");

    guard
}
