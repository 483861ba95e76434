//! Logging and tracing configuration
//!
//! All diagnostics go through `tracing`. Informational progress is logged at
//! INFO/DEBUG, complaints at WARN/ERROR. Output of the target process is
//! forwarded under the `debuggee` target so it can be filtered separately.

use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing target used for lines forwarded from the target process
pub const DEBUGGEE_TARGET: &str = "debuggee";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("attach_harness=info,debuggee=info,warn"))
}

/// Initialize tracing on stderr, optionally mirrored to a log file
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// The returned guard must be held until exit so the file writer flushes.
pub fn init(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_writer = log_file.and_then(|path| {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(tracing_appender::non_blocking(file)),
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    match file_writer {
        Some((writer, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(default_filter())
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(default_filter())
                .with(stderr_layer)
                .init();
            None
        }
    }
}

/// Forward every line read from `stream` to the log, tagged with `stream_name`
///
/// Lines are passed through untouched; the task ends at EOF.
pub fn forward_lines<R>(stream: R, stream_name: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::info!(target: DEBUGGEE_TARGET, stream = stream_name, "{}", line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(stream = stream_name, error = %e, "Stopped forwarding target output");
                    break;
                }
            }
        }
    })
}
