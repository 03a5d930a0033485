//! Logging setup, grounded in `internal/utils/logs/{logs,standard}.go`'s
//! level mapping and tee-to-file-and-stdout behavior, translated to
//! `tracing`/`tracing-subscriber` instead of zap+lumberjack.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Log;

/// Guards that must stay alive for the lifetime of the process so the
/// non-blocking file writer keeps flushing.
pub struct LogGuards {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initializes stdout logging always, plus a daily-rolling file sink when
/// `Log.Output` names a directory. Falls back to `info` on any level
/// string the Go original wouldn't recognise either.
pub fn init(log: &Log) -> LogGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log.level.as_str() {
            "debug" | "info" | "warn" | "error" => log.level.as_str(),
            _ => "info",
        };
        format!("keyproxy={level},tower_http={level}").into()
    });

    let stdout_layer = fmt::layer();

    if log.output.is_empty() {
        tracing_subscriber::registry().with(filter).with(stdout_layer).init();
        return LogGuards { _file_guard: None };
    }

    let appender = tracing_appender::rolling::daily(&log.output, "key_proxy.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // tracing-appender rotates daily, not by byte count or retention age; a
    // configured MaxSize/MaxAge is acknowledged here but not enforced
    // (DESIGN.md: logging rotation).
    if log.max_size > 0 || log.max_age > 0 {
        tracing::debug!(
            max_size = log.max_size,
            max_age = log.max_age,
            "Log.MaxSize/MaxAge are not enforced by the daily rolling file sink"
        );
    }

    LogGuards { _file_guard: Some(guard) }
}
