//! Structured logging (SPEC_FULL.md §9.1), adapted from the teacher's
//! `mcb_infrastructure::logging::init_logging`.
//!
//! One deliberate deviation from the teacher: the teacher's default
//! layer writes JSON to stdout. This server's transport *is* stdout —
//! line-delimited JSON-RPC (spec §6) — so a stdout logging layer would
//! interleave log lines with protocol frames and corrupt the stream.
//! The interactive layer here goes to stderr instead; the JSON layer
//! only ever goes to the log file.

use opensrc_domain::error::{Error, Result};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber: an `EnvFilter`-driven
/// text layer on stderr, plus a JSON layer appending to
/// `log_dir/opensrc-mcp.log` (spec §6: "one JSON entry per line").
/// `tracing_appender::rolling::never` is used deliberately — spec names
/// a single fixed log file, not a rotation policy.
pub fn init_logging(log_dir: &Path, level: &str) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    parse_log_level(level)?;
    let filter = EnvFilter::try_from_env("OPENSRC_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    std::fs::create_dir_all(log_dir).map_err(|e| Error::io(format!("creating log directory {}: {e}", log_dir.display())))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "opensrc-mcp.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let file_layer = fmt::layer().json().with_writer(non_blocking).with_ansi(false).with_target(true);

    Registry::default().with(filter).with(stderr_layer).with(file_layer).try_init().map_err(|e| Error::internal(e.to_string()))?;

    tracing::info!(log_dir = %log_dir.display(), level, "logging initialized");
    Ok(guard)
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::config(format!("invalid log level: {other} (use trace, debug, info, warn, or error)"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_known_levels() {
        assert!(parse_log_level("info").is_ok());
        assert!(parse_log_level("WARN").is_ok());
        assert!(parse_log_level("bogus").is_err());
    }
}
