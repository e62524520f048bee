//! Logging setup built on the `tracing` ecosystem.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, IrccdError, Result};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    File,
    Both,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    pub filter: String,
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
        }
    }
}

impl LogConfig {
    /// Configuration for the long-running daemon: file + stderr, span
    /// events enabled so connection/server lifecycles show enter/exit.
    pub fn daemon(verbose: bool) -> Self {
        let default_filter = if verbose { "debug" } else { "info" };
        Self {
            output: LogOutput::Both,
            filter: std::env::var("IRCCD_LOG").unwrap_or_else(|_| default_filter.into()),
            span_events: true,
        }
    }

    /// Configuration for `irccdctl`: stderr only, quiet by default.
    pub fn cli(verbose: bool) -> Self {
        let default_filter = if verbose { "debug" } else { "warn" };
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var("IRCCD_LOG").unwrap_or_else(|_| default_filter.into()),
            span_events: false,
        }
    }
}

fn open_log_file() -> Result<std::fs::File> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir).map_err(|e| IrccdError::FileRead {
        path: log_dir.clone(),
        source: e,
    })?;
    let log_path = log_dir.join("irccd.log");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| IrccdError::FileRead {
            path: log_path,
            source: e,
        })
}

/// Initialize logging. Safe to call once per process; a second call
/// returns an error rather than panicking.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| IrccdError::config(format!("invalid log filter: {e}")))?;

    let fmt_layer = fmt::layer().with_target(true);
    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
    } else {
        fmt_layer
    };

    let init_err = |e: tracing_subscriber::util::TryInitError| {
        IrccdError::internal(format!("failed to init logging: {e}"))
    };

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(init_err)?;
        }
        LogOutput::File => {
            let file = open_log_file()?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(file).with_ansi(false).with_target(true))
                .try_init()
                .map_err(init_err)?;
        }
        LogOutput::Both => {
            let file = open_log_file()?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(file).with_ansi(false).with_target(true))
                .try_init()
                .map_err(init_err)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_config_enables_span_events() {
        let cfg = LogConfig::daemon(false);
        assert!(cfg.span_events);
        assert_eq!(cfg.output, LogOutput::Both);
    }

    #[test]
    fn cli_config_defaults_quiet() {
        std::env::remove_var("IRCCD_LOG");
        let cfg = LogConfig::cli(false);
        assert_eq!(cfg.filter, "warn");
        assert_eq!(cfg.output, LogOutput::Stderr);
    }
}
