use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Silly,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    ///
    /// `info` and `verbose` only raise the CLI's own crates; `debug` and
    /// `silly` open every target, driver logs included.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "warn,cambusa=info,cambusa_cli=info,cambusa_core=info",
            LogLevel::Verbose => "warn,cambusa=debug,cambusa_cli=debug,cambusa_core=debug",
            LogLevel::Debug => "debug",
            LogLevel::Silly => "trace",
        }
    }
}

/// Initialise the global `tracing` subscriber, writing to stderr.
///
/// Respects the `RUST_LOG` environment variable. Falls back to the
/// `--log-level` directive when `RUST_LOG` is not set.
///
/// Call this once, at the very start of `main`, before any tracing macro.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
