use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

/// Structured-logging settings, read from `[logging]` in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Passed straight to `tracing_subscriber::EnvFilter` (e.g. `"info"`,
    /// `"orchestrator=debug,tower=warn"`). `RUST_LOG` still overrides it.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub file_logging: bool,
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            file_logging: false,
            log_directory: default_log_directory(),
        }
    }
}

/// Initializes the global `tracing` subscriber. Called once at process
/// start, before anything else logs. When `file_logging` is set, a daily
/// rolling file appender is layered in alongside stdout.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));

    if config.file_logging {
        std::fs::create_dir_all(&config.log_directory)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "orchestrator.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard: it must live for the process lifetime to flush on
        // drop, and this is only ever called once at startup.
        Box::leak(Box::new(guard));

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
    } else {
        fmt().with_env_filter(env_filter).init();
    }

    Ok(())
}
