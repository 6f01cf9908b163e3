use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use clap::ValueEnum;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

/// Route logs to stderr, or append them to `log_file` when one is given.
pub fn init_logging(format: LogFormat, level: LogLevel, log_file: Option<&Path>) -> io::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = tracing_subscriber::fmt()
                .with_writer(Mutex::new(file))
                .with_max_level(level.as_filter())
                .with_ansi(false)
                .with_target(false);

            match format {
                LogFormat::Text => {
                    let _ = builder.try_init();
                }
                LogFormat::Json => {
                    let _ = builder.json().try_init();
                }
            }
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_max_level(level.as_filter())
                .with_ansi(false)
                .with_target(false);

            match format {
                LogFormat::Text => {
                    let _ = builder.try_init();
                }
                LogFormat::Json => {
                    let _ = builder.json().try_init();
                }
            }
        }
    }

    Ok(())
}
