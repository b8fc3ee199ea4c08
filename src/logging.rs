use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::IsTerminal;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console and file logging.
///
/// Console lines go to stderr so stdout carries only command output, such as
/// the `--json` run summary. Colors are used only when stderr is a terminal.
///
/// The file is truncated at start unless `append` is set. The returned guard
/// flushes the file writer when dropped, so keep it alive for the whole run.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    fs::create_dir_all(&config.dir)?;

    let path = config.dir.join(&config.file_name);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(config.append)
        .truncate(!config.append)
        .open(&path)?;
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(non_blocking_writer)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking_writer)
            .boxed()
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    // RUST_LOG wins; otherwise our crate at the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("patient_loader={},warn", config.level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}
