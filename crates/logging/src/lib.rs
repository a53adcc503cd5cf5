use std::io;

use log::*;
use log4rs::*;
use log4rs::append::file::FileAppender;
use log4rs::encode::pattern::PatternEncoder;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use thiserror::Error;

const PATTERN: &str = "FG | {d(%Y-%m-%d %H:%M:%S)} | {({l}):5.5} | {f}:{L} - {m}{n}";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("could not open log file {path}: {source}")]
    File { path: String, source: io::Error },

    #[error("invalid logging configuration: {0}")]
    Config(String),

    #[error("a logger is already installed")]
    AlreadyInitialized(#[from] SetLoggerError),
}

/// Sends every record to stdout and to `file`, and routes panics into the log.
pub fn init(file: &str) -> Result<(), LoggingError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(file)
        .map_err(|source| LoggingError::File { path: file.to_string(), source })?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .logger(Logger::builder().build("fetchguard", LevelFilter::Trace))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(LevelFilter::Trace),
        )
        .map_err(|e| LoggingError::Config(e.to_string()))?;

    init_config(config)?;

    log_panics::init();

    Ok(())
}

/// Console-only variant for tools that should not leave files behind.
pub fn init_console(level: LevelFilter) -> Result<(), LoggingError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| LoggingError::Config(e.to_string()))?;

    init_config(config)?;

    log_panics::init();

    Ok(())
}
