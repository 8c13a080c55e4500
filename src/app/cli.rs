use crate::healthcheck::DEFAULT_HTTP_PORT;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Relays lab node health and logs to WebSocket subscribers")]
pub struct Cli {
    /// Log level
    #[arg(short = 'l', long, env = "LABWATCH_LOGLEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (YAML)
    #[arg(short = 'c', long, env = "LABWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Probe a running instance's health endpoint and exit 0 or 1
    Healthcheck {
        #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
        port: u16,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
