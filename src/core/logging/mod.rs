/// Logging and monitoring utilities for the verification-and-reward engine
///
/// This module provides structured logging with different levels for:
/// - Per-round verification and reward summaries
/// - Provider fan-out
/// - Performance metrics
pub mod formatter;
pub mod performance;
pub mod round_logger;

// Re-export common types and functions
pub use formatter::*;
pub use performance::*;
pub use round_logger::*;

use chrono::{DateTime, Utc};
use colored::*;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

/// Log levels for different components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub show_timestamps: bool,
    pub show_colors: bool,
    pub show_rounds: bool,
    pub show_performance: bool,
    pub show_network: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            show_timestamps: true,
            show_colors: true,
            show_rounds: true,
            show_performance: true,
            show_network: true,
        }
    }
}

/// Initialize the logging system
pub fn init_logger(config: Option<LoggerConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config.unwrap_or_default();
    let log_level = config.level.as_filter();

    if !config.show_colors {
        colored::control::set_override(false);
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level));
    if !config.show_timestamps {
        builder.format_timestamp(None);
    }

    // Try to init, but ignore error if already initialized
    match builder.try_init() {
        Ok(_) => {
            info!("🚀 Storage proof engine logger initialized");
            info!("📊 Log level: {}", log_level.to_uppercase());
        }
        Err(_) => {
            debug!("Logger already initialized, skipping...");
        }
    }

    Ok(())
}

/// Format a timestamp for logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Log with appropriate color and formatting
pub fn log_with_color(level: LogLevel, emoji: &str, category: &str, message: &str) {
    let formatted_message = format!("{} [{}] {}: {}", emoji, format_timestamp(), category, message);

    match level {
        LogLevel::Error => error!("{}", formatted_message.red()),
        LogLevel::Warn => warn!("{}", formatted_message.yellow()),
        LogLevel::Info => info!("{}", formatted_message.green()),
        LogLevel::Debug => debug!("{}", formatted_message.blue()),
        LogLevel::Trace => trace!("{}", formatted_message.dimmed()),
    }
}
