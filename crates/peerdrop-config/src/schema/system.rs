use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Filter directive scoped to the peerdrop crates.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Trace => "peerdrop=trace",
            Self::Debug => "peerdrop=debug",
            Self::Info => "peerdrop=info",
            Self::Warning => "peerdrop=warn",
            Self::Error => "peerdrop=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
