use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized log level '{0}'")]
pub struct LevelParseError(pub String);

impl LogLevel {
    /// Maps a free-form level token to a level, case-insensitively.
    /// Anything outside the synonym table is `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "TRACE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "INFO" | "INFORMATION" => LogLevel::Info,
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" | "ERR" => LogLevel::Error,
            "FATAL" | "CRITICAL" | "CRIT" | "SEVERE" | "PANIC" => LogLevel::Fatal,
            _ => LogLevel::Unknown,
        }
    }

    /// Position in the severity order; `None` for `Unknown`.
    pub fn severity(self) -> Option<u8> {
        match self {
            LogLevel::Trace => Some(0),
            LogLevel::Debug => Some(1),
            LogLevel::Info => Some(2),
            LogLevel::Warn => Some(3),
            LogLevel::Error => Some(4),
            LogLevel::Fatal => Some(5),
            LogLevel::Unknown => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::Unknown => "UNKNOWN",
        }
    }
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse for configuration values: synonyms are accepted, but a name
/// that does not resolve to a real level is an error.
impl FromStr for LogLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match LogLevel::from_token(s) {
            LogLevel::Unknown => Err(LevelParseError(s.to_string())),
            level => Ok(level),
        }
    }
}
