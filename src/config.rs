use crate::level::{LevelParseError, LogLevel};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("minimum level cannot be UNKNOWN")]
    UnknownLevel,
    #[error(transparent)]
    Level(#[from] LevelParseError),
}

/// Parameters of one analysis. Passed explicitly; nothing is read from the
/// environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub max_clusters: usize,
    pub min_level: LogLevel,
    pub summarize: bool,
    pub min_cluster_size: usize,
    pub max_features: usize,
    pub top_templates: usize,
    pub summary_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_clusters: 10,
            min_level: LogLevel::Warn,
            summarize: false,
            min_cluster_size: 2,
            max_features: 1000,
            top_templates: 10,
            summary_timeout: Duration::from_secs(30),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_clusters", self.max_clusters),
            ("min_cluster_size", self.min_cluster_size),
            ("max_features", self.max_features),
            ("top_templates", self.top_templates),
        ];
        if let Some(&(name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.min_level == LogLevel::Unknown {
            return Err(ConfigError::UnknownLevel);
        }
        Ok(())
    }

    /// Sets the minimum level from a name or synonym such as `warning` or `crit`.
    pub fn with_min_level_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.min_level = name.parse()?;
        Ok(self)
    }
}
