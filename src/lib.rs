pub mod level;
pub mod ingest;
pub mod parser;
pub mod multiline;
pub mod masking;
pub mod patterns;
pub mod normalizer;
pub mod vectorize;
pub mod kmeans;
pub mod clustering;
pub mod summary;
pub mod config;
pub mod analyzer;

pub use analyzer::{AnalysisResult, AnalyzeError, Analyzer};
pub use config::{AnalyzerConfig, ConfigError};
pub use level::LogLevel;
