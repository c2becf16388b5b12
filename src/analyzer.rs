use crate::clustering::{ErrorCluster, ErrorClusterer};
use crate::config::{AnalyzerConfig, ConfigError};
use crate::ingest;
use crate::level::LogLevel;
use crate::multiline::LogParser;
use crate::normalizer::Normalizer;
use crate::parser::ParsedLogEntry;
use crate::patterns::ErrorTemplate;
use crate::summary::{self, Summarizer};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

const SAMPLE_MESSAGES: usize = 3;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("input is empty")]
    EmptyInput,
    #[error("unsupported file '{0}': expected .log, .txt or .gz")]
    UnsupportedFile(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_lines_processed: usize,
    pub total_entries: usize,
    pub error_lines: usize,
    pub fatal_lines: usize,
    pub warning_lines: usize,
    pub exceptions_detected: usize,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOut {
    pub pattern: String,
    pub count: usize,
    pub first_seen_line: usize,
    pub examples: Vec<String>,
}

impl From<&ErrorTemplate> for TemplateOut {
    fn from(t: &ErrorTemplate) -> Self {
        Self {
            pattern: t.template.clone(),
            count: t.count,
            first_seen_line: t.first_occurrence_line,
            examples: t.examples.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOut {
    pub cluster_id: usize,
    pub total_occurrences: usize,
    pub unique_patterns: usize,
    pub keywords: Vec<String>,
    pub representative_pattern: String,
    pub sample_messages: Vec<String>,
}

impl From<&ErrorCluster> for ClusterOut {
    fn from(c: &ErrorCluster) -> Self {
        Self {
            cluster_id: c.id,
            total_occurrences: c.total_count,
            unique_patterns: c.unique_patterns(),
            keywords: c.keywords.clone(),
            representative_pattern: c.representative.clone(),
            sample_messages: c.sample_messages(SAMPLE_MESSAGES),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: Summary,
    pub top_error_templates: Vec<TemplateOut>,
    pub error_clusters: Vec<ClusterOut>,
    pub natural_language_summary: Option<String>,
    pub processing_time_ms: f64,
}

/// Runs ingest, parse, normalize and cluster over one input.
///
/// Holds no per-file state, so one analyzer can serve many inputs, including
/// from several threads at once.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("summarizer", &self.summarizer.is_some())
            .finish()
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, summarizer: None })
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyzes the bytes of `reader`. `filename` is consulted only to decide
    /// whether the bytes are gzip-compressed.
    pub fn analyze<R: Read>(&self, reader: R, filename: &str) -> Result<AnalysisResult, AnalyzeError> {
        let started = Instant::now();

        let mut lines = ingest::read_lines(reader, filename);
        let mut normalizer = Normalizer::new(self.config.min_level);
        let mut high_signal = Vec::new();
        let mut entries = LogParser::new().parse_lines(lines.by_ref());
        for entry in entries.by_ref() {
            if normalizer.observe(&entry) {
                high_signal.push(entry);
            }
        }
        let total_entries = entries.parser().entries_emitted();
        drop(entries);

        let total_lines = lines.lines_read();
        if let Some(err) = lines.take_error() {
            if total_lines == 0 {
                return Err(AnalyzeError::Io(err));
            }
            warn!(error = %err, total_lines, "analyzing the lines read before the failure");
        }
        if total_lines == 0 {
            return Err(AnalyzeError::EmptyInput);
        }
        debug!(
            total_lines,
            total_entries,
            high_signal = high_signal.len(),
            templates = normalizer.templates().len(),
            "parsed input"
        );

        let clusterer = ErrorClusterer::new(
            self.config.max_clusters,
            self.config.min_cluster_size,
            self.config.max_features,
        );
        let clusters = clusterer.cluster(normalizer.templates());

        let stats = level_counts(&high_signal);
        let (start_date, end_date) = time_range(&high_signal);
        let text = if self.config.summarize {
            summary::summarize_or_fallback(
                self.summarizer.clone(),
                &clusters,
                total_lines,
                high_signal.len(),
                stats.fatal,
                self.config.summary_timeout,
            )
        } else {
            summary::basic_summary(&clusters, total_lines, high_signal.len(), stats.fatal)
        };

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        Ok(AnalysisResult {
            summary: Summary {
                total_lines_processed: total_lines,
                total_entries,
                error_lines: stats.error,
                fatal_lines: stats.fatal,
                warning_lines: stats.warn,
                exceptions_detected: stats.exceptions,
                start_date,
                end_date,
            },
            top_error_templates: normalizer
                .top_templates(self.config.top_templates)
                .into_iter()
                .map(TemplateOut::from)
                .collect(),
            error_clusters: clusters.iter().map(ClusterOut::from).collect(),
            natural_language_summary: Some(text),
            processing_time_ms: (elapsed * 100.0).round() / 100.0,
        })
    }

    /// Opens and analyzes a file on disk after checking its extension.
    pub fn analyze_path(&self, path: impl AsRef<Path>) -> Result<AnalysisResult, AnalyzeError> {
        let path = path.as_ref();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !ingest::is_supported_filename(name) {
            return Err(AnalyzeError::UnsupportedFile(path.display().to_string()));
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(AnalyzeError::EmptyInput);
        }
        debug!(path = %path.display(), "opened input");
        self.analyze_seekable(file, name)
    }

    /// Like [`Analyzer::analyze`], but logs a line-count estimate first.
    /// The estimate is best-effort: when it fails the reader is rewound and
    /// the analysis goes ahead.
    pub fn analyze_seekable<R: Read + Seek>(&self, mut reader: R, filename: &str) -> Result<AnalysisResult, AnalyzeError> {
        match ingest::estimate_line_count(&mut reader, filename) {
            Ok(estimate) => debug!(estimated_lines = estimate, "estimated input size"),
            Err(e) => {
                debug!(error = %e, "line estimate unavailable");
                reader.rewind()?;
            }
        }
        self.analyze(reader, filename)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LevelCounts {
    error: usize,
    fatal: usize,
    warn: usize,
    exceptions: usize,
}

fn level_counts(entries: &[ParsedLogEntry]) -> LevelCounts {
    entries.iter().fold(LevelCounts::default(), |mut c, e| {
        match e.level {
            LogLevel::Error => c.error += 1,
            LogLevel::Fatal => c.fatal += 1,
            LogLevel::Warn => c.warn += 1,
            _ => {}
        }
        c.exceptions += usize::from(e.has_exception());
        c
    })
}

/// Earliest and latest parseable timestamps, RFC 3339 in UTC.
fn time_range(entries: &[ParsedLogEntry]) -> (Option<String>, Option<String>) {
    let mut stamps = entries.iter().filter_map(ParsedLogEntry::parsed_timestamp);
    let Some(first) = stamps.next() else {
        return (None, None);
    };
    let (lo, hi) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    (
        Some(lo.to_rfc3339_opts(SecondsFormat::Secs, true)),
        Some(hi.to_rfc3339_opts(SecondsFormat::Secs, true)),
    )
}
