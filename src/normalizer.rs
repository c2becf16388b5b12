use crate::level::LogLevel;
use crate::masking;
use crate::parser::ParsedLogEntry;
use crate::patterns::{self, ErrorTemplate, TemplateMap};
use tracing::debug;

/// Substrings that make an entry high-signal whatever its level.
pub const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "exception",
    "fail",
    "fatal",
    "panic",
    "crash",
    "traceback",
    "timeout",
    "refused",
    "denied",
    "unauthorized",
    "forbidden",
    "not found",
    "null",
    "undefined",
    "invalid",
    "cannot",
    "unable",
    "could not",
    "failed to",
];

/// Filters entries down to the high-signal ones and buckets them by template.
#[derive(Debug)]
pub struct Normalizer {
    min_level: LogLevel,
    templates: TemplateMap,
}

impl Normalizer {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level, templates: TemplateMap::new() }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn is_high_signal(&self, entry: &ParsedLogEntry) -> bool {
        if entry.is_error() || entry.has_exception() {
            return true;
        }
        let lower = entry.message.to_lowercase();
        if ERROR_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return true;
        }
        entry.level == LogLevel::Warn && self.min_level <= LogLevel::Warn
    }

    pub fn normalize_message(&self, message: &str) -> String {
        masking::normalize(message)
    }

    /// Feeds one entry. Returns true when it was high-signal and got counted.
    pub fn observe(&mut self, entry: &ParsedLogEntry) -> bool {
        if !self.is_high_signal(entry) {
            return false;
        }
        let key = self.normalize_message(&entry.message);
        patterns::record(&mut self.templates, key, &entry.message, entry.line_number);
        true
    }

    /// Runs a whole entry sequence, replacing any templates from a previous run.
    /// Returns the high-signal entries in input order.
    pub fn process<I>(&mut self, entries: I) -> Vec<ParsedLogEntry>
    where
        I: IntoIterator<Item = ParsedLogEntry>,
    {
        self.templates.clear();
        let kept: Vec<ParsedLogEntry> = entries.into_iter().filter(|e| self.observe(e)).collect();
        debug!(high_signal = kept.len(), templates = self.templates.len(), "normalized entries");
        kept
    }

    pub fn templates(&self) -> &TemplateMap {
        &self.templates
    }

    pub fn into_templates(self) -> TemplateMap {
        self.templates
    }

    pub fn top_templates(&self, n: usize) -> Vec<&ErrorTemplate> {
        patterns::ranked(&self.templates, n)
    }
}

/// Short text describing what went wrong in `entry`: the exception when there
/// is one, the message otherwise, cut to `max_len` characters plus `...`.
pub fn extract_error_context(entry: &ParsedLogEntry, max_len: usize) -> String {
    let context = match entry.exception.as_deref() {
        Some(exc) if !exc.is_empty() => exc,
        _ => entry.message.as_str(),
    };
    match context.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &context[..cut]),
        None => context.to_string(),
    }
}
