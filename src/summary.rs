use crate::clustering::ErrorCluster;
use std::fmt::Write as _;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DIGEST_KEYWORDS: usize = 5;
const DIGEST_PATTERN_CHARS: usize = 200;

/// Cluster statistics that are safe to hand to an outside summarizer.
///
/// Built only from ids, counts, keywords and templates. Example messages are
/// never copied in, so raw log content cannot leave through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDigest {
    pub total_lines: usize,
    pub error_count: usize,
    pub clusters: Vec<DigestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub id: usize,
    pub occurrences: usize,
    pub unique_patterns: usize,
    pub keywords: Vec<String>,
    pub pattern: String,
}

impl ClusterDigest {
    pub fn from_clusters(clusters: &[ErrorCluster], total_lines: usize, error_count: usize) -> Self {
        let clusters = clusters
            .iter()
            .map(|c| DigestEntry {
                id: c.id,
                occurrences: c.total_count,
                unique_patterns: c.unique_patterns(),
                keywords: c.keywords.iter().take(DIGEST_KEYWORDS).cloned().collect(),
                pattern: c.representative.chars().take(DIGEST_PATTERN_CHARS).collect(),
            })
            .collect();
        Self { total_lines, error_count, clusters }
    }

    /// Text form handed to a summarizer: a line with the totals, then one
    /// block per cluster.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Analyzed {} log lines. Found {} error/warning entries.\n\n",
            thousands(self.total_lines),
            thousands(self.error_count)
        );
        if self.clusters.is_empty() {
            out.push_str("No error clusters detected.");
            return out;
        }
        out.push_str("Error Cluster Summary:\n\n");
        for c in &self.clusters {
            let _ = writeln!(out, "Cluster {}:", c.id + 1);
            let _ = writeln!(out, "  - Occurrences: {}", c.occurrences);
            let _ = writeln!(out, "  - Unique patterns: {}", c.unique_patterns);
            let _ = writeln!(out, "  - Keywords: {}", c.keywords.join(", "));
            let _ = writeln!(out, "  - Representative pattern: {}", c.pattern);
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
        out
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("summarizer unavailable")]
    Unavailable,
    #[error("summarizer failed: {0}")]
    Failed(String),
    #[error("summarizer timed out")]
    TimedOut,
}

/// Turns a sanitized digest into prose, typically by calling out to a
/// text-generation service.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, digest: &ClusterDigest) -> Result<String, SummaryError>;
}

impl<F> Summarizer for F
where
    F: Fn(&ClusterDigest) -> Result<String, SummaryError> + Send + Sync,
{
    fn summarize(&self, digest: &ClusterDigest) -> Result<String, SummaryError> {
        self(digest)
    }
}

/// Runs the summarizer on its own thread and waits at most `timeout`.
/// A call that overruns is abandoned, not retried.
pub fn summarize_with_timeout(
    summarizer: Arc<dyn Summarizer>,
    digest: ClusterDigest,
    timeout: Duration,
) -> Result<String, SummaryError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(summarizer.summarize(&digest));
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(text)) if text.trim().is_empty() => Err(SummaryError::Failed("empty reply".to_string())),
        Ok(reply) => reply.map(|text| text.trim().to_string()),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(SummaryError::TimedOut),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(SummaryError::Failed("summarizer thread exited without a reply".to_string()))
        }
    }
}

/// Picks the external summary when one arrives, the rule-based one otherwise.
pub fn summarize_or_fallback(
    summarizer: Option<Arc<dyn Summarizer>>,
    clusters: &[ErrorCluster],
    total_lines: usize,
    error_count: usize,
    fatal_count: usize,
    timeout: Duration,
) -> String {
    if !clusters.is_empty() {
        let reply = match summarizer {
            Some(s) => {
                let digest = ClusterDigest::from_clusters(clusters, total_lines, error_count);
                summarize_with_timeout(s, digest, timeout)
            }
            None => Err(SummaryError::Unavailable),
        };
        match reply {
            Ok(text) => return text,
            Err(e) => warn!(error = %e, "falling back to rule-based summary"),
        }
    }
    basic_summary(clusters, total_lines, error_count, fatal_count)
}

pub fn basic_summary(clusters: &[ErrorCluster], total_lines: usize, error_count: usize, fatal_count: usize) -> String {
    let Some(top) = clusters.first() else {
        if error_count == 0 {
            return format!("Processed {} lines. No significant errors detected.", thousands(total_lines));
        }
        return format!(
            "Processed {} lines with {} errors, but no patterns could be clustered.",
            thousands(total_lines),
            thousands(error_count)
        );
    };

    let mut parts = vec![format!("Processed {} lines.", thousands(total_lines))];
    if fatal_count > 0 {
        parts.push(format!("CRITICAL: {} fatal errors detected.", thousands(fatal_count)));
    }
    parts.push(format!(
        "Found {} error entries grouped into {} clusters.",
        thousands(error_count),
        clusters.len()
    ));
    let related = if top.keywords.is_empty() {
        "various errors".to_string()
    } else {
        top.keywords.iter().take(3).map(String::as_str).collect::<Vec<_>>().join(", ")
    };
    parts.push(format!(
        "Most frequent issue ({} occurrences): related to {}.",
        thousands(top.total_count),
        related
    ));
    if let Some(kw) = top.keywords.first() {
        parts.push(format!("Suggested investigation: Search codebase for '{kw}'."));
    }
    parts.join(" ")
}

/// `1234567` as `1,234,567`.
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
