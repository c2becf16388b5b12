use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Words that carry no meaning in log text.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by",
    "from", "as", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
    "own", "same", "so", "than", "too", "very", "just", "and", "but", "if", "or", "because",
    "until", "while", "this", "that", "these", "those", "it", "its", "log", "logging", "logger",
    "timestamp", "time", "date", "level", "message", "msg", "info", "debug", "warn", "warning",
];

static STOP_SET: Lazy<AHashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z_][a-zA-Z0-9_]*\b").unwrap());

pub fn is_stop_word(word: &str) -> bool {
    STOP_SET.contains(word)
}

/// Identifier-shaped tokens of `text`, lowercased.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    RE_TOKEN.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Unigrams and bigrams of `text`. Stop words are dropped before the bigrams
/// are formed, so `failed to connect` yields the bigram `failed connect`.
pub fn terms(text: &str) -> Vec<String> {
    let words: Vec<String> = tokenize(text).into_iter().filter(|w| !is_stop_word(w)).collect();
    let mut out = words.clone();
    out.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfidfOptions {
    pub max_features: usize,
    /// Terms found in more than this fraction of documents are dropped.
    pub max_df: f64,
}

impl Default for TfidfOptions {
    fn default() -> Self {
        Self { max_features: 1000, max_df: 0.95 }
    }
}

/// Dense TF-IDF matrix, one L2-normalized row per document.
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfMatrix {
    pub features: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl TfidfMatrix {
    pub fn n_features(&self) -> usize {
        self.features.len()
    }
}

/// Fits a vocabulary over `docs` and weights every document against it.
///
/// Term frequency is the raw count, idf is smoothed as `ln((1+n)/(1+df)) + 1`.
/// Returns `None` when no term survives pruning.
pub fn fit_transform(docs: &[String], opts: TfidfOptions) -> Option<TfidfMatrix> {
    let n = docs.len();
    if n == 0 {
        return None;
    }
    let doc_terms: Vec<AHashMap<String, usize>> = docs
        .iter()
        .map(|d| {
            let mut counts = AHashMap::new();
            for t in terms(d) {
                *counts.entry(t).or_insert(0) += 1;
            }
            counts
        })
        .collect();

    // term -> (document frequency, corpus frequency), sorted by term
    let mut stats: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for counts in &doc_terms {
        for (term, &c) in counts {
            let s = stats.entry(term.as_str()).or_insert((0, 0));
            s.0 += 1;
            s.1 += c;
        }
    }

    let max_doc_count = opts.max_df * n as f64;
    let mut kept: Vec<(&str, usize, usize)> = stats
        .into_iter()
        .filter(|&(_, (df, _))| df as f64 <= max_doc_count)
        .map(|(t, (df, tf))| (t, df, tf))
        .collect();
    if kept.len() > opts.max_features {
        // stable: equal corpus frequencies keep alphabetical order
        kept.sort_by(|a, b| b.2.cmp(&a.2));
        kept.truncate(opts.max_features);
        kept.sort_by(|a, b| a.0.cmp(b.0));
    }
    if kept.is_empty() {
        return None;
    }

    let features: Vec<String> = kept.iter().map(|(t, _, _)| t.to_string()).collect();
    let idf: Vec<f64> = kept
        .iter()
        .map(|&(_, df, _)| ((1.0 + n as f64) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    let rows = doc_terms
        .iter()
        .map(|counts| {
            let mut row: Vec<f64> = features
                .iter()
                .zip(&idf)
                .map(|(f, w)| counts.get(f).map_or(0.0, |&c| c as f64 * w))
                .collect();
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|v| *v /= norm);
            }
            row
        })
        .collect();

    Some(TfidfMatrix { features, rows })
}
