use crate::kmeans::{KMeans, MiniBatchParams};
use crate::patterns::{ErrorTemplate, TemplateMap};
use crate::vectorize::{self, TfidfMatrix, TfidfOptions};
use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

pub const MAX_KEYWORDS: usize = 10;

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Z_]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorCluster {
    pub id: usize,
    pub templates: Vec<ErrorTemplate>,
    pub total_count: usize,
    pub keywords: Vec<String>,
    pub representative: String,
}

impl ErrorCluster {
    fn new(templates: Vec<ErrorTemplate>, keywords: Vec<String>) -> Self {
        let total_count = templates.iter().map(|t| t.count).sum();
        Self {
            id: 0,
            representative: representative_of(&templates),
            templates,
            total_count,
            keywords,
        }
    }

    pub fn unique_patterns(&self) -> usize {
        self.templates.len()
    }

    /// Up to `n` distinct original messages, in member order.
    pub fn sample_messages(&self, n: usize) -> Vec<String> {
        self.templates
            .iter()
            .flat_map(|t| t.examples.iter())
            .unique()
            .take(n)
            .cloned()
            .collect()
    }
}

/// Highest-count member; the first one wins a tie.
fn representative_of(templates: &[ErrorTemplate]) -> String {
    templates
        .iter()
        .fold(None::<&ErrorTemplate>, |best, t| match best {
            Some(b) if b.count >= t.count => Some(b),
            _ => Some(t),
        })
        .map(|t| t.template.clone())
        .unwrap_or_default()
}

/// Template text with placeholders removed, as fed to the vectorizer.
pub fn prepare_text(template: &str) -> String {
    let stripped = RE_PLACEHOLDER.replace_all(template, "");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}

/// Groups templates by textual similarity.
#[derive(Debug, Clone)]
pub struct ErrorClusterer {
    max_clusters: usize,
    min_cluster_size: usize,
    max_features: usize,
}

impl Default for ErrorClusterer {
    fn default() -> Self {
        Self::new(10, 2, 1000)
    }
}

impl ErrorClusterer {
    pub fn new(max_clusters: usize, min_cluster_size: usize, max_features: usize) -> Self {
        Self {
            max_clusters: max_clusters.max(1),
            min_cluster_size: min_cluster_size.max(1),
            max_features: max_features.max(1),
        }
    }

    /// Number of clusters to ask for with `n` templates.
    pub fn cluster_count(&self, n: usize) -> usize {
        self.max_clusters.min((n / self.min_cluster_size).max(1))
    }

    /// Partitions every template into exactly one cluster. Clusters come back
    /// ranked by total occurrences, with ids `0..k` following that rank.
    pub fn cluster(&self, templates: &TemplateMap) -> Vec<ErrorCluster> {
        let list: Vec<ErrorTemplate> = templates.values().cloned().collect();
        if list.is_empty() {
            return Vec::new();
        }
        if list.len() < self.min_cluster_size {
            debug!(templates = list.len(), "too few templates to cluster");
            return single_cluster(list);
        }

        let docs: Vec<String> = list.iter().map(|t| prepare_text(&t.template)).collect();
        let opts = TfidfOptions { max_features: self.max_features, ..TfidfOptions::default() };
        let Some(matrix) = vectorize::fit_transform(&docs, opts) else {
            debug!(templates = list.len(), "empty vocabulary; single cluster");
            return single_cluster(list);
        };

        let k = self.cluster_count(list.len());
        if k <= 1 {
            return single_cluster(list);
        }
        debug!(templates = list.len(), features = matrix.n_features(), k, "running k-means");
        let km = KMeans::fit(&matrix.rows, MiniBatchParams::new(k, list.len()));
        build_clusters(list, &km.assignments, &matrix)
    }
}

fn single_cluster(templates: Vec<ErrorTemplate>) -> Vec<ErrorCluster> {
    let keywords = simple_keywords(&templates);
    vec![ErrorCluster::new(templates, keywords)]
}

fn build_clusters(templates: Vec<ErrorTemplate>, labels: &[usize], matrix: &TfidfMatrix) -> Vec<ErrorCluster> {
    let mut groups: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups.sort_keys();

    let mut slots: Vec<Option<ErrorTemplate>> = templates.into_iter().map(Some).collect();
    let mut clusters: Vec<ErrorCluster> = groups
        .values()
        .map(|members| {
            let keywords = centroid_keywords(members, matrix);
            let picked = members.iter().filter_map(|&i| slots[i].take()).collect();
            ErrorCluster::new(picked, keywords)
        })
        .collect();

    // stable, so equal totals keep label order
    clusters.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    for (id, c) in clusters.iter_mut().enumerate() {
        c.id = id;
    }
    debug!(clusters = clusters.len(), "clusters ranked");
    clusters
}

/// Features with the highest mean weight over `members`, zero weights excluded.
fn centroid_keywords(members: &[usize], matrix: &TfidfMatrix) -> Vec<String> {
    if members.is_empty() {
        return Vec::new();
    }
    let n = members.len() as f64;
    let mut scored: Vec<(usize, f64)> = (0..matrix.n_features())
        .map(|f| (f, members.iter().map(|&i| matrix.rows[i][f]).sum::<f64>() / n))
        .filter(|&(_, w)| w > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(f, _)| matrix.features[f].clone())
        .collect()
}

/// Frequency-ranked tokens over the raw template texts. Stop words and
/// tokens of two characters or fewer are skipped; ties keep first-seen order.
pub fn simple_keywords(templates: &[ErrorTemplate]) -> Vec<String> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for t in templates {
        for word in vectorize::tokenize(&t.template) {
            if word.chars().count() > 2 && !vectorize::is_stop_word(&word) {
                *counts.entry(word).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .take(MAX_KEYWORDS)
        .map(|(w, _)| w)
        .collect()
}
