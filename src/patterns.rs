use indexmap::IndexMap;
use serde::Serialize;

/// Example messages kept per template.
pub const MAX_EXAMPLES: usize = 3;

/// De-duplication bucket for one normalized message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorTemplate {
    pub template: String,
    pub examples: Vec<String>,
    pub count: usize,
    pub first_occurrence_line: usize,
}

impl ErrorTemplate {
    pub fn new(template: impl Into<String>, first_occurrence_line: usize) -> Self {
        Self {
            template: template.into(),
            examples: Vec::new(),
            count: 0,
            first_occurrence_line,
        }
    }

    /// Records one more occurrence; `message` is the original, unmasked text.
    pub fn add_occurrence(&mut self, message: &str) {
        self.count += 1;
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(message.to_string());
        }
    }
}

/// Templates keyed by normalized text, in order of first appearance.
pub type TemplateMap = IndexMap<String, ErrorTemplate>;

/// Counts one occurrence of `message` under `key`, creating the bucket if needed.
pub fn record(map: &mut TemplateMap, key: String, message: &str, line_number: usize) {
    map.entry(key)
        .or_insert_with_key(|k| ErrorTemplate::new(k.clone(), line_number))
        .add_occurrence(message);
}

/// The `n` most frequent templates. Equal counts keep first-appearance order.
pub fn ranked(map: &TemplateMap, n: usize) -> Vec<&ErrorTemplate> {
    let mut all: Vec<&ErrorTemplate> = map.values().collect();
    all.sort_by(|a, b| b.count.cmp(&a.count));
    all.truncate(n);
    all
}
