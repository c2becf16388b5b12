use once_cell::sync::Lazy;
use regex::Regex;

/// One rewrite step of the normalization pipeline.
///
/// `replacement` uses `regex` expansion syntax, so context captured around the
/// value (`port `, `: `, `=`) is written back with `${1}` and friends.
pub struct MaskRule {
    pub name: &'static str,
    pub matcher: Regex,
    pub replacement: &'static str,
}

impl MaskRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self { name, matcher: Regex::new(pattern).unwrap(), replacement }
    }

    pub fn apply(&self, input: &str) -> String {
        self.matcher.replace_all(input, self.replacement).into_owned()
    }
}

/// Rules in application order. Each rule sees the output of the ones before
/// it, so the unambiguous shapes come first and the catch-alls last.
pub static RULES: Lazy<Vec<MaskRule>> = Lazy::new(|| {
    vec![
        MaskRule::new(
            "uuid",
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
            "<UUID>",
        ),
        MaskRule::new("object_id", r"\b[0-9a-fA-F]{24}\b", "<OBJECT_ID>"),
        MaskRule::new("sha1", r"\b[0-9a-fA-F]{40}\b", "<SHA>"),
        MaskRule::new("sha256", r"\b[0-9a-fA-F]{64}\b", "<SHA256>"),
        MaskRule::new("ipv4", r"\b(?:\d{1,3}\.){3}\d{1,3}\b", "<IP>"),
        MaskRule::new("ipv6", r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b", "<IPv6>"),
        MaskRule::new("url", r#"https?://[^\s<>"']+"#, "<URL>"),
        MaskRule::new("path", r"/[\w\-./]+", "<PATH>"),
        MaskRule::new("email", r"\b[\w.+-]+@[\w.-]+\.\w+\b", "<EMAIL>"),
        MaskRule::new(
            "iso_timestamp",
            r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
            "<TIMESTAMP>",
        ),
        MaskRule::new(
            "datetime",
            r"\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[,.]\d+)?",
            "<TIMESTAMP>",
        ),
        MaskRule::new("clf_timestamp", r"\d{2}/\w{3}/\d{4}:\d{2}:\d{2}:\d{2}", "<TIMESTAMP>"),
        MaskRule::new("duration", r"\b\d+(?:\.\d+)?(?:ms|us|µs|ns|s|m|h)\b", "<DURATION>"),
        MaskRule::new("hex", r"\b0x[0-9a-fA-F]+\b", "<HEX>"),
        MaskRule::new("long_number", r"\b\d{6,}\b", "<ID>"),
        MaskRule::new("port", r"(port\s)\d+", "${1}<PORT>"),
        MaskRule::new("after_colon", r"(:\s)\d+(\s|$|,)", "${1}<NUM>${2}"),
        MaskRule::new("after_equals", r"(=)\d+", "${1}<NUM>"),
        MaskRule::new("token", r"\b[A-Za-z0-9]{20,}\b", "<REQUEST_ID>"),
    ]
});

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\w+>").unwrap());

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn collapse_whitespace(input: &str) -> String {
    RE_WS.replace_all(input, " ").trim().to_string()
}

/// Collapses runs of the same placeholder, optionally separated by
/// whitespace, into one: `<IP>, <IP> <IP>` becomes `<IP>, <IP>`.
pub fn collapse_repeated_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let mut prev: Option<&str> = None;
    for m in RE_PLACEHOLDER.find_iter(input) {
        let gap = &input[last..m.start()];
        let repeat = prev == Some(m.as_str()) && gap.chars().all(char::is_whitespace);
        if !repeat {
            out.push_str(gap);
            out.push_str(m.as_str());
        }
        prev = Some(m.as_str());
        last = m.end();
    }
    out.push_str(&input[last..]);
    out
}

/// Rewrites a message into its template form.
///
/// Whitespace is collapsed before the rules run as well as after, so a value
/// hidden behind a double space is masked on the first pass; this keeps
/// `normalize(normalize(m)) == normalize(m)`.
pub fn normalize(message: &str) -> String {
    let mut s = collapse_whitespace(message);
    for rule in RULES.iter() {
        s = rule.apply(&s);
    }
    collapse_whitespace(&collapse_repeated_placeholders(&s))
}
