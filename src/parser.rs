use crate::level::LogLevel;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedLogEntry {
    pub raw: String,
    pub line_number: usize,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: Option<String>,
    pub logger: Option<String>,
    pub exception: Option<String>,
    pub is_multiline: bool,
}

impl ParsedLogEntry {
    pub fn new(raw: impl Into<String>, line_number: usize, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            line_number,
            level,
            message: message.into(),
            timestamp: None,
            logger: None,
            exception: None,
            is_multiline: false,
        }
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level.is_error()
    }

    pub fn has_exception(&self) -> bool {
        self.exception.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }
}

const LEVEL_KEYS: &[&str] = &["level", "severity", "log_level", "lvl"];
const MESSAGE_KEYS: &[&str] = &["message", "msg", "text", "@message"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "@timestamp", "ts"];
const LOGGER_KEYS: &[&str] = &["logger", "name", "source"];
const EXCEPTION_KEYS: &[&str] = &["exception", "error", "stack_trace", "stacktrace", "err"];

// Alternation order is significant: at a given offset the first shape wins.
const TIMESTAMP_SHAPES: &str = concat!(
    r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
    r"|\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[,.]\d{3})?",
    r"|\d{4}/\d{2}/\d{2}\s+\d{2}:\d{2}:\d{2}",
    r"|\[\d{10,13}\]",
    r"|\[\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[,.]\d+)?\]",
);

static RE_TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(TIMESTAMP_SHAPES).unwrap());

static RE_TIMESTAMP_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?:{TIMESTAMP_SHAPES})")).unwrap());

const LEVEL_WORDS: &str = "TRACE|DEBUG|INFO|INFORMATION|WARN|WARNING|ERROR|ERR|FATAL|CRITICAL|CRIT|SEVERE|PANIC";

static RE_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"(?i)\b(?:{LEVEL_WORDS})\b")).unwrap());

static RE_LEVEL_START: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"(?i)^(?:{LEVEL_WORDS})\b")).unwrap());

static RE_MESSAGE_LEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s\-:\]]+").unwrap());

static RE_EXCEPTION: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*Traceback \(most recent call last\):",
        r"^\s*at\s+[\w.$]+\(\w+\.\w+:\d+\)",
        r#"^\s*File ".*", line \d+"#,
        r"^\s+at\s+.*\(.*:\d+:\d+\)",
        r"(?i)Exception|Error|Throwable",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// True when the line carries exception content: a traceback header, a stack
/// frame in one of the common language shapes, or an exception class name.
pub fn shows_exception(line: &str) -> bool {
    RE_EXCEPTION.iter().any(|re| re.is_match(line))
}

/// First timestamp-shaped substring of `line`.
pub fn find_timestamp(line: &str) -> Option<&str> {
    RE_TIMESTAMP.find(line).map(|m| m.as_str())
}

pub fn starts_with_timestamp(text: &str) -> bool {
    RE_TIMESTAMP_START.is_match(text)
}

pub fn starts_with_level(text: &str) -> bool {
    RE_LEVEL_START.is_match(text)
}

/// Parses one physical line. JSON objects get structured extraction; anything
/// else, including JSON that fails to decode, goes through free-text parsing.
pub fn parse_line(line: &str, line_number: usize) -> ParsedLogEntry {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
            return parse_json_object(trimmed, &map, line_number);
        }
    }
    parse_plain_line(line, line_number)
}

fn parse_json_object(raw: &str, map: &Map<String, Value>, line_number: usize) -> ParsedLogEntry {
    let level = pick(map, LEVEL_KEYS)
        .map(|v| LogLevel::from_token(&value_text(v)))
        .unwrap_or(LogLevel::Unknown);
    let message = pick(map, MESSAGE_KEYS)
        .map(value_text)
        .unwrap_or_else(|| raw.to_string());

    ParsedLogEntry {
        raw: raw.to_string(),
        line_number,
        level,
        message,
        timestamp: pick(map, TIMESTAMP_KEYS).map(value_text),
        logger: pick(map, LOGGER_KEYS).map(value_text),
        exception: pick(map, EXCEPTION_KEYS).map(value_text),
        is_multiline: false,
    }
}

fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| map.get(*k)).find(|v| is_present(v))
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_plain_line(line: &str, line_number: usize) -> ParsedLogEntry {
    let timestamp = find_timestamp(line).map(str::to_string);

    let (mut level, message) = match RE_LEVEL.find(line) {
        Some(m) => {
            let rest = line[m.end()..].trim();
            let message = if rest.is_empty() {
                line.to_string()
            } else {
                RE_MESSAGE_LEAD.replace(rest, "").into_owned()
            };
            (LogLevel::from_token(m.as_str()), message)
        }
        None => (LogLevel::Unknown, line.to_string()),
    };

    let exception = if shows_exception(line) {
        if level == LogLevel::Unknown {
            level = LogLevel::Error;
        }
        Some(line.to_string())
    } else {
        None
    };

    ParsedLogEntry {
        raw: line.to_string(),
        line_number,
        level,
        message,
        timestamp,
        logger: None,
        exception,
        is_multiline: false,
    }
}

/// Converts a timestamp string as extracted by the parser into UTC.
/// Naive forms are taken as UTC; bracketed and bare epochs of 10 or 13 digits
/// are read as seconds or milliseconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_start_matches('[').trim_end_matches(']');
    parse_ts_string(s).or_else(|| parse_ts_number_string(s))
}

fn parse_ts_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let zoned = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];
    for f in zoned.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    // chrono only accepts '.' before fractional seconds
    let s = s.replacen(',', ".", 1);
    let fmts = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];
    for f in fmts.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&s, f) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    None
}

fn parse_ts_number_string(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n = s.parse::<i64>().ok()?;
    match s.len() {
        10 => Utc.timestamp_opt(n, 0).single(),
        13 => Utc.timestamp_millis_opt(n).single(),
        _ => None,
    }
}
