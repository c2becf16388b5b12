use crate::level::LogLevel;
use crate::parser::{self, ParsedLogEntry};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_CONT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\s+at\s+",
        r#"^\s+File\s+""#,
        r"^\s+\w+Error:",
        r"^\s{4,}",
        r"^\t+",
        r"^\s*\.\.\.\s*\d+\s+more",
        r"^\s*Caused by:",
        r"(?i)^\s*Traceback \(most recent call last\):",
        // Final line of a trace, e.g. `ValueError: bad input` or `java.io.IOException`
        r"^(?:[\w$]+\.)*[\w$]+(?:Error|Exception|Throwable)(?::|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const CONTINUATION_HINTS: &[&str] = &["exception", "error", "traceback", "stack", "caused by"];

/// Heuristic test for a line that belongs to the entry above it.
///
/// Best-effort: it looks at indentation and stack-trace shapes, not at a
/// grammar, so unusual formats can be misclassified either way.
pub fn is_continuation_line(line: &str) -> bool {
    if RE_CONT.iter().any(|re| re.is_match(line)) {
        return true;
    }
    let stripped = line.trim();
    line.starts_with([' ', '\t'])
        && !stripped.is_empty()
        && !parser::starts_with_timestamp(stripped)
        && !parser::starts_with_level(stripped)
}

/// Whether an entry is worth holding back in case continuation lines follow.
pub fn might_have_continuation(entry: &ParsedLogEntry) -> bool {
    if entry.has_exception() || matches!(entry.level, LogLevel::Error | LogLevel::Fatal) {
        return true;
    }
    let lower = entry.message.to_lowercase();
    CONTINUATION_HINTS.iter().any(|kw| lower.contains(kw))
}

fn absorb(pending: &mut ParsedLogEntry, line: &str) {
    pending.is_multiline = true;
    pending.raw.push('\n');
    pending.raw.push_str(line);
    match pending.exception.as_mut() {
        Some(exc) => {
            exc.push('\n');
            exc.push_str(line);
        }
        None if parser::shows_exception(line) => pending.exception = Some(line.to_string()),
        None => {}
    }
}

/// Turns a stream of physical lines into logical entries.
///
/// Holds at most one entry back: an entry that may have a stack trace attached
/// stays pending until a line arrives that is not a continuation, or until the
/// input ends.
#[derive(Debug, Default)]
pub struct LogParser {
    pending: Option<ParsedLogEntry>,
    line_number: usize,
    entries: usize,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries_emitted(&self) -> usize {
        self.entries
    }

    /// Physical lines pushed so far, blank ones included.
    pub fn lines_seen(&self) -> usize {
        self.line_number
    }

    /// Feeds the next physical line and yields the entries it completes:
    /// none, the entry that was pending, and/or the entry parsed from `line`.
    pub fn push(&mut self, line: &str) -> Completed {
        self.line_number += 1;
        if line.trim().is_empty() {
            return completed(None, None);
        }

        if is_continuation_line(line) {
            if let Some(pending) = self.pending.as_mut() {
                absorb(pending, line);
                return completed(None, None);
            }
        }

        let flushed = self.pending.take();
        let entry = parser::parse_line(line, self.line_number);
        let emitted = if might_have_continuation(&entry) {
            self.pending = Some(entry);
            None
        } else {
            Some(entry)
        };
        self.entries += usize::from(flushed.is_some()) + usize::from(emitted.is_some());
        completed(flushed, emitted)
    }

    /// Flushes the entry still pending at end of input.
    pub fn finish(&mut self) -> Option<ParsedLogEntry> {
        let out = self.pending.take();
        self.entries += usize::from(out.is_some());
        out
    }

    pub fn parse_lines<I>(self, lines: I) -> Entries<I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Entries { parser: self, lines: lines.into_iter(), queued: None, exhausted: false }
    }
}

/// Entries completed by a single [`LogParser::push`].
pub type Completed = std::iter::Flatten<std::array::IntoIter<Option<ParsedLogEntry>, 2>>;

fn completed(first: Option<ParsedLogEntry>, second: Option<ParsedLogEntry>) -> Completed {
    [first, second].into_iter().flatten()
}

/// Lazy entry iterator returned by [`LogParser::parse_lines`].
pub struct Entries<I: Iterator> {
    parser: LogParser,
    lines: I,
    queued: Option<ParsedLogEntry>,
    exhausted: bool,
}

impl<I: Iterator> Entries<I> {
    pub fn parser(&self) -> &LogParser {
        &self.parser
    }
}

impl<I> Iterator for Entries<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = ParsedLogEntry;

    fn next(&mut self) -> Option<ParsedLogEntry> {
        if let Some(entry) = self.queued.take() {
            return Some(entry);
        }
        if !self.exhausted {
            for line in self.lines.by_ref() {
                let mut ready = self.parser.push(line.as_ref());
                if let Some(first) = ready.next() {
                    self.queued = ready.next();
                    return Some(first);
                }
            }
            self.exhausted = true;
        }
        self.parser.finish()
    }
}
