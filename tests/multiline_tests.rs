use logsift::ingest;
use logsift::level::LogLevel;
use logsift::multiline::{is_continuation_line, might_have_continuation, LogParser};
use logsift::parser::{parse_line, ParsedLogEntry};

fn parse_all(lines: &[&str]) -> Vec<ParsedLogEntry> {
    LogParser::new().parse_lines(lines.iter().copied()).collect()
}

#[test]
fn python_traceback_becomes_one_entry() {
    let lines = [
        "2024-01-15 10:30:45 ERROR Exception occurred",
        "Traceback (most recent call last):",
        "  File \"app.py\", line 42",
        "ValueError: bad input",
        "2024-01-15 10:30:46 INFO Normal log",
    ];
    let out = parse_all(&lines);
    assert_eq!(out.len(), 2);
    assert!(out[0].is_multiline);
    assert!(out[0].raw.contains("Traceback"));
    assert!(out[0].raw.ends_with("ValueError: bad input"));
    assert_eq!(out[0].level, LogLevel::Error);
    assert_eq!(out[1].level, LogLevel::Info);
    assert_eq!(out[1].message, "Normal log");
    assert!(!out[1].is_multiline);
}

#[test]
fn java_trace_is_folded_into_exception() {
    let lines = [
        "2024-01-15 10:30:45 FATAL Request failed",
        "java.lang.NullPointerException: null",
        "\tat com.example.Foo.bar(Foo.java:12)",
        "\tat com.example.Main.main(Main.java:3)",
        "Caused by: java.io.IOException: disk",
        "\t... 5 more",
        "2024-01-15 10:30:46 INFO ok",
    ];
    let out = parse_all(&lines);
    assert_eq!(out.len(), 2);
    let exc = out[0].exception.as_deref().unwrap();
    assert!(exc.starts_with("java.lang.NullPointerException"));
    assert!(exc.contains("com.example.Main.main"));
    assert!(exc.contains("Caused by"));
    assert_eq!(out[0].raw.lines().count(), 6);
    assert_eq!(out[1].line_number, 7);
}

#[test]
fn exception_text_is_extended_when_header_already_had_one() {
    let lines = [
        "ERROR worker crashed with RuntimeException",
        "    at com.example.Worker.run(Worker.java:88)",
    ];
    let out = parse_all(&lines);
    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0].exception.as_deref(),
        Some("ERROR worker crashed with RuntimeException\n    at com.example.Worker.run(Worker.java:88)")
    );
}

#[test]
fn continuation_with_lowercase_error_becomes_the_exception() {
    let out = parse_all(&["FATAL worker stopped", "    caused an error in the pool", "INFO next"]);
    assert_eq!(out.len(), 2);
    assert!(out[0].is_multiline);
    assert_eq!(out[0].exception.as_deref(), Some("    caused an error in the pool"));
}

#[test]
fn indented_line_without_pending_entry_starts_a_new_one() {
    let out = parse_all(&["INFO started", "    details follow"]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].level, LogLevel::Unknown);
    assert!(!out[0].is_multiline);
}

#[test]
fn indented_timestamp_line_is_not_a_continuation() {
    let out = parse_all(&["ERROR boom", " 2024-01-15 10:30:45 INFO next"]);
    assert_eq!(out.len(), 2);
    assert!(!out[0].is_multiline);
}

#[test]
fn blank_lines_neither_flush_nor_continue() {
    let lines = ["INFO a", "", "ERROR b", "   ", "  at x.y(Z.java:1)", "INFO c"];
    let mut parser = LogParser::new();
    let mut out = Vec::new();
    for l in &lines {
        out.extend(parser.push(l));
    }
    out.extend(parser.finish());
    assert_eq!(out.len(), 3);
    assert_eq!(out.iter().map(|e| e.line_number).collect::<Vec<_>>(), vec![1, 3, 6]);
    assert!(out[1].is_multiline);
    assert_eq!(parser.lines_seen(), 6);
    assert_eq!(parser.entries_emitted(), 3);
}

#[test]
fn pending_entry_is_flushed_at_end_of_input() {
    let mut parser = LogParser::new();
    assert_eq!(parser.push("FATAL out of memory").count(), 0);
    assert_eq!(parser.push("\tat alloc(heap.c:10)").count(), 0);
    let last = parser.finish().unwrap();
    assert_eq!(last.level, LogLevel::Fatal);
    assert!(last.is_multiline);
    assert!(parser.finish().is_none());
}

#[test]
fn plain_info_line_is_emitted_immediately() {
    let mut parser = LogParser::new();
    let got: Vec<_> = parser.push("INFO ready").collect();
    assert_eq!(got.len(), 1);
    let got: Vec<_> = parser.push("ERROR down").collect();
    assert!(got.is_empty());
    // pending ERROR and the new INFO line complete together
    let got: Vec<_> = parser.push("INFO up").collect();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].message, "down");
    assert_eq!(got[1].message, "up");
}

#[test]
fn continuation_predicate_shapes() {
    assert!(is_continuation_line("    at com.example.Foo.bar(Foo.java:12)"));
    assert!(is_continuation_line("\tat x"));
    assert!(is_continuation_line("  File \"a.py\", line 1"));
    assert!(is_continuation_line("  KeyError: 'id'"));
    assert!(is_continuation_line("... 12 more"));
    assert!(is_continuation_line("Caused by: java.io.IOException"));
    assert!(is_continuation_line("Traceback (most recent call last):"));
    assert!(is_continuation_line("requests.exceptions.ConnectionError: refused"));
    assert!(is_continuation_line(" some wrapped text"));
    assert!(!is_continuation_line(" ERROR next entry"));
    assert!(!is_continuation_line("2024-01-15 10:30:45 INFO hello"));
    assert!(!is_continuation_line("plain words"));
    assert!(!is_continuation_line("   "));
}

#[test]
fn continuation_candidates() {
    assert!(might_have_continuation(&parse_line("ERROR x", 1)));
    assert!(might_have_continuation(&parse_line("INFO dumping stack", 1)));
    assert!(might_have_continuation(&parse_line("DEBUG caused by upstream", 1)));
    assert!(!might_have_continuation(&parse_line("INFO all good", 1)));
}

#[test]
fn parses_lazily_from_line_reader() {
    let data = b"ERROR first\n  at a.b(C.java:1)\nINFO second\nWARN third";
    let mut lines = ingest::read_lines(&data[..], "app.log");
    let entries: Vec<_> = LogParser::new().parse_lines(lines.by_ref()).collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].message, "third");
    assert_eq!(lines.lines_read(), 4);
}
