use flate2::write::GzEncoder;
use flate2::Compression;
use logsift::ingest::{
    estimate_line_count, estimate_line_count_with_sample, is_gzip_filename, is_supported_filename, read_lines,
    LineReader, Source,
};
use std::io::{self, Cursor, Read, Write};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

#[test]
fn splits_across_small_chunks() {
    let src = Source::open(&b"one\ntwo\nthree"[..], "a.log");
    let lines: Vec<String> = LineReader::with_chunk_size(src, 4).collect();
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[test]
fn trailing_newline_adds_no_empty_line() {
    let lines: Vec<String> = read_lines(&b"a\nb\n"[..], "a.log").collect();
    assert_eq!(lines, vec!["a", "b"]);
    let lines: Vec<String> = read_lines(&b"a\n\nb"[..], "a.log").collect();
    assert_eq!(lines, vec!["a", "", "b"]);
}

#[test]
fn invalid_utf8_is_replaced() {
    let lines: Vec<String> = read_lines(&b"ok\n\xff\xfebad\n"[..], "a.log").collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "ok");
    assert!(lines[1].contains('\u{FFFD}'));
    assert!(lines[1].ends_with("bad"));
}

#[test]
fn gzip_input_matches_plain() {
    let body = b"first line\nsecond line\nthird";
    let packed = gzip(body);
    let plain: Vec<String> = read_lines(&body[..], "app.log").collect();
    let unpacked: Vec<String> = read_lines(packed.as_slice(), "APP.LOG.GZ").collect();
    assert_eq!(plain, unpacked);
}

#[test]
fn line_spanning_many_chunks() {
    let long = "x".repeat(10_000);
    let data = format!("{long}\nshort\n");
    let src = Source::open(data.as_bytes(), "a.txt");
    let mut reader = LineReader::with_chunk_size(src, 64);
    assert_eq!(reader.next().as_deref(), Some(long.as_str()));
    assert_eq!(reader.next().as_deref(), Some("short"));
    assert_eq!(reader.next(), None);
    assert_eq!(reader.lines_read(), 2);
    assert_eq!(reader.bytes_read(), data.len() as u64);
}

#[test]
fn restart_rewinds_to_first_line() {
    let mut reader = read_lines(Cursor::new(b"a\nb\nc\n".to_vec()), "a.log");
    assert_eq!(reader.next().as_deref(), Some("a"));
    let reader = reader.restart().unwrap();
    assert_eq!(reader.collect::<Vec<_>>(), vec!["a", "b", "c"]);

    let packed = gzip(b"x\ny\n");
    let mut reader = read_lines(Cursor::new(packed), "a.gz");
    reader.next();
    let reader = reader.restart().unwrap();
    assert_eq!(reader.collect::<Vec<_>>(), vec!["x", "y"]);
}

struct Flaky {
    served: bool,
}

impl Read for Flaky {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone"));
        }
        self.served = true;
        let chunk = b"alpha\nbeta";
        buf[..chunk.len()].copy_from_slice(chunk);
        Ok(chunk.len())
    }
}

#[test]
fn read_failure_ends_stream_and_is_kept() {
    let mut reader = read_lines(Flaky { served: false }, "a.log");
    let lines: Vec<String> = reader.by_ref().collect();
    assert_eq!(lines, vec!["alpha", "beta"]);
    assert_eq!(reader.error().map(|e| e.kind()), Some(io::ErrorKind::ConnectionReset));
    assert!(reader.take_error().is_some());
    assert!(reader.error().is_none());
}

#[test]
fn corrupt_gzip_stops_without_panicking() {
    let reader = read_lines(&b"definitely not gzip"[..], "a.gz");
    let mut reader = reader;
    assert_eq!(reader.by_ref().count(), 0);
    assert!(reader.error().is_some());
}

#[test]
fn filename_checks() {
    assert!(is_gzip_filename("app.log.gz"));
    assert!(is_gzip_filename("APP.GZ"));
    assert!(!is_gzip_filename("app.log"));
    assert!(!is_gzip_filename("gz"));
    for ok in ["a.log", "a.TXT", "a.log.gz"] {
        assert!(is_supported_filename(ok), "{ok}");
    }
    for bad in ["a.csv", "log", "a.log.zip", ""] {
        assert!(!is_supported_filename(bad), "{bad}");
    }
}

#[test]
fn estimate_plain_from_sample() {
    let data: String = (0..100).map(|i| format!("line {i:03}\n")).collect();
    assert_eq!(data.len(), 900);
    let mut cur = Cursor::new(data.clone().into_bytes());
    assert_eq!(estimate_line_count(&mut cur, "a.log").unwrap(), 100);

    // sampling only the first 90 bytes still sees the same line length
    let mut cur = Cursor::new(data.into_bytes());
    assert_eq!(estimate_line_count_with_sample(&mut cur, "a.log", 90).unwrap(), 100);
    let mut rest = String::new();
    cur.read_to_string(&mut rest).unwrap();
    assert!(rest.starts_with("line 000"));
}

#[test]
fn estimate_edge_cases() {
    let mut empty = Cursor::new(Vec::new());
    assert_eq!(estimate_line_count(&mut empty, "a.log").unwrap(), 0);
    let mut single = Cursor::new(b"no newline at all".to_vec());
    assert_eq!(estimate_line_count(&mut single, "a.log").unwrap(), 1);
}

#[test]
fn estimate_gzip() {
    let data: String = (0..50).map(|i| format!("event {i}\n")).collect();
    let mut cur = Cursor::new(gzip(data.as_bytes()));
    assert_eq!(estimate_line_count(&mut cur, "a.log.gz").unwrap(), 50);

    let mut junk = Cursor::new(vec![0u8; 1000]);
    assert_eq!(estimate_line_count(&mut junk, "a.gz").unwrap(), 10);
}
