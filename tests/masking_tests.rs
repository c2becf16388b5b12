use logsift::masking::{collapse_repeated_placeholders, normalize, RULES};
use proptest::prelude::*;
use regex::Regex;

#[test]
fn masks_ip_uuid_and_iso_timestamp() {
    assert_eq!(normalize("Connection to 192.168.1.10 failed"), "Connection to <IP> failed");
    assert_eq!(
        normalize("User 550e8400-e29b-41d4-a716-446655440000 not found"),
        "User <UUID> not found"
    );
    assert_eq!(normalize("at 2024-01-15T10:30:45Z done"), "at <TIMESTAMP> done");
    assert_eq!(normalize("2024-01-15 10:30:45,123 retry scheduled"), "<TIMESTAMP> retry scheduled");
}

#[test]
fn masks_contextual_numbers() {
    assert_eq!(normalize("listening on port 8080"), "listening on port <PORT>");
    assert_eq!(normalize("retries=3 exhausted"), "retries=<NUM> exhausted");
    assert_eq!(normalize("status: 404 returned"), "status: <NUM> returned");
    // small meaningful integers after a colon are swallowed too
    assert_eq!(normalize("HTTP status: 500"), "HTTP status: <NUM>");
    assert_eq!(normalize("order 12345678 rejected"), "order <ID> rejected");
}

#[test]
fn masks_compound_values() {
    assert_eq!(normalize("request took 250ms"), "request took <DURATION>");
    assert_eq!(normalize("ptr 0x7ffee4b2 null"), "ptr <HEX> null");
    assert_eq!(normalize("open /var/log/app.log failed"), "open <PATH> failed");
    assert_eq!(normalize("GET https://api.example.com/v1/users?id=42 timeout"), "GET <URL> timeout");
    assert_eq!(normalize("notify ops@example.com failed"), "notify <EMAIL> failed");
    assert_eq!(normalize("trace abcdefghijklmnopqrstuvwx1234 lost"), "trace <REQUEST_ID> lost");
}

#[test]
fn hash_lengths_get_their_own_placeholder() {
    assert_eq!(normalize("doc 507f1f77bcf86cd799439011 missing"), "doc <OBJECT_ID> missing");
    assert_eq!(normalize("commit 0123456789abcdef0123456789abcdef01234567 bad"), "commit <SHA> bad");
    let sha256 = "a".repeat(64);
    assert_eq!(normalize(&format!("digest {sha256} mismatch")), "digest <SHA256> mismatch");
}

#[test]
fn collapses_repeats_and_whitespace() {
    assert_eq!(normalize("hosts 10.0.0.1 10.0.0.2 10.0.0.3 down"), "hosts <IP> down");
    assert_eq!(normalize("hosts 10.0.0.1, 10.0.0.2"), "hosts <IP>, <IP>");
    assert_eq!(normalize("  too   many \t spaces  "), "too many spaces");
    assert_eq!(collapse_repeated_placeholders("<A><A> <A> <B> <A>"), "<A> <B> <A>");
}

#[test]
fn rules_run_in_declared_order() {
    let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
    assert_eq!(names.first(), Some(&"uuid"));
    assert_eq!(names.last(), Some(&"token"));
    let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
    assert!(pos("url") < pos("path"));
    assert!(pos("long_number") < pos("after_colon"));
    assert!(pos("iso_timestamp") < pos("duration"));
}

#[test]
fn each_rule_rewrites_its_own_shape() {
    let port = RULES.iter().find(|r| r.name == "port").unwrap();
    assert_eq!(port.apply("port 5432 closed"), "port <PORT> closed");
    let colon = RULES.iter().find(|r| r.name == "after_colon").unwrap();
    assert_eq!(colon.apply("code: 7, retry: 2"), "code: <NUM>, retry: <NUM>");
    assert_eq!(colon.apply("time: 7x"), "time: 7x");
}

const WORDS: &[&str] = &[
    "error",
    "failed",
    "port",
    "status:",
    ":",
    "7",
    "id=42",
    "192.168.0.1",
    "550e8400-e29b-41d4-a716-446655440000",
    "/var/log/app.log",
    "https://example.com/a",
    "250ms",
    "0xdeadbeef",
    "12345678",
    "user@example.com",
    "2024-01-15T10:30:45Z",
    "2024-01-15",
    "10:30:45",
    "ABCDEFGHIJKLMNOPQRSTUVWX12",
    "\t",
];

proptest! {
    #[test]
    fn normalize_is_idempotent(words in prop::collection::vec(prop::sample::select(WORDS), 0..16)) {
        let msg = words.join(" ");
        let once = normalize(&msg);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn no_ipv4_or_uuid_survives(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>(), hex in "[0-9a-f]{32}") {
        let uuid = format!("{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..]);
        let msg = format!("peer {a}.{b}.{c}.{d} session {uuid} at 2024-03-01T08:00:00.250+02:00 dropped");
        let out = normalize(&msg);
        let ipv4 = Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap();
        let iso = Regex::new(r"\d{4}-\d{2}-\d{2}T").unwrap();
        prop_assert!(!ipv4.is_match(&out));
        prop_assert!(!iso.is_match(&out));
        prop_assert!(!out.contains(&uuid));
        prop_assert_eq!(out, "peer <IP> session <UUID> at <TIMESTAMP> dropped");
    }
}
