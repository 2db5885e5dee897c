//! Surgical text edits on the raw descriptor.
//!
//! These never touch bytes outside the field being rewritten, so operator
//! comments, ordering and formatting survive a deployment run.

use regex::{Captures, Regex};
use std::sync::OnceLock;

static TIMEOUT_LINE: OnceLock<Regex> = OnceLock::new();
static LISTED_ADDRESS: OnceLock<Regex> = OnceLock::new();

/// Top-level `deploy_timeout: <int>` with an optional trailing comment.
fn timeout_line() -> &'static Regex {
    TIMEOUT_LINE.get_or_init(|| {
        Regex::new(r"(?m)^(deploy_timeout[ \t]*:[ \t]*)(\d+)([ \t]*(?:#[^\n]*)?\r?)$")
            .expect("Invalid deploy_timeout regex pattern")
    })
}

/// A YAML list entry holding nothing but a dotted quad.
fn listed_address() -> &'static Regex {
    LISTED_ADDRESS.get_or_init(|| {
        Regex::new(
            r#"(?m)^([ \t]*-[ \t]+["']?)(?:\d{1,3}\.){3}\d{1,3}(["']?[ \t]*(?:#[^\n]*)?\r?)$"#,
        )
        .expect("Invalid listed address regex pattern")
    })
}

/// Replaces every occurrence of `old` that stands alone as an address.
///
/// Returns the new text and the number of replacements.
pub fn substitute_address(text: &str, old: &str, new: &str) -> (String, usize) {
    if old.is_empty() || old == new {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;

    for (start, _) in text.match_indices(old) {
        let end = start + old.len();
        if !is_address_boundary(text, start, end) {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str(new);
        last = end;
        count += 1;
    }

    out.push_str(&text[last..]);
    (out, count)
}

// `1.2.3.4` must not match inside `11.2.3.4`, `1.2.3.45` or `1.2.3.4.5`.
fn is_address_boundary(text: &str, start: usize, end: usize) -> bool {
    if let Some(c) = text[..start].chars().next_back() {
        if c.is_ascii_digit() || c == '.' {
            return false;
        }
    }

    let mut after = text[end..].chars();
    match after.next() {
        Some(c) if c.is_ascii_digit() => false,
        Some('.') => !matches!(after.next(), Some(c) if c.is_ascii_digit()),
        _ => true,
    }
}

/// Rewrites the value of every `deploy_timeout` line. Returns the lines touched.
pub fn set_deploy_timeout(text: &str, value: u64) -> (String, usize) {
    let re = timeout_line();
    let count = re.find_iter(text).count();
    if count == 0 {
        return (text.to_string(), 0);
    }

    let out = re.replace_all(text, |caps: &Captures<'_>| {
        format!("{}{}{}", &caps[1], value, &caps[3])
    });
    (out.into_owned(), count)
}

/// Sets the timeout, appending a `deploy_timeout` line when there is none.
pub fn upsert_deploy_timeout(text: &str, value: u64) -> String {
    let (out, count) = set_deploy_timeout(text, value);
    if count > 0 {
        return out;
    }

    let mut out = ensure_trailing_newline(text);
    out.push_str(&format!("deploy_timeout: {}\n", value));
    out
}

/// Rewrites every `- <ipv4>` list entry to `address`.
pub fn replace_listed_addresses(text: &str, address: &str) -> (String, usize) {
    let re = listed_address();
    let count = re.find_iter(text).count();
    let out = re.replace_all(text, |caps: &Captures<'_>| {
        format!("{}{}{}", &caps[1], address, &caps[2])
    });
    (out.into_owned(), count)
}

pub fn ensure_trailing_newline(text: &str) -> String {
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOY_YML: &str = "\
# Name of your application.
service: shop

servers:
  web:
    - 10.0.0.1 # primary

proxy:
  ssl: true
  host: app.example.com

deploy_timeout: 100   # seconds
";

    #[test]
    fn test_substitute_all_occurrences() {
        let text = "servers:\n  web:\n    - 1.2.3.4\nbuilder:\n  remote: ssh://root@1.2.3.4\n";
        let (out, count) = substitute_address(text, "1.2.3.4", "5.6.7.8");
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "servers:\n  web:\n    - 5.6.7.8\nbuilder:\n  remote: ssh://root@5.6.7.8\n"
        );
    }

    #[test]
    fn test_substitute_leaves_numbers_alone() {
        let (out, count) = substitute_address(DEPLOY_YML, "10.0.0.1", "5.6.7.8");
        assert_eq!(count, 1);
        assert!(out.contains("    - 5.6.7.8 # primary\n"));
        assert!(out.contains("deploy_timeout: 100   # seconds\n"));
    }

    #[test]
    fn test_substitute_respects_boundaries() {
        let text = "a: 10.0.0.12\nb: 110.0.0.1\nc: 10.0.0.1.5\nd: 10.0.0.1.\ne: \"10.0.0.1\"\n";
        let (out, count) = substitute_address(text, "10.0.0.1", "9.9.9.9");
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "a: 10.0.0.12\nb: 110.0.0.1\nc: 10.0.0.1.5\nd: 9.9.9.9.\ne: \"9.9.9.9\"\n"
        );
    }

    #[test]
    fn test_substitute_same_address_is_noop() {
        let (out, count) = substitute_address(DEPLOY_YML, "10.0.0.1", "10.0.0.1");
        assert_eq!(count, 0);
        assert_eq!(out, DEPLOY_YML);
    }

    #[test]
    fn test_set_timeout_keeps_comment_and_spacing() {
        let (out, count) = set_deploy_timeout(DEPLOY_YML, 120);
        assert_eq!(count, 1);
        assert!(out.contains("deploy_timeout: 120   # seconds\n"));
        assert_eq!(out.len(), DEPLOY_YML.len());
    }

    #[test]
    fn test_set_timeout_ignores_nested_and_non_numeric() {
        let text = "accessories:\n  db:\n    deploy_timeout: 10\ndeploy_timeout: <%= 30 %>\n";
        let (out, count) = set_deploy_timeout(text, 120);
        assert_eq!(count, 0);
        assert_eq!(out, text);
    }

    #[test]
    fn test_set_timeout_allows_space_before_colon() {
        let text = "service: shop\ndeploy_timeout : 30\n";
        let (out, count) = set_deploy_timeout(text, 120);
        assert_eq!(count, 1);
        assert_eq!(out, "service: shop\ndeploy_timeout : 120\n");
    }

    #[test]
    fn test_elevate_then_restore_round_trip() {
        let elevated = upsert_deploy_timeout(DEPLOY_YML, 120);
        assert_ne!(elevated, DEPLOY_YML);

        let (restored, _) = set_deploy_timeout(&elevated, 100);
        assert_eq!(ensure_trailing_newline(&restored), DEPLOY_YML);
    }

    #[test]
    fn test_round_trip_with_crlf() {
        let text = "service: shop\r\ndeploy_timeout: 45\r\nproxy:\r\n  host: a.b.c\r\n";
        let elevated = upsert_deploy_timeout(text, 120);
        assert!(elevated.contains("deploy_timeout: 120\r\n"));

        let (restored, _) = set_deploy_timeout(&elevated, 45);
        assert_eq!(restored, text);
    }

    #[test]
    fn test_upsert_appends_single_line() {
        let text = "service: shop\nproxy:\n  host: app.example.com";
        let out = upsert_deploy_timeout(text, 120);
        assert_eq!(
            out,
            "service: shop\nproxy:\n  host: app.example.com\ndeploy_timeout: 120\n"
        );
        assert_eq!(out.matches("deploy_timeout").count(), 1);
    }

    #[test]
    fn test_replace_listed_addresses() {
        let text = "servers:\n  web:\n    - 1.2.3.4\n    - \"1.2.3.5\" # standby\nlabels:\n  - traefik\n";
        let (out, count) = replace_listed_addresses(text, "5.6.7.8");
        assert_eq!(count, 2);
        assert_eq!(
            out,
            "servers:\n  web:\n    - 5.6.7.8\n    - \"5.6.7.8\" # standby\nlabels:\n  - traefik\n"
        );
    }

    #[test]
    fn test_ensure_trailing_newline() {
        assert_eq!(ensure_trailing_newline("a"), "a\n");
        assert_eq!(ensure_trailing_newline("a\n"), "a\n");
        assert_eq!(ensure_trailing_newline(""), "");
    }
}
