//! Expansion of the environment-variable tags found in Rails-style YAML files.
//!
//! Only three forms are understood:
//! - `<%= ENV["NAME"] %>` (unset expands to an empty string)
//! - `<%= ENV.fetch("NAME") %>` (unset is an error)
//! - `<%= ENV.fetch("NAME", "default") %>` / `<%= ENV.fetch("NAME") { "default" } %>`
//!
//! Every other tag is copied through untouched. Nothing is ever evaluated.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::error::CoreError;

static ENV_TAG: OnceLock<Regex> = OnceLock::new();

fn env_tag() -> &'static Regex {
    ENV_TAG.get_or_init(|| {
        Regex::new(
            r#"<%=\s*ENV(?:\[\s*["']([A-Za-z_][A-Za-z0-9_]*)["']\s*\]|\.fetch\(\s*["']([A-Za-z_][A-Za-z0-9_]*)["']\s*(?:,\s*(?:"([^"]*)"|'([^']*)'|(\d+))\s*)?\)(?:\s*\{\s*(?:"([^"]*)"|'([^']*)'|(\d+))\s*\})?)\s*%>"#,
        )
        .expect("Invalid env tag regex pattern")
    })
}

/// Expands env tags using `lookup` to resolve variable names.
pub fn expand_env_tags<F>(text: &str, lookup: F) -> Result<String, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    expand(text, &lookup, true)
}

/// Like [`expand_env_tags`], but a `fetch` with no value and no default is
/// kept as literal text instead of failing.
pub fn expand_env_tags_lenient<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    expand(text, &lookup, false).unwrap_or_else(|_| text.to_string())
}

/// Expands env tags against the current process environment.
pub fn expand_with_process_env(text: &str) -> Result<String, CoreError> {
    expand_env_tags(text, |name| std::env::var(name).ok())
}

pub fn expand_with_process_env_lenient(text: &str) -> String {
    expand_env_tags_lenient(text, |name| std::env::var(name).ok())
}

fn expand<F>(text: &str, lookup: &F, strict: bool) -> Result<String, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in env_tag().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        match resolve(&caps, lookup) {
            Ok(value) => out.push_str(&value),
            Err(CoreError::MissingEnvVar(_)) if !strict => out.push_str(whole.as_str()),
            Err(e) => return Err(e),
        }
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

fn resolve<F>(caps: &Captures<'_>, lookup: &F) -> Result<String, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(name) = caps.get(1) {
        return Ok(lookup(name.as_str()).unwrap_or_default());
    }

    // Group 2 is always set when group 1 is not.
    let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    if let Some(value) = lookup(name) {
        return Ok(value);
    }

    (3..=8)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CoreError::MissingEnvVar(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env() -> HashMap<&'static str, &'static str> {
        HashMap::from([("DB_HOST", "db.internal"), ("DB_PASSWORD", "s3cret")])
    }

    fn expand(text: &str) -> Result<String, CoreError> {
        let vars = env();
        expand_env_tags(text, |name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_index_form() {
        assert_eq!(
            expand("host: <%= ENV['DB_HOST'] %>").unwrap(),
            "host: db.internal"
        );
        assert_eq!(expand("host: <%= ENV[\"NOPE\"] %>").unwrap(), "host: ");
    }

    #[test]
    fn test_fetch_forms() {
        assert_eq!(
            expand("password: <%= ENV.fetch(\"DB_PASSWORD\") %>").unwrap(),
            "password: s3cret"
        );
        assert_eq!(
            expand("port: <%= ENV.fetch(\"DB_PORT\", 5432) %>").unwrap(),
            "port: 5432"
        );
        assert_eq!(
            expand("user: <%= ENV.fetch(\"DB_USER\") { \"rails\" } %>").unwrap(),
            "user: rails"
        );
        assert_eq!(
            expand("host: <%= ENV.fetch('DB_HOST', 'localhost') %>").unwrap(),
            "host: db.internal"
        );
    }

    #[test]
    fn test_fetch_without_default_fails() {
        let err = expand("user: <%= ENV.fetch(\"DB_USER\") %>").unwrap_err();
        assert!(matches!(err, CoreError::MissingEnvVar(name) if name == "DB_USER"));
    }

    #[test]
    fn test_lenient_keeps_unresolvable_fetch() {
        let vars = env();
        let text = "host: <%= ENV['DB_HOST'] %>\npassword: <%= ENV.fetch(\"REGISTRY_PASSWORD\") %>\n";
        assert_eq!(
            expand_env_tags_lenient(text, |name| vars.get(name).map(|v| v.to_string())),
            "host: db.internal\npassword: <%= ENV.fetch(\"REGISTRY_PASSWORD\") %>\n"
        );
    }

    #[test]
    fn test_other_tags_untouched() {
        let text = "pool: <%= ENV.fetch(\"RAILS_MAX_THREADS\") { 5 } %>\nx: <%= 1 + 1 %>\n";
        assert_eq!(expand(text).unwrap(), "pool: 5\nx: <%= 1 + 1 %>\n");
    }
}
