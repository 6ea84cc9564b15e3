//! Helper functions and filters available to every template.
//!
//! This vocabulary is part of the public contract: built-in and
//! user-replacement templates reference these names.

use convert_case::{Case, Casing};
use minijinja::Environment;

/// Convert to PascalCase (`user_accounts` -> `UserAccounts`)
pub fn pascal(value: &str) -> String {
    value.to_case(Case::Pascal)
}

/// Convert to snake_case (`UserAccounts` -> `user_accounts`)
pub fn snake(value: &str) -> String {
    value.to_case(Case::Snake)
}

/// Wrap in double quotes, escaping embedded quotes and backslashes
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Wrap in backticks (Go struct tags, raw string literals)
pub fn backquote(value: &str) -> String {
    format!("`{}`", value)
}

/// Prefix every non-empty line with `n` spaces
pub fn indent(value: &str, n: usize) -> String {
    let pad = " ".repeat(n);
    value
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Register the helper vocabulary on a template environment
pub fn register(env: &mut Environment<'_>) {
    env.add_filter("pascal", |v: String| pascal(&v));
    env.add_filter("snake", |v: String| snake(&v));
    env.add_filter("quote", |v: String| quote(&v));
    env.add_filter("backquote", |v: String| backquote(&v));
    env.add_filter("indent", |v: String, n: usize| indent(&v, n));
    env.add_filter("contains", |v: String, needle: String| v.contains(&needle));
    env.add_filter("has_prefix", |v: String, prefix: String| {
        v.starts_with(&prefix)
    });
    env.add_filter("has_suffix", |v: String, suffix: String| {
        v.ends_with(&suffix)
    });
    env.add_filter("trim", |v: String| v.trim().to_string());
    env.add_function("add", |a: i64, b: i64| a + b);
    env.add_function("join", |sep: String, parts: Vec<String>| parts.join(&sep));
}
