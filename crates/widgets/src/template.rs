//! `{{ name }}` substitution for authored strings.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;
use shared::domain::Params;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex")
    })
}

/// Resolves placeholders against `params`. Unknown names render as nothing.
pub fn parse_with_params(template: &str, params: &Params) -> String {
    render(template, params, false)
}

/// Same as [`parse_with_params`] but HTML-escapes substituted values. The
/// template itself is trusted authored markup and is left untouched.
pub fn parse_html_with_params(template: &str, params: &Params) -> String {
    render(template, params, true)
}

fn render(template: &str, params: &Params, escape: bool) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            let text = params.get(&caps[1]).map(value_to_text).unwrap_or_default();
            if escape {
                escape_html(&text)
            } else {
                text
            }
        })
        .into_owned()
}

/// Plain-text rendering of a parameter value.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/template_tests.rs"]
mod tests;
