//! Preview data for a template.
//!
//! A regex scan over the raw source, independent of the parser, so it still
//! produces something for templates that fail to translate.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;

/// Variable name to preview value, in first-seen order.
pub type Preview = IndexMap<String, Value>;

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*(?:var:)?([A-Za-z0-9_\-.]+)\s*(?::\s*"([^"]*)")?[^}]*\}\}"#).unwrap()
});

static LOOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%\s*for\s+[A-Za-z0-9_]+\s+in\s+(?:var:)?([A-Za-z0-9_]+)\s*%\}").unwrap()
});

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{%\s*if\s+(?:var:)?([A-Za-z0-9_]+)\s*(?:(?:==|!=|<=|>=|<|>)\s*["']?([^"'\s%}]*)["']?)?\s*%\}"#,
    )
    .unwrap()
});

/// Inventory every variable, loop collection and condition subject in
/// `source`.
///
/// Variables map to their Mailjet default (or `""`), loop collections to an
/// empty array, condition subjects to the literal they are compared with
/// (or `""`). The first occurrence of a name wins. Never fails.
pub fn extract_variables(source: &str) -> Preview {
    let mut preview = Preview::new();

    for caps in VARIABLE_RE.captures_iter(source) {
        let default = caps.get(2).map_or("", |m| m.as_str());
        preview
            .entry(caps[1].to_string())
            .or_insert_with(|| Value::String(default.to_string()));
    }

    for caps in LOOP_RE.captures_iter(source) {
        preview
            .entry(caps[1].to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
    }

    for caps in CONDITION_RE.captures_iter(source) {
        let compared = caps.get(2).map_or("", |m| m.as_str());
        preview
            .entry(caps[1].to_string())
            .or_insert_with(|| Value::String(compared.to_string()));
    }

    preview
}

/// The preview artifact: a pretty-printed JSON object.
pub fn preview_json(preview: &Preview) -> Result<String> {
    Ok(serde_json::to_string_pretty(preview)?)
}
