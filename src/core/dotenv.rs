//! Value-mode dotenv parsing and rendering.
//!
//! This model keeps only key/value pairs plus first-seen key order; comments
//! and formatting are dropped. Use [`crate::core::document`] when the file
//! layout must survive a round trip.

use std::collections::HashMap;

/// Severity of a parse issue. `Error` issues must abort the calling
/// operation before any write; `Warning` issues ride along with a
/// successful parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A single parse diagnostic with its 1-based source line.
#[derive(Debug, Clone)]
pub struct DotenvIssue {
    pub line: usize,
    pub severity: IssueSeverity,
    pub message: String,
}

impl DotenvIssue {
    fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }
}

/// Parsed dotenv content.
///
/// `order` holds the first-seen position of every key in `values`, with no
/// duplicates.
#[derive(Debug, Clone, Default)]
pub struct Dotenv {
    pub values: HashMap<String, String>,
    pub order: Vec<String>,
}

/// Parse dotenv text into values plus diagnostics.
///
/// Blank lines and `#` comments are skipped. An `export ` prefix is
/// stripped with a warning. Duplicate keys warn and keep the last value at
/// the first-seen position.
pub fn parse_dotenv(data: &str) -> (Dotenv, Vec<DotenvIssue>) {
    let mut result = Dotenv::default();
    let mut issues = Vec::new();

    for (idx, raw) in data.lines().enumerate() {
        let line_num = idx + 1;
        let mut line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("export ") {
            issues.push(DotenvIssue::warning(
                line_num,
                "line uses export; removed prefix",
            ));
            line = rest.trim();
        }
        let Some(eq) = line.find('=') else {
            issues.push(DotenvIssue::error(line_num, "missing '=' separator"));
            continue;
        };
        let key = line[..eq].trim();
        if key.is_empty() {
            issues.push(DotenvIssue::error(line_num, "empty key"));
            continue;
        }
        if !is_valid_env_key(key) {
            issues.push(DotenvIssue::error(line_num, format!("invalid key '{key}'")));
            continue;
        }
        let value_part = line[eq + 1..].trim();
        let value = match parse_dotenv_value(value_part) {
            Ok(value) => value,
            Err(message) => {
                issues.push(DotenvIssue::error(line_num, message));
                continue;
            }
        };
        if result.values.contains_key(key) {
            issues.push(DotenvIssue::warning(
                line_num,
                format!("duplicate key '{key}', last value wins"),
            ));
        } else {
            result.order.push(key.to_string());
        }
        result.values.insert(key.to_string(), value);
    }

    (result, issues)
}

/// Render values as `KEY=value` lines in lexical key order.
pub fn render_dotenv(values: &HashMap<String, String>) -> String {
    let mut keys: Vec<&str> = values.keys().map(String::as_str).collect();
    keys.sort_unstable();

    let mut out = String::new();
    for key in keys {
        out.push_str(key);
        out.push('=');
        out.push_str(&format_dotenv_value(&values[key]));
        out.push('\n');
    }
    out
}

/// Render values honoring a preferred key order.
///
/// Keys from `order` come first (skipping stale entries and duplicates);
/// any keys missing from `order` follow in lexical order.
pub fn render_dotenv_ordered(values: &HashMap<String, String>, order: &[String]) -> String {
    let mut emitted: Vec<&str> = Vec::with_capacity(values.len());
    for key in order {
        if !values.contains_key(key) || emitted.iter().any(|k| *k == key) {
            continue;
        }
        emitted.push(key);
    }
    if emitted.len() < values.len() {
        let mut missing: Vec<&str> = values
            .keys()
            .map(String::as_str)
            .filter(|k| !emitted.contains(k))
            .collect();
        missing.sort_unstable();
        emitted.extend(missing);
    }

    let mut out = String::new();
    for key in emitted {
        out.push_str(key);
        out.push('=');
        out.push_str(&format_dotenv_value(&values[key]));
        out.push('\n');
    }
    out
}

/// Whether `key` is a valid environment variable name: starts with a letter
/// or underscore, continues with letters, digits, or underscores.
pub fn is_valid_env_key(key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    key.chars().enumerate().all(|(i, ch)| {
        ch.is_ascii_alphabetic() || ch == '_' || (i > 0 && ch.is_ascii_digit())
    })
}

pub(crate) fn parse_dotenv_value(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Ok(String::new());
    }
    if value.starts_with('"') {
        return parse_quoted(value, '"');
    }
    if value.starts_with('\'') {
        return parse_quoted(value, '\'');
    }
    Ok(strip_inline_comment(value).trim().to_string())
}

fn parse_quoted(value: &str, quote: char) -> Result<String, String> {
    if value.len() < 2 || !value.ends_with(quote) {
        return Err("unterminated quoted value".to_string());
    }
    let inner = &value[1..value.len() - 1];
    if quote == '\'' {
        return Ok(inner.to_string());
    }
    // Double-quoted: support basic escapes; unknown escapes keep the
    // escaped character, a trailing lone backslash stays literal.
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' || chars.peek().is_none() {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'#' {
            continue;
        }
        if i == 0 {
            return "";
        }
        if bytes[i - 1] == b' ' || bytes[i - 1] == b'\t' {
            return value[..i].trim_end();
        }
    }
    value
}

/// Quote and escape a value only when required: whitespace, `#`, quotes,
/// backslashes, or control characters force double quoting.
pub(crate) fn format_dotenv_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let needs_quoting = value
        .chars()
        .any(|ch| matches!(ch, ' ' | '\t' | '\n' | '\r' | '#' | '"' | '\'' | '\\'));
    if !needs_quoting {
        return value.to_string();
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}
