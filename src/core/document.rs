//! Format-preserving dotenv document model.
//!
//! Every source line is kept as a tagged variant so comments, blank lines,
//! and even unparseable lines survive a parse/render round trip. Key lines
//! are reconstructed from structured fields, which keeps targeted value
//! edits from disturbing the rest of the file.

use super::dotenv::{
    format_dotenv_value, is_valid_env_key, parse_dotenv_value, DotenvIssue, IssueSeverity,
};

/// One line of a dotenv document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvLine {
    Blank {
        raw: String,
    },
    Comment {
        raw: String,
    },
    /// A line that failed to parse; preserved verbatim.
    Other {
        raw: String,
    },
    Key {
        key: String,
        value: String,
        /// Trailing inline comment, including the leading `#`.
        comment: Option<String>,
        export: bool,
    },
}

/// An ordered dotenv document plus first-seen key order.
#[derive(Debug, Clone, Default)]
pub struct DotenvDocument {
    pub lines: Vec<DotenvLine>,
    pub order: Vec<String>,
}

impl DotenvDocument {
    /// Render the document back to text.
    ///
    /// Non-key lines are emitted verbatim; key lines are rebuilt from their
    /// fields with canonical quoting. Rendering an unmutated canonical
    /// document is byte-stable.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                DotenvLine::Blank { raw }
                | DotenvLine::Comment { raw }
                | DotenvLine::Other { raw } => out.push_str(raw),
                DotenvLine::Key {
                    key,
                    value,
                    comment,
                    export,
                } => {
                    if *export {
                        out.push_str("export ");
                    }
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&format_dotenv_value(value));
                    if let Some(comment) = comment {
                        out.push(' ');
                        out.push_str(comment);
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Parse dotenv text preserving every line.
///
/// Shares the key/value/escaping rules of
/// [`super::dotenv::parse_dotenv`], but records `export` prefixes and the
/// exact inline comment text on key lines instead of discarding them.
pub fn parse_dotenv_document(data: &str) -> (DotenvDocument, Vec<DotenvIssue>) {
    let mut doc = DotenvDocument::default();
    let mut issues = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for (idx, raw) in data.lines().enumerate() {
        let line_num = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            doc.lines.push(DotenvLine::Blank {
                raw: raw.to_string(),
            });
            continue;
        }
        if trimmed.starts_with('#') {
            doc.lines.push(DotenvLine::Comment {
                raw: raw.to_string(),
            });
            continue;
        }

        let mut export = false;
        let mut payload = trimmed;
        if let Some(rest) = payload.strip_prefix("export ") {
            export = true;
            payload = rest.trim();
        }

        let Some(eq) = payload.find('=') else {
            issues.push(DotenvIssue {
                line: line_num,
                severity: IssueSeverity::Error,
                message: "missing '=' separator".to_string(),
            });
            doc.lines.push(DotenvLine::Other {
                raw: raw.to_string(),
            });
            continue;
        };
        let key = payload[..eq].trim();
        if key.is_empty() {
            issues.push(DotenvIssue {
                line: line_num,
                severity: IssueSeverity::Error,
                message: "empty key".to_string(),
            });
            doc.lines.push(DotenvLine::Other {
                raw: raw.to_string(),
            });
            continue;
        }
        if !is_valid_env_key(key) {
            issues.push(DotenvIssue {
                line: line_num,
                severity: IssueSeverity::Error,
                message: format!("invalid key '{key}'"),
            });
            doc.lines.push(DotenvLine::Other {
                raw: raw.to_string(),
            });
            continue;
        }

        let value_part = payload[eq + 1..].trim();
        let (value_text, comment) =
            if !value_part.is_empty() && !value_part.starts_with('"') && !value_part.starts_with('\'') {
                split_inline_comment(value_part)
            } else {
                (value_part, None)
            };
        let value = match parse_dotenv_value(value_text.trim()) {
            Ok(value) => value,
            Err(message) => {
                issues.push(DotenvIssue {
                    line: line_num,
                    severity: IssueSeverity::Error,
                    message,
                });
                doc.lines.push(DotenvLine::Other {
                    raw: raw.to_string(),
                });
                continue;
            }
        };

        if seen.iter().any(|k| k == key) {
            issues.push(DotenvIssue {
                line: line_num,
                severity: IssueSeverity::Warning,
                message: format!("duplicate key '{key}', last value wins"),
            });
        } else {
            seen.push(key.to_string());
            doc.order.push(key.to_string());
        }

        doc.lines.push(DotenvLine::Key {
            key: key.to_string(),
            value,
            comment: comment.map(str::to_string),
            export,
        });
    }

    (doc, issues)
}

/// Split an unquoted value into (value, inline comment).
///
/// A `#` counts as a comment only at position zero or after whitespace.
fn split_inline_comment(value: &str) -> (&str, Option<&str>) {
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'#' {
            continue;
        }
        if i == 0 {
            return ("", Some(value.trim()));
        }
        if bytes[i - 1] == b' ' || bytes[i - 1] == b'\t' {
            return (value[..i].trim_end(), Some(value[i..].trim()));
        }
    }
    (value, None)
}
