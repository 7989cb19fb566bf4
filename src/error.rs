//! Error types for every stage of a conversion.
//!
//! Lex and parse errors are always fatal for the template they came from.
//! Unsupported directives are collected as [`Diagnostic`]s instead and only
//! become an [`UnconvertibleConstructError`] when strict mode is requested.

use serde::Serialize;

/// A malformed token stream: an unterminated delimiter or an illegal
/// character inside a directive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("lex error at byte {offset}: {reason}")]
pub struct LexError {
    pub offset: usize,
    pub reason: String,
}

impl LexError {
    pub fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// A grammar violation found by the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at byte {offset}: expected {expected}, found {found}")]
pub struct ParseError {
    pub offset: usize,
    pub expected: String,
    pub found: String,
}

/// A recognized directive with no Brevo equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// The offending directive exactly as written in the source.
    pub snippet: String,
    pub message: String,
    /// Byte offset of the directive in the translated input.
    pub offset: usize,
}

/// Raised in strict mode when one or more diagnostics were collected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot convert Mailjet syntax to Brevo: {}", messages(.diagnostics))]
pub struct UnconvertibleConstructError {
    pub diagnostics: Vec<Diagnostic>,
}

fn messages(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure reported by a [`crate::pipeline::MarkupRenderer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Unconvertible(#[from] UnconvertibleConstructError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid namespace '{0}': must be a plain identifier")]
    InvalidNamespace(String),

    #[error("failed to serialize preview data: {0}")]
    Preview(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconvertible_error_joins_messages() {
        let err = UnconvertibleConstructError {
            diagnostics: vec![
                Diagnostic {
                    snippet: "{% set a = 1 %}".into(),
                    message: "Tag 'set' is not supported in Brevo".into(),
                    offset: 0,
                },
                Diagnostic {
                    snippet: "{% include \"x\" %}".into(),
                    message: "Tag 'include' is not supported in Brevo".into(),
                    offset: 15,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Cannot convert Mailjet syntax to Brevo: Tag 'set' is not supported in Brevo, \
             Tag 'include' is not supported in Brevo"
        );
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError {
            offset: 12,
            expected: "`{% endif %}`".into(),
            found: "end of input".into(),
        };
        assert_eq!(
            err.to_string(),
            "parse error at byte 12: expected `{% endif %}`, found end of input"
        );
    }
}
