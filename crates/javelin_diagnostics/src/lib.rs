//! javelin_diagnostics: Diagnostic messages and error reporting.
//!
//! Defines the message catalog used by the scanner and parser, the realized
//! positioned diagnostic, and the public `ParseError` type returned by
//! `parse()`. The front-end fails fast: a parse produces either a tree or a
//! single positioned diagnostic.

use javelin_core::text::LineColumn;
use std::fmt;
use thiserror::Error;

/// A diagnostic message template with a stable code.
///
/// Templates may contain `{0}`, `{1}`, ... placeholders resolved by
/// [`format_message`].
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    /// The stable diagnostic code (e.g. 1002).
    pub code: u32,
    /// The message template string.
    pub message: &'static str,
}

/// A realized diagnostic with location information and resolved message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the diagnostic occurred.
    pub position: LineColumn,
    /// The resolved message text.
    pub message_text: String,
    /// The diagnostic code.
    pub code: u32,
}

impl Diagnostic {
    /// Realize a message template at a position.
    pub fn new(position: LineColumn, message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            position,
            message_text: format_message(message.message, args),
            code: message.code,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {} column {}: {}",
            self.position.line, self.position.column, self.message_text
        )
    }
}

/// Format a message template by replacing `{0}`, `{1}`, etc. with arguments.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", i), arg);
    }
    result
}

/// The error type of a failed parse.
///
/// `Syntax` covers lexical errors, exhausted grammar alternatives, and
/// structural-invariant violations detected during tree assembly; it always
/// carries a position. `Internal` marks a precondition violation inside the
/// tree factory (malformed rule wiring) and is never a source diagnostic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}")]
    Syntax(Diagnostic),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParseError {
    /// The source position of a syntax error, if this is one.
    pub fn position(&self) -> Option<LineColumn> {
        match self {
            ParseError::Syntax(d) => Some(d.position),
            ParseError::Internal(_) => None,
        }
    }
}

// ============================================================================
// Message catalog
// ============================================================================

pub mod messages {
    use super::DiagnosticMessage;

    macro_rules! diag {
        ($name:ident, $code:expr, $msg:expr) => {
            pub const $name: DiagnosticMessage = DiagnosticMessage {
                code: $code,
                message: $msg,
            };
        };
    }

    // Lexical errors
    diag!(UNEXPECTED_CHARACTER, 1001, "unexpected character '{0}'");
    diag!(UNTERMINATED_STRING_LITERAL, 1002, "unterminated string literal");
    diag!(
        UNTERMINATED_CHARACTER_LITERAL,
        1003,
        "unterminated character literal"
    );
    diag!(UNTERMINATED_BLOCK_COMMENT, 1004, "unterminated block comment");
    diag!(EMPTY_CHARACTER_LITERAL, 1005, "empty character literal");

    // Syntactic errors
    diag!(EXPECTED, 2001, "{0} expected");
    diag!(
        ENUM_MEMBERS_WITHOUT_SEMICOLON,
        2002,
        "';' expected between enum constants and enum member declarations"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message() {
        assert_eq!(format_message("'{0}' expected", &["}"]), "'}' expected");
        assert_eq!(
            format_message("{0} before {1}", &["a", "b"]),
            "a before b"
        );
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new(
            LineColumn::new(3, 14),
            &messages::EXPECTED,
            &["'}'"],
        );
        assert_eq!(d.to_string(), "Parse error at line 3 column 14: '}' expected");
        assert_eq!(d.code, 2001);
    }

    #[test]
    fn test_parse_error_position() {
        let d = Diagnostic::new(LineColumn::new(1, 0), &messages::UNTERMINATED_BLOCK_COMMENT, &[]);
        let err = ParseError::Syntax(d);
        assert_eq!(err.position(), Some(LineColumn::new(1, 0)));
        assert_eq!(ParseError::Internal("bad wiring".into()).position(), None);
    }
}
