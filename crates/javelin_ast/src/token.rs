//! Tokens and trivia.
//!
//! A token carries its exact source text, its position, and the trivia
//! (whitespace and comments) that precede it. Concatenating the trivia and
//! text of every token in source order reconstructs the source byte for
//! byte. Tokens are immutable once created.

use crate::syntax_kind::SyntaxKind;
use javelin_core::text::{LineColumn, TextRange};

/// The kind of a piece of trivia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    Whitespace,
    LineComment,
    BlockComment,
}

/// Whitespace or a comment attached to the token that follows it.
///
/// Trivia is ordered and belongs exclusively to one token; it is never
/// shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trivia {
    kind: TriviaKind,
    text: String,
    range: TextRange,
    position: LineColumn,
}

impl Trivia {
    pub fn new(kind: TriviaKind, text: String, range: TextRange, position: LineColumn) -> Self {
        Self {
            kind,
            text,
            range,
            position,
        }
    }

    pub fn kind(&self) -> TriviaKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    /// Line/column where the trivia starts.
    pub fn position(&self) -> LineColumn {
        self.position
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TriviaKind::LineComment | TriviaKind::BlockComment)
    }
}

/// A lexed token: kind, exact text, position, and leading trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxToken {
    kind: SyntaxKind,
    text: String,
    range: TextRange,
    position: LineColumn,
    leading_trivia: Vec<Trivia>,
}

impl SyntaxToken {
    pub fn new(
        kind: SyntaxKind,
        text: String,
        range: TextRange,
        position: LineColumn,
        leading_trivia: Vec<Trivia>,
    ) -> Self {
        Self {
            kind,
            text,
            range,
            position,
            leading_trivia,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// The exact source text of the token, trivia excluded.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offsets of the token text in the source buffer, trivia excluded.
    pub fn range(&self) -> TextRange {
        self.range
    }

    /// 1-based line of the first character of the token.
    pub fn line(&self) -> u32 {
        self.position.line
    }

    /// 0-based column (in characters) of the first character of the token.
    pub fn column(&self) -> u32 {
        self.position.column
    }

    pub fn position(&self) -> LineColumn {
        self.position
    }

    pub fn leading_trivia(&self) -> &[Trivia] {
        &self.leading_trivia
    }

    /// Whether this is the synthetic end-of-file token.
    pub fn is_eof(&self) -> bool {
        self.kind == SyntaxKind::EndOfFileToken
    }

    /// Append this token's trivia and text to `out`, in source order.
    pub fn write_full_text(&self, out: &mut String) {
        for trivia in &self.leading_trivia {
            out.push_str(trivia.text());
        }
        out.push_str(&self.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_trivia() -> SyntaxToken {
        SyntaxToken::new(
            SyntaxKind::Identifier,
            "foo".to_string(),
            TextRange::new(4, 7),
            LineColumn::new(2, 0),
            vec![Trivia::new(
                TriviaKind::Whitespace,
                " \n  ".to_string(),
                TextRange::new(0, 4),
                LineColumn::new(1, 0),
            )],
        )
    }

    #[test]
    fn test_full_text_includes_trivia() {
        let token = token_with_trivia();
        let mut out = String::new();
        token.write_full_text(&mut out);
        assert_eq!(out, " \n  foo");
    }

    #[test]
    fn test_eof_flag() {
        let token = token_with_trivia();
        assert!(!token.is_eof());
        let eof = SyntaxToken::new(
            SyntaxKind::EndOfFileToken,
            String::new(),
            TextRange::empty(7),
            LineColumn::new(2, 3),
            Vec::new(),
        );
        assert!(eof.is_eof());
    }
}
