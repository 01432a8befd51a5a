//! The scanner/lexer.
//!
//! Produces one token per call, attaching any preceding whitespace and
//! comments to the token as leading trivia. Punctuators are matched
//! longest-first; `>` is the one exception and is always scanned as a
//! single-character token, so nested type-argument lists close correctly.
//! The parser merges adjacent `>`/`=` tokens back into shift and compound
//! assignment operators where a binary operator is expected.

use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::token::{SyntaxToken, Trivia, TriviaKind};
use javelin_core::text::{LineColumn, TextRange};
use javelin_diagnostics::{messages, Diagnostic, ParseError};
use memchr::{memchr, memchr2};
use once_cell::sync::Lazy;
use regex::Regex;

const FLOATING_NO_SUFFIX: &str = r"(?:[0-9][0-9_]*\.[0-9_]*(?:[eE][+-]?[0-9_]+)?|\.[0-9][0-9_]*(?:[eE][+-]?[0-9_]+)?|[0-9][0-9_]*[eE][+-]?[0-9_]+|0[xX][0-9_a-fA-F]+\.[0-9_a-fA-F]*[pP][+-]?[0-9_]+|0[xX][0-9_a-fA-F]+[pP][+-]?[0-9_]+)";

const INTEGER_NO_SUFFIX: &str = r"(?:0[xX][0-9_a-fA-F]+|0[bB][01_]+|[0-9][0-9_]*)";

/// Numeric literals are matched by ordered alternatives: float, double,
/// long, integer. The first alternative that matches wins.
static FLOAT_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?:{}[fF]|[0-9][0-9_]*[fF])", FLOATING_NO_SUFFIX)).unwrap());
static DOUBLE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?:{}[dD]?|[0-9][0-9_]*[dD])", FLOATING_NO_SUFFIX)).unwrap());
static LONG_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}[lL]", INTEGER_NO_SUFFIX)).unwrap());
static INTEGER_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", INTEGER_NO_SUFFIX)).unwrap());

/// The scanner converts source text into tokens.
pub struct Scanner<'s> {
    text: &'s str,
    /// Current byte offset.
    pos: usize,
    /// 1-based line of the current offset.
    line: u32,
    /// 0-based column (in characters) of the current offset.
    column: u32,
}

/// Tokenize a whole source buffer, ending with the synthetic EOF token.
pub fn tokenize(text: &str) -> Result<Vec<SyntaxToken>, ParseError> {
    let mut scanner = Scanner::new(text);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.scan()?;
        let done = token.is_eof();
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'s> Scanner<'s> {
    pub fn new(text: &'s str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 0,
        }
    }

    /// Scan the next token, together with its leading trivia.
    pub fn scan(&mut self) -> Result<SyntaxToken, ParseError> {
        let trivia = self.scan_trivia()?;
        let start = self.pos;
        let position = self.position();

        let Some(ch) = self.peek_char() else {
            return Ok(SyntaxToken::new(
                SyntaxKind::EndOfFileToken,
                String::new(),
                TextRange::empty(start as u32),
                position,
                trivia,
            ));
        };

        let kind = match ch {
            '(' => self.single(SyntaxKind::OpenParenToken),
            ')' => self.single(SyntaxKind::CloseParenToken),
            '{' => self.single(SyntaxKind::OpenBraceToken),
            '}' => self.single(SyntaxKind::CloseBraceToken),
            '[' => self.single(SyntaxKind::OpenBracketToken),
            ']' => self.single(SyntaxKind::CloseBracketToken),
            ';' => self.single(SyntaxKind::SemicolonToken),
            ',' => self.single(SyntaxKind::CommaToken),
            '?' => self.single(SyntaxKind::QuestionToken),
            '@' => self.single(SyntaxKind::AtToken),
            '~' => self.single(SyntaxKind::TildeToken),

            ':' => self.scan_colon(),
            '.' => self.scan_dot(position)?,
            '=' => self.scan_equals(),
            '!' => self.scan_exclamation(),
            '<' => self.scan_less_than(),
            // `>` is deliberately never combined here.
            '>' => self.single(SyntaxKind::GreaterThanToken),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_asterisk(),
            '/' => self.scan_slash(),
            '%' => self.scan_percent(),
            '&' => self.scan_ampersand(),
            '|' => self.scan_bar(),
            '^' => self.scan_caret(),

            '\'' => self.scan_char_literal(position)?,
            '"' => self.scan_string_literal(position)?,

            '0'..='9' => self.scan_number(position)?,

            _ if is_identifier_start(ch) => self.scan_identifier(),

            _ => {
                return Err(unexpected_character(position, ch));
            }
        };

        let text = self.text[start..self.pos].to_string();
        Ok(SyntaxToken::new(
            kind,
            text,
            TextRange::new(start as u32, self.pos as u32),
            position,
            trivia,
        ))
    }

    // ========================================================================
    // Trivia
    // ========================================================================

    fn scan_trivia(&mut self) -> Result<Vec<Trivia>, ParseError> {
        let mut trivia = Vec::new();
        loop {
            let start = self.pos;
            let position = self.position();
            match self.peek_char() {
                Some(c) if is_whitespace(c) => {
                    while let Some(c) = self.peek_char() {
                        if !is_whitespace(c) {
                            break;
                        }
                        self.bump_char(c);
                    }
                    trivia.push(self.make_trivia(TriviaKind::Whitespace, start, position));
                }
                Some('/') if self.byte_at(1) == Some(b'/') => {
                    let rest = &self.text.as_bytes()[self.pos..];
                    let len = memchr2(b'\n', b'\r', rest).unwrap_or(rest.len());
                    self.advance_over(len);
                    trivia.push(self.make_trivia(TriviaKind::LineComment, start, position));
                }
                Some('/') if self.byte_at(1) == Some(b'*') => {
                    self.advance_over(2);
                    loop {
                        let rest = &self.text.as_bytes()[self.pos..];
                        match memchr(b'*', rest) {
                            Some(i) if self.pos + i + 1 < self.text.len() => {
                                self.advance_over(i);
                                if self.byte_at(1) == Some(b'/') {
                                    self.advance_over(2);
                                    break;
                                }
                                self.advance_over(1);
                            }
                            _ => {
                                return Err(ParseError::Syntax(Diagnostic::new(
                                    position,
                                    &messages::UNTERMINATED_BLOCK_COMMENT,
                                    &[],
                                )));
                            }
                        }
                    }
                    trivia.push(self.make_trivia(TriviaKind::BlockComment, start, position));
                }
                _ => return Ok(trivia),
            }
        }
    }

    fn make_trivia(&self, kind: TriviaKind, start: usize, position: LineColumn) -> Trivia {
        Trivia::new(
            kind,
            self.text[start..self.pos].to_string(),
            TextRange::new(start as u32, self.pos as u32),
            position,
        )
    }

    // ========================================================================
    // Punctuators
    // ========================================================================

    fn single(&mut self, kind: SyntaxKind) -> SyntaxKind {
        self.advance_over(1);
        kind
    }

    fn scan_colon(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b':') {
            self.advance_over(2);
            SyntaxKind::ColonColonToken
        } else {
            self.single(SyntaxKind::ColonToken)
        }
    }

    fn scan_dot(&mut self, position: LineColumn) -> Result<SyntaxKind, ParseError> {
        if self.byte_at(1) == Some(b'.') && self.byte_at(2) == Some(b'.') {
            self.advance_over(3);
            Ok(SyntaxKind::EllipsisToken)
        } else if self.byte_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.scan_number(position)
        } else {
            Ok(self.single(SyntaxKind::DotToken))
        }
    }

    fn scan_equals(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::EqualsEqualsToken
        } else {
            self.single(SyntaxKind::EqualsToken)
        }
    }

    fn scan_exclamation(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::ExclamationEqualsToken
        } else {
            self.single(SyntaxKind::ExclamationToken)
        }
    }

    fn scan_less_than(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b'<') {
            if self.byte_at(2) == Some(b'=') {
                self.advance_over(3);
                SyntaxKind::LessThanLessThanEqualsToken
            } else {
                self.advance_over(2);
                SyntaxKind::LessThanLessThanToken
            }
        } else if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::LessThanEqualsToken
        } else {
            self.single(SyntaxKind::LessThanToken)
        }
    }

    fn scan_plus(&mut self) -> SyntaxKind {
        match self.byte_at(1) {
            Some(b'+') => {
                self.advance_over(2);
                SyntaxKind::PlusPlusToken
            }
            Some(b'=') => {
                self.advance_over(2);
                SyntaxKind::PlusEqualsToken
            }
            _ => self.single(SyntaxKind::PlusToken),
        }
    }

    fn scan_minus(&mut self) -> SyntaxKind {
        match self.byte_at(1) {
            Some(b'-') => {
                self.advance_over(2);
                SyntaxKind::MinusMinusToken
            }
            Some(b'=') => {
                self.advance_over(2);
                SyntaxKind::MinusEqualsToken
            }
            Some(b'>') => {
                self.advance_over(2);
                SyntaxKind::ArrowToken
            }
            _ => self.single(SyntaxKind::MinusToken),
        }
    }

    fn scan_asterisk(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::AsteriskEqualsToken
        } else {
            self.single(SyntaxKind::AsteriskToken)
        }
    }

    fn scan_slash(&mut self) -> SyntaxKind {
        // Comments were consumed as trivia; this is division.
        if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::SlashEqualsToken
        } else {
            self.single(SyntaxKind::SlashToken)
        }
    }

    fn scan_percent(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::PercentEqualsToken
        } else {
            self.single(SyntaxKind::PercentToken)
        }
    }

    fn scan_ampersand(&mut self) -> SyntaxKind {
        match self.byte_at(1) {
            Some(b'&') => {
                self.advance_over(2);
                SyntaxKind::AmpersandAmpersandToken
            }
            Some(b'=') => {
                self.advance_over(2);
                SyntaxKind::AmpersandEqualsToken
            }
            _ => self.single(SyntaxKind::AmpersandToken),
        }
    }

    fn scan_bar(&mut self) -> SyntaxKind {
        match self.byte_at(1) {
            Some(b'|') => {
                self.advance_over(2);
                SyntaxKind::BarBarToken
            }
            Some(b'=') => {
                self.advance_over(2);
                SyntaxKind::BarEqualsToken
            }
            _ => self.single(SyntaxKind::BarToken),
        }
    }

    fn scan_caret(&mut self) -> SyntaxKind {
        if self.byte_at(1) == Some(b'=') {
            self.advance_over(2);
            SyntaxKind::CaretEqualsToken
        } else {
            self.single(SyntaxKind::CaretToken)
        }
    }

    // ========================================================================
    // Literals and identifiers
    // ========================================================================

    fn scan_char_literal(&mut self, position: LineColumn) -> Result<SyntaxKind, ParseError> {
        self.scan_quoted('\'', position, &messages::UNTERMINATED_CHARACTER_LITERAL)?;
        Ok(SyntaxKind::CharLiteral)
    }

    fn scan_string_literal(&mut self, position: LineColumn) -> Result<SyntaxKind, ParseError> {
        self.scan_quoted('"', position, &messages::UNTERMINATED_STRING_LITERAL)?;
        Ok(SyntaxKind::StringLiteral)
    }

    fn scan_quoted(
        &mut self,
        quote: char,
        position: LineColumn,
        message: &javelin_diagnostics::DiagnosticMessage,
    ) -> Result<(), ParseError> {
        self.bump_char(quote);
        loop {
            match self.peek_char() {
                None => {
                    return Err(ParseError::Syntax(Diagnostic::new(position, message, &[])));
                }
                Some(c) if c == quote => {
                    self.bump_char(c);
                    return Ok(());
                }
                Some('\\') => {
                    self.bump_char('\\');
                    if let Some(c) = self.peek_char() {
                        self.bump_char(c);
                    }
                }
                Some(c) => {
                    self.bump_char(c);
                }
            }
        }
    }

    fn scan_number(&mut self, position: LineColumn) -> Result<SyntaxKind, ParseError> {
        let rest = &self.text[self.pos..];
        let alternatives: [(&Regex, SyntaxKind); 4] = [
            (&FLOAT_LITERAL, SyntaxKind::FloatLiteral),
            (&DOUBLE_LITERAL, SyntaxKind::DoubleLiteral),
            (&LONG_LITERAL, SyntaxKind::LongLiteral),
            (&INTEGER_LITERAL, SyntaxKind::IntLiteral),
        ];
        for (pattern, kind) in alternatives {
            if let Some(m) = pattern.find(rest) {
                self.advance_over(m.end());
                return Ok(kind);
            }
        }
        let ch = self.peek_char().unwrap_or('\0');
        Err(unexpected_character(position, ch))
    }

    fn scan_identifier(&mut self) -> SyntaxKind {
        let start = self.pos;
        let first = self.peek_char().expect("checked by caller");
        self.bump_char(first);
        while let Some(c) = self.peek_char() {
            if !is_identifier_part(c) {
                break;
            }
            self.bump_char(c);
        }
        // `enum` and the rest of the reserved words always win over the
        // identifier interpretation. Restricted keywords (`module`,
        // `requires`, ...) and `var` are not reserved; the parser matches
        // them by text where the grammar requires them.
        SyntaxKind::from_keyword(&self.text[start..self.pos]).unwrap_or(SyntaxKind::Identifier)
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    fn position(&self) -> LineColumn {
        LineColumn::new(self.line, self.column)
    }

    #[inline]
    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    #[inline]
    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    /// Advance past one character, updating line and column.
    fn bump_char(&mut self, c: char) {
        self.pos += c.len_utf8();
        match c {
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '\r' => {
                self.column = 0;
                // \r\n counts as a single line terminator.
                if self.text.as_bytes().get(self.pos) != Some(&b'\n') {
                    self.line += 1;
                }
            }
            _ => self.column += 1,
        }
    }

    /// Advance past `len` bytes, updating line and column per character.
    fn advance_over(&mut self, len: usize) {
        let end = self.pos + len;
        while self.pos < end {
            let c = self.peek_char().expect("advance_over past end of text");
            self.bump_char(c);
        }
    }
}

fn unexpected_character(position: LineColumn, ch: char) -> ParseError {
    let text = ch.to_string();
    ParseError::Syntax(Diagnostic::new(
        position,
        &messages::UNEXPECTED_CHARACTER,
        &[text.as_str()],
    ))
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C')
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_ascii_alphabetic() || (c as u32 > 0x7F && unicode_xid::UnicodeXID::is_xid_start(c))
}

fn is_identifier_part(c: char) -> bool {
    c == '_' || c == '$' || c.is_ascii_alphanumeric() || (c as u32 > 0x7F && unicode_xid::UnicodeXID::is_xid_continue(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<SyntaxKind> {
        tokenize(text)
            .unwrap()
            .iter()
            .map(|t| t.kind())
            .collect()
    }

    #[test]
    fn test_greater_than_is_never_combined() {
        assert_eq!(
            kinds(">> >>> >="),
            vec![
                SyntaxKind::GreaterThanToken,
                SyntaxKind::GreaterThanToken,
                SyntaxKind::GreaterThanToken,
                SyntaxKind::GreaterThanToken,
                SyntaxKind::GreaterThanToken,
                SyntaxKind::GreaterThanToken,
                SyntaxKind::EqualsToken,
                SyntaxKind::EndOfFileToken,
            ]
        );
    }

    #[test]
    fn test_enum_is_always_a_keyword() {
        assert_eq!(
            kinds("enum enumeration"),
            vec![
                SyntaxKind::EnumKeyword,
                SyntaxKind::Identifier,
                SyntaxKind::EndOfFileToken,
            ]
        );
    }

    #[test]
    fn test_restricted_keywords_are_identifiers() {
        assert_eq!(
            kinds("module requires var"),
            vec![
                SyntaxKind::Identifier,
                SyntaxKind::Identifier,
                SyntaxKind::Identifier,
                SyntaxKind::EndOfFileToken,
            ]
        );
    }
}
