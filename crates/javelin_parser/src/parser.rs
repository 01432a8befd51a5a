//! Parser infrastructure: token cursor, checkpoints, expectation tracking.
//!
//! Grammar rules are ordered choices with PEG semantics: the first
//! alternative to match wins, and a failed alternative restores the token
//! cursor and truncates the arenas. A failure is either `Backtrack`
//! (the caller may try a sibling alternative) or `Fatal` (a structural or
//! internal error that aborts the whole parse). When every alternative is
//! exhausted, the parse reports the furthest position reached together with
//! the set of tokens that were expected there.

use crate::builder::{BuilderMark, TreeBuilder};
use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::token::SyntaxToken;
use javelin_ast::tree::TokenId;
use javelin_core::text::TextRange;
use javelin_diagnostics::{messages, Diagnostic, ParseError};

/// Failure of a grammar rule.
#[derive(Debug)]
pub(crate) enum ParseFail {
    /// The alternative did not match; siblings may still match.
    Backtrack,
    /// Positioned structural error or internal error; aborts the parse.
    Fatal(ParseError),
}

pub(crate) type PResult<T> = Result<T, ParseFail>;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pos: usize,
    mark: BuilderMark,
}

pub(crate) struct Parser {
    /// The lexed token stream, ending with the EOF token.
    lexed: Vec<SyntaxToken>,
    /// Index of the current lexed token.
    pos: usize,
    pub(crate) builder: TreeBuilder,
    /// Furthest lexed index at which an expectation failed.
    furthest: usize,
    /// Token descriptions expected at `furthest`, in first-tried order.
    expected: Vec<String>,
}

impl Parser {
    pub(crate) fn new(lexed: Vec<SyntaxToken>) -> Self {
        debug_assert!(matches!(
            lexed.last().map(SyntaxToken::kind),
            Some(SyntaxKind::EndOfFileToken)
        ));
        Self {
            lexed,
            pos: 0,
            builder: TreeBuilder::new(),
            furthest: 0,
            expected: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> TreeBuilder {
        self.builder
    }

    /// The positioned error describing the furthest failure.
    pub(crate) fn failure_error(&self) -> ParseError {
        let position = self.lexed[self.furthest.min(self.lexed.len() - 1)].position();
        let description = if self.expected.is_empty() {
            "a token".to_string()
        } else {
            self.expected.join(" or ")
        };
        ParseError::Syntax(Diagnostic::new(
            position,
            &messages::EXPECTED,
            &[description.as_str()],
        ))
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    #[inline]
    pub(crate) fn current(&self) -> &SyntaxToken {
        &self.lexed[self.pos]
    }

    #[inline]
    pub(crate) fn kind(&self) -> SyntaxKind {
        self.current().kind()
    }

    #[inline]
    pub(crate) fn nth_kind(&self, n: usize) -> SyntaxKind {
        self.lexed
            .get(self.pos + n)
            .map(SyntaxToken::kind)
            .unwrap_or(SyntaxKind::EndOfFileToken)
    }

    #[inline]
    pub(crate) fn at(&self, kind: SyntaxKind) -> bool {
        self.kind() == kind
    }

    /// At an identifier with exactly this text (restricted keywords).
    #[inline]
    pub(crate) fn at_word(&self, text: &str) -> bool {
        self.kind() == SyntaxKind::Identifier && self.current().text() == text
    }

    /// Consume the current lexed token into the tree.
    pub(crate) fn bump(&mut self) -> TokenId {
        debug_assert!(!self.current().is_eof() || self.pos == self.lexed.len() - 1);
        let token = self.current().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        self.builder.push_token(token)
    }

    pub(crate) fn expect(&mut self, kind: SyntaxKind) -> PResult<TokenId> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            self.note_expected(describe(kind));
            Err(ParseFail::Backtrack)
        }
    }

    pub(crate) fn accept(&mut self, kind: SyntaxKind) -> Option<TokenId> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    pub(crate) fn accept_any(&mut self, kinds: &[SyntaxKind]) -> Option<TokenId> {
        kinds.iter().find(|k| self.at(**k)).map(|_| self.bump())
    }

    /// Expect an identifier carrying exactly `text` (restricted keywords and
    /// the special identifier `var`).
    pub(crate) fn expect_word(&mut self, text: &str) -> PResult<TokenId> {
        if self.at_word(text) {
            Ok(self.bump())
        } else {
            self.note_expected(format!("'{}'", text));
            Err(ParseFail::Backtrack)
        }
    }

    pub(crate) fn note_expected(&mut self, description: String) {
        if self.pos > self.furthest {
            self.furthest = self.pos;
            self.expected.clear();
            self.expected.push(description);
        } else if self.pos == self.furthest && !self.expected.contains(&description) {
            self.expected.push(description);
        }
    }

    // ========================================================================
    // Ordered choice
    // ========================================================================

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            mark: self.builder.mark(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.builder.truncate(checkpoint.mark);
    }

    /// Try an alternative; on `Backtrack`, restore and return `None`.
    /// Fatal errors propagate.
    pub(crate) fn try_parse<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<Option<T>> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(value) => Ok(Some(value)),
            Err(ParseFail::Backtrack) => {
                self.restore(checkpoint);
                Ok(None)
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Repeat an alternative zero or more times.
    pub(crate) fn zero_or_more<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.try_parse(&mut f)? {
            items.push(item);
        }
        Ok(items)
    }

    /// Repeat an alternative one or more times.
    pub(crate) fn one_or_more<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let first = f(self)?;
        let mut items = vec![first];
        while let Some(item) = self.try_parse(&mut f)? {
            items.push(item);
        }
        Ok(items)
    }

    // ========================================================================
    // `>`-sequence merging
    // ========================================================================

    /// Whether the next `count` lexed tokens have the given kinds with no
    /// trivia or gaps between them, and the token after them (if adjacent)
    /// is none of `not_followed_by`.
    fn at_adjacent_run(&self, kinds: &[SyntaxKind], not_followed_by: &[SyntaxKind]) -> bool {
        let mut end = match self.lexed.get(self.pos) {
            Some(t) if t.kind() == kinds[0] => t.range().end,
            _ => return false,
        };
        for (i, kind) in kinds.iter().enumerate().skip(1) {
            match self.lexed.get(self.pos + i) {
                Some(t)
                    if t.kind() == *kind
                        && t.leading_trivia().is_empty()
                        && t.range().pos == end =>
                {
                    end = t.range().end;
                }
                _ => return false,
            }
        }
        if !not_followed_by.is_empty() {
            if let Some(next) = self.lexed.get(self.pos + kinds.len()) {
                if next.leading_trivia().is_empty()
                    && next.range().pos == end
                    && not_followed_by.contains(&next.kind())
                {
                    return false;
                }
            }
        }
        true
    }

    /// Merge an adjacent run of lexed tokens into one tree token of kind
    /// `merged`. The merged token carries the first constituent's trivia.
    pub(crate) fn accept_merged(
        &mut self,
        kinds: &[SyntaxKind],
        not_followed_by: &[SyntaxKind],
        merged: SyntaxKind,
    ) -> Option<TokenId> {
        if !self.at_adjacent_run(kinds, not_followed_by) {
            return None;
        }
        let first = &self.lexed[self.pos];
        let last = &self.lexed[self.pos + kinds.len() - 1];
        let token = SyntaxToken::new(
            merged,
            merged.token_text().expect("merged punctuator").to_string(),
            TextRange::new(first.range().pos, last.range().end),
            first.position(),
            first.leading_trivia().to_vec(),
        );
        self.pos += kinds.len();
        Some(self.builder.push_token(token))
    }

    /// Match a relational operator: `>=`, `>`, `<=`, `<` (with the original
    /// grammar's negative lookahead on `>`).
    pub(crate) fn accept_relational_operator(&mut self) -> Option<TokenId> {
        use SyntaxKind::*;
        if let Some(id) =
            self.accept_merged(&[GreaterThanToken, EqualsToken], &[], GreaterThanEqualsToken)
        {
            return Some(id);
        }
        if self.at_adjacent_run(&[GreaterThanToken], &[GreaterThanToken, EqualsToken]) {
            return Some(self.bump());
        }
        self.accept_any(&[LessThanEqualsToken, LessThanToken])
    }

    /// Match a shift operator: `<<`, `>>>`, `>>` (merging adjacent `>`).
    pub(crate) fn accept_shift_operator(&mut self) -> Option<TokenId> {
        use SyntaxKind::*;
        if let Some(id) = self.accept(LessThanLessThanToken) {
            return Some(id);
        }
        if let Some(id) = self.accept_merged(
            &[GreaterThanToken, GreaterThanToken, GreaterThanToken],
            &[EqualsToken],
            GreaterThanGreaterThanGreaterThanToken,
        ) {
            return Some(id);
        }
        self.accept_merged(
            &[GreaterThanToken, GreaterThanToken],
            &[EqualsToken, GreaterThanToken],
            GreaterThanGreaterThanToken,
        )
    }

    /// Match an assignment operator, merging `>`-sequences for `>>=` and
    /// `>>>=`.
    pub(crate) fn accept_assignment_operator(&mut self) -> Option<TokenId> {
        use SyntaxKind::*;
        if let Some(id) = self.accept_any(&[
            EqualsToken,
            PlusEqualsToken,
            MinusEqualsToken,
            AsteriskEqualsToken,
            SlashEqualsToken,
            AmpersandEqualsToken,
            BarEqualsToken,
            CaretEqualsToken,
            PercentEqualsToken,
            LessThanLessThanEqualsToken,
        ]) {
            return Some(id);
        }
        if let Some(id) = self.accept_merged(
            &[
                GreaterThanToken,
                GreaterThanToken,
                GreaterThanToken,
                EqualsToken,
            ],
            &[],
            GreaterThanGreaterThanGreaterThanEqualsToken,
        ) {
            return Some(id);
        }
        self.accept_merged(
            &[GreaterThanToken, GreaterThanToken, EqualsToken],
            &[],
            GreaterThanGreaterThanEqualsToken,
        )
    }
}

/// Human-readable description of a token kind for diagnostics.
pub(crate) fn describe(kind: SyntaxKind) -> String {
    match kind.token_text() {
        Some(text) => format!("'{}'", text),
        None => match kind {
            SyntaxKind::Identifier => "an identifier".to_string(),
            SyntaxKind::EndOfFileToken => "end of file".to_string(),
            SyntaxKind::IntLiteral
            | SyntaxKind::LongLiteral
            | SyntaxKind::FloatLiteral
            | SyntaxKind::DoubleLiteral
            | SyntaxKind::CharLiteral
            | SyntaxKind::StringLiteral => "a literal".to_string(),
            other => format!("{:?}", other),
        },
    }
}
