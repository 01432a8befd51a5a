//! Scanner integration tests.
//!
//! Verifies tokenization per token family, trivia attachment, positions,
//! and lexical failure modes.

use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::token::TriviaKind;
use javelin_diagnostics::ParseError;
use javelin_scanner::tokenize;

/// Helper: kinds of all tokens, EOF excluded.
fn kinds(source: &str) -> Vec<SyntaxKind> {
    let tokens = tokenize(source).unwrap();
    tokens
        .iter()
        .filter(|t| !t.is_eof())
        .map(|t| t.kind())
        .collect()
}

/// Helper: (kind, text) of all tokens, EOF excluded.
fn lexemes(source: &str) -> Vec<(SyntaxKind, String)> {
    let tokens = tokenize(source).unwrap();
    tokens
        .iter()
        .filter(|t| !t.is_eof())
        .map(|t| (t.kind(), t.text().to_string()))
        .collect()
}

fn error_of(source: &str) -> javelin_diagnostics::Diagnostic {
    match tokenize(source).unwrap_err() {
        ParseError::Syntax(diagnostic) => diagnostic,
        ParseError::Internal(message) => panic!("internal error: {}", message),
    }
}

// ============================================================================
// Punctuators
// ============================================================================

#[test]
fn test_single_char_punctuators() {
    assert_eq!(
        kinds("( ) { } [ ] ; , ? @ ~"),
        vec![
            SyntaxKind::OpenParenToken,
            SyntaxKind::CloseParenToken,
            SyntaxKind::OpenBraceToken,
            SyntaxKind::CloseBraceToken,
            SyntaxKind::OpenBracketToken,
            SyntaxKind::CloseBracketToken,
            SyntaxKind::SemicolonToken,
            SyntaxKind::CommaToken,
            SyntaxKind::QuestionToken,
            SyntaxKind::AtToken,
            SyntaxKind::TildeToken,
        ]
    );
}

#[test]
fn test_compound_punctuators() {
    assert_eq!(
        kinds("++ += + -- -= -> - :: : ... ."),
        vec![
            SyntaxKind::PlusPlusToken,
            SyntaxKind::PlusEqualsToken,
            SyntaxKind::PlusToken,
            SyntaxKind::MinusMinusToken,
            SyntaxKind::MinusEqualsToken,
            SyntaxKind::ArrowToken,
            SyntaxKind::MinusToken,
            SyntaxKind::ColonColonToken,
            SyntaxKind::ColonToken,
            SyntaxKind::EllipsisToken,
            SyntaxKind::DotToken,
        ]
    );
}

#[test]
fn test_comparison_and_logic_punctuators() {
    assert_eq!(
        kinds("== = != ! <= << <<= < && &= & || |= | ^= ^"),
        vec![
            SyntaxKind::EqualsEqualsToken,
            SyntaxKind::EqualsToken,
            SyntaxKind::ExclamationEqualsToken,
            SyntaxKind::ExclamationToken,
            SyntaxKind::LessThanEqualsToken,
            SyntaxKind::LessThanLessThanToken,
            SyntaxKind::LessThanLessThanEqualsToken,
            SyntaxKind::LessThanToken,
            SyntaxKind::AmpersandAmpersandToken,
            SyntaxKind::AmpersandEqualsToken,
            SyntaxKind::AmpersandToken,
            SyntaxKind::BarBarToken,
            SyntaxKind::BarEqualsToken,
            SyntaxKind::BarToken,
            SyntaxKind::CaretEqualsToken,
            SyntaxKind::CaretToken,
        ]
    );
}

#[test]
fn test_greater_than_stays_single() {
    // `>` sequences are merged by the parser, never by the scanner, so
    // nested type-argument lists can close one `>` at a time.
    assert_eq!(
        kinds(">>>="),
        vec![
            SyntaxKind::GreaterThanToken,
            SyntaxKind::GreaterThanToken,
            SyntaxKind::GreaterThanToken,
            SyntaxKind::EqualsToken,
        ]
    );
}

// ============================================================================
// Keywords and identifiers
// ============================================================================

#[test]
fn test_keywords() {
    assert_eq!(
        kinds("class interface enum extends implements instanceof"),
        vec![
            SyntaxKind::ClassKeyword,
            SyntaxKind::InterfaceKeyword,
            SyntaxKind::EnumKeyword,
            SyntaxKind::ExtendsKeyword,
            SyntaxKind::ImplementsKeyword,
            SyntaxKind::InstanceOfKeyword,
        ]
    );
}

#[test]
fn test_keyword_prefix_is_identifier() {
    assert_eq!(
        lexemes("classes int0 forEach"),
        vec![
            (SyntaxKind::Identifier, "classes".to_string()),
            (SyntaxKind::Identifier, "int0".to_string()),
            (SyntaxKind::Identifier, "forEach".to_string()),
        ]
    );
}

#[test]
fn test_enum_always_wins_over_identifier() {
    assert_eq!(kinds("enum"), vec![SyntaxKind::EnumKeyword]);
    assert_eq!(kinds("enums"), vec![SyntaxKind::Identifier]);
}

#[test]
fn test_restricted_keywords_lex_as_identifiers() {
    assert_eq!(
        kinds("module requires exports opens uses provides to with open transitive var record"),
        vec![SyntaxKind::Identifier; 12]
    );
}

#[test]
fn test_identifier_characters() {
    assert_eq!(
        lexemes("_x $y x$_1 Übung"),
        vec![
            (SyntaxKind::Identifier, "_x".to_string()),
            (SyntaxKind::Identifier, "$y".to_string()),
            (SyntaxKind::Identifier, "x$_1".to_string()),
            (SyntaxKind::Identifier, "Übung".to_string()),
        ]
    );
}

// ============================================================================
// Numeric literals
// ============================================================================

#[test]
fn test_integer_literals() {
    assert_eq!(
        lexemes("0 42 0x1F 0b1010 017 1_000_000"),
        vec![
            (SyntaxKind::IntLiteral, "0".to_string()),
            (SyntaxKind::IntLiteral, "42".to_string()),
            (SyntaxKind::IntLiteral, "0x1F".to_string()),
            (SyntaxKind::IntLiteral, "0b1010".to_string()),
            (SyntaxKind::IntLiteral, "017".to_string()),
            (SyntaxKind::IntLiteral, "1_000_000".to_string()),
        ]
    );
}

#[test]
fn test_long_literals() {
    assert_eq!(
        lexemes("42L 0xFFl 0b11L"),
        vec![
            (SyntaxKind::LongLiteral, "42L".to_string()),
            (SyntaxKind::LongLiteral, "0xFFl".to_string()),
            (SyntaxKind::LongLiteral, "0b11L".to_string()),
        ]
    );
}

#[test]
fn test_float_literals() {
    assert_eq!(
        lexemes("1f 1.5f 1e3f .5F"),
        vec![
            (SyntaxKind::FloatLiteral, "1f".to_string()),
            (SyntaxKind::FloatLiteral, "1.5f".to_string()),
            (SyntaxKind::FloatLiteral, "1e3f".to_string()),
            (SyntaxKind::FloatLiteral, ".5F".to_string()),
        ]
    );
}

#[test]
fn test_double_literals() {
    assert_eq!(
        lexemes("1.5 1d .5 2e-3 0x1.8p3 1e10"),
        vec![
            (SyntaxKind::DoubleLiteral, "1.5".to_string()),
            (SyntaxKind::DoubleLiteral, "1d".to_string()),
            (SyntaxKind::DoubleLiteral, ".5".to_string()),
            (SyntaxKind::DoubleLiteral, "2e-3".to_string()),
            (SyntaxKind::DoubleLiteral, "0x1.8p3".to_string()),
            (SyntaxKind::DoubleLiteral, "1e10".to_string()),
        ]
    );
}

#[test]
fn test_dot_followed_by_digit_is_a_literal() {
    assert_eq!(
        kinds("a.5"),
        vec![SyntaxKind::Identifier, SyntaxKind::DoubleLiteral]
    );
}

// ============================================================================
// Character and string literals
// ============================================================================

#[test]
fn test_char_literals() {
    assert_eq!(
        lexemes(r"'a' '\n' '\'' '\\'"),
        vec![
            (SyntaxKind::CharLiteral, "'a'".to_string()),
            (SyntaxKind::CharLiteral, r"'\n'".to_string()),
            (SyntaxKind::CharLiteral, r"'\''".to_string()),
            (SyntaxKind::CharLiteral, r"'\\'".to_string()),
        ]
    );
}

#[test]
fn test_string_literals() {
    assert_eq!(
        lexemes(r#""hello" "a\"b" """#),
        vec![
            (SyntaxKind::StringLiteral, r#""hello""#.to_string()),
            (SyntaxKind::StringLiteral, r#""a\"b""#.to_string()),
            (SyntaxKind::StringLiteral, r#""""#.to_string()),
        ]
    );
}

// ============================================================================
// Trivia
// ============================================================================

#[test]
fn test_whitespace_is_attached_to_the_next_token() {
    let tokens = tokenize("  a\n\tb").unwrap();
    assert_eq!(tokens[0].text(), "a");
    assert_eq!(tokens[0].leading_trivia().len(), 1);
    assert_eq!(tokens[0].leading_trivia()[0].kind(), TriviaKind::Whitespace);
    assert_eq!(tokens[0].leading_trivia()[0].text(), "  ");
    assert_eq!(tokens[1].leading_trivia()[0].text(), "\n\t");
}

#[test]
fn test_comments_are_trivia() {
    let tokens = tokenize("// header\nint /* inline */ x").unwrap();
    let int_trivia = tokens[0].leading_trivia();
    assert_eq!(int_trivia.len(), 2);
    assert_eq!(int_trivia[0].kind(), TriviaKind::LineComment);
    assert_eq!(int_trivia[0].text(), "// header");
    assert_eq!(int_trivia[1].kind(), TriviaKind::Whitespace);
    let x_trivia = tokens[1].leading_trivia();
    assert_eq!(x_trivia.len(), 3);
    assert_eq!(x_trivia[1].kind(), TriviaKind::BlockComment);
    assert_eq!(x_trivia[1].text(), "/* inline */");
}

#[test]
fn test_trailing_trivia_belongs_to_eof() {
    let tokens = tokenize("x // tail\n").unwrap();
    let eof = tokens.last().unwrap();
    assert!(eof.is_eof());
    assert_eq!(eof.leading_trivia().len(), 3);
    assert_eq!(eof.leading_trivia()[1].kind(), TriviaKind::LineComment);
}

#[test]
fn test_full_text_round_trip() {
    let source = "/* a */ class  Foo {\r\n\tint x = 0x1F; // done\n}\n";
    let tokens = tokenize(source).unwrap();
    let mut rebuilt = String::new();
    for token in &tokens {
        token.write_full_text(&mut rebuilt);
    }
    assert_eq!(rebuilt, source);
}

// ============================================================================
// Positions
// ============================================================================

#[test]
fn test_line_and_column() {
    let tokens = tokenize("a\n  b\r\nc").unwrap();
    assert_eq!((tokens[0].line(), tokens[0].column()), (1, 0));
    assert_eq!((tokens[1].line(), tokens[1].column()), (2, 2));
    assert_eq!((tokens[2].line(), tokens[2].column()), (3, 0));
}

#[test]
fn test_columns_count_characters_not_bytes() {
    let tokens = tokenize("\u{00e9}\u{00e9} x").unwrap();
    // The identifier `éé` spans two characters (four bytes).
    assert_eq!((tokens[1].line(), tokens[1].column()), (1, 3));
}

#[test]
fn test_byte_ranges_reference_the_buffer() {
    let source = "ab cd";
    let tokens = tokenize(source).unwrap();
    assert_eq!(&source[tokens[1].range().to_range()], "cd");
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unexpected_character() {
    let diagnostic = error_of("int x = #;");
    assert!(diagnostic.message_text.contains('#'));
    assert_eq!(diagnostic.position.line, 1);
    assert_eq!(diagnostic.position.column, 8);
}

#[test]
fn test_unterminated_string() {
    let diagnostic = error_of("\"abc");
    assert!(diagnostic.message_text.contains("unterminated string"));
}

#[test]
fn test_unterminated_char() {
    let diagnostic = error_of("'a");
    assert!(diagnostic.message_text.contains("unterminated character"));
}

#[test]
fn test_unterminated_block_comment() {
    let diagnostic = error_of("int x; /* no end");
    assert!(diagnostic.message_text.contains("unterminated block comment"));
    assert_eq!(diagnostic.position.column, 7);
}
