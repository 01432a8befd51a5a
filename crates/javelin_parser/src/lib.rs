//! javelin_parser: The grammar-driven recursive-descent parser.
//!
//! Turns source text into a lossless concrete syntax tree: characters are
//! lexed into tokens, the grammar rules match them bottom-up into nodes via
//! the tree factory, and a final pass installs parent links. Parsing is
//! synchronous, deterministic, and fails fast with a positioned error.

mod builder;
mod factory;
mod grammar;
mod parser;

pub use javelin_ast::tree::SyntaxTree;
pub use javelin_diagnostics::ParseError;

/// Parse one compilation unit.
///
/// Each invocation allocates its own token stream and tree, so independent
/// source units may be parsed in parallel from different threads.
pub fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
    let lexed = javelin_scanner::tokenize(source)?;
    let mut parser = parser::Parser::new(lexed);
    let root = parser.parse_compilation_unit()?;
    let (nodes, tokens) = parser.finish().finish();
    let mut tree = SyntaxTree::new(nodes, tokens, root);
    tree.link_parents();
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_smoke() {
        let tree = parse("class A { }").unwrap();
        assert_eq!(tree.reconstruct_source(), "class A { }");
    }

    #[test]
    fn test_parse_failure_is_positioned() {
        let error = parse("class A { int x").unwrap_err();
        match error {
            ParseError::Syntax(diagnostic) => {
                assert!(diagnostic.message_text.contains("expected"));
            }
            ParseError::Internal(message) => panic!("unexpected internal error: {}", message),
        }
    }
}
