//! javelin_ast: The concrete syntax tree.
//!
//! Kinds, grammar-rule tags, tokens with trivia, and the arena-backed tree
//! with read-only navigation, list decompositions, and parent links.

pub mod grammar_rule;
pub mod syntax_kind;
pub mod token;
pub mod tree;

pub use grammar_rule::GrammarRule;
pub use syntax_kind::SyntaxKind;
pub use token::{SyntaxToken, Trivia, TriviaKind};
pub use tree::{Child, Element, ListParts, Node, NodeData, NodeId, SyntaxTree, TokenId};
