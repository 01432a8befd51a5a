//! The tree assembler.
//!
//! `TreeBuilder` owns the node and token arenas while a parse is in flight.
//! Consumed tokens are appended in source order, so the finished arenas
//! reconstruct the source by simple concatenation. Ordered-choice
//! backtracking truncates both arenas back to a checkpoint mark; ids handed
//! out after the mark are dead once the alternative fails, and nothing
//! created before the mark can reference them.

use crate::parser::{ParseFail, PResult};
use javelin_ast::grammar_rule::GrammarRule;
use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::token::SyntaxToken;
use javelin_ast::tree::{Element, ListParts, NodeData, NodeId, TokenId};
use javelin_diagnostics::ParseError;

/// How a list's separators relate to its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeparatorPolicy {
    /// Separators sit between elements: `max(elements - 1, 0)` separators.
    Separated,
    /// Each element carries a trailing separator, the last one optionally:
    /// `elements` or `elements - 1` separators.
    Terminated,
}

/// Arena mark used to roll back a failed alternative.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuilderMark {
    nodes: usize,
    tokens: usize,
}

pub(crate) struct TreeBuilder {
    nodes: Vec<NodeData>,
    tokens: Vec<SyntaxToken>,
}

impl TreeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            tokens: Vec::new(),
        }
    }

    pub(crate) fn push_token(&mut self, token: SyntaxToken) -> TokenId {
        let id = TokenId::from_raw(self.tokens.len() as u32);
        self.tokens.push(token);
        id
    }

    pub(crate) fn token(&self, id: TokenId) -> &SyntaxToken {
        &self.tokens[id.as_u32() as usize]
    }

    pub(crate) fn node(
        &mut self,
        kind: SyntaxKind,
        rule: GrammarRule,
        children: Vec<Element>,
    ) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind, rule, children));
        id
    }

    /// Create a list node, checking the separator invariant for the policy.
    pub(crate) fn list_node(
        &mut self,
        kind: SyntaxKind,
        rule: GrammarRule,
        children: Vec<Element>,
        elements: Vec<NodeId>,
        separators: Vec<TokenId>,
        policy: SeparatorPolicy,
    ) -> PResult<NodeId> {
        let n = elements.len();
        let s = separators.len();
        let ok = match policy {
            SeparatorPolicy::Separated => s == n.saturating_sub(1),
            SeparatorPolicy::Terminated => s == n || (n > 0 && s == n - 1),
        };
        if !ok {
            return Err(ParseFail::Fatal(ParseError::Internal(format!(
                "list node {:?} from rule {} has {} elements but {} separators",
                kind, rule, n, s
            ))));
        }
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(NodeData::new_list(
            kind,
            rule,
            children,
            ListParts {
                elements,
                separators,
            },
        ));
        Ok(id)
    }

    /// Append a child to a node still under assembly.
    pub(crate) fn append_child(&mut self, node: NodeId, element: Element) {
        self.nodes[node.as_u32() as usize].push_child(element);
    }

    /// Prepend a child to a node still under assembly.
    pub(crate) fn prepend_child(&mut self, node: NodeId, element: Element) {
        self.nodes[node.as_u32() as usize].insert_child_front(element);
    }

    pub(crate) fn mark(&self) -> BuilderMark {
        BuilderMark {
            nodes: self.nodes.len(),
            tokens: self.tokens.len(),
        }
    }

    pub(crate) fn truncate(&mut self, mark: BuilderMark) {
        self.nodes.truncate(mark.nodes);
        self.tokens.truncate(mark.tokens);
    }

    pub(crate) fn finish(self) -> (Vec<NodeData>, Vec<SyntaxToken>) {
        (self.nodes, self.tokens)
    }
}
