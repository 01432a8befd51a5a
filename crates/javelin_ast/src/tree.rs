//! The concrete syntax tree.
//!
//! A `SyntaxTree` owns every node and token of one parsed compilation unit.
//! Nodes live in a `Vec`-backed arena and refer to children and parents by
//! id, so parent back-references never form ownership cycles. Tokens are
//! stored in source order; concatenating the trivia and text of a subtree's
//! tokens reconstructs the corresponding source text exactly.

use crate::grammar_rule::GrammarRule;
use crate::syntax_kind::SyntaxKind;
use crate::token::SyntaxToken;
use std::cell::OnceCell;
use std::fmt;

/// Id of a node in a [`SyntaxTree`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Id of a token in a [`SyntaxTree`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u32);

impl TokenId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

/// A child slot of a node: either a sub-node or a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Node(NodeId),
    Token(TokenId),
}

/// The element/separator decomposition of a list node.
///
/// `elements` and `separators` reference children of the same node; the
/// node's `children` hold the full interleaved sequence (including any
/// delimiters such as parentheses) in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParts {
    pub elements: Vec<NodeId>,
    pub separators: Vec<TokenId>,
}

/// One node of the tree.
#[derive(Debug)]
pub struct NodeData {
    kind: SyntaxKind,
    rule: GrammarRule,
    children: Vec<Element>,
    list: Option<ListParts>,
    parent: Option<NodeId>,
    first_token: OnceCell<Option<TokenId>>,
    last_token: OnceCell<Option<TokenId>>,
}

impl NodeData {
    pub fn new(kind: SyntaxKind, rule: GrammarRule, children: Vec<Element>) -> Self {
        Self {
            kind,
            rule,
            children,
            list: None,
            parent: None,
            first_token: OnceCell::new(),
            last_token: OnceCell::new(),
        }
    }

    pub fn new_list(
        kind: SyntaxKind,
        rule: GrammarRule,
        children: Vec<Element>,
        parts: ListParts,
    ) -> Self {
        Self {
            kind,
            rule,
            children,
            list: Some(parts),
            parent: None,
            first_token: OnceCell::new(),
            last_token: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// Completion-stage mutation: append a child to a node still owned by
    /// the assembler (e.g. the enum body semicolon attached to the last
    /// constant). Never called on a node that is already part of a tree.
    pub fn push_child(&mut self, element: Element) {
        debug_assert!(self.first_token.get().is_none());
        self.children.push(element);
    }

    /// Completion-stage mutation: prepend a child (e.g. the receiver
    /// expression of a qualified `.new` creator).
    pub fn insert_child_front(&mut self, element: Element) {
        debug_assert!(self.first_token.get().is_none());
        self.children.insert(0, element);
    }
}

/// A parsed compilation unit: the node and token arenas plus the root id.
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    tokens: Vec<SyntaxToken>,
    root: NodeId,
}

impl SyntaxTree {
    pub fn new(nodes: Vec<NodeData>, tokens: Vec<SyntaxToken>, root: NodeId) -> Self {
        Self {
            nodes,
            tokens,
            root,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        debug_assert!(id.index() < self.nodes.len());
        Node { tree: self, id }
    }

    pub fn token(&self, id: TokenId) -> &SyntaxToken {
        &self.tokens[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Reconstruct the full source text from the tokens of the tree.
    pub fn reconstruct_source(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            token.write_full_text(&mut out);
        }
        out
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    /// Install parent references, walking the tree with an explicit
    /// work-list. Every node except the root ends up with exactly one
    /// parent; re-running on an already-linked tree is a no-op.
    pub fn link_parents(&mut self) {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let mut child_ids = Vec::new();
            for child in &self.nodes[id.index()].children {
                if let Element::Node(n) = child {
                    child_ids.push(*n);
                }
            }
            for child in child_ids {
                let slot = &mut self.nodes[child.index()].parent;
                debug_assert!(
                    slot.is_none() || *slot == Some(id),
                    "node {:?} reachable from two parents",
                    child
                );
                *slot = Some(id);
                stack.push(child);
            }
        }
    }

    fn first_token_id(&self, id: NodeId) -> Option<TokenId> {
        let data = self.data(id);
        if let Some(cached) = data.first_token.get() {
            return *cached;
        }
        let mut result = None;
        for child in &data.children {
            match child {
                Element::Token(t) => {
                    result = Some(*t);
                    break;
                }
                Element::Node(n) => {
                    if let Some(t) = self.first_token_id(*n) {
                        result = Some(t);
                        break;
                    }
                }
            }
        }
        let _ = data.first_token.set(result);
        result
    }

    fn last_token_id(&self, id: NodeId) -> Option<TokenId> {
        let data = self.data(id);
        if let Some(cached) = data.last_token.get() {
            return *cached;
        }
        let mut result = None;
        for child in data.children.iter().rev() {
            match child {
                Element::Token(t) => {
                    result = Some(*t);
                    break;
                }
                Element::Node(n) => {
                    if let Some(t) = self.last_token_id(*n) {
                        result = Some(t);
                        break;
                    }
                }
            }
        }
        let _ = data.last_token.set(result);
        result
    }

    fn write_node_text(&self, id: NodeId, out: &mut String) {
        let mut stack: Vec<Element> = Vec::new();
        for child in self.data(id).children.iter().rev() {
            stack.push(*child);
        }
        while let Some(element) = stack.pop() {
            match element {
                Element::Token(t) => self.token(t).write_full_text(out),
                Element::Node(n) => {
                    for child in self.data(n).children.iter().rev() {
                        stack.push(*child);
                    }
                }
            }
        }
    }

    /// Tree-editing hook for test tooling.
    ///
    /// Grafts `replacement` in place of the `child_index`-th child of
    /// `parent` and returns the replaced element. This is the only mutation
    /// of a completed tree; production code paths never call it. Cached
    /// first/last tokens of the ancestors are invalidated; token order (and
    /// therefore source reconstruction) reflects the graft only in terms of
    /// the replacement's own tokens.
    pub fn graft_subtree(
        &mut self,
        parent: NodeId,
        child_index: usize,
        replacement: NodeId,
    ) -> Option<Element> {
        let old = *self.nodes.get(parent.index())?.children.get(child_index)?;
        self.nodes[parent.index()].children[child_index] = Element::Node(replacement);
        if let Element::Node(old_id) = old {
            if let Some(parts) = &mut self.nodes[parent.index()].list {
                for slot in &mut parts.elements {
                    if *slot == old_id {
                        *slot = replacement;
                    }
                }
            }
        }
        self.nodes[replacement.index()].parent = Some(parent);
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            let data = &mut self.nodes[id.index()];
            data.first_token.take();
            data.last_token.take();
            cursor = data.parent;
        }
        Some(old)
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("nodes", &self.nodes.len())
            .field("tokens", &self.tokens.len())
            .field("root", &self.root)
            .finish()
    }
}

/// A child of a node, resolved against the tree.
#[derive(Clone, Copy)]
pub enum Child<'t> {
    Node(Node<'t>),
    Token(&'t SyntaxToken),
}

impl<'t> Child<'t> {
    pub fn as_node(self) -> Option<Node<'t>> {
        match self {
            Child::Node(n) => Some(n),
            Child::Token(_) => None,
        }
    }

    pub fn as_token(self) -> Option<&'t SyntaxToken> {
        match self {
            Child::Token(t) => Some(t),
            Child::Node(_) => None,
        }
    }
}

/// Read-only handle to a node of a [`SyntaxTree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> Node<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> SyntaxKind {
        self.tree.data(self.id).kind
    }

    /// The grammar rule that produced this node.
    pub fn rule(&self) -> GrammarRule {
        self.tree.data(self.id).rule
    }

    /// The ordered children of this node.
    pub fn children(&self) -> impl Iterator<Item = Child<'t>> + '_ {
        let tree = self.tree;
        self.tree
            .data(self.id)
            .children
            .iter()
            .map(move |element| match element {
                Element::Node(n) => Child::Node(tree.node(*n)),
                Element::Token(t) => Child::Token(tree.token(*t)),
            })
    }

    pub fn child_count(&self) -> usize {
        self.tree.data(self.id).children.len()
    }

    pub fn child(&self, index: usize) -> Option<Child<'t>> {
        self.tree
            .data(self.id)
            .children
            .get(index)
            .map(|element| match element {
                Element::Node(n) => Child::Node(self.tree.node(*n)),
                Element::Token(t) => Child::Token(self.tree.token(*t)),
            })
    }

    /// The sub-nodes among the children, in order.
    pub fn child_nodes(&self) -> impl Iterator<Item = Node<'t>> + '_ {
        self.children().filter_map(Child::as_node)
    }

    /// The tokens among the direct children, in order.
    pub fn child_tokens(&self) -> impl Iterator<Item = &'t SyntaxToken> + '_ {
        self.children().filter_map(Child::as_token)
    }

    /// The syntactic parent, once the linking pass has run.
    pub fn parent(&self) -> Option<Node<'t>> {
        self.tree
            .data(self.id)
            .parent
            .map(|id| self.tree.node(id))
    }

    /// The first token under this node, cached after the first computation.
    pub fn first_token(&self) -> Option<&'t SyntaxToken> {
        self.tree
            .first_token_id(self.id)
            .map(|id| self.tree.token(id))
    }

    /// The last token under this node, cached after the first computation.
    pub fn last_token(&self) -> Option<&'t SyntaxToken> {
        self.tree
            .last_token_id(self.id)
            .map(|id| self.tree.token(id))
    }

    /// The exact source text of this subtree, leading trivia included.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.tree.write_node_text(self.id, &mut out);
        out
    }

    /// Whether this node carries an element/separator decomposition.
    pub fn is_list(&self) -> bool {
        self.tree.data(self.id).list.is_some()
    }

    /// The list elements, if this is a list node.
    pub fn elements(&self) -> Vec<Node<'t>> {
        match &self.tree.data(self.id).list {
            Some(parts) => parts.elements.iter().map(|id| self.tree.node(*id)).collect(),
            None => Vec::new(),
        }
    }

    /// The list separator tokens, if this is a list node.
    pub fn separators(&self) -> Vec<&'t SyntaxToken> {
        match &self.tree.data(self.id).list {
            Some(parts) => parts
                .separators
                .iter()
                .map(|id| self.tree.token(*id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Preorder traversal of this node and all descendants.
    pub fn descendants(&self) -> Descendants<'t> {
        Descendants {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// The first descendant (or self) with the given kind, preorder.
    pub fn find(&self, kind: SyntaxKind) -> Option<Node<'t>> {
        self.descendants().find(|n| n.kind() == kind)
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:?}", self.kind(), self.id)
    }
}

/// Preorder iterator over nodes, driven by an explicit stack.
pub struct Descendants<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Descendants<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        let id = self.stack.pop()?;
        for child in self.tree.data(id).children.iter().rev() {
            if let Element::Node(n) = child {
                self.stack.push(*n);
            }
        }
        Some(self.tree.node(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use javelin_core::text::{LineColumn, TextRange};

    fn token(kind: SyntaxKind, text: &str, pos: u32) -> SyntaxToken {
        let end = pos + text.len() as u32;
        SyntaxToken::new(
            kind,
            text.to_string(),
            TextRange::new(pos, end),
            LineColumn::new(1, pos),
            Vec::new(),
        )
    }

    /// Hand-build `a + b` as Plus(Identifier, +, Identifier).
    fn small_tree() -> SyntaxTree {
        let tokens = vec![
            token(SyntaxKind::Identifier, "a", 0),
            token(SyntaxKind::PlusToken, "+", 1),
            token(SyntaxKind::Identifier, "b", 2),
        ];
        let nodes = vec![
            NodeData::new(
                SyntaxKind::Identifier,
                GrammarRule::Primary,
                vec![Element::Token(TokenId::from_raw(0))],
            ),
            NodeData::new(
                SyntaxKind::Identifier,
                GrammarRule::Primary,
                vec![Element::Token(TokenId::from_raw(2))],
            ),
            NodeData::new(
                SyntaxKind::Plus,
                GrammarRule::AdditiveExpression,
                vec![
                    Element::Node(NodeId::from_raw(0)),
                    Element::Token(TokenId::from_raw(1)),
                    Element::Node(NodeId::from_raw(1)),
                ],
            ),
        ];
        let mut tree = SyntaxTree::new(nodes, tokens, NodeId::from_raw(2));
        tree.link_parents();
        tree
    }

    #[test]
    fn test_navigation() {
        let tree = small_tree();
        let root = tree.root();
        assert_eq!(root.kind(), SyntaxKind::Plus);
        assert_eq!(root.child_count(), 3);
        let lhs = root.child_nodes().next().unwrap();
        assert_eq!(lhs.kind(), SyntaxKind::Identifier);
        assert_eq!(lhs.parent().unwrap().id(), root.id());
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_first_last_token() {
        let tree = small_tree();
        let root = tree.root();
        assert_eq!(root.first_token().unwrap().text(), "a");
        assert_eq!(root.last_token().unwrap().text(), "b");
        // Second read hits the cache.
        assert_eq!(root.first_token().unwrap().text(), "a");
    }

    #[test]
    fn test_text_and_reconstruction() {
        let tree = small_tree();
        assert_eq!(tree.root().text(), "a+b");
        assert_eq!(tree.reconstruct_source(), "a+b");
    }

    #[test]
    fn test_link_parents_idempotent() {
        let mut tree = small_tree();
        tree.link_parents();
        tree.link_parents();
        let root = tree.root();
        for child in root.child_nodes() {
            assert_eq!(child.parent().unwrap().id(), root.id());
        }
    }

    #[test]
    fn test_descendants_preorder() {
        let tree = small_tree();
        let kinds: Vec<SyntaxKind> = tree.root().descendants().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![SyntaxKind::Plus, SyntaxKind::Identifier, SyntaxKind::Identifier]
        );
    }
}
