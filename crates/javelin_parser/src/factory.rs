//! The tree factory.
//!
//! Completes raw matched parts (tokens, already-built child nodes, absent
//! optionals) into correctly shaped, kind-tagged nodes. This is where the
//! flat operator/operand sequences are folded into nested binary trees,
//! selector chains are applied onto primaries, array dimensions are nested
//! into the type tree, and structural invariants are checked.

use crate::builder::{SeparatorPolicy, TreeBuilder};
use crate::parser::{ParseFail, PResult};
use javelin_ast::grammar_rule::GrammarRule;
use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::tree::{Element, NodeId, TokenId};
use javelin_core::text::LineColumn;
use javelin_diagnostics::{messages, Diagnostic, ParseError};

fn internal(message: String) -> ParseFail {
    ParseFail::Fatal(ParseError::Internal(message))
}

// ============================================================================
// Terminals
// ============================================================================

/// Wrap a token as an identifier node. Also used for `this`, `super`,
/// `class` (in `.class` selectors) and `new` (in method references), which
/// the original tree model exposes as identifiers.
pub(crate) fn identifier(b: &mut TreeBuilder, token: TokenId) -> NodeId {
    b.node(
        SyntaxKind::Identifier,
        GrammarRule::QualifiedIdentifier,
        vec![Element::Token(token)],
    )
}

/// Wrap a literal token as a literal expression node.
pub(crate) fn literal(b: &mut TreeBuilder, token: TokenId) -> PResult<NodeId> {
    let token_kind = b.token(token).kind();
    let kind = match token_kind {
        SyntaxKind::TrueKeyword | SyntaxKind::FalseKeyword => SyntaxKind::BooleanLiteral,
        SyntaxKind::NullKeyword => SyntaxKind::NullLiteral,
        k if k.is_literal_token() => k,
        other => return Err(internal(format!("token {:?} is not a literal", other))),
    };
    Ok(b.node(kind, GrammarRule::Literal, vec![Element::Token(token)]))
}

// ============================================================================
// Lists
// ============================================================================

/// Assemble a comma-separated list node: `n` elements, `n - 1` separators,
/// optionally enclosed in delimiter tokens.
pub(crate) fn separated_list(
    b: &mut TreeBuilder,
    kind: SyntaxKind,
    rule: GrammarRule,
    open: Option<TokenId>,
    first: Option<NodeId>,
    rest: Vec<(TokenId, NodeId)>,
    close: Option<TokenId>,
) -> PResult<NodeId> {
    let mut children = Vec::new();
    let mut elements = Vec::new();
    let mut separators = Vec::new();
    if let Some(open) = open {
        children.push(Element::Token(open));
    }
    if let Some(first) = first {
        children.push(Element::Node(first));
        elements.push(first);
        for (sep, element) in rest {
            children.push(Element::Token(sep));
            children.push(Element::Node(element));
            separators.push(sep);
            elements.push(element);
        }
    } else if !rest.is_empty() {
        return Err(internal(format!(
            "separated list {} has separators but no first element",
            rule
        )));
    }
    if let Some(close) = close {
        children.push(Element::Token(close));
    }
    b.list_node(kind, rule, children, elements, separators, SeparatorPolicy::Separated)
}

/// Assemble a terminated list node: each element carries a trailing
/// separator, the last one optionally.
pub(crate) fn terminated_list(
    b: &mut TreeBuilder,
    kind: SyntaxKind,
    rule: GrammarRule,
    open: Option<TokenId>,
    items: Vec<(NodeId, Option<TokenId>)>,
    close: Option<TokenId>,
) -> PResult<NodeId> {
    let mut children = Vec::new();
    let mut elements = Vec::new();
    let mut separators = Vec::new();
    if let Some(open) = open {
        children.push(Element::Token(open));
    }
    let count = items.len();
    for (index, (element, terminator)) in items.into_iter().enumerate() {
        children.push(Element::Node(element));
        elements.push(element);
        match terminator {
            Some(t) => {
                children.push(Element::Token(t));
                separators.push(t);
            }
            None if index + 1 == count => {}
            None => {
                return Err(internal(format!(
                    "terminated list {} is missing a separator before its end",
                    rule
                )))
            }
        }
    }
    if let Some(close) = close {
        children.push(Element::Token(close));
    }
    b.list_node(kind, rule, children, elements, separators, SeparatorPolicy::Terminated)
}

/// Assemble a variable declaration (field, local, for-init, or resource):
/// modifiers, type, comma-separated declarators, optional semicolon.
pub(crate) fn variable_declaration(
    b: &mut TreeBuilder,
    rule: GrammarRule,
    modifiers: NodeId,
    declared_type: NodeId,
    first: NodeId,
    rest: Vec<(TokenId, NodeId)>,
    semi: Option<TokenId>,
) -> PResult<NodeId> {
    let mut children = vec![Element::Node(modifiers), Element::Node(declared_type)];
    let mut elements = vec![first];
    let mut separators = Vec::new();
    children.push(Element::Node(first));
    for (comma, declarator) in rest {
        children.push(Element::Token(comma));
        children.push(Element::Node(declarator));
        separators.push(comma);
        elements.push(declarator);
    }
    if let Some(semi) = semi {
        children.push(Element::Token(semi));
    }
    b.list_node(
        SyntaxKind::VariableDeclaration,
        rule,
        children,
        elements,
        separators,
        SeparatorPolicy::Separated,
    )
}

/// Assemble a `{ ... }` array initializer. The grammar admits a leading
/// comma; it is a plain child, not a separator.
pub(crate) fn array_initializer(
    b: &mut TreeBuilder,
    open: TokenId,
    leading_comma: Option<TokenId>,
    items: Vec<(NodeId, Option<TokenId>)>,
    close: TokenId,
) -> PResult<NodeId> {
    let mut children = vec![Element::Token(open)];
    if let Some(comma) = leading_comma {
        children.push(Element::Token(comma));
    }
    let mut elements = Vec::new();
    let mut separators = Vec::new();
    let count = items.len();
    for (index, (value, comma)) in items.into_iter().enumerate() {
        children.push(Element::Node(value));
        elements.push(value);
        match comma {
            Some(comma) => {
                children.push(Element::Token(comma));
                separators.push(comma);
            }
            None if index + 1 == count => {}
            None => {
                return Err(internal(
                    "array initializer is missing a comma before its end".to_string(),
                ))
            }
        }
    }
    children.push(Element::Token(close));
    b.list_node(
        SyntaxKind::NewArray,
        GrammarRule::ArrayInitializer,
        children,
        elements,
        separators,
        SeparatorPolicy::Terminated,
    )
}

// ============================================================================
// Operator folds
// ============================================================================

/// Left-fold a flat `(operator, operand)` sequence into nested
/// left-associative binary nodes: `a - b - c` becomes `(a - b) - c`.
pub(crate) fn binary_expression(
    b: &mut TreeBuilder,
    first: NodeId,
    pairs: Vec<(TokenId, NodeId)>,
    rule: GrammarRule,
) -> PResult<NodeId> {
    let mut result = first;
    for (operator, operand) in pairs {
        let op_kind = b.token(operator).kind();
        let kind = SyntaxKind::binary_kind_for_operator(op_kind)
            .ok_or_else(|| internal(format!("{:?} is not a binary operator", op_kind)))?;
        result = b.node(
            kind,
            rule,
            vec![
                Element::Node(result),
                Element::Token(operator),
                Element::Node(operand),
            ],
        );
    }
    Ok(result)
}

/// Right-fold a flat assignment sequence: `a = b = c` becomes
/// `a = (b = c)`, with the final result nested under the original
/// left-hand expression.
pub(crate) fn assignment_expression(
    b: &mut TreeBuilder,
    first: NodeId,
    pairs: Vec<(TokenId, NodeId)>,
) -> PResult<NodeId> {
    if pairs.is_empty() {
        return Ok(first);
    }
    let mut result = None;
    let mut last_operator: Option<TokenId> = None;
    for (operator, operand) in pairs.into_iter().rev() {
        result = Some(match (result, last_operator) {
            (Some(right), Some(op)) => assignment_node(b, operand, op, right)?,
            _ => operand,
        });
        last_operator = Some(operator);
    }
    let operator = last_operator.expect("pairs is non-empty");
    assignment_node(b, first, operator, result.expect("pairs is non-empty"))
}

fn assignment_node(
    b: &mut TreeBuilder,
    variable: NodeId,
    operator: TokenId,
    value: NodeId,
) -> PResult<NodeId> {
    let op_kind = b.token(operator).kind();
    let kind = SyntaxKind::assignment_kind_for_operator(op_kind)
        .ok_or_else(|| internal(format!("{:?} is not an assignment operator", op_kind)))?;
    Ok(b.node(
        kind,
        GrammarRule::AssignmentExpression,
        vec![
            Element::Node(variable),
            Element::Token(operator),
            Element::Node(value),
        ],
    ))
}

pub(crate) fn prefix_expression(
    b: &mut TreeBuilder,
    operator: TokenId,
    operand: NodeId,
) -> PResult<NodeId> {
    let op_kind = b.token(operator).kind();
    let kind = SyntaxKind::prefix_kind_for_operator(op_kind)
        .ok_or_else(|| internal(format!("{:?} is not a prefix operator", op_kind)))?;
    Ok(b.node(
        kind,
        GrammarRule::UnaryExpression,
        vec![Element::Token(operator), Element::Node(operand)],
    ))
}

pub(crate) fn postfix_expression(
    b: &mut TreeBuilder,
    operand: NodeId,
    operator: TokenId,
) -> PResult<NodeId> {
    let op_kind = b.token(operator).kind();
    let kind = SyntaxKind::postfix_kind_for_operator(op_kind)
        .ok_or_else(|| internal(format!("{:?} is not a postfix operator", op_kind)))?;
    Ok(b.node(
        kind,
        GrammarRule::UnaryExpressionNotPlusMinus,
        vec![Element::Node(operand), Element::Token(operator)],
    ))
}

// ============================================================================
// Selectors
// ============================================================================

/// One postfix selector matched after a primary.
pub(crate) enum Selector {
    /// `.name`, `.<T>name`, `.name(args)`, `.this(...)`, ...
    Member {
        dot: TokenId,
        type_arguments: Option<NodeId>,
        name: TokenId,
        arguments: Option<NodeId>,
    },
    /// `.new Foo(args) { ... }` - the creator node gains the receiver.
    Creator { dot: TokenId, creator: NodeId },
    /// `[index]`
    ArrayAccess {
        annotations: Vec<NodeId>,
        open: TokenId,
        index: NodeId,
        close: TokenId,
    },
    /// `[]... .class`
    DotClass {
        dims: Vec<(TokenId, TokenId)>,
        dot: TokenId,
        class_token: TokenId,
    },
}

/// Fold a selector chain onto a primary, left to right.
pub(crate) fn apply_selectors(
    b: &mut TreeBuilder,
    primary: NodeId,
    selectors: Vec<Selector>,
) -> PResult<NodeId> {
    let mut result = primary;
    for selector in selectors {
        result = match selector {
            Selector::Member {
                dot,
                type_arguments,
                name,
                arguments,
            } => {
                let name_node = identifier(b, name);
                let mut children = vec![Element::Node(result), Element::Token(dot)];
                if let Some(args) = type_arguments {
                    children.push(Element::Node(args));
                }
                children.push(Element::Node(name_node));
                match arguments {
                    Some(arguments) => {
                        let select = b.node(
                            SyntaxKind::MemberSelect,
                            GrammarRule::Selector,
                            children,
                        );
                        b.node(
                            SyntaxKind::MethodInvocation,
                            GrammarRule::Selector,
                            vec![Element::Node(select), Element::Node(arguments)],
                        )
                    }
                    None => b.node(SyntaxKind::MemberSelect, GrammarRule::Selector, children),
                }
            }
            Selector::Creator { dot, creator } => {
                b.prepend_child(creator, Element::Token(dot));
                b.prepend_child(creator, Element::Node(result));
                creator
            }
            Selector::ArrayAccess {
                annotations,
                open,
                index,
                close,
            } => {
                let mut children = vec![Element::Node(result)];
                children.extend(annotations.into_iter().map(Element::Node));
                children.push(Element::Token(open));
                children.push(Element::Node(index));
                children.push(Element::Token(close));
                b.node(SyntaxKind::ArrayAccess, GrammarRule::Selector, children)
            }
            Selector::DotClass {
                dims,
                dot,
                class_token,
            } => {
                let mut base = result;
                for (open, close) in dims {
                    base = b.node(
                        SyntaxKind::ArrayType,
                        GrammarRule::Selector,
                        vec![
                            Element::Node(base),
                            Element::Token(open),
                            Element::Token(close),
                        ],
                    );
                }
                let class_name = identifier(b, class_token);
                b.node(
                    SyntaxKind::MemberSelect,
                    GrammarRule::Selector,
                    vec![
                        Element::Node(base),
                        Element::Token(dot),
                        Element::Node(class_name),
                    ],
                )
            }
        };
    }
    Ok(result)
}

/// An identifier-or-invocation without a receiver.
pub(crate) fn identifier_or_invocation(
    b: &mut TreeBuilder,
    type_arguments: Option<NodeId>,
    name: TokenId,
    arguments: Option<NodeId>,
) -> NodeId {
    let name_node = identifier(b, name);
    match arguments {
        Some(arguments) => {
            let mut children = Vec::new();
            if let Some(args) = type_arguments {
                children.push(Element::Node(args));
            }
            children.push(Element::Node(name_node));
            children.push(Element::Node(arguments));
            b.node(
                SyntaxKind::MethodInvocation,
                GrammarRule::IdentifierOrMethodInvocation,
                children,
            )
        }
        None => match type_arguments {
            Some(args) => b.node(
                SyntaxKind::MemberSelect,
                GrammarRule::IdentifierOrMethodInvocation,
                vec![Element::Node(args), Element::Node(name_node)],
            ),
            None => name_node,
        },
    }
}

// ============================================================================
// Types
// ============================================================================

/// One annotated `[]` dimension pair.
pub(crate) struct Dim {
    pub annotations: Vec<NodeId>,
    pub open: TokenId,
    pub close: TokenId,
}

/// Nest bracket pairs, collected left to right by the grammar, into the
/// type tree: each dimension becomes a new array type wrapping everything
/// matched so far, so `int[][]` ends up as array-of(array-of(int)).
pub(crate) fn fold_dims(b: &mut TreeBuilder, base: NodeId, dims: Vec<Dim>) -> NodeId {
    let mut result = base;
    for dim in dims {
        let mut children = vec![Element::Node(result)];
        children.extend(dim.annotations.into_iter().map(Element::Node));
        children.push(Element::Token(dim.open));
        children.push(Element::Token(dim.close));
        result = b.node(SyntaxKind::ArrayType, GrammarRule::AnnotatedDim, children);
    }
    result
}

/// Fold `A.B<C>.D` into nested member selects and parameterized types.
pub(crate) fn qualified_identifier(
    b: &mut TreeBuilder,
    first: (NodeId, Option<NodeId>),
    rest: Vec<(TokenId, NodeId, Option<NodeId>)>,
) -> NodeId {
    let (first_name, first_args) = first;
    let mut result = match first_args {
        Some(args) => b.node(
            SyntaxKind::ParameterizedType,
            GrammarRule::QualifiedIdentifier,
            vec![Element::Node(first_name), Element::Node(args)],
        ),
        None => first_name,
    };
    for (dot, name, type_arguments) in rest {
        result = b.node(
            SyntaxKind::MemberSelect,
            GrammarRule::QualifiedIdentifier,
            vec![
                Element::Node(result),
                Element::Token(dot),
                Element::Node(name),
            ],
        );
        if let Some(args) = type_arguments {
            result = b.node(
                SyntaxKind::ParameterizedType,
                GrammarRule::QualifiedIdentifier,
                vec![Element::Node(result), Element::Node(args)],
            );
        }
    }
    result
}

// ============================================================================
// Structural checks
// ============================================================================

/// Enum bodies may only carry member declarations after the separating
/// semicolon. The grammar is deliberately relaxed; the invariant is
/// enforced here during assembly.
pub(crate) fn check_enum_body(
    members_present: bool,
    semicolon_present: bool,
    first_member_position: Option<LineColumn>,
) -> PResult<()> {
    if members_present && !semicolon_present {
        let position = first_member_position.unwrap_or(LineColumn::start());
        return Err(ParseFail::Fatal(ParseError::Syntax(Diagnostic::new(
            position,
            &messages::ENUM_MEMBERS_WITHOUT_SEMICOLON,
            &[],
        ))));
    }
    Ok(())
}
