//! Parser integration tests.
//!
//! Round-trip fidelity, operator folds, the grammar's disambiguation
//! points, list invariants, tree well-formedness, and failure modes.

use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::tree::{Child, Node, SyntaxTree};
use javelin_diagnostics::ParseError;
use javelin_parser::parse;

fn parse_ok(source: &str) -> SyntaxTree {
    match parse(source) {
        Ok(tree) => tree,
        Err(error) => panic!("parse failed: {}\nsource: {}", error, source),
    }
}

fn syntax_error(source: &str) -> javelin_diagnostics::Diagnostic {
    match parse(source).unwrap_err() {
        ParseError::Syntax(diagnostic) => diagnostic,
        ParseError::Internal(message) => panic!("internal error: {}", message),
    }
}

fn find(tree: &SyntaxTree, kind: SyntaxKind) -> Node<'_> {
    tree.root()
        .find(kind)
        .unwrap_or_else(|| panic!("no {:?} node in tree", kind))
}

fn assert_round_trip(source: &str) {
    let tree = parse_ok(source);
    assert_eq!(tree.reconstruct_source(), source, "token concatenation");
    assert_eq!(tree.root().text(), source, "tree traversal");
}

// ============================================================================
// Round-trip fidelity
// ============================================================================

const SAMPLE: &str = r#"/*
 * Sample analysis input.
 */
package com.acme.app;

import java.util.List;
import java.util.Map;
import static java.util.Objects.requireNonNull;
import java.util.function.*;

@Deprecated
public class Sample<T extends Comparable<T> & java.io.Serializable> implements Cloneable {

    static final int[][] GRID = new int[3][4];
    private volatile long counter = 0L;
    protected String name;
    int a = 1, b[] = {1, 2,}, c;

    static {
        System.out.println("init");
    }

    {
        counter = 1;
    }

    @SafeVarargs
    public static <E> List<E> of(E... items) {
        return null;
    }

    Sample(String name) throws IllegalStateException {
        this.name = requireNonNull(name);
    }

    public int compute(int x, int y) {
        int result = x + y * 2 - -3;
        result <<= 1;
        result >>>= 2;
        boolean flag = x < y && y >= 0 || name instanceof String;
        Map<String, List<Integer>> table = new java.util.HashMap<>();
        int[] copy = (int[]) GRID[0];
        double d = (double) -x;
        Object o = (Runnable) () -> System.out.println("hi");
        Function<Integer, Integer> inc = i -> i + 1;
        BiFunction<Integer, Integer, Integer> add = (p, q) -> p + q;
        Runnable r = () -> { counter++; };
        label:
        for (int i = 0, j = 10; i < j; i++, j--) {
            if (i % 2 == 0) { continue label; }
            else if (i > 7) { break label; }
        }
        for (String s : of(name)) {
            synchronized (this) {
                counter += s.length();
            }
        }
        while (flag) { flag = !flag; }
        do { result--; } while (result > 100);
        try (var reader = java.nio.file.Files.newBufferedReader(java.nio.file.Paths.get(name));) {
            result += reader.read();
        } catch (java.io.IOException | RuntimeException e) {
            throw new IllegalStateException(e);
        } finally {
            assert result >= 0 : "negative";
        }
        switch (x) {
            case 0:
            case 1:
                result = 1;
                break;
            default:
                result = table.size();
        }
        int bonus = switch (y) {
            case 1, 2 -> 10;
            default -> 0;
        };
        return result + bonus;
    }

    @Override
    public String toString() {
        return "Sample[" + name + "]" + Integer.class + String[].class;
    }

    interface Callback<V> {
        void accept(V value);
        default int priority() { return 0; }
    }

    @interface Marker {
        String value() default "";
        int[] codes() default {1, 2};
    }

    enum Level implements Comparable<Level> {
        LOW("l"), HIGH("h") {
            @Override public String tag() { return "H!"; }
        };

        private final String tag;
        Level(String tag) { this.tag = tag; }
        public String tag() { return tag; }
    }

    record Point(int x, int y) implements java.io.Serializable {
        Point {
            assert x >= 0;
        }
        static Point origin() { return new Point(0, 0); }
    }
}

class Helper {
    void visit(Sample<?> sample) {
        Object anon = new Object() {
            public int hash() { return 42; }
        };
        int[] data = new int[]{5, 6, 7};
        int first = data[0];
        Runnable job = Helper::hint;
        new Helper().visit(null);
        this.new Inner();
    }

    static void hint() { }

    class Inner { }
}
"#;

#[test]
fn test_round_trip_comprehensive() {
    assert_round_trip(SAMPLE);
}

#[test]
fn test_round_trip_module_declaration() {
    assert_round_trip(
        "@Deprecated open module com.acme.core {\n    requires transitive;\n    requires static transitive;\n    requires transitive java.base;\n    exports com.acme.api to client.a, client.b;\n    opens com.acme.internal;\n    uses com.acme.Service;\n    provides com.acme.Service with com.acme.impl.Main, com.acme.impl.Alt;\n}\n",
    );
}

#[test]
fn test_round_trip_preserves_odd_formatting() {
    assert_round_trip("class A{int x=1;/*x*/int y ;\n\t}// tail");
}

// ============================================================================
// Associativity
// ============================================================================

#[test]
fn test_subtraction_folds_left() {
    let tree = parse_ok("class A { int x = a - b - c; }");
    let outer = find(&tree, SyntaxKind::Minus);
    let children: Vec<Node> = outer.child_nodes().collect();
    assert_eq!(children[0].kind(), SyntaxKind::Minus, "(a - b) nests left");
    assert_eq!(children[1].kind(), SyntaxKind::Identifier);
    assert_eq!(children[1].text().trim(), "c");
}

#[test]
fn test_assignment_folds_right() {
    let tree = parse_ok("class A { void m() { a = b = c; } }");
    let outer = find(&tree, SyntaxKind::Assignment);
    let children: Vec<Node> = outer.child_nodes().collect();
    assert_eq!(children[0].kind(), SyntaxKind::Identifier);
    assert_eq!(children[0].text().trim(), "a");
    assert_eq!(
        children[1].kind(),
        SyntaxKind::Assignment,
        "(b = c) nests right, under the original left-hand side"
    );
}

#[test]
fn test_shift_operators_are_merged_and_fold_left() {
    let tree = parse_ok("class A { int x = a >> b >>> c; }");
    let outer = find(&tree, SyntaxKind::UnsignedRightShift);
    let inner: Vec<Node> = outer.child_nodes().collect();
    assert_eq!(inner[0].kind(), SyntaxKind::RightShift);
    let op = outer.child_tokens().next().unwrap();
    assert_eq!(op.kind(), SyntaxKind::GreaterThanGreaterThanGreaterThanToken);
    assert_eq!(op.text(), ">>>");
}

#[test]
fn test_compound_shift_assignment_is_merged() {
    let tree = parse_ok("class A { void m() { x >>= 1; y >>>= 2; } }");
    assert!(tree.root().find(SyntaxKind::RightShiftAssignment).is_some());
    assert!(tree
        .root()
        .find(SyntaxKind::UnsignedRightShiftAssignment)
        .is_some());
    assert_eq!(
        tree.reconstruct_source(),
        "class A { void m() { x >>= 1; y >>>= 2; } }"
    );
}

// ============================================================================
// Disambiguation
// ============================================================================

#[test]
fn test_primitive_cast_of_unary_minus() {
    let tree = parse_ok("class A { double d = (double) -x; }");
    let cast = find(&tree, SyntaxKind::TypeCast);
    let children: Vec<Node> = cast.child_nodes().collect();
    assert_eq!(children[0].kind(), SyntaxKind::PrimitiveType);
    assert_eq!(children[1].kind(), SyntaxKind::UnaryMinus);
}

#[test]
fn test_parenthesized_identifier_minus_is_subtraction() {
    let tree = parse_ok("class A { int s = (a) - x; }");
    assert!(tree.root().find(SyntaxKind::TypeCast).is_none());
    let minus = find(&tree, SyntaxKind::Minus);
    let children: Vec<Node> = minus.child_nodes().collect();
    assert_eq!(children[0].kind(), SyntaxKind::ParenthesizedExpression);
}

#[test]
fn test_reference_cast_without_sign() {
    let tree = parse_ok("class A { Object o = (String) x; }");
    assert!(tree.root().find(SyntaxKind::TypeCast).is_some());
}

#[test]
fn test_generic_type_in_type_position() {
    let tree = parse_ok("class A { java.util.List<String> xs; }");
    assert!(tree.root().find(SyntaxKind::ParameterizedType).is_some());
    assert!(tree.root().find(SyntaxKind::LessThan).is_none());
}

#[test]
fn test_less_than_in_expression_position() {
    let tree = parse_ok("class A { boolean b = a < c; }");
    assert!(tree.root().find(SyntaxKind::LessThan).is_some());
    assert!(tree.root().find(SyntaxKind::ParameterizedType).is_none());
}

#[test]
fn test_nested_type_arguments_close_token_by_token() {
    assert_round_trip("class A { Map<String, List<Integer>> table; }");
}

#[test]
fn test_lambda_parameter_forms() {
    let tree = parse_ok(
        "class A { void m() { f(x -> x); f((a, b) -> a); f((int v) -> v); f(() -> 0); } }",
    );
    let lambdas: Vec<Node> = tree
        .root()
        .descendants()
        .filter(|n| n.kind() == SyntaxKind::LambdaExpression)
        .collect();
    assert_eq!(lambdas.len(), 4);
    for lambda in &lambdas {
        let parameters = lambda.child_nodes().next().unwrap();
        assert_eq!(parameters.kind(), SyntaxKind::ParameterList);
        assert!(parameters.is_list());
    }
}

#[test]
fn test_switch_statement_wraps_switch_expression() {
    let tree = parse_ok("class A { void m(int x) { switch (x) { case 1: break; } } }");
    let statement = find(&tree, SyntaxKind::SwitchStatement);
    let children: Vec<Node> = statement.child_nodes().collect();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind(), SyntaxKind::SwitchExpression);
}

#[test]
fn test_switch_expression_with_arrow_labels() {
    let tree = parse_ok("class A { int m(int x) { return switch (x) { case 1, 2 -> 1; default -> 0; }; } }");
    let switch_expression = find(&tree, SyntaxKind::SwitchExpression);
    let groups: Vec<Node> = switch_expression
        .child_nodes()
        .filter(|n| n.kind() == SyntaxKind::CaseGroup)
        .collect();
    assert_eq!(groups.len(), 2);
    let first_label = groups[0].child_nodes().next().unwrap();
    assert_eq!(first_label.kind(), SyntaxKind::CaseLabel);
    let expressions = first_label
        .child_nodes()
        .find(|n| n.kind() == SyntaxKind::StatementExpressionList)
        .unwrap();
    assert_eq!(expressions.elements().len(), 2);
    assert_eq!(expressions.separators().len(), 1);
}

#[test]
fn test_resource_forms() {
    // A fresh declaration and a pre-existing effectively-final variable.
    let tree = parse_ok("class A { void m(AutoCloseable c) { try (AutoCloseable d = c; c) { } catch (Exception e) { } } }");
    let resources = find(&tree, SyntaxKind::ResourceList);
    let elements = resources.elements();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0].kind(), SyntaxKind::VariableDeclaration);
    assert_eq!(elements[1].kind(), SyntaxKind::Identifier);
}

#[test]
fn test_method_reference_forms() {
    assert_round_trip(
        "class A { void m() { f(String::valueOf); f(super::toString); f(this::m); f(java.util.ArrayList::new); } }",
    );
}

// ============================================================================
// List invariants
// ============================================================================

#[test]
fn test_argument_list_separator_invariant() {
    let tree = parse_ok("class A { void m() { f(); f(a, b, c); } }");
    let lists: Vec<Node> = tree
        .root()
        .descendants()
        .filter(|n| n.kind() == SyntaxKind::ArgumentList)
        .collect();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].elements().len(), 0);
    assert_eq!(lists[0].separators().len(), 0);
    assert_eq!(lists[1].elements().len(), 3);
    assert_eq!(lists[1].separators().len(), 2);
}

#[test]
fn test_empty_argument_list_is_distinct_from_absent() {
    let tree = parse_ok("class A { void m() { foo(); bar; } }");
    let invocation = find(&tree, SyntaxKind::MethodInvocation);
    assert!(invocation
        .child_nodes()
        .any(|n| n.kind() == SyntaxKind::ArgumentList));
    let statements: Vec<Node> = tree
        .root()
        .descendants()
        .filter(|n| n.kind() == SyntaxKind::ExpressionStatement)
        .collect();
    let bare = statements[1].child_nodes().next().unwrap();
    assert_eq!(bare.kind(), SyntaxKind::Identifier);
}

#[test]
fn test_field_declarator_list() {
    let tree = parse_ok("class A { int a = 1, b, c = 3; }");
    let declaration = find(&tree, SyntaxKind::VariableDeclaration);
    assert!(declaration.is_list());
    assert_eq!(declaration.elements().len(), 3);
    assert_eq!(declaration.separators().len(), 2);
}

#[test]
fn test_terminated_resource_list_invariant() {
    let tree = parse_ok("class A { void m(AutoCloseable a, AutoCloseable b) { try (a; b;) { } } }");
    let resources = find(&tree, SyntaxKind::ResourceList);
    // Fully terminated: one separator per element.
    assert_eq!(resources.elements().len(), resources.separators().len());
}

// ============================================================================
// Tree shape and well-formedness
// ============================================================================

fn check_parents(node: Node<'_>) {
    for child in node.child_nodes() {
        let parent = child.parent().expect("linked parent");
        assert_eq!(parent.id(), node.id());
        let occurrences = parent
            .child_nodes()
            .filter(|n| n.id() == child.id())
            .count();
        assert_eq!(occurrences, 1, "child appears exactly once in its parent");
        check_parents(child);
    }
}

#[test]
fn test_parent_links() {
    let tree = parse_ok(SAMPLE);
    assert!(tree.root().parent().is_none());
    check_parents(tree.root());
}

fn check_first_last(node: Node<'_>) {
    let mut expected_first = None;
    for child in node.children() {
        match child {
            Child::Token(token) => {
                expected_first = Some(token.range());
                break;
            }
            Child::Node(sub) => {
                if let Some(token) = sub.first_token() {
                    expected_first = Some(token.range());
                    break;
                }
            }
        }
    }
    assert_eq!(node.first_token().map(|t| t.range()), expected_first);
    let mut expected_last = None;
    for child in node.children().collect::<Vec<_>>().into_iter().rev() {
        match child {
            Child::Token(token) => {
                expected_last = Some(token.range());
                break;
            }
            Child::Node(sub) => {
                if let Some(token) = sub.last_token() {
                    expected_last = Some(token.range());
                    break;
                }
            }
        }
    }
    assert_eq!(node.last_token().map(|t| t.range()), expected_last);
    for child in node.child_nodes() {
        check_first_last(child);
    }
}

#[test]
fn test_first_last_token_invariant() {
    let tree = parse_ok(SAMPLE);
    check_first_last(tree.root());
}

#[test]
fn test_enum_semicolon_attaches_to_last_constant() {
    let tree = parse_ok("enum E { A, B; int x; }");
    let constants: Vec<Node> = tree
        .root()
        .descendants()
        .filter(|n| n.kind() == SyntaxKind::EnumConstant)
        .collect();
    assert_eq!(constants.len(), 2);
    assert!(constants[1].text().ends_with("B;"));
    assert_round_trip("enum E { A, B; int x; }");
}

#[test]
fn test_grammar_rule_tags() {
    let tree = parse_ok("class A { }");
    assert_eq!(
        tree.root().rule(),
        javelin_ast::grammar_rule::GrammarRule::CompilationUnit
    );
    let class = find(&tree, SyntaxKind::ClassDeclaration);
    assert_eq!(
        class.rule(),
        javelin_ast::grammar_rule::GrammarRule::ClassDeclaration
    );
}

#[test]
fn test_eof_token_is_in_the_tree() {
    let tree = parse_ok("class A { } ");
    let eof = tree.root().last_token().unwrap();
    assert!(eof.is_eof());
    assert_eq!(eof.leading_trivia().len(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_close_brace_is_positioned() {
    let diagnostic = syntax_error("class A { int x");
    assert!(
        diagnostic.message_text.contains("'}'"),
        "message: {}",
        diagnostic.message_text
    );
    assert_eq!(diagnostic.position.line, 1);
    assert_eq!(diagnostic.position.column, 15);
}

#[test]
fn test_error_position_tracks_lines() {
    let diagnostic = syntax_error("class A {\n  int x = ;\n}");
    assert_eq!(diagnostic.position.line, 2);
}

#[test]
fn test_lexical_error_fails_the_parse() {
    let error = parse("class A { String s = \"oops; }").unwrap_err();
    assert!(matches!(error, ParseError::Syntax(_)));
}

#[test]
fn test_enum_members_without_semicolon_are_rejected() {
    let diagnostic = syntax_error("enum E { A void f() { } }");
    assert!(
        diagnostic
            .message_text
            .contains("';' expected between enum constants"),
        "message: {}",
        diagnostic.message_text
    );
}

#[test]
fn test_garbage_after_valid_unit_is_rejected() {
    assert!(parse("class A { } ???").is_err());
}

// ============================================================================
// Concurrency and the graft hook
// ============================================================================

#[test]
fn test_parallel_parsing() {
    let sources: Vec<String> = (0..8)
        .map(|i| format!("class C{} {{ int f() {{ return {}; }} }}", i, i))
        .collect();
    let handles: Vec<_> = sources
        .into_iter()
        .map(|source| {
            std::thread::spawn(move || {
                let tree = parse(&source).unwrap();
                assert_eq!(tree.reconstruct_source(), source);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_graft_subtree_hook() {
    let mut tree = parse_ok("class A { int x = a + b; }");
    let plus = find(&tree, SyntaxKind::Plus);
    let declarator = plus.parent().unwrap();
    assert_eq!(declarator.kind(), SyntaxKind::VariableDeclarator);
    let declarator_id = declarator.id();
    let plus_id = plus.id();
    let replacement_id = plus.child_nodes().next().unwrap().id();
    let index = declarator
        .children()
        .position(|c| c.as_node().map(|n| n.id()) == Some(plus_id))
        .unwrap();
    // Force the caches so the graft has something to invalidate.
    let _ = tree.root().last_token();

    let replaced = tree.graft_subtree(declarator_id, index, replacement_id);
    assert!(replaced.is_some());
    let declarator = tree.node(declarator_id);
    assert!(declarator.text().ends_with("a"));
    let grafted = declarator.child_nodes().last().unwrap();
    assert_eq!(grafted.id(), replacement_id);
    assert_eq!(grafted.parent().unwrap().id(), declarator_id);
}
