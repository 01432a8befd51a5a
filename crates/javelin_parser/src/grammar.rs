//! The grammar rules.
//!
//! One method per nonterminal, organized like the grammar definition:
//! compilation unit, modules, types, classes, enums, interfaces,
//! annotations, formal parameters, statements, expressions. Alternatives
//! are ordered choices: the first one to match wins, and a failed
//! alternative restores the cursor before the next is tried.

use crate::factory::{self, Dim, Selector};
use crate::parser::{ParseFail, Parser, PResult};
use javelin_ast::grammar_rule::GrammarRule;
use javelin_ast::syntax_kind::SyntaxKind;
use javelin_ast::tree::{Element, NodeId, TokenId};
use javelin_diagnostics::ParseError;

impl Parser {
    // ========================================================================
    // Compilation unit
    // ========================================================================

    pub(crate) fn parse_compilation_unit(&mut self) -> Result<NodeId, ParseError> {
        match self.compilation_unit() {
            Ok(id) => Ok(id),
            Err(ParseFail::Fatal(error)) => Err(error),
            Err(ParseFail::Backtrack) => Err(self.failure_error()),
        }
    }

    fn compilation_unit(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        if let Some(package) = self.try_parse(Self::package_declaration)? {
            children.push(Element::Node(package));
        }
        for import in self.zero_or_more(Self::import_declaration)? {
            children.push(Element::Node(import));
        }
        if let Some(module) = self.try_parse(Self::module_declaration)? {
            children.push(Element::Node(module));
        }
        for declaration in self.zero_or_more(Self::type_declaration)? {
            children.push(Element::Node(declaration));
        }
        let eof = self.expect(SyntaxKind::EndOfFileToken)?;
        children.push(Element::Token(eof));
        Ok(self.builder.node(
            SyntaxKind::CompilationUnit,
            GrammarRule::CompilationUnit,
            children,
        ))
    }

    fn package_declaration(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        children.push(Element::Token(self.expect(SyntaxKind::PackageKeyword)?));
        children.push(Element::Node(self.qualified_identifier()?));
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::PackageDeclaration,
            GrammarRule::PackageDeclaration,
            children,
        ))
    }

    fn import_declaration(&mut self) -> PResult<NodeId> {
        // Stray semicolons are accepted between imports.
        if let Some(semi) = self.accept(SyntaxKind::SemicolonToken) {
            return Ok(self.builder.node(
                SyntaxKind::EmptyStatement,
                GrammarRule::ImportDeclaration,
                vec![Element::Token(semi)],
            ));
        }
        let mut children = vec![Element::Token(self.expect(SyntaxKind::ImportKeyword)?)];
        if let Some(static_token) = self.accept(SyntaxKind::StaticKeyword) {
            children.push(Element::Token(static_token));
        }
        children.push(Element::Node(self.qualified_identifier()?));
        if self.at(SyntaxKind::DotToken) {
            children.push(Element::Token(self.bump()));
            children.push(Element::Token(self.expect(SyntaxKind::AsteriskToken)?));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::ImportDeclaration,
            GrammarRule::ImportDeclaration,
            children,
        ))
    }

    fn type_declaration(&mut self) -> PResult<NodeId> {
        if let Some(semi) = self.accept(SyntaxKind::SemicolonToken) {
            return Ok(self.builder.node(
                SyntaxKind::EmptyStatement,
                GrammarRule::TypeDeclaration,
                vec![Element::Token(semi)],
            ));
        }
        let modifiers = self.modifiers()?;
        self.any_type_declaration(modifiers)
    }

    fn any_type_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(|p| p.class_declaration(modifiers))? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| p.enum_declaration(modifiers))? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| p.interface_declaration(modifiers))? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| p.annotation_type_declaration(modifiers))? {
            return Ok(n);
        }
        self.record_declaration(modifiers)
    }

    // ========================================================================
    // Modules
    // ========================================================================

    fn module_declaration(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        if self.at_word("open") && self.nth_kind(1) == SyntaxKind::Identifier {
            children.push(Element::Token(self.bump()));
        }
        children.push(Element::Token(self.expect_word("module")?));
        children.push(Element::Node(self.module_name()?));
        children.push(Element::Token(self.expect(SyntaxKind::OpenBraceToken)?));
        for directive in self.zero_or_more(Self::module_directive)? {
            children.push(Element::Node(directive));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseBraceToken)?));
        Ok(self.builder.node(
            SyntaxKind::ModuleDeclaration,
            GrammarRule::ModuleDeclaration,
            children,
        ))
    }

    fn module_name(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::Identifier)?)];
        let rest = self.zero_or_more(|p| {
            let dot = p.expect(SyntaxKind::DotToken)?;
            let name = p.expect(SyntaxKind::Identifier)?;
            Ok((dot, name))
        })?;
        for (dot, name) in rest {
            children.push(Element::Token(dot));
            children.push(Element::Token(name));
        }
        Ok(self
            .builder
            .node(SyntaxKind::ModuleName, GrammarRule::ModuleName, children))
    }

    fn module_name_list(&mut self) -> PResult<NodeId> {
        let first = self.module_name()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let name = p.module_name()?;
            Ok((comma, name))
        })?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ModuleNameList,
            GrammarRule::ModuleNameList,
            None,
            Some(first),
            rest,
            None,
        )
    }

    fn module_directive(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::requires_directive)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::exports_or_opens_directive)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::uses_directive)? {
            return Ok(n);
        }
        self.provides_directive()
    }

    fn requires_directive(&mut self) -> PResult<NodeId> {
        let requires = self.expect_word("requires")?;
        // `transitive` may be the module name rather than a modifier.
        if let Some(n) = self.try_parse(|p| {
            let name_token = p.expect_word("transitive")?;
            let semi = p.expect(SyntaxKind::SemicolonToken)?;
            let name = p.builder.node(
                SyntaxKind::ModuleName,
                GrammarRule::ModuleName,
                vec![Element::Token(name_token)],
            );
            Ok(p.builder.node(
                SyntaxKind::RequiresDirective,
                GrammarRule::RequiresDirective,
                vec![
                    Element::Token(requires),
                    Element::Node(name),
                    Element::Token(semi),
                ],
            ))
        })? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| {
            let static_token = p.expect(SyntaxKind::StaticKeyword)?;
            let name_token = p.expect_word("transitive")?;
            let semi = p.expect(SyntaxKind::SemicolonToken)?;
            let name = p.builder.node(
                SyntaxKind::ModuleName,
                GrammarRule::ModuleName,
                vec![Element::Token(name_token)],
            );
            Ok(p.builder.node(
                SyntaxKind::RequiresDirective,
                GrammarRule::RequiresDirective,
                vec![
                    Element::Token(requires),
                    Element::Token(static_token),
                    Element::Node(name),
                    Element::Token(semi),
                ],
            ))
        })? {
            return Ok(n);
        }
        let mut children = vec![Element::Token(requires)];
        let modifiers = self.zero_or_more(|p| {
            if let Some(t) = p.accept(SyntaxKind::StaticKeyword) {
                return Ok(t);
            }
            p.expect_word("transitive")
        })?;
        for modifier in modifiers {
            children.push(Element::Token(modifier));
        }
        children.push(Element::Node(self.module_name()?));
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::RequiresDirective,
            GrammarRule::RequiresDirective,
            children,
        ))
    }

    fn exports_or_opens_directive(&mut self) -> PResult<NodeId> {
        let (keyword, kind, rule) = if self.at_word("exports") {
            (self.bump(), SyntaxKind::ExportsDirective, GrammarRule::ExportsDirective)
        } else if self.at_word("opens") {
            (self.bump(), SyntaxKind::OpensDirective, GrammarRule::OpensDirective)
        } else {
            self.note_expected("'exports'".to_string());
            return Err(ParseFail::Backtrack);
        };
        let mut children = vec![Element::Token(keyword)];
        children.push(Element::Node(self.qualified_identifier()?));
        if self.at_word("to") {
            children.push(Element::Token(self.bump()));
            children.push(Element::Node(self.module_name_list()?));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(kind, rule, children))
    }

    fn uses_directive(&mut self) -> PResult<NodeId> {
        let keyword = self.expect_word("uses")?;
        let name = self.qualified_identifier()?;
        let semi = self.expect(SyntaxKind::SemicolonToken)?;
        Ok(self.builder.node(
            SyntaxKind::UsesDirective,
            GrammarRule::UsesDirective,
            vec![
                Element::Token(keyword),
                Element::Node(name),
                Element::Token(semi),
            ],
        ))
    }

    fn provides_directive(&mut self) -> PResult<NodeId> {
        let keyword = self.expect_word("provides")?;
        let name = self.qualified_identifier()?;
        let with = self.expect_word("with")?;
        let providers = self.qualified_identifier_list()?;
        let semi = self.expect(SyntaxKind::SemicolonToken)?;
        Ok(self.builder.node(
            SyntaxKind::ProvidesDirective,
            GrammarRule::ProvidesDirective,
            vec![
                Element::Token(keyword),
                Element::Node(name),
                Element::Token(with),
                Element::Node(providers),
                Element::Token(semi),
            ],
        ))
    }

    // ========================================================================
    // Modifiers and annotations
    // ========================================================================

    fn modifiers(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        loop {
            if self.at(SyntaxKind::AtToken) {
                match self.try_parse(Self::annotation)? {
                    Some(annotation) => {
                        children.push(Element::Node(annotation));
                        continue;
                    }
                    // `@interface`
                    None => break,
                }
            }
            if self.kind().is_modifier_keyword() {
                children.push(Element::Token(self.bump()));
                continue;
            }
            break;
        }
        Ok(self
            .builder
            .node(SyntaxKind::Modifiers, GrammarRule::Modifiers, children))
    }

    fn annotation(&mut self) -> PResult<NodeId> {
        let at = self.expect(SyntaxKind::AtToken)?;
        let name = self.annotation_name()?;
        let mut children = vec![Element::Token(at), Element::Node(name)];
        if self.at(SyntaxKind::OpenParenToken) {
            children.push(Element::Node(self.annotation_rest()?));
        }
        Ok(self
            .builder
            .node(SyntaxKind::Annotation, GrammarRule::Annotation, children))
    }

    /// Dotted annotation name, without type arguments.
    fn annotation_name(&mut self) -> PResult<NodeId> {
        let first = self.expect(SyntaxKind::Identifier)?;
        let mut result = factory::identifier(&mut self.builder, first);
        let rest = self.zero_or_more(|p| {
            let dot = p.expect(SyntaxKind::DotToken)?;
            let name = p.expect(SyntaxKind::Identifier)?;
            Ok((dot, name))
        })?;
        for (dot, name) in rest {
            let name_node = factory::identifier(&mut self.builder, name);
            result = self.builder.node(
                SyntaxKind::MemberSelect,
                GrammarRule::Annotation,
                vec![
                    Element::Node(result),
                    Element::Token(dot),
                    Element::Node(name_node),
                ],
            );
        }
        Ok(result)
    }

    fn annotation_rest(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::normal_annotation_rest)? {
            return Ok(n);
        }
        self.single_element_annotation_rest()
    }

    fn normal_annotation_rest(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        let mut first = None;
        let mut rest = Vec::new();
        if let Some(pair) = self.try_parse(Self::element_value_pair)? {
            first = Some(pair);
            rest = self.zero_or_more(|p| {
                let comma = p.expect(SyntaxKind::CommaToken)?;
                let pair = p.element_value_pair()?;
                Ok((comma, pair))
            })?;
        }
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ArgumentList,
            GrammarRule::Annotation,
            Some(open),
            first,
            rest,
            Some(close),
        )
    }

    fn element_value_pair(&mut self) -> PResult<NodeId> {
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        let equals = self.expect(SyntaxKind::EqualsToken)?;
        let value = self.element_value()?;
        Ok(self.builder.node(
            SyntaxKind::Assignment,
            GrammarRule::ElementValuePair,
            vec![
                Element::Node(name),
                Element::Token(equals),
                Element::Node(value),
            ],
        ))
    }

    fn single_element_annotation_rest(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        let value = self.element_value()?;
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ArgumentList,
            GrammarRule::Annotation,
            Some(open),
            Some(value),
            Vec::new(),
            Some(close),
        )
    }

    fn element_value(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::conditional_expression)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::annotation)? {
            return Ok(n);
        }
        self.element_value_array_initializer()
    }

    fn element_value_array_initializer(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenBraceToken)?;
        let mut items = Vec::new();
        loop {
            let Some(value) = self.try_parse(Self::element_value)? else {
                break;
            };
            let comma = self.accept(SyntaxKind::CommaToken);
            let done = comma.is_none();
            items.push((value, comma));
            if done {
                break;
            }
        }
        let close = self.expect(SyntaxKind::CloseBraceToken)?;
        factory::terminated_list(
            &mut self.builder,
            SyntaxKind::NewArray,
            GrammarRule::ElementValueArrayInitializer,
            Some(open),
            items,
            Some(close),
        )
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn type_rule(&mut self) -> PResult<NodeId> {
        let base = if let Some(basic) = self.try_parse(Self::basic_type)? {
            basic
        } else {
            self.qualified_identifier()?
        };
        let dims = self.zero_or_more(Self::annotated_dim)?;
        Ok(factory::fold_dims(&mut self.builder, base, dims))
    }

    fn basic_type(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        if !self.kind().is_primitive_type_keyword() {
            self.note_expected("a primitive type".to_string());
            return Err(ParseFail::Backtrack);
        }
        children.push(Element::Token(self.bump()));
        Ok(self.builder.node(
            SyntaxKind::PrimitiveType,
            GrammarRule::BasicType,
            children,
        ))
    }

    fn annotated_dim(&mut self) -> PResult<Dim> {
        let annotations = self.zero_or_more(Self::annotation)?;
        let open = self.expect(SyntaxKind::OpenBracketToken)?;
        let close = self.expect(SyntaxKind::CloseBracketToken)?;
        Ok(Dim {
            annotations,
            open,
            close,
        })
    }

    /// `A.B<C>.D` - annotated, possibly parameterized qualified identifier.
    fn qualified_identifier(&mut self) -> PResult<NodeId> {
        let first = self.annotated_parameterized_identifier()?;
        let rest = self.zero_or_more(|p| {
            let dot = p.expect(SyntaxKind::DotToken)?;
            let (name, args) = p.annotated_parameterized_identifier()?;
            Ok((dot, name, args))
        })?;
        Ok(factory::qualified_identifier(&mut self.builder, first, rest))
    }

    fn annotated_parameterized_identifier(&mut self) -> PResult<(NodeId, Option<NodeId>)> {
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        children.push(Element::Token(self.expect(SyntaxKind::Identifier)?));
        let name = self.builder.node(
            SyntaxKind::Identifier,
            GrammarRule::QualifiedIdentifier,
            children,
        );
        let args = self.try_parse(Self::type_arguments)?;
        Ok((name, args))
    }

    fn qualified_identifier_list(&mut self) -> PResult<NodeId> {
        let first = self.qualified_identifier()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let next = p.qualified_identifier()?;
            Ok((comma, next))
        })?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::TypeList,
            GrammarRule::QualifiedIdentifierList,
            None,
            Some(first),
            rest,
            None,
        )
    }

    fn type_arguments(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::LessThanToken)?;
        if let Some(close) = self.accept(SyntaxKind::GreaterThanToken) {
            // Diamond.
            return factory::separated_list(
                &mut self.builder,
                SyntaxKind::TypeArgumentList,
                GrammarRule::TypeArguments,
                Some(open),
                None,
                Vec::new(),
                Some(close),
            );
        }
        let first = self.type_argument()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let argument = p.type_argument()?;
            Ok((comma, argument))
        })?;
        let close = self.expect(SyntaxKind::GreaterThanToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::TypeArgumentList,
            GrammarRule::TypeArguments,
            Some(open),
            Some(first),
            rest,
            Some(close),
        )
    }

    fn type_argument(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::type_rule)? {
            return Ok(n);
        }
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        children.push(Element::Token(self.expect(SyntaxKind::QuestionToken)?));
        if let Some(bound_keyword) =
            self.accept_any(&[SyntaxKind::ExtendsKeyword, SyntaxKind::SuperKeyword])
        {
            let kind = if self.builder.token(bound_keyword).kind() == SyntaxKind::ExtendsKeyword {
                SyntaxKind::ExtendsWildcard
            } else {
                SyntaxKind::SuperWildcard
            };
            children.push(Element::Token(bound_keyword));
            for annotation in self.zero_or_more(Self::annotation)? {
                children.push(Element::Node(annotation));
            }
            children.push(Element::Node(self.type_rule()?));
            return Ok(self.builder.node(kind, GrammarRule::TypeArgument, children));
        }
        Ok(self.builder.node(
            SyntaxKind::UnboundedWildcard,
            GrammarRule::TypeArgument,
            children,
        ))
    }

    fn type_parameters(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::LessThanToken)?;
        let first = self.type_parameter()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let parameter = p.type_parameter()?;
            Ok((comma, parameter))
        })?;
        let close = self.expect(SyntaxKind::GreaterThanToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::TypeParameterList,
            GrammarRule::TypeParameters,
            Some(open),
            Some(first),
            rest,
            Some(close),
        )
    }

    fn type_parameter(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        if let Some(extends) = self.accept(SyntaxKind::ExtendsKeyword) {
            children.push(Element::Token(extends));
            children.push(Element::Node(self.bound()?));
        }
        Ok(self.builder.node(
            SyntaxKind::TypeParameter,
            GrammarRule::TypeParameter,
            children,
        ))
    }

    fn bound(&mut self) -> PResult<NodeId> {
        let first = self.qualified_identifier()?;
        let rest = self.zero_or_more(|p| {
            let amp = p.expect(SyntaxKind::AmpersandToken)?;
            let bound = p.qualified_identifier()?;
            Ok((amp, bound))
        })?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::TypeBoundList,
            GrammarRule::Bound,
            None,
            Some(first),
            rest,
            None,
        )
    }

    // ========================================================================
    // Classes
    // ========================================================================

    fn class_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        children.push(Element::Token(self.expect(SyntaxKind::ClassKeyword)?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        if let Some(parameters) = self.try_parse(Self::type_parameters)? {
            children.push(Element::Node(parameters));
        }
        if let Some(extends) = self.accept(SyntaxKind::ExtendsKeyword) {
            children.push(Element::Token(extends));
            children.push(Element::Node(self.qualified_identifier()?));
        }
        if let Some(implements) = self.accept(SyntaxKind::ImplementsKeyword) {
            children.push(Element::Token(implements));
            children.push(Element::Node(self.qualified_identifier_list()?));
        }
        self.class_body_into(&mut children, false)?;
        Ok(self.builder.node(
            SyntaxKind::ClassDeclaration,
            GrammarRule::ClassDeclaration,
            children,
        ))
    }

    fn class_body_into(&mut self, children: &mut Vec<Element>, in_record: bool) -> PResult<()> {
        children.push(Element::Token(self.expect(SyntaxKind::OpenBraceToken)?));
        let members = self.zero_or_more(|p| p.class_member(in_record))?;
        for member in members {
            children.push(Element::Node(member));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseBraceToken)?));
        Ok(())
    }

    /// `{ members }` as an anonymous class body node.
    fn class_body_node(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        self.class_body_into(&mut children, false)?;
        Ok(self.builder.node(
            SyntaxKind::ClassDeclaration,
            GrammarRule::ClassBody,
            children,
        ))
    }

    fn class_member(&mut self, in_record: bool) -> PResult<NodeId> {
        if let Some(member) = self.try_parse(|p| p.member_with_modifiers(in_record))? {
            return Ok(member);
        }
        if let Some(initializer) = self.try_parse(Self::initializer_member)? {
            return Ok(initializer);
        }
        // Stray semicolons are accepted between members.
        let semi = self.expect(SyntaxKind::SemicolonToken)?;
        Ok(self.builder.node(
            SyntaxKind::EmptyStatement,
            GrammarRule::MemberDecl,
            vec![Element::Token(semi)],
        ))
    }

    fn member_with_modifiers(&mut self, in_record: bool) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        if let Some(n) = self.try_parse(|p| p.method_or_constructor(modifiers, None))? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| p.field_declaration(modifiers))? {
            return Ok(n);
        }
        if in_record {
            if let Some(n) = self.try_parse(|p| p.compact_constructor(modifiers))? {
                return Ok(n);
            }
        }
        self.any_type_declaration(modifiers)
    }

    fn method_or_constructor(
        &mut self,
        modifiers: NodeId,
        type_parameters: Option<NodeId>,
    ) -> PResult<NodeId> {
        if type_parameters.is_none() {
            // Generic member: the type-parameter list is parsed separately
            // and merged into the member node.
            if let Some(n) = self.try_parse(|p| {
                let parameters = p.type_parameters()?;
                p.method_or_constructor(modifiers, Some(parameters))
            })? {
                return Ok(n);
            }
        }
        if let Some(n) = self.try_parse(|p| p.method_rest(modifiers, type_parameters))? {
            return Ok(n);
        }
        self.constructor_rest(modifiers, type_parameters)
    }

    fn method_rest(
        &mut self,
        modifiers: NodeId,
        type_parameters: Option<NodeId>,
    ) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        if let Some(parameters) = type_parameters {
            children.push(Element::Node(parameters));
        }
        children.push(Element::Node(self.type_rule()?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        children.push(Element::Node(self.formal_parameters()?));
        self.method_tail_into(&mut children)?;
        Ok(self.builder.node(
            SyntaxKind::MethodDeclaration,
            GrammarRule::MethodDeclaration,
            children,
        ))
    }

    fn constructor_rest(
        &mut self,
        modifiers: NodeId,
        type_parameters: Option<NodeId>,
    ) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        if let Some(parameters) = type_parameters {
            children.push(Element::Node(parameters));
        }
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        children.push(Element::Node(self.formal_parameters()?));
        self.method_tail_into(&mut children)?;
        Ok(self.builder.node(
            SyntaxKind::ConstructorDeclaration,
            GrammarRule::ConstructorDeclaration,
            children,
        ))
    }

    /// Trailing dimensions, `throws` clause, and body or semicolon.
    fn method_tail_into(&mut self, children: &mut Vec<Element>) -> PResult<()> {
        let dims = self.zero_or_more(Self::annotated_dim)?;
        for dim in dims {
            for annotation in dim.annotations {
                children.push(Element::Node(annotation));
            }
            children.push(Element::Token(dim.open));
            children.push(Element::Token(dim.close));
        }
        if let Some(throws) = self.accept(SyntaxKind::ThrowsKeyword) {
            children.push(Element::Token(throws));
            children.push(Element::Node(self.qualified_identifier_list()?));
        }
        if let Some(semi) = self.accept(SyntaxKind::SemicolonToken) {
            children.push(Element::Token(semi));
        } else {
            children.push(Element::Node(self.block()?));
        }
        Ok(())
    }

    fn compact_constructor(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        let body = self.block()?;
        Ok(self.builder.node(
            SyntaxKind::CompactConstructorDeclaration,
            GrammarRule::CompactConstructorDeclaration,
            vec![
                Element::Node(modifiers),
                Element::Node(name),
                Element::Node(body),
            ],
        ))
    }

    fn field_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let field_type = self.type_rule()?;
        let (first, rest) = self.variable_declarators()?;
        let semi = self.expect(SyntaxKind::SemicolonToken)?;
        factory::variable_declaration(
            &mut self.builder,
            GrammarRule::FieldDeclaration,
            modifiers,
            field_type,
            first,
            rest,
            Some(semi),
        )
    }

    fn variable_declarators(&mut self) -> PResult<(NodeId, Vec<(TokenId, NodeId)>)> {
        let first = self.variable_declarator()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let declarator = p.variable_declarator()?;
            Ok((comma, declarator))
        })?;
        Ok((first, rest))
    }

    fn variable_declarator(&mut self) -> PResult<NodeId> {
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        let mut children = vec![Element::Node(name)];
        let dims = self.zero_or_more(Self::annotated_dim)?;
        for dim in dims {
            for annotation in dim.annotations {
                children.push(Element::Node(annotation));
            }
            children.push(Element::Token(dim.open));
            children.push(Element::Token(dim.close));
        }
        if let Some(equals) = self.accept(SyntaxKind::EqualsToken) {
            children.push(Element::Token(equals));
            children.push(Element::Node(self.variable_initializer()?));
        }
        Ok(self.builder.node(
            SyntaxKind::VariableDeclarator,
            GrammarRule::VariableDeclarator,
            children,
        ))
    }

    fn variable_initializer(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::expression)? {
            return Ok(n);
        }
        self.array_initializer()
    }

    fn array_initializer(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenBraceToken)?;
        let leading_comma = self.accept(SyntaxKind::CommaToken);
        let mut items = Vec::new();
        loop {
            let Some(value) = self.try_parse(Self::variable_initializer)? else {
                break;
            };
            let comma = self.accept(SyntaxKind::CommaToken);
            let done = comma.is_none();
            items.push((value, comma));
            if done {
                break;
            }
        }
        let close = self.expect(SyntaxKind::CloseBraceToken)?;
        factory::array_initializer(
            &mut self.builder,
            open,
            leading_comma,
            items,
            close,
        )
    }

    fn initializer_member(&mut self) -> PResult<NodeId> {
        let static_token = self.accept(SyntaxKind::StaticKeyword);
        let body = self.block()?;
        let (kind, mut children) = match static_token {
            Some(token) => (
                SyntaxKind::StaticInitializerBlock,
                vec![Element::Token(token)],
            ),
            None => (SyntaxKind::InitializerBlock, Vec::new()),
        };
        children.push(Element::Node(body));
        Ok(self
            .builder
            .node(kind, GrammarRule::InitializerMember, children))
    }

    // ========================================================================
    // Enums
    // ========================================================================

    fn enum_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        children.push(Element::Token(self.expect(SyntaxKind::EnumKeyword)?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        if let Some(implements) = self.accept(SyntaxKind::ImplementsKeyword) {
            children.push(Element::Token(implements));
            children.push(Element::Node(self.qualified_identifier_list()?));
        }
        children.push(Element::Token(self.expect(SyntaxKind::OpenBraceToken)?));
        let constants = self.zero_or_more(Self::enum_constant)?;
        let semi = self.accept(SyntaxKind::SemicolonToken);
        match (constants.last().copied(), semi) {
            // The separating semicolon is attached to the last constant,
            // or kept as an empty member when there are no constants.
            (Some(last), Some(semi)) => {
                for constant in &constants {
                    children.push(Element::Node(*constant));
                }
                self.builder.append_child(last, Element::Token(semi));
            }
            (None, Some(semi)) => {
                let empty = self.builder.node(
                    SyntaxKind::EmptyStatement,
                    GrammarRule::EnumBody,
                    vec![Element::Token(semi)],
                );
                children.push(Element::Node(empty));
            }
            _ => {
                for constant in &constants {
                    children.push(Element::Node(*constant));
                }
            }
        }
        let members_position = self.current().position();
        let members = self.zero_or_more(|p| p.class_member(false))?;
        factory::check_enum_body(!members.is_empty(), semi.is_some(), Some(members_position))?;
        for member in members {
            children.push(Element::Node(member));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseBraceToken)?));
        Ok(self.builder.node(
            SyntaxKind::EnumDeclaration,
            GrammarRule::EnumDeclaration,
            children,
        ))
    }

    fn enum_constant(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        if let Some(arguments) = self.try_parse(Self::arguments)? {
            children.push(Element::Node(arguments));
        }
        if let Some(body) = self.try_parse(Self::class_body_node)? {
            children.push(Element::Node(body));
        }
        if let Some(comma) = self.accept(SyntaxKind::CommaToken) {
            children.push(Element::Token(comma));
        }
        Ok(self.builder.node(
            SyntaxKind::EnumConstant,
            GrammarRule::EnumConstant,
            children,
        ))
    }

    // ========================================================================
    // Interfaces, annotation types, records
    // ========================================================================

    fn interface_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        children.push(Element::Token(self.expect(SyntaxKind::InterfaceKeyword)?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        if let Some(parameters) = self.try_parse(Self::type_parameters)? {
            children.push(Element::Node(parameters));
        }
        if let Some(extends) = self.accept(SyntaxKind::ExtendsKeyword) {
            children.push(Element::Token(extends));
            children.push(Element::Node(self.qualified_identifier_list()?));
        }
        self.class_body_into(&mut children, false)?;
        Ok(self.builder.node(
            SyntaxKind::InterfaceDeclaration,
            GrammarRule::InterfaceDeclaration,
            children,
        ))
    }

    fn annotation_type_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        children.push(Element::Token(self.expect(SyntaxKind::AtToken)?));
        children.push(Element::Token(self.expect(SyntaxKind::InterfaceKeyword)?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        children.push(Element::Token(self.expect(SyntaxKind::OpenBraceToken)?));
        let members = self.zero_or_more(Self::annotation_type_element)?;
        for member in members {
            children.push(Element::Node(member));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseBraceToken)?));
        Ok(self.builder.node(
            SyntaxKind::AnnotationTypeDeclaration,
            GrammarRule::AnnotationTypeDeclaration,
            children,
        ))
    }

    fn annotation_type_element(&mut self) -> PResult<NodeId> {
        if let Some(semi) = self.accept(SyntaxKind::SemicolonToken) {
            return Ok(self.builder.node(
                SyntaxKind::EmptyStatement,
                GrammarRule::AnnotationTypeElement,
                vec![Element::Token(semi)],
            ));
        }
        let modifiers = self.modifiers()?;
        if let Some(n) = self.try_parse(|p| p.annotation_method(modifiers))? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| p.field_declaration(modifiers))? {
            return Ok(n);
        }
        self.any_type_declaration(modifiers)
    }

    fn annotation_method(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        children.push(Element::Node(self.type_rule()?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        let parameters = factory::separated_list(
            &mut self.builder,
            SyntaxKind::ParameterList,
            GrammarRule::AnnotationMethodRest,
            Some(open),
            None,
            Vec::new(),
            Some(close),
        )?;
        children.push(Element::Node(parameters));
        if let Some(default) = self.accept(SyntaxKind::DefaultKeyword) {
            children.push(Element::Token(default));
            children.push(Element::Node(self.element_value()?));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::MethodDeclaration,
            GrammarRule::AnnotationMethodRest,
            children,
        ))
    }

    fn record_declaration(&mut self, modifiers: NodeId) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers)];
        children.push(Element::Token(self.expect_word("record")?));
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        if let Some(parameters) = self.try_parse(Self::type_parameters)? {
            children.push(Element::Node(parameters));
        }
        children.push(Element::Node(self.formal_parameters()?));
        if let Some(implements) = self.accept(SyntaxKind::ImplementsKeyword) {
            children.push(Element::Token(implements));
            children.push(Element::Node(self.qualified_identifier_list()?));
        }
        self.class_body_into(&mut children, true)?;
        Ok(self.builder.node(
            SyntaxKind::RecordDeclaration,
            GrammarRule::RecordDeclaration,
            children,
        ))
    }

    // ========================================================================
    // Formal parameters
    // ========================================================================

    fn formal_parameters(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        if let Some(close) = self.accept(SyntaxKind::CloseParenToken) {
            return factory::separated_list(
                &mut self.builder,
                SyntaxKind::ParameterList,
                GrammarRule::FormalParameters,
                Some(open),
                None,
                Vec::new(),
                Some(close),
            );
        }
        let (first, first_vararg) = self.formal_parameter()?;
        let mut varargs = vec![first_vararg];
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let (parameter, vararg) = p.formal_parameter()?;
            Ok((comma, parameter, vararg))
        })?;
        let mut pairs = Vec::new();
        for (comma, parameter, vararg) in rest {
            varargs.push(vararg);
            pairs.push((comma, parameter));
        }
        // A variable-arity parameter closes the list.
        if varargs[..varargs.len() - 1].iter().any(|v| *v) {
            return Err(ParseFail::Backtrack);
        }
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ParameterList,
            GrammarRule::FormalParameters,
            Some(open),
            Some(first),
            pairs,
            Some(close),
        )
    }

    fn formal_parameter(&mut self) -> PResult<(NodeId, bool)> {
        let modifiers = self.modifiers()?;
        let parameter_type = self.type_rule()?;
        if let Some(receiver) = self.try_parse(|p| p.receiver_parameter(modifiers, parameter_type))?
        {
            return Ok((receiver, false));
        }
        let mut children = vec![Element::Node(modifiers), Element::Node(parameter_type)];
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        let ellipsis = self.accept(SyntaxKind::EllipsisToken);
        let vararg = ellipsis.is_some();
        if let Some(ellipsis) = ellipsis {
            children.push(Element::Token(ellipsis));
        }
        self.variable_declarator_id_into(&mut children)?;
        Ok((
            self.builder.node(
                SyntaxKind::Parameter,
                GrammarRule::FormalParameter,
                children,
            ),
            vararg,
        ))
    }

    fn receiver_parameter(
        &mut self,
        modifiers: NodeId,
        parameter_type: NodeId,
    ) -> PResult<NodeId> {
        let mut children = vec![Element::Node(modifiers), Element::Node(parameter_type)];
        let qualifiers = self.zero_or_more(|p| {
            let name = p.expect(SyntaxKind::Identifier)?;
            let dot = p.expect(SyntaxKind::DotToken)?;
            Ok((name, dot))
        })?;
        for (name, dot) in qualifiers {
            children.push(Element::Token(name));
            children.push(Element::Token(dot));
        }
        children.push(Element::Token(self.expect(SyntaxKind::ThisKeyword)?));
        Ok(self.builder.node(
            SyntaxKind::Parameter,
            GrammarRule::ReceiverParameterId,
            children,
        ))
    }

    /// `name` followed by annotated dimensions, pushed into a parameter or
    /// declarator under assembly.
    fn variable_declarator_id_into(&mut self, children: &mut Vec<Element>) -> PResult<()> {
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        children.push(Element::Node(name));
        let dims = self.zero_or_more(Self::annotated_dim)?;
        for dim in dims {
            for annotation in dim.annotations {
                children.push(Element::Node(annotation));
            }
            children.push(Element::Token(dim.open));
            children.push(Element::Token(dim.close));
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(crate) fn block(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::OpenBraceToken)?)];
        for statement in self.zero_or_more(Self::block_statement)? {
            children.push(Element::Node(statement));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseBraceToken)?));
        Ok(self
            .builder
            .node(SyntaxKind::Block, GrammarRule::Block, children))
    }

    fn block_statement(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::local_variable_declaration_statement)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::local_type_declaration)? {
            return Ok(n);
        }
        self.statement()
    }

    fn local_variable_declaration_statement(&mut self) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        let variable_type = self.local_variable_type()?;
        let (first, rest) = self.variable_declarators()?;
        let semi = self.expect(SyntaxKind::SemicolonToken)?;
        factory::variable_declaration(
            &mut self.builder,
            GrammarRule::LocalVariableDeclarationStatement,
            modifiers,
            variable_type,
            first,
            rest,
            Some(semi),
        )
    }

    fn local_variable_type(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::var_type)? {
            return Ok(n);
        }
        self.type_rule()
    }

    fn var_type(&mut self) -> PResult<NodeId> {
        let token = self.expect_word("var")?;
        Ok(self
            .builder
            .node(SyntaxKind::VarType, GrammarRule::VarType, vec![Element::Token(token)]))
    }

    fn local_type_declaration(&mut self) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        if let Some(n) = self.try_parse(|p| p.class_declaration(modifiers))? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(|p| p.enum_declaration(modifiers))? {
            return Ok(n);
        }
        self.record_declaration(modifiers)
    }

    fn statement(&mut self) -> PResult<NodeId> {
        match self.kind() {
            SyntaxKind::OpenBraceToken => self.block(),
            SyntaxKind::AssertKeyword => self.assert_statement(),
            SyntaxKind::IfKeyword => self.if_statement(),
            SyntaxKind::ForKeyword => self.for_statement(),
            SyntaxKind::WhileKeyword => self.while_statement(),
            SyntaxKind::DoKeyword => self.do_statement(),
            SyntaxKind::TryKeyword => self.try_statement(),
            SyntaxKind::SwitchKeyword => self.switch_statement(),
            SyntaxKind::SynchronizedKeyword => self.synchronized_statement(),
            SyntaxKind::ReturnKeyword => self.return_statement(),
            SyntaxKind::ThrowKeyword => self.throw_statement(),
            SyntaxKind::BreakKeyword => self.break_statement(),
            SyntaxKind::ContinueKeyword => self.continue_statement(),
            SyntaxKind::SemicolonToken => {
                let semi = self.bump();
                Ok(self.builder.node(
                    SyntaxKind::EmptyStatement,
                    GrammarRule::EmptyStatement,
                    vec![Element::Token(semi)],
                ))
            }
            _ => {
                if let Some(n) = self.try_parse(Self::labeled_statement)? {
                    return Ok(n);
                }
                self.expression_statement()
            }
        }
    }

    fn assert_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::AssertKeyword)?)];
        children.push(Element::Node(self.expression()?));
        if let Some(colon) = self.accept(SyntaxKind::ColonToken) {
            children.push(Element::Token(colon));
            children.push(Element::Node(self.expression()?));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::AssertStatement,
            GrammarRule::AssertStatement,
            children,
        ))
    }

    fn if_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::IfKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.statement()?));
        if let Some(else_token) = self.accept(SyntaxKind::ElseKeyword) {
            children.push(Element::Token(else_token));
            children.push(Element::Node(self.statement()?));
        }
        Ok(self.builder.node(
            SyntaxKind::IfStatement,
            GrammarRule::IfStatement,
            children,
        ))
    }

    fn for_statement(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::standard_for_statement)? {
            return Ok(n);
        }
        self.foreach_statement()
    }

    fn standard_for_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::ForKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        if let Some(init) = self.try_parse(Self::for_init)? {
            children.push(Element::Node(init));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        if let Some(condition) = self.try_parse(Self::expression)? {
            children.push(Element::Node(condition));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        if let Some(update) = self.try_parse(Self::statement_expressions)? {
            children.push(Element::Node(update));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.statement()?));
        Ok(self.builder.node(
            SyntaxKind::ForStatement,
            GrammarRule::ForStatement,
            children,
        ))
    }

    fn for_init(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::for_init_declaration)? {
            return Ok(n);
        }
        self.statement_expressions()
    }

    fn for_init_declaration(&mut self) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        let variable_type = self.local_variable_type()?;
        let (first, rest) = self.variable_declarators()?;
        factory::variable_declaration(
            &mut self.builder,
            GrammarRule::ForStatement,
            modifiers,
            variable_type,
            first,
            rest,
            None,
        )
    }

    fn statement_expressions(&mut self) -> PResult<NodeId> {
        let first = self.expression()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let expression = p.expression()?;
            Ok((comma, expression))
        })?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::StatementExpressionList,
            GrammarRule::StatementExpressions,
            None,
            Some(first),
            rest,
            None,
        )
    }

    fn foreach_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::ForKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.foreach_parameter()?));
        children.push(Element::Token(self.expect(SyntaxKind::ColonToken)?));
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.statement()?));
        Ok(self.builder.node(
            SyntaxKind::ForEachStatement,
            GrammarRule::ForEachStatement,
            children,
        ))
    }

    fn foreach_parameter(&mut self) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        let parameter_type = self.local_variable_type()?;
        let mut children = vec![Element::Node(modifiers), Element::Node(parameter_type)];
        self.variable_declarator_id_into(&mut children)?;
        Ok(self.builder.node(
            SyntaxKind::Parameter,
            GrammarRule::FormalParameter,
            children,
        ))
    }

    fn while_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::WhileKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.statement()?));
        Ok(self.builder.node(
            SyntaxKind::WhileStatement,
            GrammarRule::WhileStatement,
            children,
        ))
    }

    fn do_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::DoKeyword)?)];
        children.push(Element::Node(self.statement()?));
        children.push(Element::Token(self.expect(SyntaxKind::WhileKeyword)?));
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::DoStatement,
            GrammarRule::DoStatement,
            children,
        ))
    }

    fn try_statement(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::standard_try_statement)? {
            return Ok(n);
        }
        self.try_with_resources_statement()
    }

    fn standard_try_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::TryKeyword)?)];
        children.push(Element::Node(self.block()?));
        for catch in self.zero_or_more(Self::catch_clause)? {
            children.push(Element::Node(catch));
        }
        if let Some(finally_token) = self.accept(SyntaxKind::FinallyKeyword) {
            children.push(Element::Token(finally_token));
            children.push(Element::Node(self.block()?));
        }
        Ok(self.builder.node(
            SyntaxKind::TryStatement,
            GrammarRule::TryStatement,
            children,
        ))
    }

    fn try_with_resources_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::TryKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.resources()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.block()?));
        for catch in self.zero_or_more(Self::catch_clause)? {
            children.push(Element::Node(catch));
        }
        if let Some(finally_token) = self.accept(SyntaxKind::FinallyKeyword) {
            children.push(Element::Token(finally_token));
            children.push(Element::Node(self.block()?));
        }
        Ok(self.builder.node(
            SyntaxKind::TryStatement,
            GrammarRule::TryStatement,
            children,
        ))
    }

    fn resources(&mut self) -> PResult<NodeId> {
        let mut items = Vec::new();
        let first = self.resource()?;
        let first_semi = self.accept(SyntaxKind::SemicolonToken);
        let mut done = first_semi.is_none();
        items.push((first, first_semi));
        while !done {
            let Some(resource) = self.try_parse(Self::resource)? else {
                break;
            };
            let semi = self.accept(SyntaxKind::SemicolonToken);
            done = semi.is_none();
            items.push((resource, semi));
        }
        factory::terminated_list(
            &mut self.builder,
            SyntaxKind::ResourceList,
            GrammarRule::ResourceSpecification,
            None,
            items,
            None,
        )
    }

    fn resource(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::resource_declaration)? {
            return Ok(n);
        }
        // A pre-existing effectively-final variable or field access.
        self.primary_with_selectors()
    }

    fn resource_declaration(&mut self) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        let resource_type = if let Some(var) = self.try_parse(Self::var_type)? {
            var
        } else {
            self.qualified_identifier()?
        };
        let mut declarator_children = Vec::new();
        self.variable_declarator_id_into(&mut declarator_children)?;
        declarator_children.push(Element::Token(self.expect(SyntaxKind::EqualsToken)?));
        declarator_children.push(Element::Node(self.expression()?));
        let declarator = self.builder.node(
            SyntaxKind::VariableDeclarator,
            GrammarRule::Resource,
            declarator_children,
        );
        factory::variable_declaration(
            &mut self.builder,
            GrammarRule::Resource,
            modifiers,
            resource_type,
            declarator,
            Vec::new(),
            None,
        )
    }

    fn catch_clause(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::CatchKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.catch_formal_parameter()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.block()?));
        Ok(self.builder.node(
            SyntaxKind::CatchClause,
            GrammarRule::CatchClause,
            children,
        ))
    }

    fn catch_formal_parameter(&mut self) -> PResult<NodeId> {
        let modifiers = self.modifiers()?;
        let catch_type = self.catch_type()?;
        let mut children = vec![Element::Node(modifiers), Element::Node(catch_type)];
        self.variable_declarator_id_into(&mut children)?;
        Ok(self.builder.node(
            SyntaxKind::Parameter,
            GrammarRule::CatchFormalParameter,
            children,
        ))
    }

    fn catch_type(&mut self) -> PResult<NodeId> {
        let first = self.qualified_identifier()?;
        let rest = self.zero_or_more(|p| {
            let bar = p.expect(SyntaxKind::BarToken)?;
            let alternative = p.qualified_identifier()?;
            Ok((bar, alternative))
        })?;
        if rest.is_empty() {
            return Ok(first);
        }
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::UnionType,
            GrammarRule::CatchType,
            None,
            Some(first),
            rest,
            None,
        )
    }

    fn switch_statement(&mut self) -> PResult<NodeId> {
        let expression = self.switch_expression()?;
        Ok(self.builder.node(
            SyntaxKind::SwitchStatement,
            GrammarRule::SwitchStatement,
            vec![Element::Node(expression)],
        ))
    }

    fn switch_expression(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::SwitchKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Token(self.expect(SyntaxKind::OpenBraceToken)?));
        for group in self.zero_or_more(Self::switch_group)? {
            children.push(Element::Node(group));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseBraceToken)?));
        Ok(self.builder.node(
            SyntaxKind::SwitchExpression,
            GrammarRule::SwitchExpression,
            children,
        ))
    }

    fn switch_group(&mut self) -> PResult<NodeId> {
        let labels = self.one_or_more(Self::switch_label)?;
        let mut children: Vec<Element> = labels.into_iter().map(Element::Node).collect();
        for statement in self.zero_or_more(Self::block_statement)? {
            children.push(Element::Node(statement));
        }
        Ok(self.builder.node(
            SyntaxKind::CaseGroup,
            GrammarRule::SwitchBlockStatementGroup,
            children,
        ))
    }

    fn switch_label(&mut self) -> PResult<NodeId> {
        if let Some(case_token) = self.accept(SyntaxKind::CaseKeyword) {
            let expressions = self.switch_case_expression_list()?;
            let separator =
                self.accept_any(&[SyntaxKind::ColonToken, SyntaxKind::ArrowToken]);
            let Some(separator) = separator else {
                self.note_expected("':'".to_string());
                return Err(ParseFail::Backtrack);
            };
            return Ok(self.builder.node(
                SyntaxKind::CaseLabel,
                GrammarRule::SwitchLabel,
                vec![
                    Element::Token(case_token),
                    Element::Node(expressions),
                    Element::Token(separator),
                ],
            ));
        }
        let default_token = self.expect(SyntaxKind::DefaultKeyword)?;
        let separator = self.accept_any(&[SyntaxKind::ColonToken, SyntaxKind::ArrowToken]);
        let Some(separator) = separator else {
            self.note_expected("':'".to_string());
            return Err(ParseFail::Backtrack);
        };
        Ok(self.builder.node(
            SyntaxKind::CaseLabel,
            GrammarRule::SwitchLabel,
            vec![Element::Token(default_token), Element::Token(separator)],
        ))
    }

    fn switch_case_expression_list(&mut self) -> PResult<NodeId> {
        let first = self.assignment_expression()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let expression = p.assignment_expression()?;
            Ok((comma, expression))
        })?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::StatementExpressionList,
            GrammarRule::SwitchCaseExpressionList,
            None,
            Some(first),
            rest,
            None,
        )
    }

    fn synchronized_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::SynchronizedKeyword)?)];
        children.push(Element::Token(self.expect(SyntaxKind::OpenParenToken)?));
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        children.push(Element::Node(self.block()?));
        Ok(self.builder.node(
            SyntaxKind::SynchronizedStatement,
            GrammarRule::SynchronizedStatement,
            children,
        ))
    }

    fn return_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::ReturnKeyword)?)];
        if let Some(expression) = self.try_parse(Self::expression)? {
            children.push(Element::Node(expression));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::ReturnStatement,
            GrammarRule::ReturnStatement,
            children,
        ))
    }

    fn throw_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::ThrowKeyword)?)];
        children.push(Element::Node(self.expression()?));
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::ThrowStatement,
            GrammarRule::ThrowStatement,
            children,
        ))
    }

    fn break_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::BreakKeyword)?)];
        if let Some(value) = self.try_parse(Self::expression)? {
            children.push(Element::Node(value));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::BreakStatement,
            GrammarRule::BreakStatement,
            children,
        ))
    }

    fn continue_statement(&mut self) -> PResult<NodeId> {
        let mut children = vec![Element::Token(self.expect(SyntaxKind::ContinueKeyword)?)];
        if let Some(label) = self.accept(SyntaxKind::Identifier) {
            let label = factory::identifier(&mut self.builder, label);
            children.push(Element::Node(label));
        }
        children.push(Element::Token(self.expect(SyntaxKind::SemicolonToken)?));
        Ok(self.builder.node(
            SyntaxKind::ContinueStatement,
            GrammarRule::ContinueStatement,
            children,
        ))
    }

    fn labeled_statement(&mut self) -> PResult<NodeId> {
        let label_token = self.expect(SyntaxKind::Identifier)?;
        let label = factory::identifier(&mut self.builder, label_token);
        let colon = self.expect(SyntaxKind::ColonToken)?;
        let statement = self.statement()?;
        Ok(self.builder.node(
            SyntaxKind::LabeledStatement,
            GrammarRule::LabeledStatement,
            vec![
                Element::Node(label),
                Element::Token(colon),
                Element::Node(statement),
            ],
        ))
    }

    fn expression_statement(&mut self) -> PResult<NodeId> {
        let expression = self.expression()?;
        let semi = self.expect(SyntaxKind::SemicolonToken)?;
        Ok(self.builder.node(
            SyntaxKind::ExpressionStatement,
            GrammarRule::ExpressionStatement,
            vec![Element::Node(expression), Element::Token(semi)],
        ))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn expression(&mut self) -> PResult<NodeId> {
        if let Some(lambda) = self.try_parse(Self::lambda_expression)? {
            return Ok(lambda);
        }
        self.assignment_expression()
    }

    fn assignment_expression(&mut self) -> PResult<NodeId> {
        let first = self.conditional_expression()?;
        let pairs = self.operator_pairs(
            Parser::accept_assignment_operator,
            Self::assignment_operand,
        )?;
        factory::assignment_expression(&mut self.builder, first, pairs)
    }

    fn assignment_operand(&mut self) -> PResult<NodeId> {
        if let Some(lambda) = self.try_parse(Self::lambda_expression)? {
            return Ok(lambda);
        }
        self.conditional_expression()
    }

    fn conditional_expression(&mut self) -> PResult<NodeId> {
        let condition = self.conditional_or_expression()?;
        let tail = self.try_parse(|p| {
            let question = p.expect(SyntaxKind::QuestionToken)?;
            let when_true = p.expression()?;
            let colon = p.expect(SyntaxKind::ColonToken)?;
            let when_false = p.assignment_operand()?;
            Ok((question, when_true, colon, when_false))
        })?;
        match tail {
            Some((question, when_true, colon, when_false)) => Ok(self.builder.node(
                SyntaxKind::ConditionalExpression,
                GrammarRule::ConditionalExpression,
                vec![
                    Element::Node(condition),
                    Element::Token(question),
                    Element::Node(when_true),
                    Element::Token(colon),
                    Element::Node(when_false),
                ],
            )),
            None => Ok(condition),
        }
    }

    /// Zero-or-more `(operator, operand)` pairs; a pair that fails after its
    /// operator is consumed is rolled back whole.
    fn operator_pairs(
        &mut self,
        mut operator: impl FnMut(&mut Self) -> Option<TokenId>,
        mut operand: impl FnMut(&mut Self) -> PResult<NodeId>,
    ) -> PResult<Vec<(TokenId, NodeId)>> {
        let mut pairs = Vec::new();
        loop {
            let checkpoint = self.checkpoint();
            let Some(op) = operator(self) else {
                break;
            };
            match operand(self) {
                Ok(value) => pairs.push((op, value)),
                Err(ParseFail::Backtrack) => {
                    self.restore(checkpoint);
                    break;
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Ok(pairs)
    }

    fn conditional_or_expression(&mut self) -> PResult<NodeId> {
        let first = self.conditional_and_expression()?;
        let pairs = self.operator_pairs(
            |p| p.accept(SyntaxKind::BarBarToken),
            Self::conditional_and_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::ConditionalOrExpression,
        )
    }

    fn conditional_and_expression(&mut self) -> PResult<NodeId> {
        let first = self.inclusive_or_expression()?;
        let pairs = self.operator_pairs(
            |p| p.accept(SyntaxKind::AmpersandAmpersandToken),
            Self::inclusive_or_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::ConditionalAndExpression,
        )
    }

    fn inclusive_or_expression(&mut self) -> PResult<NodeId> {
        let first = self.exclusive_or_expression()?;
        let pairs = self.operator_pairs(
            |p| p.accept(SyntaxKind::BarToken),
            Self::exclusive_or_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::InclusiveOrExpression,
        )
    }

    fn exclusive_or_expression(&mut self) -> PResult<NodeId> {
        let first = self.and_expression()?;
        let pairs =
            self.operator_pairs(|p| p.accept(SyntaxKind::CaretToken), Self::and_expression)?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::ExclusiveOrExpression,
        )
    }

    fn and_expression(&mut self) -> PResult<NodeId> {
        let first = self.equality_expression()?;
        let pairs = self.operator_pairs(
            |p| p.accept(SyntaxKind::AmpersandToken),
            Self::equality_expression,
        )?;
        factory::binary_expression(&mut self.builder, first, pairs, GrammarRule::AndExpression)
    }

    fn equality_expression(&mut self) -> PResult<NodeId> {
        let first = self.instanceof_expression()?;
        let pairs = self.operator_pairs(
            |p| {
                p.accept_any(&[
                    SyntaxKind::EqualsEqualsToken,
                    SyntaxKind::ExclamationEqualsToken,
                ])
            },
            Self::instanceof_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::EqualityExpression,
        )
    }

    fn instanceof_expression(&mut self) -> PResult<NodeId> {
        let expression = self.relational_expression()?;
        let tail = self.try_parse(|p| {
            let keyword = p.expect(SyntaxKind::InstanceOfKeyword)?;
            let target = p.type_rule()?;
            Ok((keyword, target))
        })?;
        match tail {
            Some((keyword, target)) => Ok(self.builder.node(
                SyntaxKind::InstanceOf,
                GrammarRule::RelationalExpression,
                vec![
                    Element::Node(expression),
                    Element::Token(keyword),
                    Element::Node(target),
                ],
            )),
            None => Ok(expression),
        }
    }

    fn relational_expression(&mut self) -> PResult<NodeId> {
        let first = self.shift_expression()?;
        let pairs = self.operator_pairs(
            Parser::accept_relational_operator,
            Self::shift_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::RelationalExpression,
        )
    }

    fn shift_expression(&mut self) -> PResult<NodeId> {
        let first = self.additive_expression()?;
        let pairs =
            self.operator_pairs(Parser::accept_shift_operator, Self::additive_expression)?;
        factory::binary_expression(&mut self.builder, first, pairs, GrammarRule::ShiftExpression)
    }

    fn additive_expression(&mut self) -> PResult<NodeId> {
        let first = self.multiplicative_expression()?;
        let pairs = self.operator_pairs(
            |p| p.accept_any(&[SyntaxKind::PlusToken, SyntaxKind::MinusToken]),
            Self::multiplicative_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::AdditiveExpression,
        )
    }

    fn multiplicative_expression(&mut self) -> PResult<NodeId> {
        let first = self.unary_expression()?;
        let pairs = self.operator_pairs(
            |p| {
                p.accept_any(&[
                    SyntaxKind::AsteriskToken,
                    SyntaxKind::SlashToken,
                    SyntaxKind::PercentToken,
                ])
            },
            Self::unary_expression,
        )?;
        factory::binary_expression(
            &mut self.builder,
            first,
            pairs,
            GrammarRule::MultiplicativeExpression,
        )
    }

    fn unary_expression(&mut self) -> PResult<NodeId> {
        if let Some(operator) = self.accept_any(&[
            SyntaxKind::PlusPlusToken,
            SyntaxKind::MinusMinusToken,
            SyntaxKind::PlusToken,
            SyntaxKind::MinusToken,
        ]) {
            let operand = self.unary_expression()?;
            return factory::prefix_expression(&mut self.builder, operator, operand);
        }
        self.unary_expression_not_plus_minus()
    }

    fn unary_expression_not_plus_minus(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::cast_expression)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::method_reference)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::postfix_expression)? {
            return Ok(n);
        }
        if let Some(operator) =
            self.accept_any(&[SyntaxKind::TildeToken, SyntaxKind::ExclamationToken])
        {
            let operand = self.unary_expression()?;
            return factory::prefix_expression(&mut self.builder, operator, operand);
        }
        self.switch_expression()
    }

    fn postfix_expression(&mut self) -> PResult<NodeId> {
        let expression = self.primary_with_selectors()?;
        if let Some(operator) =
            self.accept_any(&[SyntaxKind::PlusPlusToken, SyntaxKind::MinusMinusToken])
        {
            return factory::postfix_expression(&mut self.builder, expression, operator);
        }
        Ok(expression)
    }

    fn cast_expression(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        if let Some(n) = self.try_parse(|p| p.basic_type_cast_rest(open))? {
            return Ok(n);
        }
        self.class_cast_rest(open)
    }

    fn basic_type_cast_rest(&mut self, open: TokenId) -> PResult<NodeId> {
        let cast_type = self.basic_type()?;
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        let expression = self.unary_expression()?;
        Ok(self.builder.node(
            SyntaxKind::TypeCast,
            GrammarRule::CastExpression,
            vec![
                Element::Token(open),
                Element::Node(cast_type),
                Element::Token(close),
                Element::Node(expression),
            ],
        ))
    }

    fn class_cast_rest(&mut self, open: TokenId) -> PResult<NodeId> {
        let cast_type = self.type_rule()?;
        let mut children = vec![Element::Token(open), Element::Node(cast_type)];
        if let Some(amp) = self.accept(SyntaxKind::AmpersandToken) {
            children.push(Element::Token(amp));
            children.push(Element::Node(self.bound()?));
        }
        children.push(Element::Token(self.expect(SyntaxKind::CloseParenToken)?));
        // `+`/`-` is deliberately not a valid continuation, so `(a) - x`
        // stays a subtraction.
        let value = if let Some(lambda) = self.try_parse(Self::lambda_expression)? {
            lambda
        } else {
            self.unary_expression_not_plus_minus()?
        };
        children.push(Element::Node(value));
        Ok(self
            .builder
            .node(SyntaxKind::TypeCast, GrammarRule::CastExpression, children))
    }

    fn method_reference(&mut self) -> PResult<NodeId> {
        let (qualifier, colons) = if let Some(pair) = self.try_parse(|p| {
            let super_token = p.expect(SyntaxKind::SuperKeyword)?;
            let qualifier = factory::identifier(&mut p.builder, super_token);
            let colons = p.expect(SyntaxKind::ColonColonToken)?;
            Ok((qualifier, colons))
        })? {
            pair
        } else if let Some(pair) = self.try_parse(|p| {
            let qualifier = p.type_rule()?;
            let colons = p.expect(SyntaxKind::ColonColonToken)?;
            Ok((qualifier, colons))
        })? {
            pair
        } else {
            let qualifier = self.primary_with_selectors()?;
            let colons = self.expect(SyntaxKind::ColonColonToken)?;
            (qualifier, colons)
        };
        let mut children = vec![Element::Node(qualifier), Element::Token(colons)];
        if let Some(arguments) = self.try_parse(Self::type_arguments)? {
            children.push(Element::Node(arguments));
        }
        let method_token = if let Some(new_token) = self.accept(SyntaxKind::NewKeyword) {
            new_token
        } else {
            self.expect(SyntaxKind::Identifier)?
        };
        let method = factory::identifier(&mut self.builder, method_token);
        children.push(Element::Node(method));
        Ok(self.builder.node(
            SyntaxKind::MethodReference,
            GrammarRule::MethodReference,
            children,
        ))
    }

    fn primary_with_selectors(&mut self) -> PResult<NodeId> {
        let primary = self.primary()?;
        let selectors = self.zero_or_more(Self::selector)?;
        factory::apply_selectors(&mut self.builder, primary, selectors)
    }

    fn primary(&mut self) -> PResult<NodeId> {
        if let Some((type_arguments, name, arguments)) =
            self.try_parse(Self::identifier_or_invocation_parts)?
        {
            return Ok(factory::identifier_or_invocation(
                &mut self.builder,
                type_arguments,
                name,
                arguments,
            ));
        }
        if let Some(n) = self.try_parse(Self::parenthesized_expression)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::literal)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::new_expression)? {
            return Ok(n);
        }
        self.basic_class_expression()
    }

    fn identifier_or_invocation_parts(
        &mut self,
    ) -> PResult<(Option<NodeId>, TokenId, Option<NodeId>)> {
        let type_arguments = self.try_parse(Self::type_arguments)?;
        let name = if self.at(SyntaxKind::Identifier)
            || self.at(SyntaxKind::ThisKeyword)
            || self.at(SyntaxKind::SuperKeyword)
        {
            self.bump()
        } else {
            self.note_expected("an identifier".to_string());
            return Err(ParseFail::Backtrack);
        };
        let arguments = self.try_parse(Self::arguments)?;
        Ok((type_arguments, name, arguments))
    }

    fn parenthesized_expression(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        let expression = self.expression()?;
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        Ok(self.builder.node(
            SyntaxKind::ParenthesizedExpression,
            GrammarRule::ParExpression,
            vec![
                Element::Token(open),
                Element::Node(expression),
                Element::Token(close),
            ],
        ))
    }

    fn literal(&mut self) -> PResult<NodeId> {
        let kind = self.kind();
        let is_literal = kind.is_literal_token()
            || matches!(
                kind,
                SyntaxKind::TrueKeyword | SyntaxKind::FalseKeyword | SyntaxKind::NullKeyword
            );
        if !is_literal {
            self.note_expected("a literal".to_string());
            return Err(ParseFail::Backtrack);
        }
        let token = self.bump();
        factory::literal(&mut self.builder, token)
    }

    fn arguments(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        if let Some(close) = self.accept(SyntaxKind::CloseParenToken) {
            return factory::separated_list(
                &mut self.builder,
                SyntaxKind::ArgumentList,
                GrammarRule::Arguments,
                Some(open),
                None,
                Vec::new(),
                Some(close),
            );
        }
        let first = self.expression()?;
        let rest = self.zero_or_more(|p| {
            let comma = p.expect(SyntaxKind::CommaToken)?;
            let argument = p.expression()?;
            Ok((comma, argument))
        })?;
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ArgumentList,
            GrammarRule::Arguments,
            Some(open),
            Some(first),
            rest,
            Some(close),
        )
    }

    fn selector(&mut self) -> PResult<Selector> {
        if let Some(selector) = self.try_parse(|p| {
            let dot = p.expect(SyntaxKind::DotToken)?;
            let (type_arguments, name, arguments) = p.identifier_or_invocation_parts()?;
            Ok(Selector::Member {
                dot,
                type_arguments,
                name,
                arguments,
            })
        })? {
            return Ok(selector);
        }
        if let Some(selector) = self.try_parse(|p| {
            let dot = p.expect(SyntaxKind::DotToken)?;
            let creator = p.new_expression()?;
            Ok(Selector::Creator { dot, creator })
        })? {
            return Ok(selector);
        }
        if let Some(selector) = self.try_parse(|p| {
            let annotations = p.zero_or_more(Self::annotation)?;
            let open = p.expect(SyntaxKind::OpenBracketToken)?;
            let index = p.expression()?;
            let close = p.expect(SyntaxKind::CloseBracketToken)?;
            Ok(Selector::ArrayAccess {
                annotations,
                open,
                index,
                close,
            })
        })? {
            return Ok(selector);
        }
        let dims = self.zero_or_more(|p| {
            let open = p.expect(SyntaxKind::OpenBracketToken)?;
            let close = p.expect(SyntaxKind::CloseBracketToken)?;
            Ok((open, close))
        })?;
        let dot = self.expect(SyntaxKind::DotToken)?;
        let class_token = self.expect(SyntaxKind::ClassKeyword)?;
        Ok(Selector::DotClass {
            dims,
            dot,
            class_token,
        })
    }

    fn new_expression(&mut self) -> PResult<NodeId> {
        let new_token = self.expect(SyntaxKind::NewKeyword)?;
        let annotations = self.zero_or_more(Self::annotation)?;
        if let Some(n) =
            self.try_parse(|p| p.class_creator(new_token, annotations.clone()))?
        {
            return Ok(n);
        }
        self.array_creator(new_token, annotations)
    }

    fn class_creator(
        &mut self,
        new_token: TokenId,
        annotations: Vec<NodeId>,
    ) -> PResult<NodeId> {
        let mut children = vec![Element::Token(new_token)];
        children.extend(annotations.into_iter().map(Element::Node));
        if let Some(arguments) = self.try_parse(Self::type_arguments)? {
            children.push(Element::Node(arguments));
        }
        children.push(Element::Node(self.qualified_identifier()?));
        children.push(Element::Node(self.arguments()?));
        if let Some(body) = self.try_parse(Self::class_body_node)? {
            children.push(Element::Node(body));
        }
        Ok(self
            .builder
            .node(SyntaxKind::NewClass, GrammarRule::Creator, children))
    }

    fn array_creator(
        &mut self,
        new_token: TokenId,
        annotations: Vec<NodeId>,
    ) -> PResult<NodeId> {
        let mut children = vec![Element::Token(new_token)];
        children.extend(annotations.into_iter().map(Element::Node));
        let element_type = if let Some(n) = self.try_parse(Self::qualified_identifier)? {
            n
        } else {
            self.basic_type()?
        };
        children.push(Element::Node(element_type));
        for annotation in self.zero_or_more(Self::annotation)? {
            children.push(Element::Node(annotation));
        }
        // Either `[] []... { ... }` or `[expr] [expr]... []...`.
        if let Some((open, close)) = self.try_parse(|p| {
            let open = p.expect(SyntaxKind::OpenBracketToken)?;
            let close = p.expect(SyntaxKind::CloseBracketToken)?;
            Ok((open, close))
        })? {
            children.push(Element::Token(open));
            children.push(Element::Token(close));
            let dims = self.zero_or_more(Self::annotated_dim)?;
            for dim in dims {
                for annotation in dim.annotations {
                    children.push(Element::Node(annotation));
                }
                children.push(Element::Token(dim.open));
                children.push(Element::Token(dim.close));
            }
            children.push(Element::Node(self.array_initializer()?));
        } else {
            children.push(Element::Token(self.expect(SyntaxKind::OpenBracketToken)?));
            children.push(Element::Node(self.expression()?));
            children.push(Element::Token(self.expect(SyntaxKind::CloseBracketToken)?));
            let sized = self.zero_or_more(|p| {
                let annotations = p.zero_or_more(Self::annotation)?;
                let open = p.expect(SyntaxKind::OpenBracketToken)?;
                let index = p.expression()?;
                let close = p.expect(SyntaxKind::CloseBracketToken)?;
                Ok((annotations, open, index, close))
            })?;
            for (dim_annotations, open, index, close) in sized {
                for annotation in dim_annotations {
                    children.push(Element::Node(annotation));
                }
                children.push(Element::Token(open));
                children.push(Element::Node(index));
                children.push(Element::Token(close));
            }
            let dims = self.zero_or_more(Self::annotated_dim)?;
            for dim in dims {
                for annotation in dim.annotations {
                    children.push(Element::Node(annotation));
                }
                children.push(Element::Token(dim.open));
                children.push(Element::Token(dim.close));
            }
        }
        Ok(self
            .builder
            .node(SyntaxKind::NewArray, GrammarRule::ArrayCreatorRest, children))
    }

    fn basic_class_expression(&mut self) -> PResult<NodeId> {
        let base = self.basic_type()?;
        let dims = self.zero_or_more(|p| {
            let open = p.expect(SyntaxKind::OpenBracketToken)?;
            let close = p.expect(SyntaxKind::CloseBracketToken)?;
            Ok((open, close))
        })?;
        let dot = self.expect(SyntaxKind::DotToken)?;
        let class_token = self.expect(SyntaxKind::ClassKeyword)?;
        factory::apply_selectors(
            &mut self.builder,
            base,
            vec![Selector::DotClass {
                dims,
                dot,
                class_token,
            }],
        )
    }

    // ========================================================================
    // Lambdas
    // ========================================================================

    fn lambda_expression(&mut self) -> PResult<NodeId> {
        let parameters = self.lambda_parameters()?;
        let arrow = self.expect(SyntaxKind::ArrowToken)?;
        let body = self.lambda_body()?;
        Ok(self.builder.node(
            SyntaxKind::LambdaExpression,
            GrammarRule::LambdaExpression,
            vec![
                Element::Node(parameters),
                Element::Token(arrow),
                Element::Node(body),
            ],
        ))
    }

    /// Tried in order: parenthesized inferred parameters, explicit formal
    /// parameters, single inferred parameter without parentheses.
    fn lambda_parameters(&mut self) -> PResult<NodeId> {
        if let Some(n) = self.try_parse(Self::multiple_inferred_parameters)? {
            return Ok(n);
        }
        if let Some(n) = self.try_parse(Self::formal_parameters)? {
            return Ok(n);
        }
        let parameter = self.inferred_parameter()?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ParameterList,
            GrammarRule::LambdaParameters,
            None,
            Some(parameter),
            Vec::new(),
            None,
        )
    }

    fn multiple_inferred_parameters(&mut self) -> PResult<NodeId> {
        let open = self.expect(SyntaxKind::OpenParenToken)?;
        let mut first = None;
        let mut rest = Vec::new();
        if let Some(parameter) = self.try_parse(Self::inferred_parameter)? {
            first = Some(parameter);
            rest = self.zero_or_more(|p| {
                let comma = p.expect(SyntaxKind::CommaToken)?;
                let parameter = p.inferred_parameter()?;
                Ok((comma, parameter))
            })?;
        }
        let close = self.expect(SyntaxKind::CloseParenToken)?;
        factory::separated_list(
            &mut self.builder,
            SyntaxKind::ParameterList,
            GrammarRule::InferedParams,
            Some(open),
            first,
            rest,
            Some(close),
        )
    }

    fn inferred_parameter(&mut self) -> PResult<NodeId> {
        let name_token = self.expect(SyntaxKind::Identifier)?;
        let name = factory::identifier(&mut self.builder, name_token);
        Ok(self.builder.node(
            SyntaxKind::Parameter,
            GrammarRule::InferedParams,
            vec![Element::Node(name)],
        ))
    }

    fn lambda_body(&mut self) -> PResult<NodeId> {
        if let Some(block) = self.try_parse(Self::block)? {
            return Ok(block);
        }
        self.expression()
    }
}
