use std::sync::Arc;
use itertools::Itertools;
use crate::errors::InternalError;
use crate::span::Span;
use crate::symbol::ClassId;
use crate::syntax::{RawKind, RawNode};
use crate::token::TokenKind;
use crate::types::{Type, Variance};
use super::arena::Tree;
use super::core::*;
use super::modifier::{Modifiers, TypeModifier};

/// 分解宣言の一時変数の名前
pub const DESTRUCTURING_TEMPORARY: &str = "<destruct>";

/// 生の構文木から初期フェーズの木を作るための構造体
///
/// 作られる宣言はすべて `RawIr` フェーズにあり、
/// 式の型は暗黙の型参照のままです。
pub struct Maker<'t> {
    tree: &'t mut Tree,
    package: Arc<str>,
    enclosing_classes: Vec<ClassId>,
}

impl<'t> Maker<'t> {
    pub fn new(tree: &'t mut Tree) -> Self {
        Maker { tree, package: Arc::from(""), enclosing_classes: vec![] }
    }

    fn alloc(&mut self, kind: NodeKind, span: Option<Span>) -> Result<NodeId, InternalError> {
        self.tree.alloc(Node::with_span(kind, span))
    }

    fn alloc_annotated(&mut self, kind: NodeKind, annotations: Vec<NodeId>, span: Option<Span>) -> Result<NodeId, InternalError> {
        self.tree.alloc(Node::with_span(kind, span).annotated(annotations))
    }

    pub fn file<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        if raw.kind != RawKind::File {
            return Err(raw.malformed("a file is expected"));
        }
        self.package = raw.child_of(RawKind::PackageDirective)
            .map(|package| package.text.clone())
            .unwrap_or_else(|| Arc::from(""));
        let mut imports = vec![];
        let mut declarations = vec![];
        for &child in &raw.children {
            match child.kind {
                RawKind::PackageDirective => {}
                RawKind::ImportDirective => imports.push(self.import(child)?),
                _ => declarations.push(self.declaration(child)?),
            }
        }
        self.alloc(NodeKind::File {
            name: raw.text.clone(),
            package: self.package.clone(),
            imports,
            declarations,
            phase: ResolvePhase::RawIr,
        }, raw.span)
    }

    fn import<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let alias = raw.child_of(RawKind::ImportAlias).map(|alias| alias.text.clone());
        self.alloc(NodeKind::Import { fq_name: raw.text.clone(), alias, resolved: None }, raw.span)
    }

    fn declaration<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        match raw.kind {
            RawKind::Class => self.class(raw),
            RawKind::TypeAlias => self.type_alias(raw),
            RawKind::Function => self.function(raw),
            RawKind::Property => self.property(raw),
            _ => Err(raw.malformed("a declaration is expected")),
        }
    }

    fn class_id(&self, name: &str) -> ClassId {
        match self.enclosing_classes.last() {
            Some(outer) => ClassId::new(format!("{}.{}", outer, name)),
            None if self.package.is_empty() => ClassId::new(name),
            None => ClassId::new(format!("{}/{}", self.package.replace('.', "/"), name)),
        }
    }

    fn annotations<'s>(&mut self, entries: &[&'s RawNode<'s>]) -> Result<Vec<NodeId>, InternalError> {
        entries.iter().map(|&entry| self.annotation(entry)).collect()
    }

    fn annotation<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let (type_reference, arguments) = raw.children.split_first()
            .ok_or_else(|| raw.malformed("an annotation needs a type"))?;
        let annotation_type_ref = self.type_ref(type_reference)?;
        let arguments = arguments.iter().map(|&argument| self.expression(argument)).collect::<Result<Vec<_>, _>>()?;
        self.alloc(NodeKind::AnnotationCall { annotation_type_ref, arguments }, raw.span)
    }

    fn class<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let modifiers = Modifiers::from_list(raw.child_of(RawKind::ModifierList))?;
        let class_kind = match (&raw.token, modifiers.is_enum, modifiers.is_annotation) {
            (Some(TokenKind::Interface), _, _) => ClassKind::Interface,
            (Some(TokenKind::Object), _, _) => ClassKind::Object,
            (_, true, _) => ClassKind::EnumClass,
            (_, _, true) => ClassKind::AnnotationClass,
            (Some(TokenKind::Class), _, _) => ClassKind::Class,
            _ => return Err(raw.malformed("a class keyword is expected")),
        };
        let name: Arc<str> = match raw.optional_text() {
            Some(name) => name,
            None if modifiers.status.is_companion => Arc::from("Companion"),
            None => return Err(raw.malformed("a class needs a name")),
        };
        let class_id = self.class_id(&name);
        let annotations = self.annotations(&modifiers.annotations)?;
        let type_parameters = raw.children_of(RawKind::TypeParameter)
            .map(|parameter| self.type_parameter(parameter))
            .collect::<Result<Vec<_>, _>>()?;

        self.enclosing_classes.push(class_id.clone());
        let declarations = self.class_members(raw, &class_id);
        self.enclosing_classes.pop();
        let declarations = declarations?;

        let super_type_refs = raw.children_of(RawKind::SuperTypeEntry)
            .map(|entry| match entry.child_of(RawKind::TypeReference) {
                Some(type_reference) => self.type_ref(type_reference),
                None => Err(entry.malformed("a super type entry needs a type")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.alloc_annotated(NodeKind::RegularClass {
            name,
            class_id,
            class_kind,
            status: modifiers.status,
            type_parameters,
            declarations,
            super_type_refs,
            companion_object: None,
            phase: ResolvePhase::RawIr,
            supertypes_status: SupertypesComputationStatus::NotComputed,
        }, annotations, raw.span)
    }

    /// 主コンストラクタを先頭に置いたメンバ宣言
    fn class_members<'s>(&mut self, raw: &'s RawNode<'s>, class_id: &ClassId) -> Result<Vec<NodeId>, InternalError> {
        let class_type_parameters = raw.children_of(RawKind::TypeParameter).collect_vec();
        let mut declarations = vec![];
        if let Some(primary) = raw.child_of(RawKind::PrimaryConstructor) {
            declarations.push(self.constructor(primary, class_id, &class_type_parameters)?);
        }
        for &child in &raw.children {
            match child.kind {
                RawKind::ModifierList | RawKind::TypeParameter | RawKind::SuperTypeEntry | RawKind::PrimaryConstructor => {}
                RawKind::SecondaryConstructor => declarations.push(self.constructor(child, class_id, &[])?),
                _ => declarations.push(self.declaration(child)?),
            }
        }
        Ok(declarations)
    }

    /// 主コンストラクタはクラスの型パラメータの写しを自身の型パラメータとして持ちます
    fn constructor<'s>(&mut self, raw: &'s RawNode<'s>, class_id: &ClassId, class_type_parameters: &[&'s RawNode<'s>]) -> Result<NodeId, InternalError> {
        let modifiers = Modifiers::from_list(raw.child_of(RawKind::ModifierList))?;
        let annotations = self.annotations(&modifiers.annotations)?;
        let type_parameters = class_type_parameters.iter()
            .map(|&parameter| self.type_parameter(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let return_type_ref = self.tree.implicit_type_ref();
        let value_parameters = raw.children_of(RawKind::Parameter)
            .map(|parameter| self.value_parameter(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let delegated_constructor = raw.child_of(RawKind::ConstructorDelegationCall)
            .map(|call| self.delegated_constructor_call(call))
            .transpose()?;
        let body = raw.child_of(RawKind::Block).map(|body| self.block(body)).transpose()?;
        self.alloc_annotated(NodeKind::Constructor {
            owner: class_id.clone(),
            is_primary: raw.kind == RawKind::PrimaryConstructor,
            type_parameters,
            return_type_ref,
            value_parameters,
            delegated_constructor,
            body,
            phase: ResolvePhase::RawIr,
        }, annotations, raw.span)
    }

    fn delegated_constructor_call<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let is_this = match &raw.token {
            Some(TokenKind::This) => true,
            Some(TokenKind::Super) => false,
            _ => return Err(raw.malformed("`this` or `super` is expected")),
        };
        let constructed_type_ref = self.tree.implicit_type_ref();
        let callee = self.delegated_constructor_callee(is_this)?;
        let arguments = raw.children.iter().map(|&argument| self.expression(argument)).collect::<Result<Vec<_>, _>>()?;
        self.alloc(NodeKind::DelegatedConstructorCall { is_this, constructed_type_ref, callee, arguments }, raw.span)
    }

    /// 委譲先のコンストラクタ呼び出しの既定の呼び出し先
    pub fn delegated_constructor_callee(&mut self, is_this: bool) -> Result<NodeId, InternalError> {
        if is_this {
            self.alloc(NodeKind::ExplicitThisReference { label: None, bound_symbol: None }, None)
        } else {
            let super_type_ref = self.tree.implicit_type_ref();
            self.alloc(NodeKind::ExplicitSuperReference { super_type_ref }, None)
        }
    }

    fn type_alias<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let name = raw.optional_text().ok_or_else(|| raw.malformed("a type alias needs a name"))?;
        let class_id = self.class_id(&name);
        let type_parameters = raw.children_of(RawKind::TypeParameter)
            .map(|parameter| self.type_parameter(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let expanded = raw.child_of(RawKind::TypeReference)
            .ok_or_else(|| raw.malformed("a type alias needs an expanded type"))?;
        let expanded_type_ref = self.type_ref(expanded)?;
        self.alloc(NodeKind::TypeAlias {
            name,
            class_id,
            type_parameters,
            expanded_type_ref,
            phase: ResolvePhase::RawIr,
            supertypes_status: SupertypesComputationStatus::NotComputed,
        }, raw.span)
    }

    fn function<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let name = raw.optional_text().ok_or_else(|| raw.malformed("a function needs a name"))?;
        let modifiers = Modifiers::from_list(raw.child_of(RawKind::ModifierList))?;
        let annotations = self.annotations(&modifiers.annotations)?;
        let type_parameters = raw.children_of(RawKind::TypeParameter)
            .map(|parameter| self.type_parameter(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let receiver_type_ref = match raw.child_of(RawKind::Receiver) {
            Some(receiver) => Some(self.receiver(receiver)?),
            None => None,
        };
        let value_parameters = raw.children_of(RawKind::Parameter)
            .map(|parameter| self.value_parameter(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let body_source = raw.children.iter().copied().find(|child| !matches!(
            child.kind,
            RawKind::ModifierList | RawKind::TypeParameter | RawKind::Receiver | RawKind::Parameter | RawKind::TypeReference
        ));
        // ブロック本体で戻り値型の省略は Unit、式本体では推論待ち
        let return_type_ref = match (raw.child_of(RawKind::TypeReference), body_source) {
            (Some(type_reference), _) => self.type_ref(type_reference)?,
            (None, Some(body)) if body.kind == RawKind::Block => self.tree.resolved_type_ref(Type::Unit),
            (None, None) => self.tree.resolved_type_ref(Type::Unit),
            (None, Some(_)) => self.tree.implicit_type_ref(),
        };
        let body = match body_source {
            Some(body) if body.kind == RawKind::Block => Some(self.block(body)?),
            Some(expression) => {
                let result = self.expression(expression)?;
                let type_ref = self.tree.implicit_type_ref();
                let returned = self.alloc(NodeKind::Return { type_ref, target: None, result }, expression.span)?;
                let type_ref = self.tree.implicit_type_ref();
                Some(self.alloc(NodeKind::Block { type_ref, statements: vec![returned] }, expression.span)?)
            }
            None => None,
        };
        self.alloc_annotated(NodeKind::SimpleFunction {
            name,
            status: modifiers.status,
            type_parameters,
            receiver_type_ref,
            return_type_ref,
            value_parameters,
            control_flow_graph: None,
            body,
            phase: ResolvePhase::RawIr,
        }, annotations, raw.span)
    }

    fn receiver<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let type_reference = raw.child_of(RawKind::TypeReference)
            .ok_or_else(|| raw.malformed("a receiver needs a type"))?;
        self.type_ref(type_reference)
    }

    fn property<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let name = raw.optional_text().ok_or_else(|| raw.malformed("a property needs a name"))?;
        let is_var = match &raw.token {
            Some(TokenKind::Var) => true,
            Some(TokenKind::Val) | None => false,
            _ => return Err(raw.malformed("`val` or `var` is expected")),
        };
        let modifiers = Modifiers::from_list(raw.child_of(RawKind::ModifierList))?;
        let annotations = self.annotations(&modifiers.annotations)?;
        let return_type_ref = match raw.child_of(RawKind::TypeReference) {
            Some(type_reference) => self.type_ref(type_reference)?,
            None => self.tree.implicit_type_ref(),
        };
        let initializer = raw.children.iter().copied()
            .find(|child| !matches!(child.kind, RawKind::ModifierList | RawKind::TypeReference))
            .map(|initializer| self.expression(initializer))
            .transpose()?;
        self.alloc_annotated(NodeKind::Property {
            name,
            status: modifiers.status,
            is_var,
            return_type_ref,
            initializer,
            phase: ResolvePhase::RawIr,
        }, annotations, raw.span)
    }

    fn value_parameter<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let name = raw.optional_text().ok_or_else(|| raw.malformed("a parameter needs a name"))?;
        let modifiers = Modifiers::from_list(raw.child_of(RawKind::ModifierList))?;
        let annotations = self.annotations(&modifiers.annotations)?;
        let return_type_ref = match raw.child_of(RawKind::TypeReference) {
            Some(type_reference) => self.type_ref(type_reference)?,
            None => self.tree.implicit_type_ref(),
        };
        let default_value = raw.children.iter().copied()
            .find(|child| !matches!(child.kind, RawKind::ModifierList | RawKind::TypeReference))
            .map(|default| self.expression(default))
            .transpose()?;
        self.alloc_annotated(NodeKind::ValueParameter {
            name,
            is_vararg: modifiers.is_vararg,
            return_type_ref,
            default_value,
            phase: ResolvePhase::RawIr,
        }, annotations, raw.span)
    }

    fn type_parameter<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let name = raw.optional_text().ok_or_else(|| raw.malformed("a type parameter needs a name"))?;
        let modifiers = Modifiers::from_list(raw.child_of(RawKind::ModifierList))?;
        let annotations = self.annotations(&modifiers.annotations)?;
        let bounds = raw.children_of(RawKind::TypeReference)
            .map(|bound| self.type_ref(bound))
            .collect::<Result<Vec<_>, _>>()?;
        self.alloc_annotated(NodeKind::TypeParameter {
            name,
            variance: modifiers.variance,
            is_reified: modifiers.is_reified,
            bounds,
        }, annotations, raw.span)
    }

    pub fn type_ref<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        if raw.kind != RawKind::TypeReference {
            return Err(raw.malformed("a type reference is expected"));
        }
        let modifier = TypeModifier::from_list(raw.child_of(RawKind::ModifierList));
        let annotations = self.annotations(&modifier.annotations)?;
        let element = raw.children.iter().copied()
            .find(|child| child.kind != RawKind::ModifierList)
            .ok_or_else(|| raw.malformed("a type reference needs a type element"))?;
        let (element, is_nullable) = match element.kind {
            RawKind::NullableType => {
                let inner = element.children.first().copied()
                    .ok_or_else(|| element.malformed("a nullable type needs an inner type"))?;
                (inner, true)
            }
            _ => (element, false),
        };
        let kind = match element.kind {
            RawKind::UserType => {
                let qualifier = element.text.split('.').map(Arc::from).collect();
                let type_arguments = element.children.iter()
                    .map(|&argument| self.type_projection(argument))
                    .collect::<Result<Vec<_>, _>>()?;
                NodeKind::UserTypeRef { qualifier, type_arguments, is_nullable }
            }
            RawKind::FunctionType => {
                let receiver_type_ref = match element.child_of(RawKind::Receiver) {
                    Some(receiver) => Some(self.receiver(receiver)?),
                    None => None,
                };
                let mut types: Vec<NodeId> = element.children_of(RawKind::TypeReference)
                    .map(|parameter| self.type_ref(parameter))
                    .collect::<Result<Vec<_>, _>>()?;
                let return_type_ref = types.pop()
                    .ok_or_else(|| element.malformed("a function type needs a return type"))?;
                NodeKind::FunctionTypeRef {
                    is_nullable,
                    is_suspend: modifier.has_suspend,
                    receiver_type_ref,
                    parameter_type_refs: types,
                    return_type_ref,
                }
            }
            RawKind::DynamicType => NodeKind::DynamicTypeRef { is_nullable },
            _ => return Err(element.malformed("an unknown type element")),
        };
        self.alloc_annotated(kind, annotations, raw.span)
    }

    fn type_projection<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        match raw.kind {
            RawKind::TypeReference => {
                let type_ref = self.type_ref(raw)?;
                self.alloc(NodeKind::TypeProjectionWithVariance { variance: Variance::Invariant, type_ref }, raw.span)
            }
            RawKind::TypeProjection if raw.token == Some(TokenKind::Asterisk) => {
                self.alloc(NodeKind::StarProjection, raw.span)
            }
            RawKind::TypeProjection => {
                let variance = match &raw.token {
                    Some(TokenKind::In) => Variance::In,
                    Some(TokenKind::Out) => Variance::Out,
                    _ => Variance::Invariant,
                };
                let inner = raw.child_of(RawKind::TypeReference)
                    .ok_or_else(|| raw.malformed("a type projection needs a type"))?;
                let type_ref = self.type_ref(inner)?;
                self.alloc(NodeKind::TypeProjectionWithVariance { variance, type_ref }, raw.span)
            }
            _ => Err(raw.malformed("a type argument is expected")),
        }
    }

    fn block<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let mut statements = vec![];
        for &statement in &raw.children {
            statements.extend(self.statement(statement)?);
        }
        let type_ref = self.tree.implicit_type_ref();
        self.alloc(NodeKind::Block { type_ref, statements }, raw.span)
    }

    /// 一つの生の文から作られる文。分解宣言は複数の文になります
    fn statement<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<Vec<NodeId>, InternalError> {
        match raw.kind {
            RawKind::Class | RawKind::Function | RawKind::Property => Ok(vec![self.declaration(raw)?]),
            RawKind::DestructuringDeclaration => self.destructuring(raw),
            RawKind::While => {
                let (condition, body) = match raw.children.as_slice() {
                    [condition, body] => (*condition, *body),
                    _ => return Err(raw.malformed("a while loop needs a condition and a body")),
                };
                let condition = self.expression(condition)?;
                let block = self.expression(body)?;
                Ok(vec![self.alloc(NodeKind::WhileLoop { label: raw.optional_text(), condition, block }, raw.span)?])
            }
            RawKind::DoWhile => {
                let (body, condition) = match raw.children.as_slice() {
                    [body, condition] => (*body, *condition),
                    _ => return Err(raw.malformed("a do-while loop needs a body and a condition")),
                };
                let block = self.expression(body)?;
                let condition = self.expression(condition)?;
                Ok(vec![self.alloc(NodeKind::DoWhileLoop { label: raw.optional_text(), block, condition }, raw.span)?])
            }
            _ => Ok(vec![self.expression(raw)?]),
        }
    }

    /// `val (a, b) = e` を一時変数と `componentN` 呼び出しの初期化子に分解します
    fn destructuring<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<Vec<NodeId>, InternalError> {
        let is_var = raw.token == Some(TokenKind::Var);
        let initializer = raw.children.iter().copied()
            .find(|child| child.kind != RawKind::DestructuringEntry)
            .ok_or_else(|| raw.malformed("a destructuring declaration needs an initializer"))?;
        let initializer = self.expression(initializer)?;
        let return_type_ref = self.tree.implicit_type_ref();
        let temporary = self.alloc(NodeKind::Property {
            name: Arc::from(DESTRUCTURING_TEMPORARY),
            status: DeclarationStatus::default(),
            is_var: false,
            return_type_ref,
            initializer: Some(initializer),
            phase: ResolvePhase::RawIr,
        }, raw.span)?;
        let mut statements = vec![temporary];
        for (index, entry) in raw.children_of(RawKind::DestructuringEntry).enumerate() {
            if entry.text.as_ref() == "_" {
                continue;
            }
            let receiver = self.variable_access(DESTRUCTURING_TEMPORARY, None)?;
            let component = self.component_call(index as u32 + 1, receiver, entry.span)?;
            let return_type_ref = match entry.child_of(RawKind::TypeReference) {
                Some(type_reference) => self.type_ref(type_reference)?,
                None => self.tree.implicit_type_ref(),
            };
            statements.push(self.alloc(NodeKind::Property {
                name: entry.text.clone(),
                status: DeclarationStatus::default(),
                is_var,
                return_type_ref,
                initializer: Some(component),
                phase: ResolvePhase::RawIr,
            }, entry.span)?);
        }
        Ok(statements)
    }

    fn variable_access(&mut self, name: &str, span: Option<Span>) -> Result<NodeId, InternalError> {
        let callee = self.alloc(NodeKind::SimpleNamedReference { name: Arc::from(name) }, span)?;
        let type_ref = self.tree.implicit_type_ref();
        self.alloc(NodeKind::QualifiedAccessExpression {
            safe: false,
            type_ref,
            explicit_receiver: None,
            dispatch_receiver: None,
            extension_receiver: None,
            callee,
        }, span)
    }

    /// `componentN` を呼び出し先とする分解呼び出し
    pub fn component_call(&mut self, component_index: u32, receiver: NodeId, span: Option<Span>) -> Result<NodeId, InternalError> {
        let callee = self.alloc(NodeKind::SimpleNamedReference { name: Arc::from(format!("component{}", component_index)) }, span)?;
        let type_ref = self.tree.implicit_type_ref();
        self.alloc(NodeKind::ComponentCall { component_index, type_ref, explicit_receiver: receiver, callee }, span)
    }

    pub fn expression<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        match raw.kind {
            RawKind::Constant => self.constant(raw),
            RawKind::StringTemplate => self.string_template(raw),
            RawKind::NameReference => self.variable_access(&raw.text, raw.span),
            RawKind::Call => self.call(raw, None, false),
            RawKind::DotQualified => {
                let (receiver, selector) = match raw.children.as_slice() {
                    [receiver, selector] => (*receiver, *selector),
                    _ => return Err(raw.malformed("a qualified expression needs a receiver and a selector")),
                };
                let safe = raw.token == Some(TokenKind::SafeDot);
                let receiver = self.expression(receiver)?;
                match selector.kind {
                    RawKind::Call => self.call(selector, Some(receiver), safe),
                    RawKind::NameReference => {
                        let callee = self.alloc(NodeKind::SimpleNamedReference { name: selector.text.clone() }, selector.span)?;
                        let type_ref = self.tree.implicit_type_ref();
                        self.alloc(NodeKind::QualifiedAccessExpression {
                            safe,
                            type_ref,
                            explicit_receiver: Some(receiver),
                            dispatch_receiver: None,
                            extension_receiver: None,
                            callee,
                        }, raw.span)
                    }
                    _ => Err(selector.malformed("a call or a name is expected after `.`")),
                }
            }
            RawKind::This => {
                let callee = self.alloc(NodeKind::ExplicitThisReference { label: raw.optional_text(), bound_symbol: None }, raw.span)?;
                let type_ref = self.tree.implicit_type_ref();
                self.alloc(NodeKind::ThisReceiverExpression { type_ref, callee }, raw.span)
            }
            RawKind::Block => self.block(raw),
            RawKind::Return => {
                let result = match raw.children.first() {
                    Some(&result) => self.expression(result)?,
                    None => {
                        let type_ref = self.tree.resolved_type_ref(Type::Unit);
                        self.alloc(NodeKind::Block { type_ref, statements: vec![] }, raw.span)?
                    }
                };
                let type_ref = self.tree.implicit_type_ref();
                self.alloc(NodeKind::Return { type_ref, target: None, result }, raw.span)
            }
            RawKind::Break => {
                let type_ref = self.tree.implicit_type_ref();
                self.alloc(NodeKind::Break { label: raw.optional_text(), target: None, type_ref }, raw.span)
            }
            RawKind::Continue => {
                let type_ref = self.tree.implicit_type_ref();
                self.alloc(NodeKind::Continue { label: raw.optional_text(), target: None, type_ref }, raw.span)
            }
            _ => Err(raw.malformed("an expression is expected")),
        }
    }

    fn call<'s>(&mut self, raw: &'s RawNode<'s>, explicit_receiver: Option<NodeId>, safe: bool) -> Result<NodeId, InternalError> {
        let callee = self.alloc(NodeKind::SimpleNamedReference { name: raw.text.clone() }, raw.span)?;
        let (type_arguments, arguments): (Vec<_>, Vec<_>) = raw.children.iter().copied()
            .partition(|child| matches!(child.kind, RawKind::TypeProjection | RawKind::TypeReference));
        let type_arguments = type_arguments.into_iter()
            .map(|argument| self.type_projection(argument))
            .collect::<Result<Vec<_>, _>>()?;
        let arguments = arguments.into_iter()
            .map(|argument| self.expression(argument))
            .collect::<Result<Vec<_>, _>>()?;
        let type_ref = self.tree.implicit_type_ref();
        self.alloc(NodeKind::FunctionCall {
            safe,
            type_ref,
            type_arguments,
            explicit_receiver,
            dispatch_receiver: None,
            extension_receiver: None,
            callee,
            arguments,
        }, raw.span)
    }

    fn constant<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        let invalid = || raw.malformed(format!("`{}` is not a valid literal", raw.text));
        let value = match &raw.token {
            Some(TokenKind::IntLiteral(digits)) => match digits.parse::<i32>() {
                Ok(value) => ConstValue::Int(value),
                Err(_) => ConstValue::Long(digits.parse().map_err(|_| invalid())?),
            },
            Some(TokenKind::LongLiteral(digits)) => ConstValue::Long(digits.parse().map_err(|_| invalid())?),
            Some(TokenKind::DoubleLiteral(digits)) => ConstValue::Double(digits.parse().map_err(|_| invalid())?),
            Some(TokenKind::FloatLiteral(digits)) => ConstValue::Float(digits.parse().map_err(|_| invalid())?),
            Some(TokenKind::CharLiteral(value)) => ConstValue::Char(*value),
            Some(TokenKind::StringLiteral(value)) => ConstValue::String(value.clone()),
            Some(TokenKind::BoolLiteral(value)) => ConstValue::Boolean(*value),
            Some(TokenKind::NullLiteral) => ConstValue::Null,
            _ => return Err(invalid()),
        };
        self.string_or_const(value, raw.span)
    }

    fn string_or_const(&mut self, value: ConstValue, span: Option<Span>) -> Result<NodeId, InternalError> {
        let type_ref = self.tree.implicit_type_ref();
        self.alloc(NodeKind::Const { value, type_ref }, span)
    }

    /// 文字列テンプレート。リテラル一つだけなら文字列定数になります
    fn string_template<'s>(&mut self, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
        match raw.children.as_slice() {
            [] => return self.string_or_const(ConstValue::String(Arc::from("")), raw.span),
            [entry] if entry.kind == RawKind::LiteralStringEntry => {
                return self.string_or_const(ConstValue::String(entry.text.clone()), raw.span);
            }
            _ => {}
        }
        let arguments = raw.children.iter()
            .map(|&entry| match entry.kind {
                RawKind::LiteralStringEntry => self.string_or_const(ConstValue::String(entry.text.clone()), entry.span),
                RawKind::ExpressionStringEntry => match entry.children.first() {
                    Some(&expression) => self.expression(expression),
                    None => Err(entry.malformed("a template entry needs an expression")),
                },
                _ => Err(entry.malformed("a string template entry is expected")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let type_ref = self.tree.implicit_type_ref();
        self.alloc(NodeKind::StringConcatenationCall { arguments, type_ref }, raw.span)
    }
}

/// 生のファイルから初期フェーズの木を作ります
pub fn build_file<'s>(tree: &mut Tree, raw: &'s RawNode<'s>) -> Result<NodeId, InternalError> {
    Maker::new(tree).file(raw)
}
