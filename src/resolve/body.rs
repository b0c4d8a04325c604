use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::trace;
use crate::errors::{Error, InternalError};
use crate::span::Span;
use crate::symbol::{CallableId, ClassId, FunctionInfo, Symbol};
use crate::tree::{Capabilities, ClassKind, Node, NodeId, NodeKind, Transformer, Tree};
use crate::types::Type;
use super::core::Resolver;
use super::types::replacement_type_ref;

/// `this` で参照できる暗黙のレシーバ
#[derive(Clone, Debug)]
struct ImplicitReceiver {
    label: Arc<str>,
    ty: Type,
    symbol: Symbol,
}

/// 本体の解決中に見えている名前
///
/// 入れ子のスコープへ入るたびに複製されます。中身は `im` の永続データ構造なので複製は安価です。
#[derive(Clone, Default)]
struct Scope {
    variables: im::HashMap<Arc<str>, NodeId>,
    functions: im::HashMap<Arc<str>, im::Vector<NodeId>>,
    receivers: im::Vector<ImplicitReceiver>,
    /// `return` の行き先
    callable: Option<NodeId>,
    loops: im::Vector<(Option<Arc<str>>, NodeId)>,
}

impl Scope {
    fn declare(&mut self, tree: &Tree, id: NodeId) {
        match tree.kind(id) {
            NodeKind::Property { name, .. } | NodeKind::ValueParameter { name, .. } => {
                self.variables.insert(name.clone(), id);
            }
            NodeKind::SimpleFunction { name, .. } => {
                let mut overloads = self.functions.get(name).cloned().unwrap_or_default();
                overloads.push_back(id);
                self.functions.insert(name.clone(), overloads);
            }
            _ => {}
        }
    }
}

/// 呼び出しの候補
struct Candidate {
    symbol: Symbol,
    receiver: Option<Type>,
    parameters: Vec<Type>,
    /// 戻り値型を宣言から読む場合の宣言
    declaration: Option<NodeId>,
    return_type: Option<Type>,
}

impl Candidate {
    fn from_info(info: &FunctionInfo) -> Self {
        Candidate {
            symbol: Symbol::Callable(info.id.clone()),
            receiver: None,
            parameters: info.id.parameters.iter().cloned().collect(),
            declaration: None,
            return_type: Some(info.return_type.clone()),
        }
    }

    fn from_function(tree: &Tree, function: NodeId, owner: Option<&ClassId>) -> Option<Self> {
        let NodeKind::SimpleFunction { name, receiver_type_ref, value_parameters, .. } = tree.kind(function) else {
            return None;
        };
        let parameters = parameter_types(tree, value_parameters);
        Some(Candidate {
            symbol: Symbol::Callable(CallableId::new(owner.cloned(), name.clone(), parameters.clone())),
            receiver: receiver_type_ref.and_then(|receiver| type_of_type_ref(tree, receiver)),
            parameters,
            declaration: Some(function),
            return_type: None,
        })
    }
}

/// 名前の解決結果
enum Resolution {
    Found(Symbol, Type),
    /// レシーバがすでにエラー型なので、新たな診断は出さずにエラーを伝えます
    Poisoned(Arc<str>),
    Missing,
}

fn type_of_type_ref(tree: &Tree, type_ref: NodeId) -> Option<Type> {
    match tree.kind(type_ref) {
        NodeKind::ResolvedTypeRef { ty } => Some(ty.clone()),
        NodeKind::ErrorTypeRef { reason } => Some(Type::Error(reason.clone())),
        _ => None,
    }
}

fn parameter_types(tree: &Tree, value_parameters: &[NodeId]) -> Vec<Type> {
    value_parameters.iter()
        .map(|&parameter| tree.kind(parameter).type_ref()
            .and_then(|type_ref| type_of_type_ref(tree, type_ref))
            .unwrap_or_else(|| Type::error("type is not specified")))
        .collect()
}

fn error_reason(ty: &Type) -> Option<Arc<str>> {
    match ty.without_nullability() {
        Type::Error(reason) => Some(reason.clone()),
        _ => None,
    }
}

fn member_declarations(tree: &Tree, class: NodeId) -> &[NodeId] {
    match tree.kind(class) {
        NodeKind::RegularClass { declarations, .. } => declarations,
        _ => &[],
    }
}

fn primary_constructor_parameters(tree: &Tree, class: NodeId) -> Vec<NodeId> {
    member_declarations(tree, class).iter()
        .find_map(|&declaration| match tree.kind(declaration) {
            NodeKind::Constructor { is_primary: true, value_parameters, .. } => Some(value_parameters.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

/// プロパティと主コンストラクタのパラメータ
fn member_properties(tree: &Tree, class: NodeId) -> Vec<NodeId> {
    let mut members: Vec<NodeId> = member_declarations(tree, class).iter().copied()
        .filter(|&declaration| matches!(tree.kind(declaration), NodeKind::Property { .. }))
        .collect();
    members.extend(primary_constructor_parameters(tree, class));
    members
}

/// 本体の最後の `return` から戻り値型を求めます。なければ `Unit`
fn returned_type(tree: &Tree, body: NodeId) -> Result<Type, InternalError> {
    match tree.kind(body) {
        NodeKind::Block { statements, .. } => match statements.last().map(|&last| tree.kind(last)) {
            Some(NodeKind::Return { result, .. }) => tree.expression_type(*result),
            _ => Ok(Type::Unit),
        },
        _ => tree.expression_type(body),
    }
}

/// 式の型と参照を解決する変換器
struct BodyResolver<'r> {
    resolver: &'r mut Resolver,
}

impl BodyResolver<'_> {
    /// 型スロットがまだ未解決のときだけ型を書き込みます
    fn assign_type(&mut self, tree: &mut Tree, id: NodeId, ty: Type) -> Result<(), InternalError> {
        let Some(old) = tree.kind(id).type_ref() else { return Ok(()) };
        if !tree.kind(old).is_unresolved_type_ref() {
            return Ok(());
        }
        let kind = match error_reason(&ty) {
            Some(reason) => NodeKind::ErrorTypeRef { reason },
            None => NodeKind::ResolvedTypeRef { ty },
        };
        let new = replacement_type_ref(tree, old, kind)?;
        tree.replace_type_ref(id, old, new)
    }

    fn report(&mut self, error: Error) -> Type {
        let reason = error.reason();
        self.resolver.error(error);
        Type::error(reason)
    }

    /// 宣言の型。省略されていてまだ推論されていなければ診断を報告します
    fn declared_type(&mut self, tree: &Tree, declaration: NodeId, span: Option<Span>) -> Type {
        if let Some(ty) = tree.kind(declaration).type_ref().and_then(|type_ref| type_of_type_ref(tree, type_ref)) {
            return ty;
        }
        let name = tree.kind(declaration).declaration_name().cloned()
            .unwrap_or_else(|| Arc::from(tree.describe(declaration)));
        self.report(Error::uninferred_type(name, span))
    }

    /// クラスとその上位クラスを近い順に並べます
    fn class_hierarchy(&self, tree: &Tree, class_id: &ClassId) -> Vec<ClassId> {
        let mut result = vec![];
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([class_id.clone()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let supertypes: Vec<Type> = match self.resolver.local_class(&id).map(|class| tree.kind(class)) {
                Some(NodeKind::RegularClass { super_type_refs, .. }) => super_type_refs.iter()
                    .filter_map(|&type_ref| type_of_type_ref(tree, type_ref))
                    .collect(),
                Some(NodeKind::TypeAlias { expanded_type_ref, .. }) =>
                    type_of_type_ref(tree, *expanded_type_ref).into_iter().collect(),
                _ => self.resolver.symbols.class(&id).map(|info| info.supertypes.clone()).unwrap_or_default(),
            };
            queue.extend(supertypes.iter().filter_map(|ty| ty.class_id().cloned()));
            result.push(id);
        }
        result
    }

    /// 引数の型がパラメータの型に渡せるかどうか。エラー型はどちら側でも受け入れます
    fn accepts(&self, tree: &Tree, parameter: &Type, argument: &Type) -> bool {
        if parameter.is_error() || argument.is_error() || parameter == argument {
            return true;
        }
        match (parameter, argument) {
            (Type::TypeParameter(_), _) => true,
            (Type::Nullable(parameter), Type::Nullable(argument)) => self.accepts(tree, parameter, argument),
            (Type::Nullable(parameter), argument) => self.accepts(tree, parameter, argument),
            (_, Type::Nullable(_)) => false,
            (_, Type::Nothing) | (Type::Any, _) => true,
            (Type::Class(expected, _), Type::Class(actual, _)) => self.class_hierarchy(tree, actual).contains(expected),
            _ => false,
        }
    }

    fn select(&self, tree: &Tree, candidates: Vec<Candidate>, arguments: &[Type]) -> Option<Candidate> {
        candidates.into_iter().find(|candidate| {
            candidate.parameters.len() == arguments.len()
                && candidate.parameters.iter().zip(arguments)
                    .all(|(parameter, argument)| self.accepts(tree, parameter, argument))
        })
    }

    fn found(&mut self, tree: &Tree, candidate: Candidate, span: Option<Span>) -> Resolution {
        let ty = match (candidate.return_type, candidate.declaration) {
            (Some(ty), _) => ty,
            (None, Some(declaration)) => self.declared_type(tree, declaration, span),
            (None, None) => Type::Unit,
        };
        Resolution::Found(candidate.symbol, ty)
    }

    fn member_property(&mut self, tree: &Tree, receiver: &Type, name: &Arc<str>, span: Option<Span>) -> Option<(Symbol, Type)> {
        let class_id = receiver.class_id()?.clone();
        for id in self.class_hierarchy(tree, &class_id) {
            if let Some(class) = self.resolver.local_class(&id) {
                let member = member_properties(tree, class).into_iter()
                    .find(|&member| tree.kind(member).declaration_name() == Some(name));
                if let Some(member) = member {
                    let ty = self.declared_type(tree, member, span);
                    return Some((Symbol::Variable { name: name.clone(), declaration: member }, ty));
                }
            } else if let Some(info) = self.resolver.symbols.class(&id) {
                if let Some((_, ty)) = info.properties.iter().find(|(property, _)| property == name) {
                    return Some((Symbol::Callable(CallableId::member(&id, name.clone(), [])), ty.clone()));
                }
            }
        }
        None
    }

    fn member_function_candidates(&self, tree: &Tree, receiver: &Type, name: &str) -> Vec<Candidate> {
        let Some(class_id) = receiver.class_id() else { return vec![] };
        let mut candidates = vec![];
        for id in self.class_hierarchy(tree, class_id) {
            match self.resolver.local_class(&id) {
                Some(class) => candidates.extend(member_declarations(tree, class).iter()
                    .filter(|&&member| tree.kind(member).declaration_name().is_some_and(|member| member.as_ref() == name))
                    .filter_map(|&member| Candidate::from_function(tree, member, Some(&id)))),
                None => candidates.extend(self.resolver.symbols.class(&id).into_iter()
                    .flat_map(|info| info.functions_named(name))
                    .map(Candidate::from_info)),
            }
        }
        candidates
    }

    /// 名前がクラスを指していればそのコンストラクタ。宣言がなければ引数なしの既定のコンストラクタです
    fn constructor_candidates(&self, tree: &Tree, name: &Arc<str>) -> Vec<Candidate> {
        let Some(class_id) = self.resolver.lookup_class(std::slice::from_ref(name)) else { return vec![] };
        let class_type = Type::class(class_id.clone());
        let constructor = |parameters: Vec<Type>| Candidate {
            symbol: Symbol::Callable(CallableId::member(&class_id, "<init>", parameters.clone())),
            receiver: None,
            parameters,
            declaration: None,
            return_type: Some(class_type.clone()),
        };
        let declared: Vec<Candidate> = match self.resolver.local_class(&class_id).map(|class| tree.kind(class)) {
            Some(NodeKind::RegularClass { class_kind: ClassKind::Interface, .. }) => return vec![],
            Some(NodeKind::RegularClass { declarations, .. }) => declarations.iter()
                .filter_map(|&declaration| match tree.kind(declaration) {
                    NodeKind::Constructor { value_parameters, .. } => Some(constructor(parameter_types(tree, value_parameters))),
                    _ => None,
                })
                .collect(),
            Some(_) => return vec![],
            None => match self.resolver.symbols.class(&class_id) {
                Some(info) => info.functions_named("<init>")
                    .map(|function| constructor(function.id.parameters.iter().cloned().collect()))
                    .collect(),
                None => return vec![],
            },
        };
        if declared.is_empty() { vec![constructor(vec![])] } else { declared }
    }

    /// 呼び出し先の参照を解決結果で置き換え、式の型を書き込みます
    fn bind_callee(&mut self, tree: &mut Tree, id: NodeId, callee: NodeId, name: Arc<str>, resolution: Resolution) -> Result<NodeId, InternalError> {
        let span = tree.node(callee).span;
        let (reference, ty) = match resolution {
            Resolution::Found(symbol, ty) => {
                trace!(?symbol, "resolved {}", name);
                (NodeKind::ResolvedNamedReference { name, symbol }, ty)
            }
            Resolution::Poisoned(reason) => (NodeKind::ErrorNamedReference { name, reason: reason.clone() }, Type::Error(reason)),
            Resolution::Missing => {
                let ty = self.report(Error::unresolved_reference(name.clone(), span));
                let reason = error_reason(&ty).unwrap_or_else(|| Arc::from(""));
                (NodeKind::ErrorNamedReference { name, reason }, ty)
            }
        };
        let reference = tree.alloc(Node::with_span(reference, span))?;
        tree.replace_callee_reference(id, reference)?;
        self.assign_type(tree, id, ty)?;
        Ok(id)
    }

    fn component(&mut self, tree: &Tree, receiver: &Type, index: u32, name: &Arc<str>, span: Option<Span>) -> Resolution {
        let declared = self.member_function_candidates(tree, receiver, name).into_iter()
            .find(|candidate| candidate.parameters.is_empty());
        if let Some(candidate) = declared {
            return self.found(tree, candidate, span);
        }
        let Some(class_id) = receiver.class_id().cloned() else { return Resolution::Missing };
        let parameter = self.resolver.local_class(&class_id)
            .filter(|&class| matches!(tree.kind(class), NodeKind::RegularClass { status, .. } if status.is_data))
            .and_then(|class| {
                let parameters = primary_constructor_parameters(tree, class);
                (index as usize).checked_sub(1).and_then(|position| parameters.get(position).copied())
            });
        match parameter {
            Some(parameter) => {
                let ty = self.declared_type(tree, parameter, span);
                Resolution::Found(Symbol::Callable(CallableId::member(&class_id, name.clone(), [])), ty)
            }
            None => Resolution::Missing,
        }
    }
}

impl Transformer<Scope> for BodyResolver<'_> {
    fn transform_file(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let mut inner = scope.clone();
        if let NodeKind::File { declarations, .. } = tree.kind(id) {
            for &declaration in declarations {
                inner.declare(tree, declaration);
            }
        }
        tree.transform_children(id, self, &mut inner)?;
        Ok(id)
    }

    fn transform_regular_class(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let NodeKind::RegularClass { name, class_id, .. } = tree.kind(id) else {
            return self.transform_element(tree, id, scope);
        };
        let mut inner = Scope { callable: None, loops: im::Vector::new(), ..scope.clone() };
        inner.receivers.push_back(ImplicitReceiver {
            label: name.clone(),
            ty: Type::class(class_id.clone()),
            symbol: Symbol::Class(class_id.clone()),
        });
        for parameter in primary_constructor_parameters(tree, id) {
            inner.declare(tree, parameter);
        }
        tree.transform_children(id, self, &mut inner)?;
        Ok(id)
    }

    fn transform_constructor(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let mut inner = Scope { callable: Some(id), loops: im::Vector::new(), ..scope.clone() };
        if let NodeKind::Constructor { value_parameters, .. } = tree.kind(id) {
            for &parameter in value_parameters {
                inner.declare(tree, parameter);
            }
        }
        tree.transform_children(id, self, &mut inner)?;
        Ok(id)
    }

    fn transform_simple_function(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let NodeKind::SimpleFunction { name, receiver_type_ref, value_parameters, .. } = tree.kind(id) else {
            return self.transform_element(tree, id, scope);
        };
        let mut inner = Scope { callable: Some(id), loops: im::Vector::new(), ..scope.clone() };
        for &parameter in value_parameters {
            inner.declare(tree, parameter);
        }
        if let Some(receiver) = (*receiver_type_ref).and_then(|receiver| type_of_type_ref(tree, receiver)) {
            inner.receivers.push_back(ImplicitReceiver {
                label: name.clone(),
                ty: receiver,
                symbol: Symbol::Variable { name: name.clone(), declaration: id },
            });
        }
        // ローカル関数は自身の本体から再帰呼び出しできる
        if tree.owner(id).is_some_and(|owner| matches!(tree.kind(owner), NodeKind::Block { .. })) {
            inner.declare(tree, id);
        }
        tree.transform_children(id, self, &mut inner)?;

        if let NodeKind::SimpleFunction { body: Some(body), return_type_ref, .. } = tree.kind(id) {
            if tree.kind(*return_type_ref).is_unresolved_type_ref() {
                let ty = returned_type(tree, *body)?;
                self.assign_type(tree, id, ty)?;
            }
        }
        Ok(id)
    }

    fn transform_property(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        let NodeKind::Property { name, return_type_ref, initializer, .. } = tree.kind(id) else { return Ok(id) };
        if !tree.kind(*return_type_ref).is_unresolved_type_ref() {
            return Ok(id);
        }
        let ty = match *initializer {
            Some(initializer) => tree.expression_type(initializer)?,
            None => {
                let error = Error::uninferred_type(name.clone(), tree.node(id).span);
                self.report(error)
            }
        };
        self.assign_type(tree, id, ty)?;
        Ok(id)
    }

    fn transform_value_parameter(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        let NodeKind::ValueParameter { name, return_type_ref, .. } = tree.kind(id) else { return Ok(id) };
        if tree.kind(*return_type_ref).is_unresolved_type_ref() {
            let error = Error::uninferred_type(name.clone(), tree.node(id).span);
            let ty = self.report(error);
            self.assign_type(tree, id, ty)?;
        }
        Ok(id)
    }

    /// 文を順に解決し、ローカル宣言はその文より後でだけ見えるようにします
    fn transform_block(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let mut inner = scope.clone();
        for slot in tree.slots(id) {
            let new = tree.transform(slot.child, self, &mut inner)?;
            tree.set_slot(&slot, new)?;
            inner.declare(tree, new);
        }
        let last = match tree.kind(id) {
            NodeKind::Block { statements, .. } => statements.last().copied(),
            _ => None,
        };
        let ty = match last {
            Some(last) if tree.kind(last).capabilities().contains(Capabilities::EXPRESSION) => tree.expression_type(last)?,
            _ => Type::Unit,
        };
        self.assign_type(tree, id, ty)?;
        Ok(id)
    }

    fn transform_const(&mut self, tree: &mut Tree, id: NodeId, _: &mut Scope) -> Result<NodeId, InternalError> {
        if let NodeKind::Const { value, .. } = tree.kind(id) {
            let ty = value.static_type();
            self.assign_type(tree, id, ty)?;
        }
        Ok(id)
    }

    fn transform_string_concatenation_call(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        self.assign_type(tree, id, Type::String)?;
        Ok(id)
    }

    fn transform_qualified_access_expression(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        let NodeKind::QualifiedAccessExpression { explicit_receiver, callee, .. } = tree.kind(id) else { return Ok(id) };
        let (explicit_receiver, callee) = (*explicit_receiver, *callee);
        let NodeKind::SimpleNamedReference { name } = tree.kind(callee) else { return Ok(id) };
        let name = name.clone();
        let span = tree.node(id).span;
        let resolution = match explicit_receiver {
            Some(receiver) => {
                let receiver_type = tree.expression_type(receiver)?;
                match error_reason(&receiver_type) {
                    Some(reason) => Resolution::Poisoned(reason),
                    None => match self.member_property(tree, &receiver_type, &name, span) {
                        Some((symbol, ty)) => Resolution::Found(symbol, ty),
                        None => Resolution::Missing,
                    },
                }
            }
            None => {
                let mut resolved = scope.variables.get(&name).copied().map(|declaration| {
                    let ty = self.declared_type(tree, declaration, span);
                    (Symbol::Variable { name: name.clone(), declaration }, ty)
                });
                for receiver in scope.receivers.iter().rev() {
                    if resolved.is_some() {
                        break;
                    }
                    resolved = self.member_property(tree, &receiver.ty, &name, span);
                }
                let resolved = resolved.or_else(|| self.resolver.lookup_class(std::slice::from_ref(&name))
                    .map(|class_id| (Symbol::Class(class_id.clone()), Type::class(class_id))));
                match resolved {
                    Some((symbol, ty)) => Resolution::Found(symbol, ty),
                    None => Resolution::Missing,
                }
            }
        };
        self.bind_callee(tree, id, callee, name, resolution)
    }

    fn transform_function_call(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        let NodeKind::FunctionCall { explicit_receiver, callee, arguments, .. } = tree.kind(id) else { return Ok(id) };
        let (explicit_receiver, callee, arguments) = (*explicit_receiver, *callee, arguments.clone());
        let NodeKind::SimpleNamedReference { name } = tree.kind(callee) else { return Ok(id) };
        let name = name.clone();
        let span = tree.node(id).span;
        let argument_types = arguments.iter()
            .map(|&argument| tree.expression_type(argument))
            .collect::<Result<Vec<_>, _>>()?;
        let local_functions: Vec<Candidate> = scope.functions.get(&name).into_iter().flatten()
            .filter_map(|&function| Candidate::from_function(tree, function, None))
            .collect();

        let candidates = match explicit_receiver {
            Some(receiver) => {
                let receiver_type = tree.expression_type(receiver)?;
                if let Some(reason) = error_reason(&receiver_type) {
                    return self.bind_callee(tree, id, callee, name, Resolution::Poisoned(reason));
                }
                let mut candidates = self.member_function_candidates(tree, &receiver_type, &name);
                candidates.extend(local_functions.into_iter().filter(|candidate| candidate.receiver.as_ref()
                    .is_some_and(|expected| self.accepts(tree, expected, &receiver_type))));
                candidates
            }
            None => {
                let mut candidates: Vec<Candidate> = local_functions.into_iter()
                    .filter(|candidate| candidate.receiver.is_none())
                    .collect();
                for receiver in scope.receivers.iter().rev() {
                    candidates.extend(self.member_function_candidates(tree, &receiver.ty, &name));
                }
                candidates.extend(self.resolver.symbols.top_level_functions(&name).map(Candidate::from_info));
                candidates.extend(self.constructor_candidates(tree, &name));
                candidates
            }
        };
        let resolution = match self.select(tree, candidates, &argument_types) {
            Some(candidate) => self.found(tree, candidate, span),
            None => Resolution::Missing,
        };
        self.bind_callee(tree, id, callee, name, resolution)
    }

    fn transform_component_call(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        let NodeKind::ComponentCall { component_index, explicit_receiver, callee, .. } = tree.kind(id) else { return Ok(id) };
        let (index, receiver, callee) = (*component_index, *explicit_receiver, *callee);
        let NodeKind::SimpleNamedReference { name } = tree.kind(callee) else { return Ok(id) };
        let name = name.clone();
        let receiver_type = tree.expression_type(receiver)?;
        let resolution = match error_reason(&receiver_type) {
            Some(reason) => Resolution::Poisoned(reason),
            None => self.component(tree, &receiver_type, index, &name, tree.node(id).span),
        };
        self.bind_callee(tree, id, callee, name, resolution)
    }

    fn transform_this_receiver_expression(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let NodeKind::ThisReceiverExpression { callee, .. } = tree.kind(id) else { return Ok(id) };
        let callee = *callee;
        let NodeKind::ExplicitThisReference { label, .. } = tree.kind(callee) else { return Ok(id) };
        let label = label.clone();
        let receiver = scope.receivers.iter().rev()
            .find(|receiver| label.as_ref().is_none_or(|label| *label == receiver.label))
            .cloned();
        match receiver {
            Some(receiver) => {
                tree.bind_this_reference(callee, receiver.symbol)?;
                self.assign_type(tree, id, receiver.ty)?;
            }
            None => {
                let span = tree.node(id).span;
                let error = match label {
                    Some(label) => Error::unresolved_label(label, span),
                    None => Error::this_outside_class(span),
                };
                let ty = self.report(error);
                self.assign_type(tree, id, ty)?;
            }
        }
        Ok(id)
    }

    fn transform_implicit_cast(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        if let NodeKind::ImplicitCast { argument, .. } = tree.kind(id) {
            let ty = tree.expression_type(*argument)?;
            self.assign_type(tree, id, ty)?;
        }
        Ok(id)
    }

    fn transform_return(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, scope)?;
        let Some(callable) = scope.callable else {
            return Err(InternalError::SchemaViolation {
                node: tree.describe(id),
                reason: "return outside of a function".to_string(),
            });
        };
        tree.bind_jump_target(id, callable)?;
        self.assign_type(tree, id, Type::Nothing)?;
        Ok(id)
    }

    fn transform_error_expression(&mut self, tree: &mut Tree, id: NodeId, _: &mut Scope) -> Result<NodeId, InternalError> {
        if let NodeKind::ErrorExpression { reason, .. } = tree.kind(id) {
            let ty = Type::Error(reason.clone());
            self.assign_type(tree, id, ty)?;
        }
        Ok(id)
    }

    fn transform_loop(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let label = match tree.kind(id) {
            NodeKind::WhileLoop { label, .. } | NodeKind::DoWhileLoop { label, .. } => label.clone(),
            _ => None,
        };
        let mut inner = scope.clone();
        inner.loops.push_back((label, id));
        tree.transform_children(id, self, &mut inner)?;
        Ok(id)
    }

    fn transform_loop_jump(&mut self, tree: &mut Tree, id: NodeId, scope: &mut Scope) -> Result<NodeId, InternalError> {
        let (label, keyword) = match tree.kind(id) {
            NodeKind::Break { label, .. } => (label.clone(), "break"),
            NodeKind::Continue { label, .. } => (label.clone(), "continue"),
            _ => return Ok(id),
        };
        let target = scope.loops.iter().rev()
            .find(|(loop_label, _)| label.is_none() || *loop_label == label)
            .map(|(_, target)| *target);
        match target {
            Some(target) => {
                tree.bind_jump_target(id, target)?;
                self.assign_type(tree, id, Type::Nothing)?;
            }
            None => {
                let label = label.unwrap_or_else(|| Arc::from(keyword));
                let ty = self.report(Error::unresolved_label(label, tree.node(id).span));
                self.assign_type(tree, id, ty)?;
            }
        }
        Ok(id)
    }

    // 宣言の型は前の段で解決済み。暗黙の型は持ち主の処理で埋める
    fn transform_type_ref(&mut self, _tree: &mut Tree, id: NodeId, _: &mut Scope) -> Result<NodeId, InternalError> {
        Ok(id)
    }

    fn transform_type_projection_with_variance(&mut self, tree: &mut Tree, id: NodeId, _: &mut Scope) -> Result<NodeId, InternalError> {
        if let NodeKind::TypeProjectionWithVariance { type_ref, .. } = tree.kind(id) {
            let type_ref = *type_ref;
            self.resolver.resolve_type_ref_in_place(tree, id, type_ref)?;
        }
        Ok(id)
    }
}

impl Resolver {
    /// 関数本体・初期化子・既定値の中の参照と式の型を解決します
    pub(super) fn resolve_bodies(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        let mut resolver = BodyResolver { resolver: self };
        tree.transform(file, &mut resolver, &mut Scope::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use typed_arena::Arena;
    use crate::errors::{ErrorKind, NameError};
    use crate::symbol::{CallableId, ClassId, ClassInfo, FunctionInfo, Symbol, SymbolTable};
    use crate::syntax::{RawKind, RawNode, RawTreeBuilder};
    use crate::token::TokenKind;
    use crate::tree::{build_file, ClassKind, NodeId, NodeKind, ResolvePhase, Tree};
    use crate::types::Type;
    use crate::resolve::Resolver;

    fn resolve<'s>(symbols: SymbolTable, file: &'s RawNode<'s>) -> (Tree, NodeId, Resolver) {
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let mut resolver = Resolver::new(Arc::new(symbols));
        resolver.resolve_fully(&mut tree, file).unwrap();
        assert!(tree.verify(file).is_ok());
        (tree, file, resolver)
    }

    fn top_level(tree: &Tree, file: NodeId, index: usize) -> NodeId {
        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        declarations[index]
    }

    fn body_statements(tree: &Tree, function: NodeId) -> Vec<NodeId> {
        let NodeKind::SimpleFunction { body: Some(body), .. } = tree.kind(function) else { panic!("function expected") };
        let NodeKind::Block { statements, .. } = tree.kind(*body) else { panic!("block expected") };
        statements.clone()
    }

    fn initializer(tree: &Tree, property: NodeId) -> NodeId {
        let NodeKind::Property { initializer: Some(initializer), .. } = tree.kind(property) else { panic!("property expected") };
        *initializer
    }

    #[test]
    fn test_expression_body_infers_return_type() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let function = raw.function("answer", vec![raw.constant("42").unwrap()]);
        let (tree, file, resolver) = resolve(SymbolTable::new(), raw.file("a.kt", vec![function]));
        assert!(!resolver.has_errors());
        let function = top_level(&tree, file, 0);
        assert_eq!(tree.phase(function), Some(ResolvePhase::BodyResolved));
        assert_eq!(tree.expression_type(function).unwrap(), Type::int());
        let statements = body_statements(&tree, function);
        assert!(matches!(tree.kind(statements[0]), NodeKind::Return { target: Some(target), .. } if *target == function));
        assert_eq!(tree.expression_type(statements[0]).unwrap(), Type::Nothing);
    }

    #[test]
    fn test_locals_parameters_and_members() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let class = raw.class("Point", vec![
            raw.node(RawKind::PrimaryConstructor, "", vec![raw.parameter("x", raw.user_type("Int", vec![]))]),
            raw.function("twice", vec![
                raw.parameter("factor", raw.user_type("Long", vec![])),
                raw.block(vec![
                    raw.property("copy", vec![raw.name("x")]),
                    raw.name("factor"),
                    raw.dot(raw.node(RawKind::This, "", vec![]), raw.name("x")),
                ]),
            ]),
        ]);
        let (tree, file, resolver) = resolve(SymbolTable::new(), raw.file("a.kt", vec![class]));
        assert!(!resolver.has_errors(), "{:?}", resolver.errors);

        let NodeKind::RegularClass { declarations, .. } = tree.kind(top_level(&tree, file, 0)) else { panic!("class expected") };
        let statements = body_statements(&tree, declarations[1]);
        assert_eq!(tree.expression_type(statements[0]).unwrap(), Type::int());
        assert_eq!(tree.expression_type(statements[1]).unwrap(), Type::long());
        assert_eq!(tree.expression_type(statements[2]).unwrap(), Type::int());
        let NodeKind::QualifiedAccessExpression { explicit_receiver: Some(receiver), .. } = tree.kind(statements[2]) else {
            panic!("member access expected")
        };
        let NodeKind::ThisReceiverExpression { callee, .. } = tree.kind(*receiver) else { panic!("this expected") };
        assert!(matches!(
            tree.kind(*callee),
            NodeKind::ExplicitThisReference { bound_symbol: Some(Symbol::Class(id)), .. } if id.as_str() == "Point"
        ));
    }

    #[test]
    fn test_calls_pick_matching_overload() {
        let mut symbols = SymbolTable::new();
        let printer = ClassId::new("io/Printer");
        let mut info = ClassInfo::new(printer.clone(), ClassKind::Class);
        info.functions.push(FunctionInfo::member(CallableId::member(&printer, "print", [Type::String]), Type::Unit));
        info.functions.push(FunctionInfo::member(CallableId::member(&printer, "print", [Type::int()]), Type::boolean()));
        symbols.add_class(info);

        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let printer_call = raw.call("Printer", vec![]);
        let print = raw.dot(printer_call, raw.call("print", vec![raw.constant("1").unwrap()]));
        let property = raw.property("printed", vec![print]);
        let (tree, file, resolver) = resolve(symbols, raw.file("a.kt", vec![property]));
        assert!(!resolver.has_errors(), "{:?}", resolver.errors);

        let call = initializer(&tree, top_level(&tree, file, 0));
        assert_eq!(tree.expression_type(call).unwrap(), Type::boolean());
        let NodeKind::FunctionCall { callee, explicit_receiver: Some(receiver), .. } = tree.kind(call) else { panic!("call expected") };
        assert!(matches!(
            tree.kind(*callee),
            NodeKind::ResolvedNamedReference { symbol: Symbol::Callable(id), .. } if id.parameters[0] == Type::int()
        ));
        assert_eq!(tree.expression_type(*receiver).unwrap(), Type::class(printer));
    }

    #[test]
    fn test_unresolved_reference_poisons_only_once() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let property = raw.property("p", vec![raw.dot(raw.name("missing"), raw.name("length"))]);
        let (tree, file, resolver) = resolve(SymbolTable::new(), raw.file("a.kt", vec![property]));
        assert_eq!(resolver.errors.len(), 1);
        assert!(matches!(
            &resolver.errors[0].kind,
            ErrorKind::NameError(NameError::UnresolvedReference { name }) if name.as_ref() == "missing"
        ));
        let access = initializer(&tree, top_level(&tree, file, 0));
        assert!(tree.expression_type(access).unwrap().is_error());
        let NodeKind::QualifiedAccessExpression { callee, .. } = tree.kind(access) else { panic!("access expected") };
        assert!(matches!(tree.kind(*callee), NodeKind::ErrorNamedReference { .. }));
    }

    #[test]
    fn test_loop_jumps_bind_to_labels() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let inner = raw.node(RawKind::While, "", vec![
            raw.constant("true").unwrap(),
            raw.block(vec![raw.node(RawKind::Break, "outer", vec![]), raw.node(RawKind::Continue, "", vec![])]),
        ]);
        let outer = raw.node(RawKind::DoWhile, "outer", vec![raw.block(vec![inner]), raw.constant("false").unwrap()]);
        let function = raw.function("spin", vec![raw.block(vec![outer, raw.node(RawKind::Break, "", vec![])])]);
        let (tree, file, resolver) = resolve(SymbolTable::new(), raw.file("a.kt", vec![function]));
        assert_eq!(resolver.errors.len(), 1);

        let statements = body_statements(&tree, top_level(&tree, file, 0));
        let outer = statements[0];
        let NodeKind::DoWhileLoop { block, .. } = tree.kind(outer) else { panic!("loop expected") };
        let NodeKind::Block { statements: outer_body, .. } = tree.kind(*block) else { panic!("block expected") };
        let inner = outer_body[0];
        let NodeKind::WhileLoop { block, .. } = tree.kind(inner) else { panic!("loop expected") };
        let NodeKind::Block { statements: jumps, .. } = tree.kind(*block) else { panic!("block expected") };
        assert!(matches!(tree.kind(jumps[0]), NodeKind::Break { target: Some(target), .. } if *target == outer));
        assert!(matches!(tree.kind(jumps[1]), NodeKind::Continue { target: Some(target), .. } if *target == inner));
        assert!(matches!(tree.kind(statements[1]), NodeKind::Break { target: None, .. }));
    }

    #[test]
    fn test_component_calls_use_data_class_parameters() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let pair = raw.tagged(RawKind::Class, TokenKind::Class, "Pair", vec![
            raw.modifiers("data", vec![]),
            raw.node(RawKind::PrimaryConstructor, "", vec![
                raw.parameter("first", raw.user_type("Int", vec![])),
                raw.parameter("second", raw.user_type("String", vec![])),
            ]),
        ]);
        let destructuring = raw.tagged(RawKind::DestructuringDeclaration, TokenKind::Val, "", vec![
            raw.node(RawKind::DestructuringEntry, "a", vec![]),
            raw.node(RawKind::DestructuringEntry, "b", vec![]),
            raw.call("Pair", vec![raw.constant("1").unwrap(), raw.constant("\"x\"").unwrap()]),
        ]);
        let function = raw.function("split", vec![raw.block(vec![destructuring, raw.name("b")])]);
        let (tree, file, resolver) = resolve(SymbolTable::new(), raw.file("a.kt", vec![pair, function]));
        assert!(!resolver.has_errors(), "{:?}", resolver.errors);

        let statements = body_statements(&tree, top_level(&tree, file, 1));
        assert_eq!(tree.expression_type(statements[0]).unwrap(), Type::class(ClassId::new("Pair")));
        assert_eq!(tree.expression_type(statements[1]).unwrap(), Type::int());
        assert_eq!(tree.expression_type(statements[2]).unwrap(), Type::String);
        assert_eq!(tree.expression_type(statements[3]).unwrap(), Type::String);
    }
}
