use std::sync::Arc;
use itertools::Itertools;
use crate::errors::{Error, InternalError};
use crate::types::Type;
use crate::tree::{Node, NodeId, NodeKind, Tree};
use super::core::{type_parameters_in_scope, Resolver};

fn with_nullability(ty: Type, is_nullable: bool) -> Type {
    if is_nullable && !ty.is_error() { ty.nullable() } else { ty }
}

impl Resolver {
    /// 型参照が表す型を求めます。木は変更しません
    pub(super) fn type_of_ref(&self, tree: &Tree, type_ref: NodeId, scope: &im::HashSet<Arc<str>>) -> Result<Type, Error> {
        let span = tree.node(type_ref).span;
        match tree.kind(type_ref) {
            NodeKind::ResolvedTypeRef { ty } => Ok(ty.clone()),
            NodeKind::ErrorTypeRef { reason } => Ok(Type::Error(reason.clone())),
            NodeKind::UserTypeRef { qualifier, type_arguments, is_nullable } => {
                if let [single] = qualifier.as_slice() {
                    if scope.contains(single) {
                        return Ok(with_nullability(Type::TypeParameter(single.clone()), *is_nullable));
                    }
                }
                let name = qualifier.iter().join(".");
                if let Some(ty) = Type::builtin(&name) {
                    return Ok(with_nullability(ty, *is_nullable));
                }
                let class_id = self.lookup_class(qualifier)
                    .ok_or_else(|| Error::unresolved_type(name.as_str(), span))?;
                let arguments = type_arguments.iter()
                    .map(|&argument| self.type_of_projection(tree, argument, scope))
                    .collect::<Result<im::Vector<_>, _>>()?;
                Ok(with_nullability(Type::Class(class_id, arguments), *is_nullable))
            }
            NodeKind::FunctionTypeRef { is_nullable, receiver_type_ref, parameter_type_refs, return_type_ref, .. } => {
                let parameters = receiver_type_ref.iter().chain(parameter_type_refs)
                    .map(|&parameter| self.type_of_ref(tree, parameter, scope))
                    .collect::<Result<im::Vector<_>, _>>()?;
                let returned = self.type_of_ref(tree, *return_type_ref, scope)?;
                Ok(with_nullability(Type::Function(parameters, Arc::new(returned)), *is_nullable))
            }
            NodeKind::DynamicTypeRef { .. } => Ok(Type::nullable_any()),
            NodeKind::ImplicitTypeRef => Ok(Type::error("type is not specified")),
            other => Ok(Type::error(format!("{} is not a type", other.name()))),
        }
    }

    fn type_of_projection(&self, tree: &Tree, projection: NodeId, scope: &im::HashSet<Arc<str>>) -> Result<Type, Error> {
        match tree.kind(projection) {
            NodeKind::StarProjection => Ok(Type::nullable_any()),
            NodeKind::TypeProjectionWithVariance { type_ref, .. } => self.type_of_ref(tree, *type_ref, scope),
            other => Ok(Type::error(format!("{} is not a type argument", other.name()))),
        }
    }

    /// 未解決の型参照に代わるノードを作ります。すでに解決済みならそのまま返します
    ///
    /// 解決できなければ診断を報告し、エラー型参照を返します。
    pub(super) fn resolved_type_ref_node(&mut self, tree: &mut Tree, type_ref: NodeId, scope: &im::HashSet<Arc<str>>) -> Result<NodeId, InternalError> {
        if !tree.kind(type_ref).is_unresolved_type_ref() {
            return Ok(type_ref);
        }
        let kind = match self.type_of_ref(tree, type_ref, scope) {
            Ok(ty) => NodeKind::ResolvedTypeRef { ty },
            Err(error) => {
                let reason = Arc::from(error.reason());
                self.error(error);
                NodeKind::ErrorTypeRef { reason }
            }
        };
        replacement_type_ref(tree, type_ref, kind)
    }

    /// `owner` のスロットにある型参照を解決済みのものに置き換えます
    pub(super) fn resolve_type_ref_in_place(&mut self, tree: &mut Tree, owner: NodeId, type_ref: NodeId) -> Result<(), InternalError> {
        let scope = type_parameters_in_scope(tree, owner);
        let new = self.resolved_type_ref_node(tree, type_ref, &scope)?;
        if new != type_ref {
            tree.replace_type_ref(owner, type_ref, new)?;
        }
        Ok(())
    }

    /// 宣言に書かれた型（戻り値型・パラメータ型・境界・注釈の型）を解決します
    ///
    /// 省略された型は本体の解決まで暗黙の型参照のまま残ります。
    pub(super) fn resolve_types(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        for declaration in tree.declarations(file) {
            for (owner, type_ref) in declared_type_refs(tree, declaration) {
                self.resolve_type_ref_in_place(tree, owner, type_ref)?;
            }
            if let NodeKind::Constructor { owner, return_type_ref, .. } = tree.kind(declaration) {
                if matches!(tree.kind(*return_type_ref), NodeKind::ImplicitTypeRef) {
                    let ty = Type::class(owner.clone());
                    tree.set_resolved_type(declaration, ty)?;
                }
            }
        }
        Ok(())
    }
}

/// 古い型参照の注釈を引き継いだ置き換え用のノードを作ります
pub(super) fn replacement_type_ref(tree: &mut Tree, old: NodeId, kind: NodeKind) -> Result<NodeId, InternalError> {
    let node = tree.node(old);
    let (annotations, span) = (node.annotations.clone(), node.span);
    if !annotations.is_empty() {
        tree.detach(old)?;
    }
    tree.alloc(Node::with_span(kind, span).annotated(annotations))
}

/// 宣言が直接書いている、まだ解決されていない型参照と、それを持つノード
fn declared_type_refs(tree: &Tree, declaration: NodeId) -> Vec<(NodeId, NodeId)> {
    let node = tree.node(declaration);
    let mut refs = vec![];
    for &annotation in &node.annotations {
        if let NodeKind::AnnotationCall { annotation_type_ref, .. } = tree.kind(annotation) {
            refs.push((annotation, *annotation_type_ref));
        }
    }
    let type_parameters: &[NodeId] = match &node.kind {
        NodeKind::RegularClass { type_parameters, .. }
        | NodeKind::TypeAlias { type_parameters, .. }
        | NodeKind::Constructor { type_parameters, .. }
        | NodeKind::SimpleFunction { type_parameters, .. } => type_parameters,
        _ => &[],
    };
    for &parameter in type_parameters {
        if let NodeKind::TypeParameter { bounds, .. } = tree.kind(parameter) {
            refs.extend(bounds.iter().map(|&bound| (parameter, bound)));
        }
    }
    match &node.kind {
        NodeKind::SimpleFunction { receiver_type_ref, return_type_ref, .. } => {
            refs.extend(receiver_type_ref.map(|receiver| (declaration, receiver)));
            refs.push((declaration, *return_type_ref));
        }
        NodeKind::Property { return_type_ref, .. } | NodeKind::ValueParameter { return_type_ref, .. } => {
            refs.push((declaration, *return_type_ref));
        }
        NodeKind::TypeAlias { expanded_type_ref, .. } => refs.push((declaration, *expanded_type_ref)),
        _ => {}
    }
    refs.retain(|&(_, type_ref)| {
        let kind = tree.kind(type_ref);
        kind.is_unresolved_type_ref() && !matches!(kind, NodeKind::ImplicitTypeRef)
    });
    refs
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use typed_arena::Arena;
    use crate::symbol::SymbolTable;
    use crate::syntax::{RawKind, RawTreeBuilder};
    use crate::tree::{build_file, NodeKind, Tree};
    use crate::types::Type;
    use crate::resolve::{ResolveStep, Resolver};

    fn resolve_through_types(tree: &mut Tree, file: crate::tree::NodeId) -> Resolver {
        let mut resolver = Resolver::new(Arc::new(SymbolTable::new()));
        for step in [ResolveStep::Imports, ResolveStep::Supertypes, ResolveStep::Types] {
            resolver.run_step(tree, file, step).unwrap();
        }
        resolver
    }

    #[test]
    fn test_declared_types_are_resolved() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let function = raw.function("pick", vec![
            raw.node(RawKind::TypeParameter, "T", vec![]),
            raw.parameter("value", raw.user_type("T", vec![])),
            raw.parameter("fallback", raw.nullable_type("String")),
            raw.user_type("Box", vec![raw.user_type("T", vec![])]),
            raw.block(vec![]),
        ]);
        let class = raw.class("Box", vec![raw.node(RawKind::TypeParameter, "E", vec![])]);
        let file = raw.file("a.kt", vec![class, function]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let resolver = resolve_through_types(&mut tree, file);
        assert!(resolver.errors.is_empty());

        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        let NodeKind::SimpleFunction { value_parameters, return_type_ref, .. } = tree.kind(declarations[1]) else {
            panic!("function expected")
        };
        assert_eq!(tree.expression_type(value_parameters[0]).unwrap(), Type::TypeParameter(Arc::from("T")));
        assert_eq!(tree.expression_type(value_parameters[1]).unwrap(), Type::String.nullable());
        let NodeKind::ResolvedTypeRef { ty } = tree.kind(*return_type_ref) else { panic!("resolved type expected") };
        assert_eq!(format!("{:?}", ty), "Box<T>");
    }

    #[test]
    fn test_unknown_type_becomes_error_type_ref() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let property = raw.property("p", vec![raw.user_type("Missing", vec![])]);
        let file = raw.file("a.kt", vec![property]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let resolver = resolve_through_types(&mut tree, file);
        assert_eq!(resolver.errors.len(), 1);
        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        let NodeKind::Property { return_type_ref, .. } = tree.kind(declarations[0]) else { panic!("property expected") };
        assert!(matches!(tree.kind(*return_type_ref), NodeKind::ErrorTypeRef { reason } if reason.as_ref() == "Unresolved type: Missing"));
    }
}
