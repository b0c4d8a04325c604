use crate::errors::InternalError;
use crate::symbol::{ClassId, Symbol};
use crate::tree::{ClassKind, DeclarationStatus, Modality, NodeId, NodeKind, Tree};
use crate::types::Type;
use super::core::Resolver;

/// 宣言を直接含むクラスの種類。トップレベルやローカルの宣言では `None`
fn containing_class_kind(tree: &Tree, id: NodeId) -> Option<ClassKind> {
    match tree.owner(id).map(|owner| tree.kind(owner)) {
        Some(NodeKind::RegularClass { class_kind, .. }) => Some(*class_kind),
        _ => None,
    }
}

fn default_member_modality(container: Option<ClassKind>, status: &DeclarationStatus, has_body: bool) -> Modality {
    match container {
        Some(ClassKind::Interface) if has_body => Modality::Open,
        Some(ClassKind::Interface) => Modality::Abstract,
        _ if status.is_override => Modality::Open,
        _ => Modality::Final,
    }
}

impl Resolver {
    /// 修飾子で指定されなかった可視性以外の状態（モダリティ）を確定させます
    pub(super) fn resolve_statuses(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        for declaration in tree.declarations(file) {
            let container = containing_class_kind(tree, declaration);
            let (mut status, modality) = match tree.kind(declaration) {
                NodeKind::RegularClass { status, class_kind, .. } => {
                    let modality = match class_kind {
                        ClassKind::Interface => Modality::Abstract,
                        _ => Modality::Final,
                    };
                    (status.clone(), modality)
                }
                NodeKind::SimpleFunction { status, body, .. } =>
                    (status.clone(), default_member_modality(container, status, body.is_some())),
                NodeKind::Property { status, initializer, .. } =>
                    (status.clone(), default_member_modality(container, status, initializer.is_some())),
                _ => continue,
            };
            if status.modality.is_none() {
                status.modality = Some(modality);
                tree.resolve_status(declaration, status)?;
            }
        }
        Ok(())
    }

    /// 委譲先のコンストラクタ呼び出しと `super`/`this` 参照を解決します
    pub(super) fn resolve_declarations(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        for declaration in tree.declarations(file) {
            let NodeKind::Constructor { owner, delegated_constructor: Some(call), .. } = tree.kind(declaration) else {
                continue;
            };
            let (owner, call) = (owner.clone(), *call);
            let NodeKind::DelegatedConstructorCall { is_this, constructed_type_ref, callee, .. } = tree.kind(call) else {
                continue;
            };
            let (is_this, constructed_type_ref, callee) = (*is_this, *constructed_type_ref, *callee);
            let constructed = if is_this {
                Type::class(owner.clone())
            } else {
                self.first_supertype(tree, &owner)
            };
            if tree.kind(constructed_type_ref).is_unresolved_type_ref() {
                let new = tree.resolved_type_ref(constructed.clone());
                tree.replace_type_ref(call, constructed_type_ref, new)?;
            }
            match tree.kind(callee) {
                NodeKind::ExplicitThisReference { .. } => tree.bind_this_reference(callee, Symbol::Class(owner))?,
                NodeKind::ExplicitSuperReference { super_type_ref } if tree.kind(*super_type_ref).is_unresolved_type_ref() => {
                    let old = *super_type_ref;
                    let new = tree.resolved_type_ref(constructed);
                    tree.replace_type_ref(callee, old, new)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// クラスが最初に挙げた解決済みの上位型。なければ `Any`
    fn first_supertype(&self, tree: &Tree, class_id: &ClassId) -> Type {
        let declared = self.local_class(class_id).and_then(|class| match tree.kind(class) {
            NodeKind::RegularClass { super_type_refs, .. } => super_type_refs.iter()
                .find_map(|&type_ref| match tree.kind(type_ref) {
                    NodeKind::ResolvedTypeRef { ty } => Some(ty.clone()),
                    _ => None,
                }),
            _ => None,
        });
        declared
            .or_else(|| self.symbols.class(class_id).and_then(|info| info.supertypes.first().cloned()))
            .unwrap_or(Type::Any)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use typed_arena::Arena;
    use crate::symbol::{ClassId, Symbol, SymbolTable};
    use crate::syntax::{RawKind, RawTreeBuilder};
    use crate::token::TokenKind;
    use crate::tree::{build_file, Modality, NodeKind, ResolvePhase, Tree};
    use crate::types::Type;
    use crate::resolve::{ResolveStep, Resolver};

    fn resolve_until(tree: &mut Tree, file: crate::tree::NodeId, last: ResolveStep) -> Resolver {
        let mut resolver = Resolver::new(Arc::new(SymbolTable::new()));
        for step in ResolveStep::ALL {
            resolver.run_step(tree, file, step).unwrap();
            if step == last {
                break;
            }
        }
        resolver
    }

    #[test]
    fn test_default_modalities() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let interface = raw.tagged(RawKind::Class, TokenKind::Interface, "Shape", vec![
            raw.function("area", vec![raw.user_type("Int", vec![])]),
            raw.function("name", vec![raw.user_type("String", vec![]), raw.block(vec![])]),
        ]);
        let class = raw.class("Square", vec![
            raw.function("area", vec![raw.modifiers("override", vec![]), raw.user_type("Int", vec![]), raw.block(vec![])]),
            raw.function("side", vec![raw.modifiers("open", vec![]), raw.block(vec![])]),
        ]);
        let file = raw.file("a.kt", vec![interface, class]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        resolve_until(&mut tree, file, ResolveStep::Status);
        assert_eq!(tree.phase(file), Some(ResolvePhase::StatusResolved));

        let modality = |tree: &Tree, id| match tree.kind(id) {
            NodeKind::RegularClass { status, .. } | NodeKind::SimpleFunction { status, .. } => status.modality,
            _ => None,
        };
        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        let (interface, class) = (declarations[0], declarations[1]);
        assert_eq!(modality(&tree, interface), Some(Modality::Abstract));
        assert_eq!(modality(&tree, class), Some(Modality::Final));
        let NodeKind::RegularClass { declarations: members, .. } = tree.kind(interface) else { panic!("class expected") };
        assert_eq!(modality(&tree, members[0]), Some(Modality::Abstract));
        assert_eq!(modality(&tree, members[1]), Some(Modality::Open));
        let NodeKind::RegularClass { declarations: members, .. } = tree.kind(class) else { panic!("class expected") };
        assert_eq!(modality(&tree, members[0]), Some(Modality::Open));
        assert_eq!(modality(&tree, members[1]), Some(Modality::Open));
    }

    #[test]
    fn test_delegated_constructor_calls_are_resolved() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let base = raw.tagged(RawKind::Class, TokenKind::Class, "Base", vec![raw.modifiers("open", vec![])]);
        let derived = raw.class("Derived", vec![
            raw.node(RawKind::SuperTypeEntry, "", vec![raw.user_type("Base", vec![])]),
            raw.node(RawKind::PrimaryConstructor, "", vec![
                raw.tagged(RawKind::ConstructorDelegationCall, TokenKind::Super, "", vec![]),
            ]),
            raw.node(RawKind::SecondaryConstructor, "", vec![
                raw.parameter("x", raw.user_type("Int", vec![])),
                raw.tagged(RawKind::ConstructorDelegationCall, TokenKind::This, "", vec![]),
            ]),
        ]);
        let file = raw.file("a.kt", vec![base, derived]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let resolver = resolve_until(&mut tree, file, ResolveStep::Declarations);
        assert!(!resolver.has_errors());

        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        let NodeKind::RegularClass { declarations: members, .. } = tree.kind(declarations[1]) else { panic!("class expected") };
        let delegated = |tree: &Tree, constructor| match tree.kind(constructor) {
            NodeKind::Constructor { delegated_constructor: Some(call), .. } => *call,
            _ => panic!("delegating constructor expected"),
        };
        let NodeKind::DelegatedConstructorCall { constructed_type_ref, callee, .. } = tree.kind(delegated(&tree, members[0])) else {
            panic!("delegated call expected")
        };
        assert!(matches!(tree.kind(*constructed_type_ref), NodeKind::ResolvedTypeRef { ty } if *ty == Type::class(ClassId::new("Base"))));
        assert!(matches!(tree.kind(*callee), NodeKind::ExplicitSuperReference { .. }));
        let NodeKind::DelegatedConstructorCall { callee, .. } = tree.kind(delegated(&tree, members[1])) else {
            panic!("delegated call expected")
        };
        assert!(matches!(
            tree.kind(*callee),
            NodeKind::ExplicitThisReference { bound_symbol: Some(Symbol::Class(id)), .. } if id.as_str() == "Derived"
        ));
    }
}
