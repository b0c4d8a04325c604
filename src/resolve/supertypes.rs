use std::sync::Arc;
use crate::errors::{Error, InternalError};
use crate::symbol::ClassId;
use crate::tree::{NodeId, NodeKind, SupertypesComputationStatus, Tree};
use super::core::{type_parameters_in_scope, Resolver};
use super::types::replacement_type_ref;

fn class_id_of(tree: &Tree, id: NodeId) -> Option<ClassId> {
    match tree.kind(id) {
        NodeKind::RegularClass { class_id, .. } | NodeKind::TypeAlias { class_id, .. } => Some(class_id.clone()),
        _ => None,
    }
}

impl Resolver {
    /// すべてのクラスとタイプエイリアスの上位型を解決します
    pub(super) fn resolve_supertypes(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        let class_likes: Vec<NodeId> = tree.declarations(file).into_iter()
            .filter(|&id| tree.kind(id).supertypes_status().is_some())
            .collect();
        let mut chain = vec![];
        for id in class_likes {
            self.compute_supertypes(tree, id, &mut chain)?;
        }
        Ok(())
    }

    /// 一つのクラスの上位型を計算します
    ///
    /// 計算中のクラスに再び入った場合は循環として診断を報告し、
    /// 循環を閉じる参照をエラー型参照に置き換えます。
    fn compute_supertypes(&mut self, tree: &mut Tree, id: NodeId, chain: &mut Vec<NodeId>) -> Result<(), InternalError> {
        if tree.kind(id).supertypes_status() != Some(SupertypesComputationStatus::NotComputed) {
            return Ok(());
        }
        tree.set_supertypes_status(id, SupertypesComputationStatus::Computing)?;
        chain.push(id);
        match tree.kind(id).clone() {
            NodeKind::RegularClass { super_type_refs, .. } => {
                let mut resolved = Vec::with_capacity(super_type_refs.len());
                for type_ref in super_type_refs {
                    resolved.push(self.resolve_super_type_ref(tree, id, type_ref, chain)?);
                }
                tree.replace_super_type_refs(id, resolved)?;
            }
            NodeKind::TypeAlias { expanded_type_ref, .. } => {
                let resolved = self.resolve_super_type_ref(tree, id, expanded_type_ref, chain)?;
                if resolved != expanded_type_ref {
                    tree.replace_type_ref(id, expanded_type_ref, resolved)?;
                }
            }
            _ => {}
        }
        chain.pop();
        tree.set_supertypes_status(id, SupertypesComputationStatus::Computed)
    }

    fn resolve_super_type_ref(&mut self, tree: &mut Tree, owner: NodeId, type_ref: NodeId, chain: &mut Vec<NodeId>) -> Result<NodeId, InternalError> {
        let target = match tree.kind(type_ref) {
            NodeKind::UserTypeRef { qualifier, .. } => self.lookup_class(qualifier)
                .and_then(|class_id| self.local_class(&class_id)),
            _ => None,
        };
        if let Some(target) = target {
            match tree.kind(target).supertypes_status() {
                Some(SupertypesComputationStatus::Computing) => {
                    let start = chain.iter().position(|&id| id == target).unwrap_or(0);
                    let cycle: Vec<ClassId> = chain[start..].iter()
                        .chain(std::iter::once(&target))
                        .filter_map(|&id| class_id_of(tree, id))
                        .collect();
                    let error = Error::cyclic_supertype(cycle, tree.node(type_ref).span);
                    let reason = Arc::from(error.reason());
                    self.error(error);
                    return replacement_type_ref(tree, type_ref, NodeKind::ErrorTypeRef { reason });
                }
                Some(SupertypesComputationStatus::NotComputed) => self.compute_supertypes(tree, target, chain)?,
                _ => {}
            }
        }
        let scope = type_parameters_in_scope(tree, owner);
        self.resolved_type_ref_node(tree, type_ref, &scope)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use typed_arena::Arena;
    use crate::errors::{ErrorKind, ResolutionError};
    use crate::symbol::{ClassId, SymbolTable};
    use crate::syntax::{RawKind, RawTreeBuilder};
    use crate::tree::{build_file, NodeKind, SupertypesComputationStatus, Tree};
    use crate::types::Type;
    use crate::resolve::{ResolveStep, Resolver};

    #[test]
    fn test_cycle_is_reported_once() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let extends = |name: &str| raw.node(RawKind::SuperTypeEntry, "", vec![raw.user_type(name, vec![])]);
        let a = raw.class("A", vec![extends("B")]);
        let b = raw.class("B", vec![extends("A")]);
        let c = raw.class("C", vec![extends("A")]);
        let file = raw.file("a.kt", vec![a, b, c]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let mut resolver = Resolver::new(Arc::new(SymbolTable::new()));
        resolver.run_step(&mut tree, file, ResolveStep::Imports).unwrap();
        resolver.run_step(&mut tree, file, ResolveStep::Supertypes).unwrap();

        assert_eq!(resolver.errors.len(), 1);
        let ErrorKind::ResolutionError(ResolutionError::CyclicSupertype { chain }) = &resolver.errors[0].kind else {
            panic!("cycle expected")
        };
        assert_eq!(chain, &vec![ClassId::new("A"), ClassId::new("B"), ClassId::new("A")]);

        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        for &class in declarations {
            assert_eq!(tree.kind(class).supertypes_status(), Some(SupertypesComputationStatus::Computed));
        }
        let NodeKind::RegularClass { super_type_refs, .. } = tree.kind(declarations[1]) else { panic!("class expected") };
        assert!(matches!(tree.kind(super_type_refs[0]), NodeKind::ErrorTypeRef { .. }));
        let NodeKind::RegularClass { super_type_refs, .. } = tree.kind(declarations[0]) else { panic!("class expected") };
        assert!(matches!(tree.kind(super_type_refs[0]), NodeKind::ResolvedTypeRef { ty } if *ty == Type::class(ClassId::new("B"))));
        assert!(tree.verify(file).is_ok());
    }

    #[test]
    fn test_alias_expansion_is_resolved() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let alias = raw.node(RawKind::TypeAlias, "Name", vec![raw.user_type("String", vec![])]);
        let file = raw.file("a.kt", vec![alias]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let mut resolver = Resolver::new(Arc::new(SymbolTable::new()));
        resolver.run_step(&mut tree, file, ResolveStep::Imports).unwrap();
        resolver.run_step(&mut tree, file, ResolveStep::Supertypes).unwrap();
        assert!(!resolver.has_errors());
        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        let NodeKind::TypeAlias { expanded_type_ref, .. } = tree.kind(declarations[0]) else { panic!("alias expected") };
        assert!(matches!(tree.kind(*expanded_type_ref), NodeKind::ResolvedTypeRef { ty: Type::String }));
    }
}
