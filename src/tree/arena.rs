use std::collections::{HashMap, HashSet};
use la_arena::Arena;
use itertools::Itertools;
use crate::errors::InternalError;
use crate::symbol::{ClassId, Symbol};
use crate::types::Type;
use super::capability::Capabilities;
use super::core::*;

/// 子スロットの位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPosition {
    Annotation(usize),
    /// `NodeKind::slots` の添字
    Structural(usize),
}

/// 走査で訪れる一つの子スロット
///
/// `owner` は子を実際に所有するノードです。クラスが代わりに訪れる
/// コンストラクタの型パラメータでは、`owner` はクラスではなくコンストラクタになります。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub owner: NodeId,
    pub position: SlotPosition,
    pub child: NodeId,
    pub required: Capabilities,
}

/// 一つの翻訳単位の木
///
/// ノードはアリーナに置かれ、`NodeId` で参照されます。
/// 所有関係は `owners` に記録され、同じ子を二つの親が持つことはできません。
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Arena<Node>,
    owners: HashMap<NodeId, NodeId>,
    detached: HashSet<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        (u32::from(id.into_raw()) as usize) < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    /// 子を所有している親。囲むスコープを辿るための非所有の参照です
    pub fn owner(&self, id: NodeId) -> Option<NodeId> {
        self.owners.get(&id).copied()
    }

    pub fn is_detached(&self, id: NodeId) -> bool {
        self.detached.contains(&id)
    }

    /// 診断用の `Kind#n` 形式の名前
    pub fn describe(&self, id: NodeId) -> String {
        let index = u32::from(id.into_raw());
        if self.contains(id) {
            format!("{}#{}", self.nodes[id].kind.name(), index)
        } else {
            format!("<dangling>#{}", index)
        }
    }

    /// ノードを確保し、すべての子を所有します
    ///
    /// 子が要求される契約を満たさない、すでに他のノードに所有されている、
    /// 切り離し済みである、のいずれかの場合はスキーマ違反です。
    pub fn alloc(&mut self, mut node: Node) -> Result<NodeId, InternalError> {
        let name = node.kind.name();
        if !node.annotations.is_empty() && !node.kind.capabilities().contains(Capabilities::ANNOTATED) {
            return Err(InternalError::SchemaViolation {
                node: name.to_string(),
                reason: "annotations are not allowed on this node".to_string(),
            });
        }
        if let NodeKind::ComponentCall { component_index: 0, .. } = node.kind {
            return Err(InternalError::SchemaViolation {
                node: name.to_string(),
                reason: "component index starts at 1".to_string(),
            });
        }
        let children = node.annotations.iter()
            .map(|&annotation| (annotation, Capabilities::ANNOTATION))
            .chain(node.kind.slots())
            .collect_vec();
        let mut seen = HashSet::new();
        for &(child, required) in &children {
            self.check_child(name, child, required)?;
            if !seen.insert(child) {
                return Err(InternalError::SchemaViolation {
                    node: name.to_string(),
                    reason: format!("{} appears in two slots", self.describe(child)),
                });
            }
        }
        let companion = match &node.kind {
            NodeKind::RegularClass { declarations, .. } => self.find_companion(declarations),
            _ => None,
        };
        if let NodeKind::RegularClass { companion_object, .. } = &mut node.kind {
            *companion_object = companion;
        }
        let id = self.nodes.alloc(node);
        for (child, _) in children {
            self.owners.insert(child, id);
        }
        Ok(id)
    }

    /// 子を持たない解決済みの型参照を作ります
    pub fn resolved_type_ref(&mut self, ty: Type) -> NodeId {
        self.nodes.alloc(Node::new(NodeKind::ResolvedTypeRef { ty }))
    }

    pub fn implicit_type_ref(&mut self) -> NodeId {
        self.nodes.alloc(Node::new(NodeKind::ImplicitTypeRef))
    }

    fn check_child(&self, owner: &str, child: NodeId, required: Capabilities) -> Result<(), InternalError> {
        let violation = |reason: String| InternalError::SchemaViolation { node: owner.to_string(), reason };
        if !self.contains(child) {
            return Err(violation(format!("{} does not exist", self.describe(child))));
        }
        if self.detached.contains(&child) {
            return Err(violation(format!("{} was detached and cannot be reused", self.describe(child))));
        }
        if let Some(&current) = self.owners.get(&child) {
            return Err(violation(format!("{} is already owned by {}", self.describe(child), self.describe(current))));
        }
        let actual = self.nodes[child].kind.capabilities();
        if !actual.contains(required) {
            return Err(violation(format!("{} does not satisfy {:?}", self.describe(child), required)));
        }
        Ok(())
    }

    fn find_companion(&self, declarations: &[NodeId]) -> Option<NodeId> {
        declarations.iter().copied().find(|&declaration| matches!(
            &self.nodes[declaration].kind,
            NodeKind::RegularClass { status, .. } if status.is_companion
        ))
    }

    pub(crate) fn recompute_companion(&mut self, id: NodeId) {
        let companion = match &self.nodes[id].kind {
            NodeKind::RegularClass { declarations, .. } => self.find_companion(declarations),
            _ => return,
        };
        if let NodeKind::RegularClass { companion_object, .. } = &mut self.nodes[id].kind {
            *companion_object = companion;
        }
    }

    fn first_constructor(&self, declarations: &[NodeId]) -> Option<NodeId> {
        declarations.iter().copied()
            .find(|&declaration| matches!(self.nodes[declaration].kind, NodeKind::Constructor { .. }))
    }

    /// 走査の順序に並べた子スロット
    ///
    /// 注釈、型パラメータ、主要な部分構造、末尾の構造の順です。
    /// クラスは自身の型パラメータの直後に最初のコンストラクタの型パラメータを訪れ、
    /// コンストラクタ自身はそれらを訪れません。
    pub fn slots(&self, id: NodeId) -> Vec<Slot> {
        let node = &self.nodes[id];
        let mut slots = node.annotations.iter().enumerate()
            .map(|(index, &child)| Slot {
                owner: id,
                position: SlotPosition::Annotation(index),
                child,
                required: Capabilities::ANNOTATION,
            })
            .collect_vec();
        let own = node.kind.slots().into_iter().enumerate()
            .map(|(index, (child, required))| Slot {
                owner: id,
                position: SlotPosition::Structural(index),
                child,
                required,
            })
            .collect_vec();
        match &node.kind {
            NodeKind::RegularClass { type_parameters, declarations, .. } => {
                let (leading, rest) = own.split_at(type_parameters.len());
                slots.extend_from_slice(leading);
                if let Some(constructor) = self.first_constructor(declarations) {
                    slots.extend(self.constructor_type_parameter_slots(constructor));
                }
                slots.extend_from_slice(rest);
            }
            NodeKind::Constructor { type_parameters, .. } => {
                slots.extend(own.into_iter().skip(type_parameters.len()));
            }
            _ => slots.extend(own),
        }
        slots
    }

    fn constructor_type_parameter_slots(&self, constructor: NodeId) -> Vec<Slot> {
        match &self.nodes[constructor].kind {
            NodeKind::Constructor { type_parameters, .. } => type_parameters.iter().enumerate()
                .map(|(index, &child)| Slot {
                    owner: constructor,
                    position: SlotPosition::Structural(index),
                    child,
                    required: Capabilities::TYPE_PARAMETER,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// 走査の順序に並べた子
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.slots(id).into_iter().map(|slot| slot.child).collect()
    }

    pub fn slot_value(&self, slot: &Slot) -> Option<NodeId> {
        let node = &self.nodes[slot.owner];
        match slot.position {
            SlotPosition::Annotation(index) => node.annotations.get(index).copied(),
            SlotPosition::Structural(index) => node.kind.slots().get(index).map(|&(child, _)| child),
        }
    }

    /// スロットの値を差し替えます。古い子は切り離されます
    pub fn set_slot(&mut self, slot: &Slot, new: NodeId) -> Result<(), InternalError> {
        if new == slot.child {
            return Ok(());
        }
        let owner_name = self.describe(slot.owner);
        if self.slot_value(slot) != Some(slot.child) {
            return Err(InternalError::SchemaViolation {
                node: owner_name,
                reason: format!("slot {:?} no longer holds {}", slot.position, self.describe(slot.child)),
            });
        }
        self.check_child(&owner_name, new, slot.required)?;
        self.release(slot.owner, slot.child);
        self.owners.insert(new, slot.owner);
        let node = &mut self.nodes[slot.owner];
        match slot.position {
            SlotPosition::Annotation(index) => node.annotations[index] = new,
            SlotPosition::Structural(index) => match node.kind.slots_mut().into_iter().nth(index) {
                Some(value) => *value = new,
                None => return Err(InternalError::SchemaViolation {
                    node: owner_name,
                    reason: format!("no slot at {}", index),
                }),
            },
        }
        Ok(())
    }

    fn release(&mut self, owner: NodeId, child: NodeId) {
        if self.owners.get(&child) == Some(&owner) {
            self.owners.remove(&child);
        }
        self.detached.insert(child);
    }

    /// ノードを切り離し、その子を別のノードへ移せるようにします
    ///
    /// 切り離したノードは二度と木から到達できてはいけません。
    pub fn detach(&mut self, id: NodeId) -> Result<(), InternalError> {
        if !self.contains(id) || self.detached.contains(&id) {
            return Err(InternalError::SchemaViolation {
                node: self.describe(id),
                reason: "node is already detached".to_string(),
            });
        }
        let node = &self.nodes[id];
        let children = node.annotations.iter().copied()
            .chain(node.kind.slots().into_iter().map(|(child, _)| child))
            .collect_vec();
        for child in children {
            if self.owners.get(&child) == Some(&id) {
                self.owners.remove(&child);
            }
        }
        self.detached.insert(id);
        Ok(())
    }

    /// 到達可能な木全体の所有関係と契約を検査します
    pub fn verify(&self, root: NodeId) -> Result<(), InternalError> {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        if self.detached.contains(&root) {
            return Err(InternalError::SchemaViolation {
                node: self.describe(root),
                reason: "root is detached".to_string(),
            });
        }
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return Err(InternalError::SchemaViolation {
                    node: self.describe(id),
                    reason: "node is reachable twice".to_string(),
                });
            }
            let node = &self.nodes[id];
            if !node.annotations.is_empty() && !node.kind.capabilities().contains(Capabilities::ANNOTATED) {
                return Err(InternalError::SchemaViolation {
                    node: self.describe(id),
                    reason: "annotations are not allowed on this node".to_string(),
                });
            }
            let children = node.annotations.iter()
                .map(|&annotation| (annotation, Capabilities::ANNOTATION))
                .chain(node.kind.slots());
            for (child, required) in children {
                let violation = |reason: String| InternalError::SchemaViolation { node: self.describe(id), reason };
                if !self.contains(child) {
                    return Err(violation(format!("{} does not exist", self.describe(child))));
                }
                if self.detached.contains(&child) {
                    return Err(violation(format!("detached {} is reachable", self.describe(child))));
                }
                if self.owners.get(&child) != Some(&id) {
                    return Err(violation(format!("{} is not owned by its parent", self.describe(child))));
                }
                if !self.nodes[child].kind.capabilities().contains(required) {
                    return Err(violation(format!("{} does not satisfy {:?}", self.describe(child), required)));
                }
                stack.push(child);
            }
        }
        Ok(())
    }

    /// 二つの部分木を、アリーナの添字と非所有の関連を無視して比較します
    pub fn structurally_equal(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let left = &self.nodes[a];
        let right = &other.nodes[b];
        if left.kind.shape() != right.kind.shape() || left.annotations.len() != right.annotations.len() {
            return false;
        }
        let left_children = left.annotations.iter().copied()
            .chain(left.kind.slots().into_iter().map(|(child, _)| child));
        let right_children = right.annotations.iter().copied()
            .chain(right.kind.slots().into_iter().map(|(child, _)| child));
        left_children.zip_longest(right_children).all(|pair| match pair {
            itertools::EitherOrBoth::Both(l, r) => self.structurally_equal(l, other, r),
            _ => false,
        })
    }

    fn illegal_slot(&self, id: NodeId, slot: &'static str) -> InternalError {
        InternalError::IllegalSlot { node: self.describe(id), slot }
    }

    /// 未解決の型参照を差し替えます
    ///
    /// `old` は `owner` の型参照スロットにあり、まだ暗黙・ユーザー・関数型の参照でなければなりません。
    pub fn replace_type_ref(&mut self, owner: NodeId, old: NodeId, new: NodeId) -> Result<(), InternalError> {
        let position = self.nodes[owner].kind.slots().into_iter()
            .position(|(child, required)| child == old && required == Capabilities::TYPE_REF)
            .ok_or_else(|| self.illegal_slot(owner, "type_ref"))?;
        if !self.nodes[old].kind.is_unresolved_type_ref() {
            return Err(self.illegal_slot(owner, "type_ref"));
        }
        let slot = Slot {
            owner,
            position: SlotPosition::Structural(position),
            child: old,
            required: Capabilities::TYPE_REF,
        };
        self.set_slot(&slot, new)
    }

    /// 式または宣言自身の型スロットを解決済みの型で置き換えます
    pub fn set_resolved_type(&mut self, id: NodeId, ty: Type) -> Result<(), InternalError> {
        let old = self.nodes[id].kind.type_ref().ok_or_else(|| self.illegal_slot(id, "type_ref"))?;
        let new = self.resolved_type_ref(ty);
        self.replace_type_ref(id, old, new)
    }

    pub fn replace_callee_reference(&mut self, id: NodeId, new: NodeId) -> Result<(), InternalError> {
        let old = self.nodes[id].kind.callee().ok_or_else(|| self.illegal_slot(id, "callee_reference"))?;
        let (position, required) = self.nodes[id].kind.slots().into_iter()
            .find_position(|&(child, _)| child == old)
            .map(|(position, (_, required))| (position, required))
            .ok_or_else(|| self.illegal_slot(id, "callee_reference"))?;
        let slot = Slot { owner: id, position: SlotPosition::Structural(position), child: old, required };
        self.set_slot(&slot, new)
    }

    /// `this` 参照の束縛先を設定します。再解決のため上書きできます
    pub fn bind_this_reference(&mut self, id: NodeId, symbol: Symbol) -> Result<(), InternalError> {
        match &mut self.nodes[id].kind {
            NodeKind::ExplicitThisReference { bound_symbol, .. } => {
                *bound_symbol = Some(symbol);
                Ok(())
            }
            _ => Err(self.illegal_slot(id, "bound_symbol")),
        }
    }

    /// 上位型の参照リストを差し替えます。新しいリストに残らなかった参照は切り離されます
    pub fn replace_super_type_refs(&mut self, id: NodeId, new_refs: Vec<NodeId>) -> Result<(), InternalError> {
        let old = match &self.nodes[id].kind {
            NodeKind::RegularClass { super_type_refs, .. } => super_type_refs.clone(),
            _ => return Err(self.illegal_slot(id, "super_type_refs")),
        };
        let owner_name = self.describe(id);
        if !new_refs.iter().all_unique() {
            return Err(InternalError::SchemaViolation {
                node: owner_name,
                reason: "duplicate super type reference".to_string(),
            });
        }
        for &new in new_refs.iter().filter(|new| !old.contains(new)) {
            self.check_child(&owner_name, new, Capabilities::TYPE_REF)?;
        }
        for &removed in old.iter().filter(|old| !new_refs.contains(old)) {
            self.release(id, removed);
        }
        for &new in &new_refs {
            self.owners.insert(new, id);
        }
        if let NodeKind::RegularClass { super_type_refs, .. } = &mut self.nodes[id].kind {
            *super_type_refs = new_refs;
        }
        Ok(())
    }

    /// 上位型の計算状態を進めます。`NotComputed → Computing → Computed` の順だけが許されます
    pub fn set_supertypes_status(&mut self, id: NodeId, status: SupertypesComputationStatus) -> Result<(), InternalError> {
        use SupertypesComputationStatus as S;
        let current = self.nodes[id].kind.supertypes_status()
            .ok_or_else(|| self.illegal_slot(id, "supertypes_status"))?;
        let legal = matches!((current, status), (S::NotComputed, S::Computing) | (S::Computing, S::Computed));
        if !legal {
            return Err(self.illegal_slot(id, "supertypes_status"));
        }
        if let Some(slot) = self.nodes[id].kind.supertypes_status_mut() {
            *slot = status;
        }
        Ok(())
    }

    /// 修飾子から決まった宣言の状態を書き戻します
    pub fn resolve_status(&mut self, id: NodeId, resolved: DeclarationStatus) -> Result<(), InternalError> {
        match &mut self.nodes[id].kind {
            NodeKind::RegularClass { status, .. }
            | NodeKind::SimpleFunction { status, .. }
            | NodeKind::Property { status, .. } => {
                *status = resolved;
                Ok(())
            }
            _ => Err(self.illegal_slot(id, "status")),
        }
    }

    /// `break`/`continue` をループに、`return` を関数に結びつけます
    pub fn bind_jump_target(&mut self, id: NodeId, target: NodeId) -> Result<(), InternalError> {
        let required = match &self.nodes[id].kind {
            NodeKind::Break { .. } | NodeKind::Continue { .. } => Capabilities::LOOP,
            NodeKind::Return { .. } => Capabilities::CALLABLE,
            _ => return Err(self.illegal_slot(id, "target")),
        };
        if !self.contains(target) || !self.nodes[target].kind.capabilities().contains(required) {
            return Err(InternalError::SchemaViolation {
                node: self.describe(id),
                reason: format!("jump target {} does not satisfy {:?}", self.describe(target), required),
            });
        }
        match &mut self.nodes[id].kind {
            NodeKind::Break { target: slot, .. }
            | NodeKind::Continue { target: slot, .. }
            | NodeKind::Return { target: slot, .. } => *slot = Some(target),
            _ => {}
        }
        Ok(())
    }

    /// 本体解決済みの関数にフローグラフへの参照を一度だけ取り付けます
    pub fn attach_control_flow_graph(&mut self, function: NodeId, reference: NodeId) -> Result<(), InternalError> {
        self.require_phase(function, ResolvePhase::BodyResolved)?;
        match &self.nodes[function].kind {
            NodeKind::SimpleFunction { control_flow_graph: None, .. } => {}
            _ => return Err(self.illegal_slot(function, "control_flow_graph")),
        }
        let owner_name = self.describe(function);
        self.check_child(&owner_name, reference, Capabilities::CONTROL_FLOW_GRAPH_REFERENCE)?;
        self.owners.insert(reference, function);
        if let NodeKind::SimpleFunction { control_flow_graph, .. } = &mut self.nodes[function].kind {
            *control_flow_graph = Some(reference);
        }
        Ok(())
    }

    pub fn resolve_import(&mut self, id: NodeId, class_id: ClassId) -> Result<(), InternalError> {
        match &mut self.nodes[id].kind {
            NodeKind::Import { resolved, .. } => {
                *resolved = Some(class_id);
                Ok(())
            }
            _ => Err(self.illegal_slot(id, "resolved")),
        }
    }

    pub fn phase(&self, id: NodeId) -> Option<ResolvePhase> {
        self.nodes[id].kind.phase()
    }

    /// 宣言のフェーズをちょうど一段進めます
    pub fn advance_phase(&mut self, id: NodeId, to: ResolvePhase) -> Result<(), InternalError> {
        let kind = &self.nodes[id].kind;
        let from = kind.phase().ok_or_else(|| self.illegal_slot(id, "phase"))?;
        if from.next() != Some(to) {
            return Err(InternalError::IllegalPhaseTransition { node: self.describe(id), from, to });
        }
        if let Some(status) = kind.supertypes_status() {
            if to >= ResolvePhase::SupertypesResolved && status != SupertypesComputationStatus::Computed {
                return Err(InternalError::PrerequisiteUnmet {
                    node: self.describe(id),
                    phase: to,
                    reason: format!("supertypes are {:?}", status),
                });
            }
        }
        if let Some(phase) = self.nodes[id].kind.phase_mut() {
            *phase = to;
        }
        Ok(())
    }

    /// 宣言が `required` 以上のフェーズにあることを確かめます。宣言以外は常に通ります
    pub fn require_phase(&self, id: NodeId, required: ResolvePhase) -> Result<(), InternalError> {
        match self.nodes[id].kind.phase() {
            Some(actual) if actual < required => Err(InternalError::PhasePrecondition {
                node: self.describe(id),
                required,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// 式の静的な型。型スロットがまだ未解決なら内部エラーです
    pub fn expression_type(&self, id: NodeId) -> Result<Type, InternalError> {
        let type_ref = self.nodes[id].kind.type_ref().ok_or_else(|| self.illegal_slot(id, "type_ref"))?;
        match &self.nodes[type_ref].kind {
            NodeKind::ResolvedTypeRef { ty } => Ok(ty.clone()),
            NodeKind::ErrorTypeRef { reason } => Ok(Type::Error(reason.clone())),
            _ => Err(InternalError::TypeNotResolved { node: self.describe(id) }),
        }
    }

    /// 到達可能な宣言を前順で列挙します
    pub fn declarations(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = vec![];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.nodes[id].kind.phase().is_some() {
                result.push(id);
            }
            stack.extend(self.children(id).into_iter().rev());
        }
        result
    }
}

/// テスト用の、どのノードも指さない添字
#[cfg(test)]
pub(crate) fn dangling() -> NodeId {
    la_arena::Idx::from_raw(la_arena::RawIdx::from(u32::MAX - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn int_const(tree: &mut Tree, value: i32) -> NodeId {
        let type_ref = tree.implicit_type_ref();
        tree.alloc(Node::new(NodeKind::Const { value: ConstValue::Int(value), type_ref })).unwrap()
    }

    fn block(tree: &mut Tree, statements: Vec<NodeId>) -> NodeId {
        let type_ref = tree.implicit_type_ref();
        tree.alloc(Node::new(NodeKind::Block { type_ref, statements })).unwrap()
    }

    #[test]
    fn test_alloc_rejects_aliasing() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        let _first = block(&mut tree, vec![one]);
        let type_ref = tree.implicit_type_ref();
        let result = tree.alloc(Node::new(NodeKind::Block { type_ref, statements: vec![one] }));
        assert!(matches!(result, Err(InternalError::SchemaViolation { .. })));
    }

    #[test]
    fn test_alloc_rejects_unmet_capability() {
        let mut tree = Tree::new();
        let not_a_type = int_const(&mut tree, 1);
        let result = tree.alloc(Node::new(NodeKind::TypeProjectionWithVariance {
            variance: crate::types::Variance::Out,
            type_ref: not_a_type,
        }));
        assert!(matches!(result, Err(InternalError::SchemaViolation { .. })));
    }

    #[test]
    fn test_alloc_rejects_annotations_on_implicit_type_ref() {
        let mut tree = Tree::new();
        let annotation_type = tree.resolved_type_ref(Type::Any);
        let annotation = tree.alloc(Node::new(NodeKind::AnnotationCall {
            annotation_type_ref: annotation_type,
            arguments: vec![],
        })).unwrap();
        let result = tree.alloc(Node::new(NodeKind::ImplicitTypeRef).annotated(vec![annotation]));
        assert!(matches!(result, Err(InternalError::SchemaViolation { .. })));
    }

    #[test]
    fn test_alloc_rejects_dangling_child() {
        let mut tree = Tree::new();
        let result = tree.alloc(Node::new(NodeKind::Const { value: ConstValue::Null, type_ref: dangling() }));
        assert!(result.is_err());
    }

    #[test]
    fn test_type_ref_is_replaced_once() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        tree.set_resolved_type(one, Type::int()).unwrap();
        assert_eq!(tree.expression_type(one).unwrap(), Type::int());
        let again = tree.set_resolved_type(one, Type::long());
        assert!(matches!(again, Err(InternalError::IllegalSlot { slot: "type_ref", .. })));
    }

    #[test]
    fn test_reading_placeholder_type_fails() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        assert!(matches!(tree.expression_type(one), Err(InternalError::TypeNotResolved { .. })));
    }

    #[test]
    fn test_detach_releases_children() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        let old = block(&mut tree, vec![one]);
        tree.detach(old).unwrap();
        let new = block(&mut tree, vec![one]);
        assert_eq!(tree.owner(one), Some(new));
        assert!(tree.verify(new).is_ok());
        assert!(tree.detach(old).is_err());
    }

    #[test]
    fn test_verify_finds_reachable_detached_node() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        let root = block(&mut tree, vec![one]);
        tree.detach(one).unwrap();
        assert!(tree.verify(root).is_err());
    }

    #[test]
    fn test_phase_advances_one_step() {
        let mut tree = Tree::new();
        let file = tree.alloc(Node::new(NodeKind::File {
            name: Arc::from("a.kt"),
            package: Arc::from(""),
            imports: vec![],
            declarations: vec![],
            phase: ResolvePhase::RawIr,
        })).unwrap();
        assert!(matches!(
            tree.advance_phase(file, ResolvePhase::TypesResolved),
            Err(InternalError::IllegalPhaseTransition { .. })
        ));
        tree.advance_phase(file, ResolvePhase::ImportsResolved).unwrap();
        assert_eq!(tree.phase(file), Some(ResolvePhase::ImportsResolved));
        assert!(matches!(
            tree.require_phase(file, ResolvePhase::BodyResolved),
            Err(InternalError::PhasePrecondition { .. })
        ));
    }

    #[test]
    fn test_structural_equality_ignores_indices() {
        let mut left = Tree::new();
        let one = int_const(&mut left, 1);
        let a = block(&mut left, vec![one]);

        let mut right = Tree::new();
        let _padding = right.implicit_type_ref();
        let one = int_const(&mut right, 1);
        let b = block(&mut right, vec![one]);
        assert!(left.structurally_equal(a, &right, b));

        let two = int_const(&mut right, 2);
        let c = block(&mut right, vec![two]);
        assert!(!left.structurally_equal(a, &right, c));
    }
}
