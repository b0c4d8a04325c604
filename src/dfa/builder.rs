use std::collections::HashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;
use crate::errors::InternalError;
use crate::tree::{Node, NodeId, NodeKind, ResolvePhase, Tree, Visitor};
use super::cfg::*;

/// 本体を辿りながらグラフを作る訪問者
struct GraphBuilder {
    graph: DiGraph<FlowNode, EdgeKind>,
    /// 直前のノード。`None` はジャンプの後の到達不能な位置
    current: Option<NodeIndex>,
    /// ループ → (入口, 出口)
    loops: HashMap<NodeId, (NodeIndex, NodeIndex)>,
    exit: NodeIndex,
}

impl GraphBuilder {
    fn append(&mut self, kind: FlowNodeKind, element: NodeId) -> NodeIndex {
        let node = self.graph.add_node(FlowNode { kind, element });
        if let Some(previous) = self.current {
            self.graph.add_edge(previous, node, EdgeKind::Normal);
        }
        self.current = Some(node);
        node
    }

    fn jump(&mut self, element: NodeId, to: Option<NodeIndex>, kind: EdgeKind) {
        let node = self.append(FlowNodeKind::Jump, element);
        if let Some(to) = to {
            self.graph.add_edge(node, to, kind);
        }
        self.current = None;
    }
}

impl Visitor<()> for GraphBuilder {
    type Output = ();

    fn visit_element(&mut self, _tree: &Tree, id: NodeId, _: &mut ()) {
        self.append(FlowNodeKind::Statement, id);
    }

    fn visit_block(&mut self, tree: &Tree, id: NodeId, data: &mut ()) {
        if let NodeKind::Block { statements, .. } = tree.kind(id) {
            for &statement in statements {
                tree.accept(statement, self, data);
            }
        }
    }

    fn visit_while_loop(&mut self, tree: &Tree, id: NodeId, data: &mut ()) {
        let NodeKind::WhileLoop { condition, block, .. } = tree.kind(id) else { return };
        let enter = self.append(FlowNodeKind::LoopEnter, id);
        let exit = self.graph.add_node(FlowNode { kind: FlowNodeKind::LoopExit, element: id });
        self.loops.insert(id, (enter, exit));
        self.append(FlowNodeKind::LoopCondition, *condition);
        let check = self.current;
        tree.accept(*block, self, data);
        if let Some(last) = self.current {
            self.graph.add_edge(last, enter, EdgeKind::Back);
        }
        if let Some(check) = check {
            self.graph.add_edge(check, exit, EdgeKind::Normal);
        }
        self.current = Some(exit);
    }

    fn visit_do_while_loop(&mut self, tree: &Tree, id: NodeId, data: &mut ()) {
        let NodeKind::DoWhileLoop { block, condition, .. } = tree.kind(id) else { return };
        let enter = self.append(FlowNodeKind::LoopEnter, id);
        let exit = self.graph.add_node(FlowNode { kind: FlowNodeKind::LoopExit, element: id });
        self.loops.insert(id, (enter, exit));
        tree.accept(*block, self, data);
        let check = self.graph.add_node(FlowNode { kind: FlowNodeKind::LoopCondition, element: *condition });
        if let Some(last) = self.current {
            self.graph.add_edge(last, check, EdgeKind::Normal);
        }
        self.graph.add_edge(check, enter, EdgeKind::Back);
        self.graph.add_edge(check, exit, EdgeKind::Normal);
        self.current = Some(exit);
    }

    fn visit_break(&mut self, tree: &Tree, id: NodeId, _: &mut ()) {
        let target = match tree.kind(id) {
            NodeKind::Break { target: Some(target), .. } => self.loops.get(target).map(|&(_, exit)| exit),
            _ => None,
        };
        self.jump(id, target, EdgeKind::Jump);
    }

    fn visit_continue(&mut self, tree: &Tree, id: NodeId, _: &mut ()) {
        let target = match tree.kind(id) {
            NodeKind::Continue { target: Some(target), .. } => self.loops.get(target).map(|&(enter, _)| enter),
            _ => None,
        };
        self.jump(id, target, EdgeKind::Jump);
    }

    fn visit_return(&mut self, _tree: &Tree, id: NodeId, _: &mut ()) {
        let exit = self.exit;
        self.jump(id, Some(exit), EdgeKind::Jump);
    }
}

/// 本体解決済みの関数からフローグラフを作ります
pub fn build_graph(tree: &Tree, function: NodeId) -> Result<ControlFlowGraph, InternalError> {
    tree.require_phase(function, ResolvePhase::BodyResolved)?;
    let NodeKind::SimpleFunction { name, body, .. } = tree.kind(function) else {
        return Err(InternalError::IllegalSlot { node: tree.describe(function), slot: "control_flow_graph" });
    };
    let mut graph = DiGraph::new();
    let enter = graph.add_node(FlowNode { kind: FlowNodeKind::Enter, element: function });
    let exit = graph.add_node(FlowNode { kind: FlowNodeKind::Exit, element: function });
    let mut builder = GraphBuilder { graph, current: Some(enter), loops: HashMap::new(), exit };
    if let Some(body) = body {
        tree.accept(*body, &mut builder, &mut ());
    }
    if let Some(last) = builder.current {
        builder.graph.add_edge(last, exit, EdgeKind::Normal);
    }
    Ok(ControlFlowGraph { name: name.clone(), graph: builder.graph, enter, exit })
}

/// 本体を持つすべての関数にフローグラフを作って取り付けます。取り付けた数を返します
pub fn attach_graphs(tree: &mut Tree, root: NodeId, graphs: &mut FlowGraphs) -> Result<usize, InternalError> {
    let functions: Vec<NodeId> = tree.declarations(root).into_iter()
        .filter(|&id| matches!(
            tree.kind(id),
            NodeKind::SimpleFunction { body: Some(_), control_flow_graph: None, .. }
        ))
        .collect();
    for &function in &functions {
        let graph = build_graph(tree, function)?;
        debug!(function = %tree.describe(function), nodes = graph.node_count(), "built control flow graph");
        let id = graphs.add(graph);
        let reference = tree.alloc(Node::new(NodeKind::ControlFlowGraphReference { graph: id }))?;
        tree.attach_control_flow_graph(function, reference)?;
    }
    Ok(functions.len())
}

/// 取り付け済みのグラフを今の木から作り直し、同じ `GraphId` に差し替えます
///
/// 下げで置き換えられた文を指したままのグラフを残さないために、下げの後に呼びます。
pub fn rebuild_graphs(tree: &Tree, root: NodeId, graphs: &mut FlowGraphs) -> Result<usize, InternalError> {
    let mut rebuilt = 0;
    for function in tree.declarations(root) {
        let NodeKind::SimpleFunction { control_flow_graph: Some(reference), .. } = tree.kind(function) else { continue };
        let NodeKind::ControlFlowGraphReference { graph: id } = tree.kind(*reference) else { continue };
        let id = *id;
        let graph = build_graph(tree, function)?;
        if graphs.replace(id, graph).is_none() {
            return Err(InternalError::UnboundSymbol { symbol: format!("{:?}", id) });
        }
        rebuilt += 1;
    }
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use typed_arena::Arena;
    use crate::dfa::{attach_graphs, build_graph, rebuild_graphs, EdgeKind, FlowGraphs, FlowNodeKind};
    use crate::errors::InternalError;
    use crate::compiler::CancellationFlag;
    use crate::lower::{LoweringContext, PassManager};
    use crate::resolve::Resolver;
    use crate::symbol::SymbolTable;
    use crate::syntax::{RawKind, RawNode, RawTreeBuilder};
    use crate::tree::{build_file, NodeId, NodeKind, Tree};

    fn looping_function<'s>(raw: &RawTreeBuilder<'s>) -> &'s RawNode<'s> {
        let body = raw.block(vec![raw.node(RawKind::Break, "", vec![])]);
        let condition = raw.constant("true").unwrap();
        raw.function("spin", vec![raw.block(vec![
            raw.node(RawKind::DoWhile, "", vec![body, condition]),
            raw.node(RawKind::Return, "", vec![]),
        ])])
    }

    fn first_declaration(tree: &Tree, file: NodeId) -> NodeId {
        let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
        declarations[0]
    }

    #[test]
    fn test_graph_has_loop_and_jump_edges() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let file = raw.file("a.kt", vec![looping_function(&raw)]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        Resolver::new(Arc::new(SymbolTable::new())).resolve_fully(&mut tree, file).unwrap();

        let graph = build_graph(&tree, first_declaration(&tree, file)).unwrap();
        assert!(graph.exit_is_reachable());
        assert_eq!(graph.edge_count(EdgeKind::Back), 1);
        assert_eq!(graph.edge_count(EdgeKind::Jump), 2);
        assert_eq!(graph.nodes().filter(|node| node.kind == FlowNodeKind::LoopExit).count(), 1);
    }

    #[test]
    fn test_graphs_are_attached_once() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let file = raw.file("a.kt", vec![looping_function(&raw)]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        Resolver::new(Arc::new(SymbolTable::new())).resolve_fully(&mut tree, file).unwrap();

        let mut graphs = FlowGraphs::new();
        assert_eq!(attach_graphs(&mut tree, file, &mut graphs).unwrap(), 1);
        assert_eq!(attach_graphs(&mut tree, file, &mut graphs).unwrap(), 0);
        assert_eq!(graphs.len(), 1);
        let NodeKind::SimpleFunction { control_flow_graph: Some(reference), .. } = tree.kind(first_declaration(&tree, file)) else {
            panic!("graph reference expected")
        };
        let NodeKind::ControlFlowGraphReference { graph } = tree.kind(*reference) else { panic!("reference expected") };
        assert_eq!(graphs.get(*graph).map(|graph| graph.name.as_ref()), Some("spin"));
        assert!(tree.verify(file).is_ok());
    }

    #[test]
    fn test_rebuilt_graph_follows_lowered_statements() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let template = raw.template(vec![raw.literal_entry("a"), raw.expression_entry(raw.constant("1").unwrap())]);
        let file = raw.file("a.kt", vec![raw.function("show", vec![raw.block(vec![template])])]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let symbols = Arc::new(SymbolTable::new());
        Resolver::new(Arc::clone(&symbols)).resolve_fully(&mut tree, file).unwrap();
        let mut graphs = FlowGraphs::new();
        attach_graphs(&mut tree, file, &mut graphs).unwrap();

        let context = LoweringContext::new(symbols);
        let names = vec!["StringConcatenation".to_string()];
        PassManager::new(&names, true, &context).unwrap()
            .run(&mut tree, file, &CancellationFlag::new()).unwrap();
        let stale = |graphs: &FlowGraphs, tree: &Tree| graphs.iter()
            .flat_map(|graph| graph.nodes())
            .filter(|node| tree.is_detached(node.element))
            .count();
        assert_eq!(stale(&graphs, &tree), 1);

        assert_eq!(rebuild_graphs(&tree, file, &mut graphs).unwrap(), 1);
        assert_eq!(graphs.len(), 1);
        assert_eq!(stale(&graphs, &tree), 0);
        let NodeKind::SimpleFunction { control_flow_graph: Some(reference), .. } = tree.kind(first_declaration(&tree, file)) else {
            panic!("graph reference expected")
        };
        let NodeKind::ControlFlowGraphReference { graph } = tree.kind(*reference) else { panic!("reference expected") };
        assert!(graphs.get(*graph).unwrap().nodes().any(|node| matches!(tree.kind(node.element), NodeKind::FunctionCall { .. })));
    }

    #[test]
    fn test_unresolved_function_is_rejected() {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let file = raw.file("a.kt", vec![looping_function(&raw)]);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, file).unwrap();
        let result = build_graph(&tree, first_declaration(&tree, file));
        assert!(matches!(result, Err(InternalError::PhasePrecondition { .. })));
    }
}
