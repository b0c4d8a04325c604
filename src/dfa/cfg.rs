use std::fmt;
use std::sync::Arc;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use crate::tree::NodeId;

/// フローグラフ置き場の中の一つのグラフを指す不透明な値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowNodeKind {
    Enter,
    Exit,
    Statement,
    LoopEnter,
    LoopCondition,
    LoopExit,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowNode {
    pub kind: FlowNodeKind,
    /// 対応する木の要素
    pub element: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Normal,
    Back,
    Jump,
}

/// 一つの関数の制御フローグラフ
#[derive(Clone)]
pub struct ControlFlowGraph {
    pub name: Arc<str>,
    pub(crate) graph: DiGraph<FlowNode, EdgeKind>,
    pub(crate) enter: NodeIndex,
    pub(crate) exit: NodeIndex,
}

impl ControlFlowGraph {
    pub fn enter(&self) -> FlowNode {
        self.graph[self.enter]
    }
    pub fn exit(&self) -> FlowNode {
        self.graph[self.exit]
    }
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
    pub fn nodes(&self) -> impl Iterator<Item = FlowNode> + '_ {
        self.graph.node_weights().copied()
    }
    /// 関数の出口に入口から到達できるか
    pub fn exit_is_reachable(&self) -> bool {
        has_path_connecting(&self.graph, self.enter, self.exit, None)
    }
    /// 指定した種類の辺の数
    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.graph.edge_references().filter(|edge| *edge.weight() == kind).count()
    }
}

impl fmt::Debug for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cfg {} ({} nodes, {} edges)", self.name, self.graph.node_count(), self.graph.edge_count())
    }
}

/// 翻訳単位ごとのフローグラフ置き場
///
/// 木からは `ControlFlowGraphReference` が `GraphId` で参照するだけで、グラフ自体は所有しません。
#[derive(Debug, Clone, Default)]
pub struct FlowGraphs {
    graphs: Vec<ControlFlowGraph>,
}

impl FlowGraphs {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add(&mut self, graph: ControlFlowGraph) -> GraphId {
        self.graphs.push(graph);
        GraphId(self.graphs.len() as u32 - 1)
    }
    pub fn get(&self, id: GraphId) -> Option<&ControlFlowGraph> {
        self.graphs.get(id.0 as usize)
    }
    /// 同じ `GraphId` のまま作り直したグラフに差し替え、古いグラフを返します
    pub fn replace(&mut self, id: GraphId, graph: ControlFlowGraph) -> Option<ControlFlowGraph> {
        self.graphs.get_mut(id.0 as usize).map(|slot| std::mem::replace(slot, graph))
    }
    pub fn iter(&self) -> impl Iterator<Item = &ControlFlowGraph> + '_ {
        self.graphs.iter()
    }
    pub fn len(&self) -> usize {
        self.graphs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
