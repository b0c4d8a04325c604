//! 制御フローグラフ
//!
//! 本体まで解決された関数からグラフを作り、
//! 木には `ControlFlowGraphReference` として後から取り付けます。

mod builder;
mod cfg;

pub use builder::{attach_graphs, build_graph, rebuild_graphs};
pub use cfg::{ControlFlowGraph, EdgeKind, FlowGraphs, FlowNode, FlowNodeKind, GraphId};
