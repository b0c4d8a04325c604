use std::sync::Arc;
use tracing::debug;
use crate::compiler::CancellationFlag;
use crate::config::ConfigError;
use crate::errors::InternalError;
use crate::span::Span;
use crate::symbol::{FunctionInfo, Symbol};
use crate::tree::{Node, NodeId, NodeKind, ResolvePhase, Tree};
use super::component_call::ComponentCallLowering;
use super::context::LoweringContext;
use super::string_concatenation::StringConcatenationLowering;

/// 一つの翻訳単位の木全体を、より原始的な同値の木へ書き換えるパス
///
/// パスは木以外の状態を他のパスと共有しません。
/// 自分の出力にもう一度適用しても何も変えてはいけません。
pub trait FileLoweringPass {
    fn lower(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError>;
}

/// 名前と説明を付けて登録されたパス
pub struct LoweringPhase {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: fn(&LoweringContext) -> Box<dyn FileLoweringPass>,
}

pub static PHASES: [LoweringPhase; 2] = [
    LoweringPhase {
        name: "ComponentCall",
        description: "Replace component calls with ordinary member calls",
        factory: component_call_pass,
    },
    LoweringPhase {
        name: "StringConcatenation",
        description: "Replace string concatenations with string builders",
        factory: string_concatenation_pass,
    },
];

fn component_call_pass(context: &LoweringContext) -> Box<dyn FileLoweringPass> {
    Box::new(ComponentCallLowering::new(context))
}

fn string_concatenation_pass(context: &LoweringContext) -> Box<dyn FileLoweringPass> {
    Box::new(StringConcatenationLowering::new(context))
}

pub fn find_phase(name: &str) -> Option<&'static LoweringPhase> {
    PHASES.iter().find(|phase| phase.name == name)
}

/// 名前の並びを登録済みのパスに対応付けます。知らない名前があれば設定エラーです
pub fn find_phases(names: &[String]) -> Result<Vec<&'static LoweringPhase>, ConfigError> {
    names.iter()
        .map(|name| find_phase(name).ok_or_else(|| ConfigError::UnknownPass { name: name.clone() }))
        .collect()
}

/// 設定された順にパスを実行します
pub struct PassManager {
    passes: Vec<(&'static LoweringPhase, Box<dyn FileLoweringPass>)>,
    verify: bool,
}

impl PassManager {
    pub fn new(names: &[String], verify: bool, context: &LoweringContext) -> Result<Self, ConfigError> {
        let phases = find_phases(names)?;
        Ok(Self::with_phases(&phases, verify, context))
    }

    pub fn with_phases(phases: &[&'static LoweringPhase], verify: bool, context: &LoweringContext) -> Self {
        let passes = phases.iter()
            .map(|&phase| (phase, (phase.factory)(context)))
            .collect();
        PassManager { passes, verify }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|(phase, _)| phase.name).collect()
    }

    /// すべてのパスを実行します。途中で取り消されたら `false` を返します
    pub fn run(&mut self, tree: &mut Tree, file: NodeId, cancellation: &CancellationFlag) -> Result<bool, InternalError> {
        for (phase, pass) in &mut self.passes {
            if cancellation.is_cancelled() {
                debug!(pass = phase.name, "lowering cancelled");
                return Ok(false);
            }
            debug!(pass = phase.name, file = %tree.describe(file), "{}", phase.description);
            pass.lower(tree, file)?;
            if self.verify {
                tree.verify(file)?;
            }
        }
        Ok(true)
    }
}

/// 解決済みの関数を呼ぶ式を作ります
///
/// `dispatch_receiver` と `arguments` はまだどこにも所有されていないノードです。
pub(super) fn call(
    tree: &mut Tree,
    function: &FunctionInfo,
    dispatch_receiver: Option<NodeId>,
    arguments: Vec<NodeId>,
    span: Option<Span>,
) -> Result<NodeId, InternalError> {
    let callee = tree.alloc(Node::with_span(NodeKind::ResolvedNamedReference {
        name: Arc::clone(&function.id.name),
        symbol: Symbol::Callable(function.id.clone()),
    }, span))?;
    let type_ref = tree.resolved_type_ref(function.return_type.clone());
    tree.alloc(Node::with_span(NodeKind::FunctionCall {
        safe: false,
        type_ref,
        type_arguments: vec![],
        explicit_receiver: None,
        dispatch_receiver,
        extension_receiver: None,
        callee,
        arguments,
    }, span))
}

/// パスが入る宣言は本体まで解決されていなければなりません
pub(super) fn require_body_resolved(tree: &Tree, declaration: NodeId) -> Result<(), InternalError> {
    tree.require_phase(declaration, ResolvePhase::BodyResolved)
}
