use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use rayon::prelude::*;
use thiserror::Error as ThisError;
use tracing::{error, info};
use typed_arena::Arena;
use crate::config::{ConfigError, PipelineConfig};
use crate::dfa::{attach_graphs, rebuild_graphs, FlowGraphs};
use crate::errors::{Error, InternalError};
use crate::lower::{find_phases, LoweringContext, LoweringPhase, PassManager};
use crate::resolve::{ResolveStep, Resolver};
use crate::symbol::SymbolTable;
use crate::syntax::{RawTreeBuilder, SyntaxSource};
use crate::tree::{build_file, NodeId, Tree};

/// 処理中の翻訳単位をまとめて取り消すための共有フラグ
///
/// 解決の各段と下げの各パスの間で確かめられます。
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 翻訳単位が最後まで処理されなかった理由
///
/// どの場合も途中まで書き換えた木は捨てられます。
#[derive(Debug, ThisError)]
pub enum UnitFailure {
    #[error("{} error(s) reported", .0.len())]
    Diagnostics(Vec<Error>),

    #[error("internal error: {0}")]
    Internal(#[from] InternalError),

    #[error("cancelled")]
    Cancelled,
}

/// 解決と下げを終えた一つの翻訳単位
#[derive(Debug)]
pub struct CompiledUnit {
    pub name: String,
    pub tree: Tree,
    pub file: NodeId,
    pub graphs: FlowGraphs,
}

/// 構文木の構築から下げまでを翻訳単位ごとに行うパイプライン
///
/// 各翻訳単位の木はそれを処理するタスクだけが持ちます。
/// 他の翻訳単位について分かっていることは `SymbolTable` の読み取り専用の写しとして共有します。
pub struct Pipeline {
    config: PipelineConfig,
    phases: Vec<&'static LoweringPhase>,
    context: LoweringContext,
    cancellation: CancellationFlag,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, symbols: Arc<SymbolTable>) -> Result<Self, ConfigError> {
        let phases = find_phases(&config.passes)?;
        Ok(Pipeline {
            config,
            phases,
            context: LoweringContext::new(symbols),
            cancellation: CancellationFlag::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// このパイプラインのすべての翻訳単位を取り消すフラグ
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    fn check_cancelled(&self) -> Result<(), UnitFailure> {
        if self.cancellation.is_cancelled() {
            return Err(UnitFailure::Cancelled);
        }
        Ok(())
    }

    /// 一つの翻訳単位を処理します
    pub fn compile_unit(&self, source: &dyn SyntaxSource) -> Result<CompiledUnit, UnitFailure> {
        let name = source.file_name().to_string();
        info!(file = %name, "compiling");
        let result = self.run(source);
        match &result {
            Ok(unit) => info!(file = %name, nodes = unit.tree.len(), graphs = unit.graphs.len(), "compiled"),
            Err(UnitFailure::Diagnostics(errors)) => info!(file = %name, errors = errors.len(), "stopped on diagnostics"),
            Err(UnitFailure::Internal(internal)) => error!(file = %name, "aborted: {}", internal),
            Err(UnitFailure::Cancelled) => info!(file = %name, "cancelled"),
        }
        result
    }

    fn run(&self, source: &dyn SyntaxSource) -> Result<CompiledUnit, UnitFailure> {
        self.check_cancelled()?;
        let mut tree = Tree::new();
        let file = {
            let arena = Arena::new();
            let raw = source.produce(&RawTreeBuilder::new(&arena))?;
            build_file(&mut tree, raw)?
        };

        let mut resolver = Resolver::new(Arc::clone(&self.context.symbols));
        for step in ResolveStep::ALL {
            self.check_cancelled()?;
            resolver.run_step(&mut tree, file, step)?;
        }
        if resolver.has_errors() {
            return Err(UnitFailure::Diagnostics(resolver.into_errors()));
        }

        let mut graphs = FlowGraphs::new();
        attach_graphs(&mut tree, file, &mut graphs)?;

        let mut passes = PassManager::with_phases(&self.phases, self.config.verify_tree, &self.context);
        if !passes.run(&mut tree, file, &self.cancellation)? {
            return Err(UnitFailure::Cancelled);
        }
        // 下げで切り離された文をグラフから指さない
        rebuild_graphs(&tree, file, &mut graphs)?;
        Ok(CompiledUnit { name: source.file_name().to_string(), tree, file, graphs })
    }

    /// 複数の翻訳単位を処理します。結果は入力と同じ順に並びます
    pub fn compile_units(&self, sources: Vec<Box<dyn SyntaxSource>>) -> Vec<Result<CompiledUnit, UnitFailure>> {
        if self.config.parallel {
            sources.into_par_iter()
                .map(|source| self.compile_unit(source.as_ref()))
                .collect()
        } else {
            sources.iter()
                .map(|source| self.compile_unit(source.as_ref()))
                .collect()
        }
    }
}
