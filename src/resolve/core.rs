use std::collections::HashMap;
use std::sync::Arc;
use itertools::Itertools;
use tracing::{debug, warn};
use crate::errors::{Error, InternalError};
use crate::symbol::{ClassId, SymbolTable};
use crate::tree::{NodeId, NodeKind, ResolvePhase, Tree};

/// 解決の一段。各段の後で、到達可能なすべての宣言がちょうど一つ先のフェーズへ進みます
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ResolveStep {
    Imports,
    Supertypes,
    Types,
    Status,
    Declarations,
    Body,
}

impl ResolveStep {
    pub const ALL: [ResolveStep; 6] = [
        ResolveStep::Imports,
        ResolveStep::Supertypes,
        ResolveStep::Types,
        ResolveStep::Status,
        ResolveStep::Declarations,
        ResolveStep::Body,
    ];

    /// この段を終えた宣言が到達するフェーズ
    pub fn target(self) -> ResolvePhase {
        match self {
            ResolveStep::Imports => ResolvePhase::ImportsResolved,
            ResolveStep::Supertypes => ResolvePhase::SupertypesResolved,
            ResolveStep::Types => ResolvePhase::TypesResolved,
            ResolveStep::Status => ResolvePhase::StatusResolved,
            ResolveStep::Declarations => ResolvePhase::DeclarationsResolved,
            ResolveStep::Body => ResolvePhase::BodyResolved,
        }
    }
}

/// 一つの翻訳単位の解決器
///
/// 他の翻訳単位の情報は確定済みの `SymbolTable` から読み取るだけです。
/// 利用者向けの診断は `errors` に溜まり、木の中にはエラーノードが残ります。
pub struct Resolver {
    pub(super) symbols: Arc<SymbolTable>,
    pub errors: Vec<Error>,
    indexed: bool,
    package: Arc<str>,
    /// このファイルで宣言されたクラスとタイプエイリアス
    local_classes: HashMap<ClassId, NodeId>,
    /// 短い名前で見えるクラス
    pub(super) visible: HashMap<Arc<str>, ClassId>,
}

impl Resolver {
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        Resolver {
            symbols,
            errors: vec![],
            indexed: false,
            package: Arc::from(""),
            local_classes: HashMap::new(),
            visible: HashMap::new(),
        }
    }

    pub(super) fn error(&mut self, error: Error) {
        warn!(location = %error.location_string(), "{}", error.reason());
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    /// 一段だけ解決を進めます
    ///
    /// ファイルがすでにその段を終えていれば何もしません。
    /// 前の段を飛ばして呼ばれた場合は内部エラーです。
    pub fn run_step(&mut self, tree: &mut Tree, file: NodeId, step: ResolveStep) -> Result<(), InternalError> {
        let target = step.target();
        let current = tree.phase(file)
            .ok_or_else(|| InternalError::IllegalSlot { node: tree.describe(file), slot: "phase" })?;
        if current >= target {
            debug!(?step, file = %tree.describe(file), "step already done");
            return Ok(());
        }
        if current.next() != Some(target) {
            return Err(InternalError::IllegalPhaseTransition { node: tree.describe(file), from: current, to: target });
        }
        if !self.indexed {
            self.index(tree, file);
        }
        debug!(?step, file = %tree.describe(file), "resolution step");
        match step {
            ResolveStep::Imports => self.resolve_imports(tree, file)?,
            ResolveStep::Supertypes => self.resolve_supertypes(tree, file)?,
            ResolveStep::Types => self.resolve_types(tree, file)?,
            ResolveStep::Status => self.resolve_statuses(tree, file)?,
            ResolveStep::Declarations => self.resolve_declarations(tree, file)?,
            ResolveStep::Body => self.resolve_bodies(tree, file)?,
        }
        advance_all(tree, file, target)
    }

    /// 残りの段をすべて順に実行します
    pub fn resolve_fully(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        for step in ResolveStep::ALL {
            self.run_step(tree, file, step)?;
        }
        Ok(())
    }

    fn index(&mut self, tree: &Tree, file: NodeId) {
        for declaration in tree.declarations(file) {
            match tree.kind(declaration) {
                NodeKind::File { package, .. } => self.package = package.clone(),
                NodeKind::RegularClass { name, class_id, .. } | NodeKind::TypeAlias { name, class_id, .. } => {
                    self.local_classes.insert(class_id.clone(), declaration);
                    self.visible.entry(name.clone()).or_insert_with(|| class_id.clone());
                }
                _ => {}
            }
        }
        self.indexed = true;
    }

    /// このファイルで宣言されたクラスのノード
    pub(super) fn local_class(&self, id: &ClassId) -> Option<NodeId> {
        self.local_classes.get(id).copied()
    }

    pub(super) fn is_known_class(&self, id: &ClassId) -> bool {
        self.local_classes.contains_key(id) || self.symbols.class(id).is_some()
    }

    /// 型の名前からクラスを探します
    ///
    /// インポートとローカルクラスの短い名前、同じパッケージ、完全修飾名、
    /// シンボル表の一意な短い名前の順に調べます。
    pub(super) fn lookup_class(&self, qualifier: &[Arc<str>]) -> Option<ClassId> {
        let dotted = qualifier.iter().join(".");
        if let Some(id) = self.visible.get(dotted.as_str()) {
            return Some(id.clone());
        }
        let in_package = if self.package.is_empty() {
            ClassId::new(dotted.as_str())
        } else {
            ClassId::new(format!("{}/{}", self.package.replace('.', "/"), dotted))
        };
        if self.is_known_class(&in_package) {
            return Some(in_package);
        }
        let qualified = fq_class_id(&dotted);
        if self.is_known_class(&qualified) {
            return Some(qualified);
        }
        match qualifier {
            [name] => self.symbols.class_by_short_name(name).map(|info| info.id.clone()),
            _ => None,
        }
    }
}

/// `a.b.C` 形式の名前を `a/b/C` 形式のクラスIDにします
pub(super) fn fq_class_id(dotted: &str) -> ClassId {
    ClassId::new(dotted.replace('.', "/"))
}

fn advance_all(tree: &mut Tree, root: NodeId, target: ResolvePhase) -> Result<(), InternalError> {
    for declaration in tree.declarations(root) {
        if tree.phase(declaration).is_some_and(|phase| phase < target) {
            tree.advance_phase(declaration, target)?;
        }
    }
    Ok(())
}

/// 宣言やその部分が見ることのできる型パラメータの名前
pub(super) fn type_parameters_in_scope(tree: &Tree, id: NodeId) -> im::HashSet<Arc<str>> {
    let mut names = im::HashSet::new();
    let mut current = Some(id);
    while let Some(node) = current {
        let parameters: &[NodeId] = match tree.kind(node) {
            NodeKind::RegularClass { type_parameters, .. }
            | NodeKind::TypeAlias { type_parameters, .. }
            | NodeKind::Constructor { type_parameters, .. }
            | NodeKind::SimpleFunction { type_parameters, .. } => type_parameters,
            _ => &[],
        };
        for &parameter in parameters {
            if let NodeKind::TypeParameter { name, .. } = tree.kind(parameter) {
                names.insert(name.clone());
            }
        }
        current = tree.owner(node);
    }
    names
}
