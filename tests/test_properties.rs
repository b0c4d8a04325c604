use std::collections::HashMap;
use std::sync::Arc;
use proptest::prelude::*;
use typed_arena::Arena;
use firn::compiler::CancellationFlag;
use firn::errors::InternalError;
use firn::lower::{LoweringContext, PassManager};
use firn::resolve::{ResolveStep, Resolver};
use firn::symbol::{Symbol, SymbolTable};
use firn::syntax::{FnSyntaxSource, RawNode, RawTreeBuilder};
use firn::tree::{build_file, IdentityTransformer, NodeId, NodeKind, Tree};
use firn::{Pipeline, PipelineConfig};

const PARAMETERS: [(&str, &str); 7] = [
    ("i", "Int"),
    ("l", "Long"),
    ("b", "Boolean"),
    ("c", "Char"),
    ("d", "Double"),
    ("s", "Short"),
    ("t", "String"),
];

#[derive(Debug, Clone)]
enum Entry {
    Literal(String),
    Parameter(usize),
}

impl Entry {
    fn is_string(&self) -> bool {
        match self {
            Entry::Literal(_) => true,
            Entry::Parameter(index) => PARAMETERS[*index].1 == "String",
        }
    }
}

fn entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        "[a-z =]{1,6}".prop_map(Entry::Literal),
        (0..PARAMETERS.len()).prop_map(Entry::Parameter),
    ]
}

fn template_file<'s>(raw: &RawTreeBuilder<'s>, entries: &[Entry]) -> Result<&'s RawNode<'s>, InternalError> {
    let mut children: Vec<_> = PARAMETERS.iter()
        .map(|&(name, ty)| raw.parameter(name, raw.user_type(ty, vec![])))
        .collect();
    let entries = entries.iter()
        .map(|entry| match entry {
            Entry::Literal(text) => raw.literal_entry(text),
            Entry::Parameter(index) => raw.expression_entry(raw.name(PARAMETERS[*index].0)),
        })
        .collect();
    children.push(raw.template(entries));
    Ok(raw.file("t.kt", vec![raw.function("render", children)]))
}

fn rendered(tree: &Tree, file: NodeId) -> NodeId {
    let NodeKind::File { declarations, .. } = tree.kind(file) else { panic!("file expected") };
    let NodeKind::SimpleFunction { body: Some(body), .. } = tree.kind(declarations[0]) else { panic!("function expected") };
    let NodeKind::Block { statements, .. } = tree.kind(*body) else { panic!("block expected") };
    let NodeKind::Return { result, .. } = tree.kind(statements[0]) else { panic!("return expected") };
    *result
}

fn callee_name(tree: &Tree, id: NodeId) -> Option<String> {
    let NodeKind::FunctionCall { callee, .. } = tree.kind(id) else { return None };
    match tree.kind(*callee) {
        NodeKind::ResolvedNamedReference { symbol: Symbol::Callable(callable), .. } => Some(callable.name.to_string()),
        _ => None,
    }
}

fn count_appends(tree: &Tree, to_string: NodeId) -> usize {
    let mut count = 0;
    let mut current = to_string;
    while let NodeKind::FunctionCall { dispatch_receiver: Some(receiver), .. } = tree.kind(current) {
        current = *receiver;
        if callee_name(tree, current).as_deref() == Some("append") {
            count += 1;
        }
    }
    count
}

fn pipeline() -> Pipeline {
    let config = PipelineConfig { parallel: false, ..PipelineConfig::default() };
    Pipeline::new(config, Arc::new(SymbolTable::new())).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_template_lowering_shape(entries in prop::collection::vec(entry(), 0..6)) {
        let captured = entries.clone();
        let source = FnSyntaxSource::new("t.kt", move |raw| template_file(raw, &captured));
        let unit = pipeline().compile_unit(&source).unwrap();
        let result = rendered(&unit.tree, unit.file);
        let name = callee_name(&unit.tree, result);

        match entries.as_slice() {
            [] | [Entry::Literal(_)] => {
                prop_assert!(matches!(unit.tree.kind(result), NodeKind::Const { .. }), "constant expected");
            }
            [single] if single.is_string() => {
                prop_assert!(name.is_none());
            }
            [_] => {
                prop_assert_eq!(name.as_deref(), Some("valueOf"));
            }
            [first, _] if first.is_string() => {
                prop_assert_eq!(name.as_deref(), Some("stringPlus"));
            }
            _ => {
                prop_assert_eq!(name.as_deref(), Some("toString"));
                prop_assert_eq!(count_appends(&unit.tree, result), entries.len());
            }
        }
        prop_assert_eq!(unit.tree.expression_type(result).unwrap(), firn::types::Type::String);
    }

    #[test]
    fn test_lowering_is_idempotent(entries in prop::collection::vec(entry(), 0..6)) {
        let captured = entries.clone();
        let source = FnSyntaxSource::new("t.kt", move |raw| template_file(raw, &captured));
        let pipeline = pipeline();
        let mut unit = pipeline.compile_unit(&source).unwrap();
        let before = unit.tree.clone();
        let context = LoweringContext::new(Arc::new(SymbolTable::new()));
        let mut passes = PassManager::new(&pipeline.config().passes, true, &context).unwrap();
        prop_assert!(passes.run(&mut unit.tree, unit.file, &CancellationFlag::new()).unwrap());
        prop_assert!(unit.tree.structurally_equal(unit.file, &before, unit.file));
    }

    #[test]
    fn test_identity_transform_keeps_tree(entries in prop::collection::vec(entry(), 0..6)) {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, template_file(&raw, &entries).unwrap()).unwrap();
        Resolver::new(Arc::new(SymbolTable::new())).resolve_fully(&mut tree, file).unwrap();
        let before = tree.clone();
        let result = tree.transform(file, &mut IdentityTransformer, &mut ()).unwrap();
        prop_assert_eq!(result, file);
        prop_assert!(tree.structurally_equal(file, &before, file));
        prop_assert!(tree.verify(file).is_ok());
    }

    #[test]
    fn test_phases_never_move_backwards(entries in prop::collection::vec(entry(), 0..6)) {
        let arena = Arena::new();
        let raw = RawTreeBuilder::new(&arena);
        let mut tree = Tree::new();
        let file = build_file(&mut tree, template_file(&raw, &entries).unwrap()).unwrap();
        let mut resolver = Resolver::new(Arc::new(SymbolTable::new()));
        let mut seen = HashMap::new();
        for step in ResolveStep::ALL {
            resolver.run_step(&mut tree, file, step).unwrap();
            for declaration in tree.declarations(file) {
                let phase = tree.phase(declaration).unwrap();
                if let Some(previous) = seen.insert(declaration, phase) {
                    prop_assert!(previous <= phase);
                }
            }
            prop_assert_eq!(tree.phase(file), Some(step.target()));
        }
        prop_assert!(!resolver.has_errors());
    }
}
