use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;
use crate::errors::InternalError;
use crate::span::Span;
use crate::symbol::{CallableId, ClassId, FunctionInfo};
use crate::tree::{ConstValue, Node, NodeId, NodeKind, Transformer, Tree};
use crate::types::{PrimitiveType, Type};
use super::core::{call, require_body_resolved, FileLoweringPass};
use super::context::LoweringContext;

/// 文字列の連結を `StringBuilder` の呼び出し列に置き換えます
///
/// 子から先に下げるので、入れ子の連結も一度の実行ですべて消えます。
pub struct StringConcatenationLowering {
    context: LoweringContext,
    /// このファイルで宣言された、`toString` を上書きするインラインクラス
    local_inline_classes: HashSet<ClassId>,
}

/// インラインクラスの `toString` として扱えるメンバ関数かどうか
fn is_to_string_override(function: &FunctionInfo) -> bool {
    function.has_dispatch_receiver
        && !function.has_extension_receiver
        && function.id.parameters.is_empty()
        && function.is_override
}

fn declares_to_string_override(tree: &Tree, declarations: &[NodeId]) -> bool {
    declarations.iter().any(|&member| matches!(
        tree.kind(member),
        NodeKind::SimpleFunction { name, status, receiver_type_ref: None, value_parameters, .. }
            if name.as_ref() == "toString" && status.is_override && value_parameters.is_empty()
    ))
}

impl StringConcatenationLowering {
    pub fn new(context: &LoweringContext) -> Self {
        StringConcatenationLowering { context: context.clone(), local_inline_classes: HashSet::new() }
    }

    fn index_inline_classes(&mut self, tree: &Tree, file: NodeId) {
        self.local_inline_classes = tree.declarations(file).into_iter()
            .filter_map(|declaration| match tree.kind(declaration) {
                NodeKind::RegularClass { class_id, status, declarations, .. }
                    if status.is_inline && declares_to_string_override(tree, declarations) => Some(class_id.clone()),
                _ => None,
            })
            .collect();
    }

    /// インラインクラスの値なら、ボックス化せずに済む `toString` の置き換え先
    fn to_string_replacement(&self, ty: &Type) -> Option<&FunctionInfo> {
        let Type::Class(class_id, _) = ty else { return None };
        let overrides = self.local_inline_classes.contains(class_id)
            || self.context.symbols.class(class_id).is_some_and(|info| {
                info.is_inline && info.functions_named("toString").any(is_to_string_override)
            });
        if !overrides {
            return None;
        }
        self.context.symbols.inline_class_replacement(&CallableId::member(class_id, "toString", []))
    }

    fn lower_inline_class_argument(&self, tree: &mut Tree, argument: NodeId) -> Result<NodeId, InternalError> {
        let ty = tree.expression_type(argument)?;
        match self.to_string_replacement(&ty) {
            Some(replacement) => {
                trace!(replacement = ?replacement.id, "unboxed toString");
                let span = tree.node(argument).span;
                call(tree, replacement, None, vec![argument], span)
            }
            None => Ok(argument),
        }
    }

    fn empty_string(&self, tree: &mut Tree, span: Option<Span>) -> Result<NodeId, InternalError> {
        let type_ref = tree.resolved_type_ref(Type::String);
        tree.alloc(Node::with_span(NodeKind::Const { value: ConstValue::String(Arc::from("")), type_ref }, span))
    }

    fn call_to_string(&self, tree: &mut Tree, argument: NodeId, span: Option<Span>) -> Result<NodeId, InternalError> {
        let ty = tree.expression_type(argument)?;
        if ty.is_string() {
            return Ok(argument);
        }
        // Byte と Short には valueOf がない
        let (argument, ty) = match ty {
            Type::Primitive(PrimitiveType::Byte | PrimitiveType::Short) => {
                let type_ref = tree.resolved_type_ref(Type::int());
                let cast = tree.alloc(Node::with_span(NodeKind::ImplicitCast { type_ref, argument }, span))?;
                (cast, Type::int())
            }
            ty => (argument, ty),
        };
        call(tree, self.context.builtins.value_of_for(&ty), None, vec![argument], span)
    }

    fn build_string(&self, tree: &mut Tree, arguments: &[NodeId], span: Option<Span>) -> Result<NodeId, InternalError> {
        let builtins = &self.context.builtins;
        let mut builder = call(tree, &builtins.string_builder_init, None, vec![], span)?;
        for &argument in arguments {
            let ty = tree.expression_type(argument)?;
            builder = call(tree, builtins.append_for(&ty), Some(builder), vec![argument], span)?;
        }
        call(tree, &builtins.string_builder_to_string, Some(builder), vec![], span)
    }
}

impl FileLoweringPass for StringConcatenationLowering {
    fn lower(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        self.index_inline_classes(tree, file);
        tree.transform(file, self, &mut ())?;
        Ok(())
    }
}

impl Transformer<()> for StringConcatenationLowering {
    fn transform_declaration(&mut self, tree: &mut Tree, id: NodeId, data: &mut ()) -> Result<NodeId, InternalError> {
        require_body_resolved(tree, id)?;
        self.transform_element(tree, id, data)
    }

    fn transform_string_concatenation_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut ()) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, data)?;
        let NodeKind::StringConcatenationCall { arguments, .. } = tree.kind(id) else { return Ok(id) };
        let arguments = arguments.clone();
        let span = tree.node(id).span;
        tree.detach(id)?;
        let arguments = arguments.into_iter()
            .map(|argument| self.lower_inline_class_argument(tree, argument))
            .collect::<Result<Vec<_>, _>>()?;

        match arguments.as_slice() {
            [] => self.empty_string(tree, span),
            &[single] => self.call_to_string(tree, single, span),
            &[first, second] if tree.expression_type(first)?.is_string_class_type() =>
                call(tree, &self.context.builtins.string_plus, None, vec![first, second], span),
            _ => self.build_string(tree, &arguments, span),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use crate::errors::InternalError;
    use crate::lower::{FileLoweringPass, LoweringContext};
    use crate::symbol::{CallableId, ClassId, ClassInfo, FunctionInfo, Symbol, SymbolTable};
    use crate::tree::{ClassKind, ConstValue, Node, NodeId, NodeKind, ResolvePhase, Tree};
    use crate::types::Type;
    use super::StringConcatenationLowering;

    fn constant(tree: &mut Tree, value: ConstValue) -> NodeId {
        let type_ref = tree.resolved_type_ref(value.static_type());
        tree.alloc(Node::new(NodeKind::Const { value, type_ref })).unwrap()
    }

    /// 型だけを持つ変数参照
    fn variable(tree: &mut Tree, name: &str, ty: Type) -> NodeId {
        let callee = tree.alloc(Node::new(NodeKind::SimpleNamedReference { name: Arc::from(name) })).unwrap();
        let type_ref = tree.resolved_type_ref(ty);
        tree.alloc(Node::new(NodeKind::QualifiedAccessExpression {
            safe: false,
            type_ref,
            explicit_receiver: None,
            dispatch_receiver: None,
            extension_receiver: None,
            callee,
        })).unwrap()
    }

    /// 連結を初期化子に持つプロパティだけのファイル。(file, property) を返します
    fn file_with(tree: &mut Tree, arguments: Vec<NodeId>) -> (NodeId, NodeId) {
        let type_ref = tree.resolved_type_ref(Type::String);
        let concatenation = tree.alloc(Node::new(NodeKind::StringConcatenationCall { arguments, type_ref })).unwrap();
        let return_type_ref = tree.resolved_type_ref(Type::String);
        let property = tree.alloc(Node::new(NodeKind::Property {
            name: Arc::from("text"),
            status: Default::default(),
            is_var: false,
            return_type_ref,
            initializer: Some(concatenation),
            phase: ResolvePhase::BodyResolved,
        })).unwrap();
        let file = tree.alloc(Node::new(NodeKind::File {
            name: Arc::from("a.kt"),
            package: Arc::from(""),
            imports: vec![],
            declarations: vec![property],
            phase: ResolvePhase::BodyResolved,
        })).unwrap();
        (file, property)
    }

    fn lower(symbols: SymbolTable, tree: &mut Tree, file: NodeId) -> StringConcatenationLowering {
        let mut pass = StringConcatenationLowering::new(&LoweringContext::new(Arc::new(symbols)));
        pass.lower(tree, file).unwrap();
        assert!(tree.verify(file).is_ok());
        pass
    }

    fn initializer(tree: &Tree, property: NodeId) -> NodeId {
        let NodeKind::Property { initializer: Some(initializer), .. } = tree.kind(property) else { panic!("property expected") };
        *initializer
    }

    /// 呼び出しの (関数, ディスパッチレシーバ, 引数)
    fn call_parts(tree: &Tree, id: NodeId) -> (CallableId, Option<NodeId>, Vec<NodeId>) {
        let NodeKind::FunctionCall { callee, dispatch_receiver, arguments, .. } = tree.kind(id) else {
            panic!("call expected, found {}", tree.describe(id))
        };
        let NodeKind::ResolvedNamedReference { symbol: Symbol::Callable(function), .. } = tree.kind(*callee) else {
            panic!("resolved callee expected")
        };
        (function.clone(), *dispatch_receiver, arguments.clone())
    }

    #[test]
    fn test_no_operands_become_empty_string() {
        let mut tree = Tree::new();
        let (file, property) = file_with(&mut tree, vec![]);
        lower(SymbolTable::new(), &mut tree, file);
        assert!(matches!(
            tree.kind(initializer(&tree, property)),
            NodeKind::Const { value: ConstValue::String(text), .. } if text.is_empty()
        ));
    }

    #[test]
    fn test_single_string_operand_passes_through() {
        let mut tree = Tree::new();
        let name = variable(&mut tree, "name", Type::String);
        let (file, property) = file_with(&mut tree, vec![name]);
        lower(SymbolTable::new(), &mut tree, file);
        assert_eq!(initializer(&tree, property), name);
    }

    #[test]
    fn test_single_short_operand_is_widened() {
        let mut tree = Tree::new();
        let small = variable(&mut tree, "small", Type::short());
        let (file, property) = file_with(&mut tree, vec![small]);
        lower(SymbolTable::new(), &mut tree, file);

        let (function, receiver, arguments) = call_parts(&tree, initializer(&tree, property));
        assert_eq!(function.name.as_ref(), "valueOf");
        assert_eq!(function.parameters[0], Type::int());
        assert_eq!(receiver, None);
        let NodeKind::ImplicitCast { argument, .. } = tree.kind(arguments[0]) else { panic!("cast expected") };
        assert_eq!(*argument, small);
        assert_eq!(tree.expression_type(arguments[0]).unwrap(), Type::int());
    }

    #[test]
    fn test_single_nullable_operand_uses_any_overload() {
        let mut tree = Tree::new();
        let maybe = variable(&mut tree, "maybe", Type::int().nullable());
        let (file, property) = file_with(&mut tree, vec![maybe]);
        lower(SymbolTable::new(), &mut tree, file);
        let (function, _, arguments) = call_parts(&tree, initializer(&tree, property));
        assert_eq!(function.parameters[0], Type::nullable_any());
        assert_eq!(arguments, vec![maybe]);
    }

    #[test]
    fn test_string_then_value_uses_string_plus() {
        let mut tree = Tree::new();
        let a = constant(&mut tree, ConstValue::String(Arc::from("a")));
        let one = constant(&mut tree, ConstValue::Int(1));
        let (file, property) = file_with(&mut tree, vec![a, one]);
        lower(SymbolTable::new(), &mut tree, file);

        let lowered = initializer(&tree, property);
        let (function, receiver, arguments) = call_parts(&tree, lowered);
        assert_eq!(function.name.as_ref(), "stringPlus");
        assert_eq!(function.owner, Some(ClassId::new("kotlin/jvm/internal/Intrinsics")));
        assert_eq!(receiver, None);
        assert_eq!(arguments, vec![a, one]);
        assert_eq!(tree.expression_type(lowered).unwrap(), Type::String);
    }

    #[test]
    fn test_mixed_operands_build_string() {
        let mut tree = Tree::new();
        let one = constant(&mut tree, ConstValue::Int(1));
        let a = constant(&mut tree, ConstValue::String(Arc::from("a")));
        let two = constant(&mut tree, ConstValue::Int(2));
        let (file, property) = file_with(&mut tree, vec![one, a, two]);
        lower(SymbolTable::new(), &mut tree, file);

        let (finish, receiver, arguments) = call_parts(&tree, initializer(&tree, property));
        assert_eq!(finish.name.as_ref(), "toString");
        assert!(arguments.is_empty());
        let mut appended = vec![];
        let mut current = receiver.unwrap();
        loop {
            let (function, receiver, arguments) = call_parts(&tree, current);
            if function.name.as_ref() == "<init>" {
                assert_eq!(function.owner, Some(ClassId::new("java/lang/StringBuilder")));
                break;
            }
            assert_eq!(function.name.as_ref(), "append");
            appended.push((function.parameters[0].clone(), arguments[0]));
            current = receiver.unwrap();
        }
        appended.reverse();
        assert_eq!(appended, vec![(Type::int(), one), (Type::String, a), (Type::int(), two)]);
    }

    #[test]
    fn test_narrow_operand_appends_as_any() {
        let mut tree = Tree::new();
        let small = variable(&mut tree, "small", Type::byte());
        let a = constant(&mut tree, ConstValue::String(Arc::from("a")));
        let flag = variable(&mut tree, "flag", Type::boolean());
        let (file, property) = file_with(&mut tree, vec![small, a, flag]);
        lower(SymbolTable::new(), &mut tree, file);

        let (_, receiver, _) = call_parts(&tree, initializer(&tree, property));
        let (last, receiver, _) = call_parts(&tree, receiver.unwrap());
        assert_eq!(last.parameters[0], Type::boolean());
        let (middle, receiver, _) = call_parts(&tree, receiver.unwrap());
        assert_eq!(middle.parameters[0], Type::String);
        let (first, _, arguments) = call_parts(&tree, receiver.unwrap());
        assert_eq!(first.parameters[0], Type::nullable_any());
        assert_eq!(arguments, vec![small]);
    }

    #[test]
    fn test_inline_class_operand_uses_replacement() {
        let meters = ClassId::new("units/Meters");
        let mut info = ClassInfo::new(meters.clone(), ClassKind::Class);
        info.is_inline = true;
        let to_string = CallableId::member(&meters, "toString", []);
        info.functions.push(FunctionInfo::member(to_string.clone(), Type::String).overriding());
        let mut symbols = SymbolTable::new();
        symbols.add_class(info);
        let replacement = FunctionInfo::top_level(
            CallableId::member(&meters, "toString-impl", [Type::double()]),
            Type::String,
        );
        symbols.add_inline_class_replacement(to_string, replacement.clone());

        let mut tree = Tree::new();
        let distance = variable(&mut tree, "distance", Type::class(meters));
        let (file, property) = file_with(&mut tree, vec![distance]);
        lower(symbols, &mut tree, file);

        let lowered = initializer(&tree, property);
        let (function, receiver, arguments) = call_parts(&tree, lowered);
        assert_eq!(function, replacement.id);
        assert_eq!(receiver, None);
        assert_eq!(arguments, vec![distance]);
        assert_eq!(tree.expression_type(lowered).unwrap(), Type::String);
    }

    #[test]
    fn test_inline_class_without_replacement_is_kept() {
        let meters = ClassId::new("units/Meters");
        let mut info = ClassInfo::new(meters.clone(), ClassKind::Class);
        info.is_inline = true;
        info.functions.push(FunctionInfo::member(CallableId::member(&meters, "toString", []), Type::String).overriding());
        let mut symbols = SymbolTable::new();
        symbols.add_class(info);

        let mut tree = Tree::new();
        let distance = variable(&mut tree, "distance", Type::class(meters));
        let (file, property) = file_with(&mut tree, vec![distance]);
        lower(symbols, &mut tree, file);
        let (function, _, arguments) = call_parts(&tree, initializer(&tree, property));
        assert_eq!(function.name.as_ref(), "valueOf");
        assert_eq!(function.parameters[0], Type::nullable_any());
        assert_eq!(arguments, vec![distance]);
    }

    #[test]
    fn test_lowering_twice_changes_nothing() {
        let mut tree = Tree::new();
        let one = constant(&mut tree, ConstValue::Int(1));
        let a = constant(&mut tree, ConstValue::String(Arc::from("a")));
        let x = constant(&mut tree, ConstValue::Char('x'));
        let (file, _) = file_with(&mut tree, vec![one, a, x]);
        let mut pass = lower(SymbolTable::new(), &mut tree, file);
        let once = tree.clone();
        pass.lower(&mut tree, file).unwrap();
        assert!(tree.structurally_equal(file, &once, file));
    }

    #[test]
    fn test_unresolved_operand_is_an_internal_error() {
        let mut tree = Tree::new();
        let callee = tree.alloc(Node::new(NodeKind::SimpleNamedReference { name: Arc::from("x") })).unwrap();
        let type_ref = tree.implicit_type_ref();
        let unresolved = tree.alloc(Node::new(NodeKind::QualifiedAccessExpression {
            safe: false,
            type_ref,
            explicit_receiver: None,
            dispatch_receiver: None,
            extension_receiver: None,
            callee,
        })).unwrap();
        let (file, _) = file_with(&mut tree, vec![unresolved]);
        let mut pass = StringConcatenationLowering::new(&LoweringContext::new(Arc::new(SymbolTable::new())));
        assert!(matches!(pass.lower(&mut tree, file), Err(InternalError::TypeNotResolved { .. })));
    }
}
