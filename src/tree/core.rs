use std::fmt;
use std::sync::Arc;
use la_arena::{Idx, RawIdx};
use crate::dfa::GraphId;
use crate::span::Span;
use crate::symbol::{ClassId, Symbol};
use crate::types::{Type, Variance};
use super::capability::Capabilities;

pub type NodeId = Idx<Node>;

/// 木の一つのノード
///
/// 子ノードはすべて親が排他的に所有します。
/// 所有しない関連（コンパニオンオブジェクト、ジャンプ先など）も `NodeId` で表しますが、
/// 走査の対象にはなりません。
#[derive(Clone, PartialEq, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub annotations: Vec<NodeId>,
    pub span: Option<Span>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, annotations: vec![], span: None }
    }
    pub fn with_span(kind: NodeKind, span: Option<Span>) -> Self {
        Self { kind, annotations: vec![], span }
    }
    pub fn annotated(mut self, annotations: Vec<NodeId>) -> Self {
        self.annotations = annotations;
        self
    }
}

/// 宣言の解決フェーズ
///
/// 宣言ごとに単調に進み、戻ることはありません。
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum ResolvePhase {
    RawIr,
    ImportsResolved,
    SupertypesResolved,
    TypesResolved,
    StatusResolved,
    DeclarationsResolved,
    BodyResolved,
}

impl ResolvePhase {
    pub const ALL: [ResolvePhase; 7] = [
        ResolvePhase::RawIr,
        ResolvePhase::ImportsResolved,
        ResolvePhase::SupertypesResolved,
        ResolvePhase::TypesResolved,
        ResolvePhase::StatusResolved,
        ResolvePhase::DeclarationsResolved,
        ResolvePhase::BodyResolved,
    ];
    pub fn next(self) -> Option<ResolvePhase> {
        let index = ResolvePhase::ALL.iter().position(|&phase| phase == self)?;
        ResolvePhase::ALL.get(index + 1).copied()
    }
}

/// 上位型の計算状態。`Computing` のまま再び入ってきたら循環です
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub enum SupertypesComputationStatus {
    #[default]
    NotComputed,
    Computing,
    Computed,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Object,
    EnumClass,
    AnnotationClass,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Protected,
    Private,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Modality {
    Final,
    Open,
    Abstract,
    Sealed,
}

/// 修飾子から得られる宣言の状態
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DeclarationStatus {
    pub visibility: Visibility,
    pub modality: Option<Modality>,
    pub is_inline: bool,
    pub is_data: bool,
    pub is_companion: bool,
    pub is_override: bool,
    pub is_suspend: bool,
}

/// 定数の種類
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ConstKind {
    Null,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ConstValue {
    Null,
    Boolean(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
}

impl ConstValue {
    pub fn kind(&self) -> ConstKind {
        match self {
            ConstValue::Null => ConstKind::Null,
            ConstValue::Boolean(_) => ConstKind::Boolean,
            ConstValue::Char(_) => ConstKind::Char,
            ConstValue::Byte(_) => ConstKind::Byte,
            ConstValue::Short(_) => ConstKind::Short,
            ConstValue::Int(_) => ConstKind::Int,
            ConstValue::Long(_) => ConstKind::Long,
            ConstValue::Float(_) => ConstKind::Float,
            ConstValue::Double(_) => ConstKind::Double,
            ConstValue::String(_) => ConstKind::String,
        }
    }
    /// 定数の静的な型
    pub fn static_type(&self) -> Type {
        match self {
            ConstValue::Null => Type::Nothing.nullable(),
            ConstValue::Boolean(_) => Type::boolean(),
            ConstValue::Char(_) => Type::char(),
            ConstValue::Byte(_) => Type::byte(),
            ConstValue::Short(_) => Type::short(),
            ConstValue::Int(_) => Type::int(),
            ConstValue::Long(_) => Type::long(),
            ConstValue::Float(_) => Type::float(),
            ConstValue::Double(_) => Type::double(),
            ConstValue::String(_) => Type::String,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Boolean(b) => write!(f, "{b}"),
            ConstValue::Char(c) => write!(f, "'{c}'"),
            ConstValue::Byte(n) => write!(f, "{n}"),
            ConstValue::Short(n) => write!(f, "{n}"),
            ConstValue::Int(n) => write!(f, "{n}"),
            ConstValue::Long(n) => write!(f, "{n}L"),
            ConstValue::Float(n) => write!(f, "{n}f"),
            ConstValue::Double(n) => write!(f, "{n}"),
            ConstValue::String(s) => write!(f, "\"{s}\""),
        }
    }
}

/// ノードの種類と、その種類固有のデータ
#[derive(Clone, PartialEq, Debug)]
pub enum NodeKind {
    File {
        name: Arc<str>,
        package: Arc<str>,
        imports: Vec<NodeId>,
        declarations: Vec<NodeId>,
        phase: ResolvePhase,
    },
    Import {
        fq_name: Arc<str>,
        alias: Option<Arc<str>>,
        resolved: Option<ClassId>,
    },
    RegularClass {
        name: Arc<str>,
        class_id: ClassId,
        class_kind: ClassKind,
        status: DeclarationStatus,
        type_parameters: Vec<NodeId>,
        declarations: Vec<NodeId>,
        super_type_refs: Vec<NodeId>,
        companion_object: Option<NodeId>,
        phase: ResolvePhase,
        supertypes_status: SupertypesComputationStatus,
    },
    TypeAlias {
        name: Arc<str>,
        class_id: ClassId,
        type_parameters: Vec<NodeId>,
        expanded_type_ref: NodeId,
        phase: ResolvePhase,
        supertypes_status: SupertypesComputationStatus,
    },
    Constructor {
        owner: ClassId,
        is_primary: bool,
        type_parameters: Vec<NodeId>,
        return_type_ref: NodeId,
        value_parameters: Vec<NodeId>,
        delegated_constructor: Option<NodeId>,
        body: Option<NodeId>,
        phase: ResolvePhase,
    },
    SimpleFunction {
        name: Arc<str>,
        status: DeclarationStatus,
        type_parameters: Vec<NodeId>,
        receiver_type_ref: Option<NodeId>,
        return_type_ref: NodeId,
        value_parameters: Vec<NodeId>,
        control_flow_graph: Option<NodeId>,
        body: Option<NodeId>,
        phase: ResolvePhase,
    },
    Property {
        name: Arc<str>,
        status: DeclarationStatus,
        is_var: bool,
        return_type_ref: NodeId,
        initializer: Option<NodeId>,
        phase: ResolvePhase,
    },
    ValueParameter {
        name: Arc<str>,
        is_vararg: bool,
        return_type_ref: NodeId,
        default_value: Option<NodeId>,
        phase: ResolvePhase,
    },
    TypeParameter {
        name: Arc<str>,
        variance: Variance,
        is_reified: bool,
        bounds: Vec<NodeId>,
    },
    AnnotationCall {
        annotation_type_ref: NodeId,
        arguments: Vec<NodeId>,
    },
    Const {
        value: ConstValue,
        type_ref: NodeId,
    },
    StringConcatenationCall {
        arguments: Vec<NodeId>,
        type_ref: NodeId,
    },
    FunctionCall {
        safe: bool,
        type_ref: NodeId,
        type_arguments: Vec<NodeId>,
        explicit_receiver: Option<NodeId>,
        dispatch_receiver: Option<NodeId>,
        extension_receiver: Option<NodeId>,
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    ComponentCall {
        component_index: u32,
        type_ref: NodeId,
        explicit_receiver: NodeId,
        callee: NodeId,
    },
    DelegatedConstructorCall {
        is_this: bool,
        constructed_type_ref: NodeId,
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    QualifiedAccessExpression {
        safe: bool,
        type_ref: NodeId,
        explicit_receiver: Option<NodeId>,
        dispatch_receiver: Option<NodeId>,
        extension_receiver: Option<NodeId>,
        callee: NodeId,
    },
    ThisReceiverExpression {
        type_ref: NodeId,
        callee: NodeId,
    },
    ImplicitCast {
        type_ref: NodeId,
        argument: NodeId,
    },
    Block {
        type_ref: NodeId,
        statements: Vec<NodeId>,
    },
    Return {
        type_ref: NodeId,
        target: Option<NodeId>,
        result: NodeId,
    },
    WhileLoop {
        label: Option<Arc<str>>,
        condition: NodeId,
        block: NodeId,
    },
    DoWhileLoop {
        label: Option<Arc<str>>,
        block: NodeId,
        condition: NodeId,
    },
    Break {
        label: Option<Arc<str>>,
        target: Option<NodeId>,
        type_ref: NodeId,
    },
    Continue {
        label: Option<Arc<str>>,
        target: Option<NodeId>,
        type_ref: NodeId,
    },
    ErrorExpression {
        reason: Arc<str>,
        type_ref: NodeId,
    },
    ImplicitTypeRef,
    UserTypeRef {
        qualifier: Vec<Arc<str>>,
        type_arguments: Vec<NodeId>,
        is_nullable: bool,
    },
    FunctionTypeRef {
        is_nullable: bool,
        is_suspend: bool,
        receiver_type_ref: Option<NodeId>,
        parameter_type_refs: Vec<NodeId>,
        return_type_ref: NodeId,
    },
    DynamicTypeRef {
        is_nullable: bool,
    },
    ResolvedTypeRef {
        ty: Type,
    },
    ErrorTypeRef {
        reason: Arc<str>,
    },
    TypeProjectionWithVariance {
        variance: Variance,
        type_ref: NodeId,
    },
    StarProjection,
    SimpleNamedReference {
        name: Arc<str>,
    },
    ResolvedNamedReference {
        name: Arc<str>,
        symbol: Symbol,
    },
    ErrorNamedReference {
        name: Arc<str>,
        reason: Arc<str>,
    },
    ExplicitThisReference {
        label: Option<Arc<str>>,
        bound_symbol: Option<Symbol>,
    },
    ExplicitSuperReference {
        super_type_ref: NodeId,
    },
    ControlFlowGraphReference {
        graph: GraphId,
    },
}

fn list(ids: &[NodeId], required: Capabilities) -> impl Iterator<Item = (NodeId, Capabilities)> + '_ {
    ids.iter().map(move |&id| (id, required))
}
fn opt(id: &Option<NodeId>, required: Capabilities) -> impl Iterator<Item = (NodeId, Capabilities)> {
    id.map(|id| (id, required)).into_iter()
}
fn one(id: NodeId, required: Capabilities) -> std::iter::Once<(NodeId, Capabilities)> {
    std::iter::once((id, required))
}

impl NodeKind {
    /// 種類の名前（判別子）
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::File { .. } => "File",
            NodeKind::Import { .. } => "Import",
            NodeKind::RegularClass { .. } => "RegularClass",
            NodeKind::TypeAlias { .. } => "TypeAlias",
            NodeKind::Constructor { .. } => "Constructor",
            NodeKind::SimpleFunction { .. } => "SimpleFunction",
            NodeKind::Property { .. } => "Property",
            NodeKind::ValueParameter { .. } => "ValueParameter",
            NodeKind::TypeParameter { .. } => "TypeParameter",
            NodeKind::AnnotationCall { .. } => "AnnotationCall",
            NodeKind::Const { .. } => "Const",
            NodeKind::StringConcatenationCall { .. } => "StringConcatenationCall",
            NodeKind::FunctionCall { .. } => "FunctionCall",
            NodeKind::ComponentCall { .. } => "ComponentCall",
            NodeKind::DelegatedConstructorCall { .. } => "DelegatedConstructorCall",
            NodeKind::QualifiedAccessExpression { .. } => "QualifiedAccessExpression",
            NodeKind::ThisReceiverExpression { .. } => "ThisReceiverExpression",
            NodeKind::ImplicitCast { .. } => "ImplicitCast",
            NodeKind::Block { .. } => "Block",
            NodeKind::Return { .. } => "Return",
            NodeKind::WhileLoop { .. } => "WhileLoop",
            NodeKind::DoWhileLoop { .. } => "DoWhileLoop",
            NodeKind::Break { .. } => "Break",
            NodeKind::Continue { .. } => "Continue",
            NodeKind::ErrorExpression { .. } => "ErrorExpression",
            NodeKind::ImplicitTypeRef => "ImplicitTypeRef",
            NodeKind::UserTypeRef { .. } => "UserTypeRef",
            NodeKind::FunctionTypeRef { .. } => "FunctionTypeRef",
            NodeKind::DynamicTypeRef { .. } => "DynamicTypeRef",
            NodeKind::ResolvedTypeRef { .. } => "ResolvedTypeRef",
            NodeKind::ErrorTypeRef { .. } => "ErrorTypeRef",
            NodeKind::TypeProjectionWithVariance { .. } => "TypeProjectionWithVariance",
            NodeKind::StarProjection => "StarProjection",
            NodeKind::SimpleNamedReference { .. } => "SimpleNamedReference",
            NodeKind::ResolvedNamedReference { .. } => "ResolvedNamedReference",
            NodeKind::ErrorNamedReference { .. } => "ErrorNamedReference",
            NodeKind::ExplicitThisReference { .. } => "ExplicitThisReference",
            NodeKind::ExplicitSuperReference { .. } => "ExplicitSuperReference",
            NodeKind::ControlFlowGraphReference { .. } => "ControlFlowGraphReference",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        use Capabilities as C;
        match self {
            NodeKind::File { .. } => C::DECLARATION | C::ANNOTATED,
            NodeKind::Import { .. } => C::IMPORT,
            NodeKind::RegularClass { .. } =>
                C::DECLARATION | C::CLASS_LIKE | C::TYPE_PARAMETERS_OWNER | C::ANNOTATED | C::STATEMENT,
            NodeKind::TypeAlias { .. } =>
                C::DECLARATION | C::CLASS_LIKE | C::TYPE_PARAMETERS_OWNER | C::ANNOTATED,
            NodeKind::Constructor { .. } =>
                C::DECLARATION | C::CALLABLE | C::TYPE_PARAMETERS_OWNER | C::ANNOTATED,
            NodeKind::SimpleFunction { .. } =>
                C::DECLARATION | C::CALLABLE | C::TYPE_PARAMETERS_OWNER | C::ANNOTATED | C::STATEMENT,
            NodeKind::Property { .. } => C::DECLARATION | C::CALLABLE | C::ANNOTATED | C::STATEMENT,
            NodeKind::ValueParameter { .. } => C::DECLARATION | C::VALUE_PARAMETER | C::ANNOTATED,
            NodeKind::TypeParameter { .. } => C::TYPE_PARAMETER | C::ANNOTATED,
            NodeKind::AnnotationCall { .. } => C::ANNOTATION | C::CALL,
            NodeKind::Const { .. } => C::EXPRESSION_NODE,
            NodeKind::StringConcatenationCall { .. } => C::EXPRESSION_NODE | C::CALL,
            NodeKind::FunctionCall { .. } | NodeKind::ComponentCall { .. } => C::CALL_NODE,
            NodeKind::DelegatedConstructorCall { .. } =>
                C::STATEMENT | C::CALL | C::DELEGATED_CONSTRUCTOR_CALL | C::ANNOTATED,
            NodeKind::QualifiedAccessExpression { .. } | NodeKind::ThisReceiverExpression { .. } =>
                C::EXPRESSION_NODE | C::QUALIFIED_ACCESS,
            NodeKind::ImplicitCast { .. } | NodeKind::Block { .. } | NodeKind::Return { .. }
            | NodeKind::ErrorExpression { .. } => C::EXPRESSION_NODE,
            NodeKind::WhileLoop { .. } | NodeKind::DoWhileLoop { .. } => C::STATEMENT | C::LOOP | C::ANNOTATED,
            NodeKind::Break { .. } | NodeKind::Continue { .. } => C::EXPRESSION_NODE | C::LOOP_JUMP,
            NodeKind::ImplicitTypeRef => C::TYPE_REF,
            NodeKind::UserTypeRef { .. } | NodeKind::FunctionTypeRef { .. } | NodeKind::DynamicTypeRef { .. }
            | NodeKind::ResolvedTypeRef { .. } | NodeKind::ErrorTypeRef { .. } => C::ANNOTATED_TYPE_REF,
            NodeKind::TypeProjectionWithVariance { .. } | NodeKind::StarProjection => C::TYPE_PROJECTION,
            NodeKind::SimpleNamedReference { .. } | NodeKind::ResolvedNamedReference { .. }
            | NodeKind::ErrorNamedReference { .. } => C::REFERENCE | C::NAMED_REFERENCE,
            NodeKind::ExplicitThisReference { .. } | NodeKind::ExplicitSuperReference { .. } => C::REFERENCE,
            NodeKind::ControlFlowGraphReference { .. } => C::REFERENCE | C::CONTROL_FLOW_GRAPH_REFERENCE,
        }
    }

    /// 所有している子と、各スロットが要求する契約を固定の順序で返します
    ///
    /// 順序は型パラメータ相当、主要な部分構造、末尾の構造（上位型・本体）の順です。
    pub fn slots(&self) -> Vec<(NodeId, Capabilities)> {
        use Capabilities as C;
        match self {
            NodeKind::File { imports, declarations, .. } =>
                list(imports, C::IMPORT).chain(list(declarations, C::DECLARATION)).collect(),
            NodeKind::RegularClass { type_parameters, declarations, super_type_refs, .. } =>
                list(type_parameters, C::TYPE_PARAMETER)
                    .chain(list(declarations, C::DECLARATION))
                    .chain(list(super_type_refs, C::TYPE_REF))
                    .collect(),
            NodeKind::TypeAlias { type_parameters, expanded_type_ref, .. } =>
                list(type_parameters, C::TYPE_PARAMETER).chain(one(*expanded_type_ref, C::TYPE_REF)).collect(),
            NodeKind::Constructor { type_parameters, return_type_ref, value_parameters, delegated_constructor, body, .. } =>
                list(type_parameters, C::TYPE_PARAMETER)
                    .chain(one(*return_type_ref, C::TYPE_REF))
                    .chain(list(value_parameters, C::VALUE_PARAMETER))
                    .chain(opt(delegated_constructor, C::DELEGATED_CONSTRUCTOR_CALL))
                    .chain(opt(body, C::EXPRESSION))
                    .collect(),
            NodeKind::SimpleFunction { type_parameters, receiver_type_ref, return_type_ref, value_parameters, control_flow_graph, body, .. } =>
                list(type_parameters, C::TYPE_PARAMETER)
                    .chain(opt(receiver_type_ref, C::TYPE_REF))
                    .chain(one(*return_type_ref, C::TYPE_REF))
                    .chain(list(value_parameters, C::VALUE_PARAMETER))
                    .chain(opt(control_flow_graph, C::CONTROL_FLOW_GRAPH_REFERENCE))
                    .chain(opt(body, C::EXPRESSION))
                    .collect(),
            NodeKind::Property { return_type_ref, initializer, .. } =>
                one(*return_type_ref, C::TYPE_REF).chain(opt(initializer, C::EXPRESSION)).collect(),
            NodeKind::ValueParameter { return_type_ref, default_value, .. } =>
                one(*return_type_ref, C::TYPE_REF).chain(opt(default_value, C::EXPRESSION)).collect(),
            NodeKind::TypeParameter { bounds, .. } => list(bounds, C::TYPE_REF).collect(),
            NodeKind::AnnotationCall { annotation_type_ref, arguments } =>
                one(*annotation_type_ref, C::TYPE_REF).chain(list(arguments, C::EXPRESSION)).collect(),
            NodeKind::Const { type_ref, .. } => vec![(*type_ref, C::TYPE_REF)],
            NodeKind::StringConcatenationCall { arguments, type_ref } =>
                one(*type_ref, C::TYPE_REF).chain(list(arguments, C::EXPRESSION)).collect(),
            NodeKind::FunctionCall { type_ref, type_arguments, explicit_receiver, dispatch_receiver, extension_receiver, callee, arguments, .. } =>
                one(*type_ref, C::TYPE_REF)
                    .chain(list(type_arguments, C::TYPE_PROJECTION))
                    .chain(opt(explicit_receiver, C::EXPRESSION))
                    .chain(opt(dispatch_receiver, C::EXPRESSION))
                    .chain(opt(extension_receiver, C::EXPRESSION))
                    .chain(one(*callee, C::NAMED_REFERENCE))
                    .chain(list(arguments, C::EXPRESSION))
                    .collect(),
            NodeKind::ComponentCall { type_ref, explicit_receiver, callee, .. } =>
                vec![(*type_ref, C::TYPE_REF), (*explicit_receiver, C::EXPRESSION), (*callee, C::NAMED_REFERENCE)],
            NodeKind::DelegatedConstructorCall { constructed_type_ref, callee, arguments, .. } =>
                one(*constructed_type_ref, C::TYPE_REF)
                    .chain(one(*callee, C::REFERENCE))
                    .chain(list(arguments, C::EXPRESSION))
                    .collect(),
            NodeKind::QualifiedAccessExpression { type_ref, explicit_receiver, dispatch_receiver, extension_receiver, callee, .. } =>
                one(*type_ref, C::TYPE_REF)
                    .chain(opt(explicit_receiver, C::EXPRESSION))
                    .chain(opt(dispatch_receiver, C::EXPRESSION))
                    .chain(opt(extension_receiver, C::EXPRESSION))
                    .chain(one(*callee, C::NAMED_REFERENCE))
                    .collect(),
            NodeKind::ThisReceiverExpression { type_ref, callee } =>
                vec![(*type_ref, C::TYPE_REF), (*callee, C::REFERENCE)],
            NodeKind::ImplicitCast { type_ref, argument } =>
                vec![(*type_ref, C::TYPE_REF), (*argument, C::EXPRESSION)],
            NodeKind::Block { type_ref, statements } =>
                one(*type_ref, C::TYPE_REF).chain(list(statements, C::STATEMENT)).collect(),
            NodeKind::Return { type_ref, result, .. } =>
                vec![(*type_ref, C::TYPE_REF), (*result, C::EXPRESSION)],
            NodeKind::WhileLoop { condition, block, .. } =>
                vec![(*condition, C::EXPRESSION), (*block, C::EXPRESSION)],
            NodeKind::DoWhileLoop { block, condition, .. } =>
                vec![(*block, C::EXPRESSION), (*condition, C::EXPRESSION)],
            NodeKind::Break { type_ref, .. } | NodeKind::Continue { type_ref, .. }
            | NodeKind::ErrorExpression { type_ref, .. } => vec![(*type_ref, C::TYPE_REF)],
            NodeKind::UserTypeRef { type_arguments, .. } => list(type_arguments, C::TYPE_PROJECTION).collect(),
            NodeKind::FunctionTypeRef { receiver_type_ref, parameter_type_refs, return_type_ref, .. } =>
                opt(receiver_type_ref, C::TYPE_REF)
                    .chain(list(parameter_type_refs, C::TYPE_REF))
                    .chain(one(*return_type_ref, C::TYPE_REF))
                    .collect(),
            NodeKind::TypeProjectionWithVariance { type_ref, .. } => vec![(*type_ref, C::TYPE_REF)],
            NodeKind::ExplicitSuperReference { super_type_ref } => vec![(*super_type_ref, C::TYPE_REF)],
            NodeKind::Import { .. }
            | NodeKind::ImplicitTypeRef
            | NodeKind::DynamicTypeRef { .. }
            | NodeKind::ResolvedTypeRef { .. }
            | NodeKind::ErrorTypeRef { .. }
            | NodeKind::StarProjection
            | NodeKind::SimpleNamedReference { .. }
            | NodeKind::ResolvedNamedReference { .. }
            | NodeKind::ErrorNamedReference { .. }
            | NodeKind::ExplicitThisReference { .. }
            | NodeKind::ControlFlowGraphReference { .. } => vec![],
        }
    }

    /// `slots` と同じ順序で、子スロットへの可変参照を返します
    pub(crate) fn slots_mut(&mut self) -> Vec<&mut NodeId> {
        fn list_mut(ids: &mut [NodeId]) -> impl Iterator<Item = &mut NodeId> {
            ids.iter_mut()
        }
        match self {
            NodeKind::File { imports, declarations, .. } =>
                list_mut(imports).chain(list_mut(declarations)).collect(),
            NodeKind::RegularClass { type_parameters, declarations, super_type_refs, .. } =>
                list_mut(type_parameters).chain(list_mut(declarations)).chain(list_mut(super_type_refs)).collect(),
            NodeKind::TypeAlias { type_parameters, expanded_type_ref, .. } =>
                list_mut(type_parameters).chain(std::iter::once(expanded_type_ref)).collect(),
            NodeKind::Constructor { type_parameters, return_type_ref, value_parameters, delegated_constructor, body, .. } =>
                list_mut(type_parameters)
                    .chain(std::iter::once(return_type_ref))
                    .chain(list_mut(value_parameters))
                    .chain(delegated_constructor.as_mut())
                    .chain(body.as_mut())
                    .collect(),
            NodeKind::SimpleFunction { type_parameters, receiver_type_ref, return_type_ref, value_parameters, control_flow_graph, body, .. } =>
                list_mut(type_parameters)
                    .chain(receiver_type_ref.as_mut())
                    .chain(std::iter::once(return_type_ref))
                    .chain(list_mut(value_parameters))
                    .chain(control_flow_graph.as_mut())
                    .chain(body.as_mut())
                    .collect(),
            NodeKind::Property { return_type_ref, initializer, .. } =>
                std::iter::once(return_type_ref).chain(initializer.as_mut()).collect(),
            NodeKind::ValueParameter { return_type_ref, default_value, .. } =>
                std::iter::once(return_type_ref).chain(default_value.as_mut()).collect(),
            NodeKind::TypeParameter { bounds, .. } => list_mut(bounds).collect(),
            NodeKind::AnnotationCall { annotation_type_ref, arguments } =>
                std::iter::once(annotation_type_ref).chain(list_mut(arguments)).collect(),
            NodeKind::Const { type_ref, .. } => vec![type_ref],
            NodeKind::StringConcatenationCall { arguments, type_ref } =>
                std::iter::once(type_ref).chain(list_mut(arguments)).collect(),
            NodeKind::FunctionCall { type_ref, type_arguments, explicit_receiver, dispatch_receiver, extension_receiver, callee, arguments, .. } =>
                std::iter::once(type_ref)
                    .chain(list_mut(type_arguments))
                    .chain(explicit_receiver.as_mut())
                    .chain(dispatch_receiver.as_mut())
                    .chain(extension_receiver.as_mut())
                    .chain(std::iter::once(callee))
                    .chain(list_mut(arguments))
                    .collect(),
            NodeKind::ComponentCall { type_ref, explicit_receiver, callee, .. } =>
                vec![type_ref, explicit_receiver, callee],
            NodeKind::DelegatedConstructorCall { constructed_type_ref, callee, arguments, .. } =>
                std::iter::once(constructed_type_ref)
                    .chain(std::iter::once(callee))
                    .chain(list_mut(arguments))
                    .collect(),
            NodeKind::QualifiedAccessExpression { type_ref, explicit_receiver, dispatch_receiver, extension_receiver, callee, .. } =>
                std::iter::once(type_ref)
                    .chain(explicit_receiver.as_mut())
                    .chain(dispatch_receiver.as_mut())
                    .chain(extension_receiver.as_mut())
                    .chain(std::iter::once(callee))
                    .collect(),
            NodeKind::ThisReceiverExpression { type_ref, callee } => vec![type_ref, callee],
            NodeKind::ImplicitCast { type_ref, argument } => vec![type_ref, argument],
            NodeKind::Block { type_ref, statements } =>
                std::iter::once(type_ref).chain(list_mut(statements)).collect(),
            NodeKind::Return { type_ref, result, .. } => vec![type_ref, result],
            NodeKind::WhileLoop { condition, block, .. } => vec![condition, block],
            NodeKind::DoWhileLoop { block, condition, .. } => vec![block, condition],
            NodeKind::Break { type_ref, .. } | NodeKind::Continue { type_ref, .. }
            | NodeKind::ErrorExpression { type_ref, .. } => vec![type_ref],
            NodeKind::UserTypeRef { type_arguments, .. } => list_mut(type_arguments).collect(),
            NodeKind::FunctionTypeRef { receiver_type_ref, parameter_type_refs, return_type_ref, .. } =>
                receiver_type_ref.as_mut().into_iter()
                    .chain(list_mut(parameter_type_refs))
                    .chain(std::iter::once(return_type_ref))
                    .collect(),
            NodeKind::TypeProjectionWithVariance { type_ref, .. } => vec![type_ref],
            NodeKind::ExplicitSuperReference { super_type_ref } => vec![super_type_ref],
            NodeKind::Import { .. }
            | NodeKind::ImplicitTypeRef
            | NodeKind::DynamicTypeRef { .. }
            | NodeKind::ResolvedTypeRef { .. }
            | NodeKind::ErrorTypeRef { .. }
            | NodeKind::StarProjection
            | NodeKind::SimpleNamedReference { .. }
            | NodeKind::ResolvedNamedReference { .. }
            | NodeKind::ErrorNamedReference { .. }
            | NodeKind::ExplicitThisReference { .. }
            | NodeKind::ControlFlowGraphReference { .. } => vec![],
        }
    }

    /// 所有しない関連（コンパニオン、ジャンプ先）
    fn weak_links_mut(&mut self) -> Vec<&mut Option<NodeId>> {
        match self {
            NodeKind::RegularClass { companion_object, .. } => vec![companion_object],
            NodeKind::Return { target, .. }
            | NodeKind::Break { target, .. }
            | NodeKind::Continue { target, .. } => vec![target],
            _ => vec![],
        }
    }

    /// 子と非所有の関連を取り除いた形。構造比較に使います
    pub(crate) fn shape(&self) -> NodeKind {
        let placeholder = Idx::from_raw(RawIdx::from(u32::MAX));
        let mut shape = self.clone();
        for slot in shape.slots_mut() {
            *slot = placeholder;
        }
        for link in shape.weak_links_mut() {
            *link = link.map(|_| placeholder);
        }
        shape
    }

    pub fn phase(&self) -> Option<ResolvePhase> {
        match self {
            NodeKind::File { phase, .. }
            | NodeKind::RegularClass { phase, .. }
            | NodeKind::TypeAlias { phase, .. }
            | NodeKind::Constructor { phase, .. }
            | NodeKind::SimpleFunction { phase, .. }
            | NodeKind::Property { phase, .. }
            | NodeKind::ValueParameter { phase, .. } => Some(*phase),
            _ => None,
        }
    }
    pub(crate) fn phase_mut(&mut self) -> Option<&mut ResolvePhase> {
        match self {
            NodeKind::File { phase, .. }
            | NodeKind::RegularClass { phase, .. }
            | NodeKind::TypeAlias { phase, .. }
            | NodeKind::Constructor { phase, .. }
            | NodeKind::SimpleFunction { phase, .. }
            | NodeKind::Property { phase, .. }
            | NodeKind::ValueParameter { phase, .. } => Some(phase),
            _ => None,
        }
    }
    pub fn supertypes_status(&self) -> Option<SupertypesComputationStatus> {
        match self {
            NodeKind::RegularClass { supertypes_status, .. }
            | NodeKind::TypeAlias { supertypes_status, .. } => Some(*supertypes_status),
            _ => None,
        }
    }
    pub(crate) fn supertypes_status_mut(&mut self) -> Option<&mut SupertypesComputationStatus> {
        match self {
            NodeKind::RegularClass { supertypes_status, .. }
            | NodeKind::TypeAlias { supertypes_status, .. } => Some(supertypes_status),
            _ => None,
        }
    }

    /// 式の型、または宣言の戻り値型のスロット
    pub fn type_ref(&self) -> Option<NodeId> {
        match self {
            NodeKind::Constructor { return_type_ref, .. }
            | NodeKind::SimpleFunction { return_type_ref, .. }
            | NodeKind::Property { return_type_ref, .. }
            | NodeKind::ValueParameter { return_type_ref, .. } => Some(*return_type_ref),
            NodeKind::Const { type_ref, .. }
            | NodeKind::StringConcatenationCall { type_ref, .. }
            | NodeKind::FunctionCall { type_ref, .. }
            | NodeKind::ComponentCall { type_ref, .. }
            | NodeKind::QualifiedAccessExpression { type_ref, .. }
            | NodeKind::ThisReceiverExpression { type_ref, .. }
            | NodeKind::ImplicitCast { type_ref, .. }
            | NodeKind::Block { type_ref, .. }
            | NodeKind::Return { type_ref, .. }
            | NodeKind::Break { type_ref, .. }
            | NodeKind::Continue { type_ref, .. }
            | NodeKind::ErrorExpression { type_ref, .. } => Some(*type_ref),
            _ => None,
        }
    }
    pub fn callee(&self) -> Option<NodeId> {
        match self {
            NodeKind::FunctionCall { callee, .. }
            | NodeKind::ComponentCall { callee, .. }
            | NodeKind::DelegatedConstructorCall { callee, .. }
            | NodeKind::QualifiedAccessExpression { callee, .. }
            | NodeKind::ThisReceiverExpression { callee, .. } => Some(*callee),
            _ => None,
        }
    }
    /// 宣言の名前。名前を持たない種類は `None`
    pub fn declaration_name(&self) -> Option<&Arc<str>> {
        match self {
            NodeKind::File { name, .. }
            | NodeKind::RegularClass { name, .. }
            | NodeKind::TypeAlias { name, .. }
            | NodeKind::SimpleFunction { name, .. }
            | NodeKind::Property { name, .. }
            | NodeKind::ValueParameter { name, .. }
            | NodeKind::TypeParameter { name, .. } => Some(name),
            _ => None,
        }
    }
    /// 未解決（置き換え待ち）の型参照かどうか
    pub fn is_unresolved_type_ref(&self) -> bool {
        matches!(self, NodeKind::ImplicitTypeRef | NodeKind::UserTypeRef { .. } | NodeKind::FunctionTypeRef { .. } | NodeKind::DynamicTypeRef { .. })
    }
}
