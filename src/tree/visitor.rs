use crate::errors::InternalError;
use super::arena::Tree;
use super::core::{NodeId, NodeKind};

/// 木を読み取り専用で辿る訪問者
///
/// 種類ごとの処理はより一般的な処理へ順に委譲されます
/// （関数 → 呼び出し可能な宣言 → 宣言 → 要素）。
/// 必須なのは `visit_element` だけです。
pub trait Visitor<D> {
    type Output;

    fn visit_element(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output;

    fn visit_declaration(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_file(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_declaration(tree, id, data)
    }
    fn visit_import(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_class_like(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_declaration(tree, id, data)
    }
    fn visit_regular_class(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_class_like(tree, id, data)
    }
    fn visit_type_alias(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_class_like(tree, id, data)
    }
    fn visit_callable(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_declaration(tree, id, data)
    }
    fn visit_constructor(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_callable(tree, id, data)
    }
    fn visit_simple_function(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_callable(tree, id, data)
    }
    fn visit_property(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_callable(tree, id, data)
    }
    fn visit_value_parameter(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_declaration(tree, id, data)
    }
    fn visit_type_parameter(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_annotation_call(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_statement(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_expression(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_statement(tree, id, data)
    }
    fn visit_const(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_string_concatenation_call(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_qualified_access_expression(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_function_call(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_qualified_access_expression(tree, id, data)
    }
    fn visit_component_call(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_function_call(tree, id, data)
    }
    fn visit_this_receiver_expression(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_qualified_access_expression(tree, id, data)
    }
    fn visit_delegated_constructor_call(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_statement(tree, id, data)
    }
    fn visit_implicit_cast(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_block(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_return(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_error_expression(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_loop(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_statement(tree, id, data)
    }
    fn visit_while_loop(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_loop(tree, id, data)
    }
    fn visit_do_while_loop(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_loop(tree, id, data)
    }
    fn visit_loop_jump(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_expression(tree, id, data)
    }
    fn visit_break(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_loop_jump(tree, id, data)
    }
    fn visit_continue(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_loop_jump(tree, id, data)
    }
    fn visit_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_implicit_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_ref(tree, id, data)
    }
    fn visit_user_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_ref(tree, id, data)
    }
    fn visit_function_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_ref(tree, id, data)
    }
    fn visit_dynamic_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_ref(tree, id, data)
    }
    fn visit_resolved_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_ref(tree, id, data)
    }
    fn visit_error_type_ref(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_resolved_type_ref(tree, id, data)
    }
    fn visit_type_projection(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_type_projection_with_variance(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_projection(tree, id, data)
    }
    fn visit_star_projection(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_type_projection(tree, id, data)
    }
    fn visit_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_element(tree, id, data)
    }
    fn visit_named_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_reference(tree, id, data)
    }
    fn visit_simple_named_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_named_reference(tree, id, data)
    }
    fn visit_resolved_named_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_named_reference(tree, id, data)
    }
    fn visit_error_named_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_named_reference(tree, id, data)
    }
    fn visit_explicit_this_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_reference(tree, id, data)
    }
    fn visit_explicit_super_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_reference(tree, id, data)
    }
    fn visit_control_flow_graph_reference(&mut self, tree: &Tree, id: NodeId, data: &mut D) -> Self::Output {
        self.visit_reference(tree, id, data)
    }
}

/// 木をその場で書き換える変換器
///
/// 各処理はスロットに書き戻すノードを返します。同じノードを返せば何も変わりません。
/// 既定の `transform_element` は子を変換してから自身を返すので、
/// 何も上書きしない変換器は恒等変換になります。
pub trait Transformer<D> {
    fn transform_element(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, data)?;
        Ok(id)
    }

    fn transform_declaration(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_file(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_declaration(tree, id, data)
    }
    fn transform_import(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_class_like(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_declaration(tree, id, data)
    }
    fn transform_regular_class(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_class_like(tree, id, data)
    }
    fn transform_type_alias(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_class_like(tree, id, data)
    }
    fn transform_callable(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_declaration(tree, id, data)
    }
    fn transform_constructor(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_callable(tree, id, data)
    }
    fn transform_simple_function(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_callable(tree, id, data)
    }
    fn transform_property(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_callable(tree, id, data)
    }
    fn transform_value_parameter(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_declaration(tree, id, data)
    }
    fn transform_type_parameter(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_annotation_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_statement(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_expression(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_statement(tree, id, data)
    }
    fn transform_const(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_string_concatenation_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_qualified_access_expression(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_function_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_qualified_access_expression(tree, id, data)
    }
    fn transform_component_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_function_call(tree, id, data)
    }
    fn transform_this_receiver_expression(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_qualified_access_expression(tree, id, data)
    }
    fn transform_delegated_constructor_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_statement(tree, id, data)
    }
    fn transform_implicit_cast(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_block(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_return(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_error_expression(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_loop(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_statement(tree, id, data)
    }
    fn transform_while_loop(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_loop(tree, id, data)
    }
    fn transform_do_while_loop(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_loop(tree, id, data)
    }
    fn transform_loop_jump(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_expression(tree, id, data)
    }
    fn transform_break(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_loop_jump(tree, id, data)
    }
    fn transform_continue(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_loop_jump(tree, id, data)
    }
    fn transform_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_implicit_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_ref(tree, id, data)
    }
    fn transform_user_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_ref(tree, id, data)
    }
    fn transform_function_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_ref(tree, id, data)
    }
    fn transform_dynamic_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_ref(tree, id, data)
    }
    fn transform_resolved_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_ref(tree, id, data)
    }
    fn transform_error_type_ref(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_resolved_type_ref(tree, id, data)
    }
    fn transform_type_projection(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_type_projection_with_variance(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_projection(tree, id, data)
    }
    fn transform_star_projection(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_type_projection(tree, id, data)
    }
    fn transform_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_element(tree, id, data)
    }
    fn transform_named_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_reference(tree, id, data)
    }
    fn transform_simple_named_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_named_reference(tree, id, data)
    }
    fn transform_resolved_named_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_named_reference(tree, id, data)
    }
    fn transform_error_named_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_named_reference(tree, id, data)
    }
    fn transform_explicit_this_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_reference(tree, id, data)
    }
    fn transform_explicit_super_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_reference(tree, id, data)
    }
    fn transform_control_flow_graph_reference(&mut self, tree: &mut Tree, id: NodeId, data: &mut D) -> Result<NodeId, InternalError> {
        self.transform_reference(tree, id, data)
    }
}

/// 何も書き換えない変換器
pub struct IdentityTransformer;

impl<D> Transformer<D> for IdentityTransformer {}

impl Tree {
    /// 種類に応じた訪問者の処理を呼びます
    pub fn accept<V, D>(&self, id: NodeId, visitor: &mut V, data: &mut D) -> V::Output
    where
        V: Visitor<D> + ?Sized,
    {
        match self.kind(id) {
            NodeKind::File { .. } => visitor.visit_file(self, id, data),
            NodeKind::Import { .. } => visitor.visit_import(self, id, data),
            NodeKind::RegularClass { .. } => visitor.visit_regular_class(self, id, data),
            NodeKind::TypeAlias { .. } => visitor.visit_type_alias(self, id, data),
            NodeKind::Constructor { .. } => visitor.visit_constructor(self, id, data),
            NodeKind::SimpleFunction { .. } => visitor.visit_simple_function(self, id, data),
            NodeKind::Property { .. } => visitor.visit_property(self, id, data),
            NodeKind::ValueParameter { .. } => visitor.visit_value_parameter(self, id, data),
            NodeKind::TypeParameter { .. } => visitor.visit_type_parameter(self, id, data),
            NodeKind::AnnotationCall { .. } => visitor.visit_annotation_call(self, id, data),
            NodeKind::Const { .. } => visitor.visit_const(self, id, data),
            NodeKind::StringConcatenationCall { .. } => visitor.visit_string_concatenation_call(self, id, data),
            NodeKind::FunctionCall { .. } => visitor.visit_function_call(self, id, data),
            NodeKind::ComponentCall { .. } => visitor.visit_component_call(self, id, data),
            NodeKind::DelegatedConstructorCall { .. } => visitor.visit_delegated_constructor_call(self, id, data),
            NodeKind::QualifiedAccessExpression { .. } => visitor.visit_qualified_access_expression(self, id, data),
            NodeKind::ThisReceiverExpression { .. } => visitor.visit_this_receiver_expression(self, id, data),
            NodeKind::ImplicitCast { .. } => visitor.visit_implicit_cast(self, id, data),
            NodeKind::Block { .. } => visitor.visit_block(self, id, data),
            NodeKind::Return { .. } => visitor.visit_return(self, id, data),
            NodeKind::WhileLoop { .. } => visitor.visit_while_loop(self, id, data),
            NodeKind::DoWhileLoop { .. } => visitor.visit_do_while_loop(self, id, data),
            NodeKind::Break { .. } => visitor.visit_break(self, id, data),
            NodeKind::Continue { .. } => visitor.visit_continue(self, id, data),
            NodeKind::ErrorExpression { .. } => visitor.visit_error_expression(self, id, data),
            NodeKind::ImplicitTypeRef => visitor.visit_implicit_type_ref(self, id, data),
            NodeKind::UserTypeRef { .. } => visitor.visit_user_type_ref(self, id, data),
            NodeKind::FunctionTypeRef { .. } => visitor.visit_function_type_ref(self, id, data),
            NodeKind::DynamicTypeRef { .. } => visitor.visit_dynamic_type_ref(self, id, data),
            NodeKind::ResolvedTypeRef { .. } => visitor.visit_resolved_type_ref(self, id, data),
            NodeKind::ErrorTypeRef { .. } => visitor.visit_error_type_ref(self, id, data),
            NodeKind::TypeProjectionWithVariance { .. } => visitor.visit_type_projection_with_variance(self, id, data),
            NodeKind::StarProjection => visitor.visit_star_projection(self, id, data),
            NodeKind::SimpleNamedReference { .. } => visitor.visit_simple_named_reference(self, id, data),
            NodeKind::ResolvedNamedReference { .. } => visitor.visit_resolved_named_reference(self, id, data),
            NodeKind::ErrorNamedReference { .. } => visitor.visit_error_named_reference(self, id, data),
            NodeKind::ExplicitThisReference { .. } => visitor.visit_explicit_this_reference(self, id, data),
            NodeKind::ExplicitSuperReference { .. } => visitor.visit_explicit_super_reference(self, id, data),
            NodeKind::ControlFlowGraphReference { .. } => visitor.visit_control_flow_graph_reference(self, id, data),
        }
    }

    /// 子を走査の順序で訪れます。各処理の戻り値は捨てられます
    pub fn accept_children<V, D>(&self, id: NodeId, visitor: &mut V, data: &mut D)
    where
        V: Visitor<D> + ?Sized,
    {
        for child in self.children(id) {
            self.accept(child, visitor, data);
        }
    }

    pub fn transform<T, D>(&mut self, id: NodeId, transformer: &mut T, data: &mut D) -> Result<NodeId, InternalError>
    where
        T: Transformer<D> + ?Sized,
    {
        match self.kind(id) {
            NodeKind::File { .. } => transformer.transform_file(self, id, data),
            NodeKind::Import { .. } => transformer.transform_import(self, id, data),
            NodeKind::RegularClass { .. } => transformer.transform_regular_class(self, id, data),
            NodeKind::TypeAlias { .. } => transformer.transform_type_alias(self, id, data),
            NodeKind::Constructor { .. } => transformer.transform_constructor(self, id, data),
            NodeKind::SimpleFunction { .. } => transformer.transform_simple_function(self, id, data),
            NodeKind::Property { .. } => transformer.transform_property(self, id, data),
            NodeKind::ValueParameter { .. } => transformer.transform_value_parameter(self, id, data),
            NodeKind::TypeParameter { .. } => transformer.transform_type_parameter(self, id, data),
            NodeKind::AnnotationCall { .. } => transformer.transform_annotation_call(self, id, data),
            NodeKind::Const { .. } => transformer.transform_const(self, id, data),
            NodeKind::StringConcatenationCall { .. } => transformer.transform_string_concatenation_call(self, id, data),
            NodeKind::FunctionCall { .. } => transformer.transform_function_call(self, id, data),
            NodeKind::ComponentCall { .. } => transformer.transform_component_call(self, id, data),
            NodeKind::DelegatedConstructorCall { .. } => transformer.transform_delegated_constructor_call(self, id, data),
            NodeKind::QualifiedAccessExpression { .. } => transformer.transform_qualified_access_expression(self, id, data),
            NodeKind::ThisReceiverExpression { .. } => transformer.transform_this_receiver_expression(self, id, data),
            NodeKind::ImplicitCast { .. } => transformer.transform_implicit_cast(self, id, data),
            NodeKind::Block { .. } => transformer.transform_block(self, id, data),
            NodeKind::Return { .. } => transformer.transform_return(self, id, data),
            NodeKind::WhileLoop { .. } => transformer.transform_while_loop(self, id, data),
            NodeKind::DoWhileLoop { .. } => transformer.transform_do_while_loop(self, id, data),
            NodeKind::Break { .. } => transformer.transform_break(self, id, data),
            NodeKind::Continue { .. } => transformer.transform_continue(self, id, data),
            NodeKind::ErrorExpression { .. } => transformer.transform_error_expression(self, id, data),
            NodeKind::ImplicitTypeRef => transformer.transform_implicit_type_ref(self, id, data),
            NodeKind::UserTypeRef { .. } => transformer.transform_user_type_ref(self, id, data),
            NodeKind::FunctionTypeRef { .. } => transformer.transform_function_type_ref(self, id, data),
            NodeKind::DynamicTypeRef { .. } => transformer.transform_dynamic_type_ref(self, id, data),
            NodeKind::ResolvedTypeRef { .. } => transformer.transform_resolved_type_ref(self, id, data),
            NodeKind::ErrorTypeRef { .. } => transformer.transform_error_type_ref(self, id, data),
            NodeKind::TypeProjectionWithVariance { .. } => transformer.transform_type_projection_with_variance(self, id, data),
            NodeKind::StarProjection => transformer.transform_star_projection(self, id, data),
            NodeKind::SimpleNamedReference { .. } => transformer.transform_simple_named_reference(self, id, data),
            NodeKind::ResolvedNamedReference { .. } => transformer.transform_resolved_named_reference(self, id, data),
            NodeKind::ErrorNamedReference { .. } => transformer.transform_error_named_reference(self, id, data),
            NodeKind::ExplicitThisReference { .. } => transformer.transform_explicit_this_reference(self, id, data),
            NodeKind::ExplicitSuperReference { .. } => transformer.transform_explicit_super_reference(self, id, data),
            NodeKind::ControlFlowGraphReference { .. } => transformer.transform_control_flow_graph_reference(self, id, data),
        }
    }

    /// 子をそれぞれ変換し、結果をスロットに書き戻します
    ///
    /// 書き戻すノードはスロットの契約を満たし、まだどこにも所有されていない必要があります。
    /// クラスではその後でコンパニオンオブジェクトを求め直します。
    pub fn transform_children<T, D>(&mut self, id: NodeId, transformer: &mut T, data: &mut D) -> Result<(), InternalError>
    where
        T: Transformer<D> + ?Sized,
    {
        for slot in self.slots(id) {
            let new = self.transform(slot.child, transformer, data)?;
            self.set_slot(&slot, new)?;
        }
        self.recompute_companion(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::tree::{ClassKind, ConstValue, DeclarationStatus, Node, ResolvePhase, SupertypesComputationStatus};
    use crate::symbol::ClassId;

    /// 訪れた種類の名前を順に記録する
    struct Recorder;

    impl Visitor<Vec<String>> for Recorder {
        type Output = ();
        fn visit_element(&mut self, tree: &Tree, id: NodeId, data: &mut Vec<String>) {
            data.push(tree.kind(id).name().to_string());
            tree.accept_children(id, self, data);
        }
        fn visit_type_parameter(&mut self, tree: &Tree, id: NodeId, data: &mut Vec<String>) {
            if let NodeKind::TypeParameter { name, .. } = tree.kind(id) {
                data.push(format!("T:{}", name));
            }
        }
        fn visit_type_ref(&mut self, _tree: &Tree, _id: NodeId, _data: &mut Vec<String>) {}
    }

    fn type_parameter(tree: &mut Tree, name: &str) -> NodeId {
        tree.alloc(Node::new(NodeKind::TypeParameter {
            name: Arc::from(name),
            variance: Default::default(),
            is_reified: false,
            bounds: vec![],
        })).unwrap()
    }

    fn class_with_constructor(tree: &mut Tree) -> NodeId {
        let class_parameter = type_parameter(tree, "A");
        let constructor_parameter = type_parameter(tree, "B");
        let return_type_ref = tree.implicit_type_ref();
        let constructor = tree.alloc(Node::new(NodeKind::Constructor {
            owner: ClassId::new("Foo"),
            is_primary: true,
            type_parameters: vec![constructor_parameter],
            return_type_ref,
            value_parameters: vec![],
            delegated_constructor: None,
            body: None,
            phase: ResolvePhase::RawIr,
        })).unwrap();
        let super_type = tree.implicit_type_ref();
        tree.alloc(Node::new(NodeKind::RegularClass {
            name: Arc::from("Foo"),
            class_id: ClassId::new("Foo"),
            class_kind: ClassKind::Class,
            status: DeclarationStatus::default(),
            type_parameters: vec![class_parameter],
            declarations: vec![constructor],
            super_type_refs: vec![super_type],
            companion_object: None,
            phase: ResolvePhase::RawIr,
            supertypes_status: SupertypesComputationStatus::NotComputed,
        })).unwrap()
    }

    #[test]
    fn test_constructor_type_parameters_are_visited_by_class() {
        let mut tree = Tree::new();
        let class = class_with_constructor(&mut tree);
        let mut visited = vec![];
        tree.accept(class, &mut Recorder, &mut visited);
        assert_eq!(visited, vec!["RegularClass", "T:A", "T:B", "Constructor"]);
    }

    #[test]
    fn test_identity_transform_keeps_tree() {
        let mut tree = Tree::new();
        let class = class_with_constructor(&mut tree);
        let before = tree.clone();
        let result = tree.transform(class, &mut IdentityTransformer, &mut ()).unwrap();
        assert_eq!(result, class);
        assert!(tree.structurally_equal(class, &before, class));
        assert!(tree.verify(class).is_ok());
    }

    /// 整数定数をすべて 0 に置き換える
    struct Zeroing;

    impl Transformer<usize> for Zeroing {
        fn transform_const(&mut self, tree: &mut Tree, id: NodeId, count: &mut usize) -> Result<NodeId, InternalError> {
            if let NodeKind::Const { value: ConstValue::Int(_), .. } = tree.kind(id) {
                *count += 1;
                tree.detach(id)?;
                let type_ref = tree.resolved_type_ref(crate::types::Type::int());
                return tree.alloc(Node::new(NodeKind::Const { value: ConstValue::Int(0), type_ref }));
            }
            Ok(id)
        }
    }

    /// 子を切り離さずに返して別名を作ろうとする
    struct Aliasing;

    impl Transformer<()> for Aliasing {
        fn transform_implicit_cast(&mut self, tree: &mut Tree, id: NodeId, _: &mut ()) -> Result<NodeId, InternalError> {
            match tree.kind(id) {
                NodeKind::ImplicitCast { argument, .. } => Ok(*argument),
                _ => Ok(id),
            }
        }
    }

    fn int_const(tree: &mut Tree, value: i32) -> NodeId {
        let type_ref = tree.implicit_type_ref();
        tree.alloc(Node::new(NodeKind::Const { value: ConstValue::Int(value), type_ref })).unwrap()
    }

    #[test]
    fn test_transform_substitutes_children() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        let two = int_const(&mut tree, 2);
        let type_ref = tree.implicit_type_ref();
        let block = tree.alloc(Node::new(NodeKind::Block { type_ref, statements: vec![one, two] })).unwrap();
        let mut count = 0;
        tree.transform(block, &mut Zeroing, &mut count).unwrap();
        assert_eq!(count, 2);
        let NodeKind::Block { statements, .. } = tree.kind(block) else { panic!("block expected") };
        assert!(statements.iter().all(|&statement| matches!(
            tree.kind(statement),
            NodeKind::Const { value: ConstValue::Int(0), .. }
        )));
        assert!(tree.verify(block).is_ok());
    }

    #[test]
    fn test_transform_rejects_aliasing() {
        let mut tree = Tree::new();
        let one = int_const(&mut tree, 1);
        let type_ref = tree.implicit_type_ref();
        let cast = tree.alloc(Node::new(NodeKind::ImplicitCast { type_ref, argument: one })).unwrap();
        let type_ref = tree.implicit_type_ref();
        let block = tree.alloc(Node::new(NodeKind::Block { type_ref, statements: vec![cast] })).unwrap();
        let result = tree.transform(block, &mut Aliasing, &mut ());
        assert!(matches!(result, Err(InternalError::SchemaViolation { .. })));
    }
}
