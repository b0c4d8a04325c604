use crate::errors::InternalError;
use crate::tree::{Node, NodeId, NodeKind, Transformer, Tree};
use super::core::{require_body_resolved, FileLoweringPass};
use super::context::LoweringContext;

/// 分解宣言の `componentN()` 呼び出しを、受け手をディスパッチレシーバとする普通の呼び出しにします
pub struct ComponentCallLowering;

impl ComponentCallLowering {
    pub fn new(_context: &LoweringContext) -> Self {
        ComponentCallLowering
    }
}

impl FileLoweringPass for ComponentCallLowering {
    fn lower(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        tree.transform(file, self, &mut ())?;
        Ok(())
    }
}

impl Transformer<()> for ComponentCallLowering {
    fn transform_declaration(&mut self, tree: &mut Tree, id: NodeId, data: &mut ()) -> Result<NodeId, InternalError> {
        require_body_resolved(tree, id)?;
        self.transform_element(tree, id, data)
    }

    fn transform_component_call(&mut self, tree: &mut Tree, id: NodeId, data: &mut ()) -> Result<NodeId, InternalError> {
        tree.transform_children(id, self, data)?;
        let NodeKind::ComponentCall { type_ref, explicit_receiver, callee, .. } = tree.kind(id) else {
            return Ok(id);
        };
        let (type_ref, receiver, callee) = (*type_ref, *explicit_receiver, *callee);
        let span = tree.node(id).span;
        tree.detach(id)?;
        tree.alloc(Node::with_span(NodeKind::FunctionCall {
            safe: false,
            type_ref,
            type_arguments: vec![],
            explicit_receiver: None,
            dispatch_receiver: Some(receiver),
            extension_receiver: None,
            callee,
            arguments: vec![],
        }, span))
    }
}
