use std::sync::Arc;
use crate::errors::{Error, InternalError};
use crate::tree::{NodeKind, NodeId, Tree};
use super::core::{fq_class_id, Resolver};

impl Resolver {
    /// インポートをクラスIDに解決し、別名または短い名前で見えるようにします
    pub(super) fn resolve_imports(&mut self, tree: &mut Tree, file: NodeId) -> Result<(), InternalError> {
        let imports = match tree.kind(file) {
            NodeKind::File { imports, .. } => imports.clone(),
            _ => return Err(InternalError::IllegalSlot { node: tree.describe(file), slot: "imports" }),
        };
        for import in imports {
            let NodeKind::Import { fq_name, alias, .. } = tree.kind(import) else { continue };
            let (fq_name, alias) = (fq_name.clone(), alias.clone());
            let class_id = fq_class_id(&fq_name);
            if !self.is_known_class(&class_id) {
                self.error(Error::unresolved_import(fq_name, tree.node(import).span));
                continue;
            }
            let visible_name = alias.unwrap_or_else(|| Arc::from(class_id.short_name()));
            self.visible.insert(visible_name, class_id.clone());
            tree.resolve_import(import, class_id)?;
        }
        Ok(())
    }
}
