use std::sync::Arc;
use std::collections::HashMap;
use std::fmt;
use itertools::Itertools;
use crate::tree::{ClassKind, NodeId};
use crate::types::Type;

/// クラスの完全修飾名（`kotlin/String` のような `/` 区切り）
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClassId(Arc<str>);

impl ClassId {
    pub fn new(fq_name: impl Into<Arc<str>>) -> Self {
        ClassId(fq_name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn short_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}
impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 関数・プロパティを一意に識別する値
///
/// オーバーロードを区別するためにパラメータの型を含みます。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CallableId {
    pub owner: Option<ClassId>,
    pub name: Arc<str>,
    pub parameters: im::Vector<Type>,
}

impl CallableId {
    pub fn new(owner: Option<ClassId>, name: impl Into<Arc<str>>, parameters: impl IntoIterator<Item = Type>) -> Self {
        Self { owner, name: name.into(), parameters: parameters.into_iter().collect() }
    }
    pub fn member(owner: &ClassId, name: impl Into<Arc<str>>, parameters: impl IntoIterator<Item = Type>) -> Self {
        Self::new(Some(owner.clone()), name, parameters)
    }
}
impl fmt::Debug for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{}.", owner)?;
        }
        write!(f, "{}({})", self.name, self.parameters.iter().map(|p| format!("{:?}", p)).join(", "))
    }
}

/// 参照の解決先
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Symbol {
    Class(ClassId),
    Callable(CallableId),
    /// 同じ翻訳単位内のローカル変数・パラメータ・プロパティ
    Variable { name: Arc<str>, declaration: NodeId },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionInfo {
    pub id: CallableId,
    pub return_type: Type,
    pub has_dispatch_receiver: bool,
    pub has_extension_receiver: bool,
    pub is_override: bool,
}

impl FunctionInfo {
    pub fn member(id: CallableId, return_type: Type) -> Self {
        Self { id, return_type, has_dispatch_receiver: true, has_extension_receiver: false, is_override: false }
    }
    pub fn top_level(id: CallableId, return_type: Type) -> Self {
        Self { id, return_type, has_dispatch_receiver: false, has_extension_receiver: false, is_override: false }
    }
    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassInfo {
    pub id: ClassId,
    pub kind: ClassKind,
    pub is_inline: bool,
    pub supertypes: Vec<Type>,
    pub functions: Vec<FunctionInfo>,
    pub properties: Vec<(Arc<str>, Type)>,
}

impl ClassInfo {
    pub fn new(id: ClassId, kind: ClassKind) -> Self {
        Self { id, kind, is_inline: false, supertypes: vec![], functions: vec![], properties: vec![] }
    }
    pub fn functions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionInfo> + 'a {
        self.functions.iter().filter(move |function| function.id.name.as_ref() == name)
    }
}

/// 他の翻訳単位や外部ライブラリから得られた、確定済みのシンボル情報
///
/// 並列に処理される各翻訳単位からは `Arc` 越しに読み取り専用で共有されます。
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    classes: HashMap<ClassId, ClassInfo>,
    top_level: Vec<FunctionInfo>,
    inline_class_replacements: HashMap<CallableId, FunctionInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_class(&mut self, info: ClassInfo) {
        self.classes.insert(info.id.clone(), info);
    }
    pub fn add_top_level_function(&mut self, info: FunctionInfo) {
        self.top_level.push(info);
    }
    /// インラインクラスのメンバ関数を、ボックス化せずに呼べる静的関数に対応付けます
    pub fn add_inline_class_replacement(&mut self, original: CallableId, replacement: FunctionInfo) {
        self.inline_class_replacements.insert(original, replacement);
    }
    pub fn class(&self, id: &ClassId) -> Option<&ClassInfo> {
        self.classes.get(id)
    }
    /// 短い名前からクラスを探します。候補が複数ある場合は `None` を返します
    pub fn class_by_short_name(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.values()
            .filter(|info| info.id.short_name() == name)
            .exactly_one()
            .ok()
    }
    pub fn top_level_functions<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionInfo> + 'a {
        self.top_level.iter().filter(move |function| function.id.name.as_ref() == name)
    }
    pub fn inline_class_replacement(&self, original: &CallableId) -> Option<&FunctionInfo> {
        self.inline_class_replacements.get(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_short_name() {
        assert_eq!(ClassId::new("kotlin/collections/List").short_name(), "List");
        assert_eq!(ClassId::new("Local").short_name(), "Local");
    }

    #[test]
    fn test_class_by_short_name_requires_unique_match() {
        let mut table = SymbolTable::new();
        table.add_class(ClassInfo::new(ClassId::new("a/Foo"), ClassKind::Class));
        assert!(table.class_by_short_name("Foo").is_some());
        table.add_class(ClassInfo::new(ClassId::new("b/Foo"), ClassKind::Class));
        assert!(table.class_by_short_name("Foo").is_none());
    }

    #[test]
    fn test_callable_debug_includes_overload() {
        let owner = ClassId::new("java/lang/StringBuilder");
        let id = CallableId::member(&owner, "append", [Type::int()]);
        assert_eq!(format!("{:?}", id), "java/lang/StringBuilder.append(Int)");
    }
}
