use std::collections::HashMap;
use std::sync::Arc;
use literally::hmap;
use crate::symbol::{CallableId, ClassId, FunctionInfo, SymbolTable};
use crate::types::Type;

/// 下げの結果が呼び出すJVMの組み込み関数
///
/// `append` と `valueOf` は引数の静的な型からちょうど一致する多重定義を選び、
/// 一致するものがなければ `Any?` を取る多重定義に落ちます。
#[derive(Debug, Clone)]
pub struct Builtins {
    pub string_builder: ClassId,
    pub string_builder_init: FunctionInfo,
    pub string_builder_to_string: FunctionInfo,
    append: HashMap<Type, FunctionInfo>,
    append_any: FunctionInfo,
    value_of: HashMap<Type, FunctionInfo>,
    value_of_any: FunctionInfo,
    pub string_plus: FunctionInfo,
}

impl Builtins {
    pub fn jvm() -> Self {
        let string_builder = ClassId::new("java/lang/StringBuilder");
        let string = ClassId::new("java/lang/String");
        let intrinsics = ClassId::new("kotlin/jvm/internal/Intrinsics");
        let builder_type = Type::class(string_builder.clone());

        let append = |parameter: Type| FunctionInfo::member(
            CallableId::member(&string_builder, "append", [parameter]),
            builder_type.clone(),
        );
        let value_of = |parameter: Type| FunctionInfo::top_level(
            CallableId::member(&string, "valueOf", [parameter]),
            Type::String,
        );
        Builtins {
            string_builder_init: FunctionInfo::top_level(
                CallableId::member(&string_builder, "<init>", []),
                builder_type.clone(),
            ),
            string_builder_to_string: FunctionInfo::member(
                CallableId::member(&string_builder, "toString", []),
                Type::String,
            ).overriding(),
            append: hmap! {
                Type::boolean() => append(Type::boolean()),
                Type::char() => append(Type::char()),
                Type::int() => append(Type::int()),
                Type::long() => append(Type::long()),
                Type::float() => append(Type::float()),
                Type::double() => append(Type::double()),
                Type::String => append(Type::String)
            },
            append_any: append(Type::nullable_any()),
            value_of: hmap! {
                Type::boolean() => value_of(Type::boolean()),
                Type::char() => value_of(Type::char()),
                Type::int() => value_of(Type::int()),
                Type::long() => value_of(Type::long()),
                Type::float() => value_of(Type::float()),
                Type::double() => value_of(Type::double())
            },
            value_of_any: value_of(Type::nullable_any()),
            string_plus: FunctionInfo::top_level(
                CallableId::member(&intrinsics, "stringPlus", [Type::String.nullable(), Type::nullable_any()]),
                Type::String,
            ),
            string_builder,
        }
    }

    /// `StringBuilder.append` のうち、型がちょうど一致する多重定義
    pub fn append_for(&self, ty: &Type) -> &FunctionInfo {
        self.append.get(ty).unwrap_or(&self.append_any)
    }

    /// `String.valueOf` のうち、型がちょうど一致する多重定義
    pub fn value_of_for(&self, ty: &Type) -> &FunctionInfo {
        self.value_of.get(ty).unwrap_or(&self.value_of_any)
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::jvm()
    }
}

/// 下げパスが共有する読み取り専用の文脈
#[derive(Debug, Clone)]
pub struct LoweringContext {
    pub symbols: Arc<SymbolTable>,
    pub builtins: Arc<Builtins>,
}

impl LoweringContext {
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        LoweringContext { symbols, builtins: Arc::new(Builtins::jvm()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_prefers_exact_overload() {
        let builtins = Builtins::jvm();
        assert_eq!(builtins.append_for(&Type::int()).id.parameters[0], Type::int());
        assert_eq!(builtins.append_for(&Type::String).id.parameters[0], Type::String);
        assert_eq!(builtins.append_for(&Type::String.nullable()).id.parameters[0], Type::nullable_any());
        assert_eq!(builtins.append_for(&Type::short()).id.parameters[0], Type::nullable_any());
        assert!(builtins.append_for(&Type::long()).has_dispatch_receiver);
    }

    #[test]
    fn test_value_of_has_no_string_overload() {
        let builtins = Builtins::jvm();
        assert_eq!(builtins.value_of_for(&Type::double()).id.parameters[0], Type::double());
        assert_eq!(builtins.value_of_for(&Type::String).id.parameters[0], Type::nullable_any());
        assert!(!builtins.value_of_for(&Type::char()).has_dispatch_receiver);
    }
}
