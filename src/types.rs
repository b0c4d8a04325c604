use std::sync::Arc;
use std::fmt;
use itertools::Itertools;
use crate::symbol::ClassId;

/// 解決済みの型
///
/// 木の中では `ResolvedTypeRef` が保持します。
#[derive(PartialEq, Clone, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    String,
    Unit,
    Any,
    Nothing,
    Class(ClassId, im::Vector<Type>),
    Function(im::Vector<Type>, Arc<Type>),
    TypeParameter(Arc<str>),
    Nullable(Arc<Type>),
    Error(Arc<str>),
}
impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{:?}", p),
            Type::String => write!(f, "String"),
            Type::Unit => write!(f, "Unit"),
            Type::Any => write!(f, "Any"),
            Type::Nothing => write!(f, "Nothing"),
            Type::Class(id, args) if args.is_empty() => write!(f, "{}", id),
            Type::Class(id, args) => write!(f, "{}<{}>", id, args.iter().map(|a| format!("{:?}", a)).join(", ")),
            Type::Function(params, ret) => write!(f, "({}) -> {:?}", params.iter().map(|p| format!("{:?}", p)).join(", "), ret),
            Type::TypeParameter(name) => write!(f, "{}", name),
            Type::Nullable(inner) => write!(f, "{:?}?", inner),
            Type::Error(reason) => write!(f, "<error: {}>", reason),
        }
    }
}
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}
impl PrimitiveType {
    pub const ALL: [PrimitiveType; 8] = [
        PrimitiveType::Boolean,
        PrimitiveType::Char,
        PrimitiveType::Byte,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
    ];
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Char => "Char",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Short => "Short",
            PrimitiveType::Int => "Int",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Double => "Double",
        }
    }
}

impl Type {
    pub fn boolean() -> Type {
        Type::Primitive(PrimitiveType::Boolean)
    }
    pub fn char() -> Type {
        Type::Primitive(PrimitiveType::Char)
    }
    pub fn byte() -> Type {
        Type::Primitive(PrimitiveType::Byte)
    }
    pub fn short() -> Type {
        Type::Primitive(PrimitiveType::Short)
    }
    pub fn int() -> Type {
        Type::Primitive(PrimitiveType::Int)
    }
    pub fn long() -> Type {
        Type::Primitive(PrimitiveType::Long)
    }
    pub fn float() -> Type {
        Type::Primitive(PrimitiveType::Float)
    }
    pub fn double() -> Type {
        Type::Primitive(PrimitiveType::Double)
    }
    pub fn nullable_any() -> Type {
        Type::Any.nullable()
    }
    pub fn class(id: ClassId) -> Type {
        Type::Class(id, im::Vector::new())
    }
    pub fn error(reason: impl Into<Arc<str>>) -> Type {
        Type::Error(reason.into())
    }
    pub fn nullable(self) -> Type {
        match self {
            Type::Nullable(_) => self,
            ty => Type::Nullable(Arc::new(ty)),
        }
    }
    /// null許容の印を外した型
    pub fn without_nullability(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            ty => ty,
        }
    }
    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }
    /// null非許容の `String` のときだけ真
    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }
    /// null許容かどうかを問わず `String` クラスなら真
    pub fn is_string_class_type(&self) -> bool {
        self.without_nullability().is_string()
    }
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }
    pub fn is_error(&self) -> bool {
        matches!(self.without_nullability(), Type::Error(_))
    }
    pub fn class_id(&self) -> Option<&ClassId> {
        match self.without_nullability() {
            Type::Class(id, _) => Some(id),
            _ => None,
        }
    }
    /// 組み込み型の名前から型を作ります
    pub fn builtin(name: &str) -> Option<Type> {
        let ty = match name {
            "String" => Type::String,
            "Unit" => Type::Unit,
            "Any" => Type::Any,
            "Nothing" => Type::Nothing,
            name => return PrimitiveType::ALL.iter()
                .find(|primitive| primitive.name() == name)
                .map(|&primitive| Type::Primitive(primitive)),
        };
        Some(ty)
    }
}

/// 型引数・型パラメータの変性
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Default)]
pub enum Variance {
    #[default]
    Invariant,
    In,
    Out,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert_eq!(Type::builtin("Short"), Some(Type::short()));
        assert_eq!(Type::builtin("String"), Some(Type::String));
        assert_eq!(Type::builtin("StringBuilder"), None);
    }

    #[test]
    fn test_nullability() {
        let ty = Type::String.nullable();
        assert!(!ty.is_string());
        assert!(ty.is_string_class_type());
        assert_eq!(ty.clone().nullable(), ty);
        assert_eq!(format!("{:?}", Type::nullable_any()), "Any?");
    }
}
