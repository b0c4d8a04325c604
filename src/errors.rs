use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;
use crate::span::Span;
use crate::symbol::ClassId;
use crate::tree::ResolvePhase;
use itertools::Itertools;

/// 利用者に報告される診断
///
/// 診断は例外ではなく、木の中にはエラーノードとして残ります。
/// ここではその一覧を報告用に保持します。
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    ResolutionError(ResolutionError),
    NameError(NameError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub span: Option<Span>,
}

impl Error {
    pub fn cyclic_supertype(chain: Vec<ClassId>, span: Option<Span>) -> Self {
        Error { kind: ErrorKind::ResolutionError(ResolutionError::CyclicSupertype { chain }), span }
    }
    pub fn unresolved_type(name: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Error { kind: ErrorKind::ResolutionError(ResolutionError::UnresolvedType { name: name.into() }), span }
    }
    pub fn unresolved_import(fq_name: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Error { kind: ErrorKind::ResolutionError(ResolutionError::UnresolvedImport { fq_name: fq_name.into() }), span }
    }
    pub fn uninferred_type(name: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Error { kind: ErrorKind::ResolutionError(ResolutionError::UninferredType { name: name.into() }), span }
    }
    pub fn unresolved_reference(name: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Error { kind: ErrorKind::NameError(NameError::UnresolvedReference { name: name.into() }), span }
    }
    pub fn unresolved_label(label: impl Into<Arc<str>>, span: Option<Span>) -> Self {
        Error { kind: ErrorKind::NameError(NameError::UnresolvedLabel { label: label.into() }), span }
    }
    pub fn this_outside_class(span: Option<Span>) -> Self {
        Error { kind: ErrorKind::NameError(NameError::ThisOutsideClass), span }
    }
    /// エラーノードに埋め込む短い理由
    pub fn reason(&self) -> String {
        match &self.kind {
            ErrorKind::ResolutionError(ResolutionError::CyclicSupertype { chain }) =>
                format!("Loop in supertypes: {}", chain.iter().join(" -> ")),
            ErrorKind::ResolutionError(ResolutionError::UnresolvedType { name }) =>
                format!("Unresolved type: {}", name),
            ErrorKind::ResolutionError(ResolutionError::UnresolvedImport { fq_name }) =>
                format!("Unresolved import: {}", fq_name),
            ErrorKind::ResolutionError(ResolutionError::UninferredType { name }) =>
                format!("Cannot infer a type for {}", name),
            ErrorKind::NameError(NameError::UnresolvedReference { name }) =>
                format!("Unresolved reference: {}", name),
            ErrorKind::NameError(NameError::UnresolvedLabel { label }) =>
                format!("Unresolved label: {}", label),
            ErrorKind::NameError(NameError::ThisOutsideClass) =>
                "'this' is not defined in this context".to_string(),
        }
    }
    pub fn message(&self) -> String {
        match &self.kind {
            ErrorKind::ResolutionError(resolution_error) => match resolution_error {
                ResolutionError::CyclicSupertype { chain } =>
                    format!("上位型の循環: {}", chain.iter().join(" -> ")),
                ResolutionError::UnresolvedType { name } =>
                    format!("未解決の型: {}", name),
                ResolutionError::UnresolvedImport { fq_name } =>
                    format!("未解決のインポート: {}", fq_name),
                ResolutionError::UninferredType { name } =>
                    format!("{} の型を推論できません", name),
            },
            ErrorKind::NameError(name_error) => format!("{}", name_error),
        }
    }
    pub fn location_string(&self) -> String {
        match self.span {
            Some(span) => format!("{}行目 {}文字目", span.start.line, span.start.column),
            None => "位置不明".to_string(),
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub enum ResolutionError {
    CyclicSupertype {
        chain: Vec<ClassId>,
    },
    UnresolvedType {
        name: Arc<str>,
    },
    UnresolvedImport {
        fq_name: Arc<str>,
    },
    /// 型が省略され、使われる時点でまだ推論されていない宣言
    UninferredType {
        name: Arc<str>,
    },
}
#[derive(Clone, Debug, PartialEq)]
pub enum NameError {
    UnresolvedReference {
        name: Arc<str>,
    },
    UnresolvedLabel {
        label: Arc<str>,
    },
    ThisOutsideClass,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::UnresolvedReference { name } => write!(f, "未解決の参照: {}", name),
            NameError::UnresolvedLabel { label } => write!(f, "未解決のラベル: @{}", label),
            NameError::ThisOutsideClass => write!(f, "クラスの外で this は使えません"),
        }
    }
}

/// パイプライン内部の整合性違反
///
/// 正しいパイプラインでは起こらないプログラミングエラーで、
/// 発生した翻訳単位の処理はその場で打ち切られます。
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum InternalError {
    #[error("schema violation at {node}: {reason}")]
    SchemaViolation { node: String, reason: String },

    #[error("illegal mutation of slot `{slot}` on {node}")]
    IllegalSlot { node: String, slot: &'static str },

    #[error("{node} is at phase {actual:?} but {required:?} is required")]
    PhasePrecondition { node: String, required: ResolvePhase, actual: ResolvePhase },

    #[error("type of {node} was read before it was resolved")]
    TypeNotResolved { node: String },

    #[error("illegal phase transition of {node}: {from:?} -> {to:?}")]
    IllegalPhaseTransition { node: String, from: ResolvePhase, to: ResolvePhase },

    #[error("{node} cannot reach {phase:?}: {reason}")]
    PrerequisiteUnmet { node: String, phase: ResolvePhase, reason: String },

    #[error("malformed raw syntax `{kind}`: {reason}")]
    MalformedSyntax { kind: String, reason: String },

    #[error("no symbol `{symbol}` is available")]
    UnboundSymbol { symbol: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_reason_lists_chain() {
        let error = Error::cyclic_supertype(vec![ClassId::new("A"), ClassId::new("B"), ClassId::new("A")], None);
        assert_eq!(error.reason(), "Loop in supertypes: A -> B -> A");
        assert_eq!(error.location_string(), "位置不明");
    }

    #[test]
    fn test_internal_error_display() {
        let error = InternalError::PhasePrecondition {
            node: "SimpleFunction#3".to_string(),
            required: ResolvePhase::BodyResolved,
            actual: ResolvePhase::TypesResolved,
        };
        assert_eq!(error.to_string(), "SimpleFunction#3 is at phase TypesResolved but BodyResolved is required");
    }
}
