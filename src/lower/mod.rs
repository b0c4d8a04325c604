//! 下げ（lowering）
//!
//! 本体まで解決された翻訳単位の木を、意味を変えずにより原始的な形へ書き換えるパス群です。
//! パスは名前と説明で登録され、設定された順に一つの翻訳単位ずつ実行されます。

mod component_call;
mod context;
mod core;
mod string_concatenation;

pub use self::core::*;
pub use component_call::ComponentCallLowering;
pub use context::{Builtins, LoweringContext};
pub use string_concatenation::StringConcatenationLowering;
