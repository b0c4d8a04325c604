//! 名前と型の解決
//!
//! 一つの翻訳単位の木を、インポートから本体まで一段ずつ解決します。
//! 各段は木の型参照・呼び出し先・`this`・ジャンプ先のスロットを埋め、
//! 終わるとすべての宣言のフェーズを一つ進めます。
//!
//! 他の翻訳単位の情報は確定済みの `SymbolTable` として読むだけです。

mod body;
mod core;
mod declarations;
mod imports;
mod supertypes;
mod types;

pub use self::core::{ResolveStep, Resolver};
