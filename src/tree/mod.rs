//! 型付き中間表現の木
//!
//! 宣言・式・型参照・参照を一つの木で表します。
//! この木は以下の主要な特徴を持ちます：
//!
//! - ノードはアリーナに置かれ、子は親がただ一人で所有する
//! - 種類ごとの構造上の契約（能力）を生成時に検査する
//! - 訪問者と変換器による一様な走査
//! - 宣言ごとに単調に進む解決フェーズ

mod arena;
mod builder;
mod capability;
mod core;
mod modifier;
mod visitor;

pub use arena::{Slot, SlotPosition, Tree};
pub use builder::{build_file, Maker, DESTRUCTURING_TEMPORARY};
pub use capability::Capabilities;
pub use self::core::*;
pub use modifier::{Modifiers, TypeModifier};
pub use visitor::{IdentityTransformer, Transformer, Visitor};
#[cfg(test)]
pub(crate) use arena::dangling;
