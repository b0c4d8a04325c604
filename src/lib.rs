# ![recursion_limit = "256"]

pub mod compiler;
pub mod config;
pub mod dfa;
pub mod errors;
pub mod lexer;
pub mod lower;
pub mod resolve;
pub mod span;
pub mod symbol;
pub mod syntax;
pub mod token;
pub mod tree;
pub mod types;
pub use crate::compiler::{CancellationFlag, CompiledUnit, Pipeline, UnitFailure};
pub use crate::config::PipelineConfig;
