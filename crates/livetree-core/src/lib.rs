//! Tree-diffing template engine core: compiler, evaluator, renderer,
//! differ, and the per-connection [`Session`].
//!
//! A typical use: [`compiler::compile`] a template source string, register
//! it (or others it invokes) in a [`Registry`], build a [`Session`] around
//! it, and call [`Session::next_delta`] once per data snapshot. What comes
//! back is the [`tree::UpdateTree`] to serialize and send; `livetree-client`
//! is the other half that turns a stream of those back into HTML.

pub mod compiler;
pub mod config;
pub mod construct;
pub mod diff;
pub mod error;
pub mod eval;
pub mod fingerprint;
pub mod keys;
pub mod path;
pub mod registry;
pub mod render;
pub mod rendered;
pub mod session;
pub mod tree;

pub use compiler::compile;
pub use config::{EngineConfig, EvalMode};
pub use construct::{CompiledTemplate, Construct, KeySource};
pub use error::{CompileError, EngineError, EvaluationError, Result};
pub use eval::DataContext;
pub use path::{Path, Scope};
pub use registry::Registry;
pub use render::{interleave, render_html, render_tree};
pub use rendered::{RenderedTree, RenderedValue};
pub use session::{Coalescer, Session};
pub use tree::{DynValue, InsertPosition, Operation, UpdateTree};
