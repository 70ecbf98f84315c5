//! `livetree`: the facade over [`livetree_core`] (compile, render, diff,
//! session) and [`livetree_client`] (merge deltas back into HTML).
//!
//! Most callers only need [`prelude`]:
//!
//! ```
//! use livetree::prelude::*;
//! use serde_json::json;
//!
//! let tpl = compile("<p>Hello {{.Name}}!</p>").unwrap();
//! let registry = Registry::new();
//! let mut session = Session::new(std::sync::Arc::new(tpl), registry, EngineConfig::default());
//! let full = session.full_tree(json!({"Name": "World"})).unwrap();
//! assert_eq!(full.to_value(), json!({"s": ["<p>Hello ", "!</p>"], "0": "World"}));
//! ```

pub use livetree_client as client;
pub use livetree_core as core;

pub mod prelude {
    pub use livetree_client::CachedTree;
    pub use livetree_core::{
        compile, render_html, CompiledTemplate, Construct, DataContext, EngineConfig, EngineError, EvalMode,
        KeySource, Path, Registry, RenderedTree, Scope, Session, UpdateTree,
    };
}
