//! Immutable registry of compiled templates, safely shared across sessions.
//!
//! Per §5 "Shared resource policy": compiled templates are immutable after
//! compilation. `Registry` is cheaply `Clone` (an `Arc` per entry) so it can
//! be handed to every connection's session without synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use crate::construct::CompiledTemplate;
use crate::error::CompileError;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    templates: HashMap<String, Arc<CompiledTemplate>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Compile `src` and register it under `name`, at load time (so a
    /// `ParseError` surfaces before any connection can reach this template).
    pub fn register(&mut self, name: impl Into<String>, src: &str) -> Result<(), CompileError> {
        let compiled = crate::compiler::compile(src)?;
        self.templates.insert(name.into(), Arc::new(compiled));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledTemplate>> {
        self.templates.get(name).cloned()
    }
}
