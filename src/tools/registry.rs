//! Tool registry.
//!
//! The [`ToolRegistry`] holds the tools offered to the realtime endpoint,
//! provides lookup by name, and exports schemas for tool registration.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::knowledge::KnowledgeTool;
use super::notes::NotesTool;
use super::types::{ToolSchema, ToolSpec};

/// Registry of callable tools.
///
/// Tools are registered with [`register()`](Self::register) and looked up
/// by name with [`get()`](Self::get). The same registry instance feeds tool
/// registration, call detection (only registered names are recognised), and
/// result formatting.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolSpec>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the knowledge retrieval and notes tools.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(KnowledgeTool::new()));
        reg.register(Arc::new(NotesTool::new()));
        reg
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolSpec>) {
        self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolSpec>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted names of all registered tools.
    pub fn names(&self) -> BTreeSet<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Export schemas for all tools, sorted by name.
    pub fn schemas_for_api(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.to_schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
