//! Tools offered to the realtime endpoint.
//!
//! - [`types`]: the [`ToolSpec`] trait and wire [`ToolSchema`]
//! - [`registry`]: name lookup and schema export
//! - [`knowledge`]: `rag_knowledge`, document retrieval
//! - [`notes`]: `manage_notes`, note CRUD and search
//! - [`validation`]: argument checks against a tool's schema

pub mod knowledge;
pub mod notes;
pub mod registry;
pub mod types;
pub mod validation;

pub use knowledge::KnowledgeTool;
pub use notes::NotesTool;
pub use registry::ToolRegistry;
pub use types::{ToolSchema, ToolSpec};
