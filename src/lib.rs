//! Fury: typed, schema-driven DAG execution engine
//!
//! Composes two kinds of computational units — programmatic actions (native
//! callables wrapping I/O such as HTTP requests and text transforms) and AI
//! actions (templated prompts rendered and dispatched to an LLM provider) —
//! into a directed acyclic graph whose edges carry named values between
//! units.
//!
//! # Core Concepts
//!
//! - **Var**: JSON-schema-like descriptor of a single named value
//! - **Node**: a registered unit wrapping a callable with declared input
//!   fields and output projections
//! - **Edge**: names which source outputs feed which target fields
//! - **Chain**: a validated DAG with a cached topological order; executing
//!   it routes intermediates through a per-run IR map keyed
//!   `"<node_id>/<output_name>"`
//!
//! Execution is strictly sequential: one node at a time in topological
//! order, with each node's outputs published to the IR before any
//! downstream node runs.
//!
//! # Example
//!
//! ```
//! use fury::{Var, VarKind};
//!
//! let var = Var::string().with_name("url").required().shown();
//! assert!(var.var_type.is_kind(VarKind::String));
//! assert_eq!(
//!     serde_json::to_value(&var).unwrap(),
//!     serde_json::json!({"type": "string", "required": true, "show": true, "name": "url"}),
//! );
//! ```

pub mod ai;
mod chain;
pub mod model;
pub mod path;
pub mod schema;
pub mod template;

pub use ai::{AiAction, ChatTemplate, TemplateBody};
pub use chain::{
    topological_sort, Action, ActionError, Chain, ChainError, DataMap, Edge, FnAction, IrMap,
    Node, NodeType,
};
pub use model::{
    model_tags, ChatMessage, MockProvider, Model, ModelError, ModelProvider, ModelRegistry,
    RenderedPrompt,
};
pub use path::{get_path, put_path, Path, PathKey};
pub use schema::{
    params_to_vars, returns_to_vars, AdditionalProps, Param, SchemaError, Signature, TypeRepr,
    Var, VarKind, VarType,
};
pub use template::{extract_template_indices, template_vars, TemplateError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
