//! Node: a registered computational unit wrapping a callable

use super::ChainError;
use crate::path::{get_path, Path};
use crate::schema::{params_to_vars, returns_to_vars, SchemaError, Signature, Var};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Named inputs passed to an action; also the shape of projected outputs.
pub type DataMap = serde_json::Map<String, Value>;

/// The per-execution intermediate representation: every projected output,
/// keyed `"<node_id>/<output_name>"`, in publication order.
pub type IrMap = IndexMap<String, Value>;

/// The two kinds of computational units a chain composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// Native code: I/O, transforms.
    #[serde(rename = "programmatic")]
    Programmatic,
    /// A rendered prompt dispatched to a model provider.
    #[serde(rename = "ai-powered")]
    Ai,
}

/// Failure raised by a node's underlying callable.
///
/// `trace` is the human-readable diagnostic adjacent to the error — the
/// engine's rendering of a formatted stack string.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
    pub trace: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let trace = message.clone();
        ActionError { message, trace }
    }

    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        ActionError {
            message: message.into(),
            trace: trace.into(),
        }
    }
}

/// The callable seam between the engine and a unit's body.
///
/// Implementations perform the only I/O in a chain (HTTP requests, model
/// provider calls). The engine invokes them with a map of named inputs and
/// treats the returned payload as an opaque nested structure; declared
/// outputs are lifted out of it by path.
#[async_trait]
pub trait Action: Send + Sync {
    async fn call(&self, data: &DataMap) -> Result<Value, ActionError>;
}

/// Adapts a plain function or closure as an [`Action`].
pub struct FnAction<F>(F);

impl<F> FnAction<F>
where
    F: Fn(&DataMap) -> Result<Value, ActionError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnAction(f)
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&DataMap) -> Result<Value, ActionError> + Send + Sync,
{
    async fn call(&self, data: &DataMap) -> Result<Value, ActionError> {
        (self.0)(data)
    }
}

/// A registered computational unit: a callable plus its declared input
/// fields and output projections. Immutable once constructed.
#[derive(Clone)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub description: String,
    /// The recognised input parameters.
    pub fields: Vec<Var>,
    /// The projection schema; each Var's `loc` lifts its value out of the
    /// raw payload.
    pub outputs: Vec<Var>,
    action: Arc<dyn Action>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("fields", &self.fields.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        node_type: NodeType,
        action: Arc<dyn Action>,
        fields: Vec<Var>,
        outputs: Vec<Var>,
        description: impl Into<String>,
    ) -> Self {
        Node {
            id: id.into(),
            node_type,
            description: description.into(),
            fields,
            outputs,
            action,
        }
    }

    /// Register a programmatic action from its declared signature. Fields
    /// come from the parameters, outputs from the return annotation plus the
    /// `returns` name → path mapping.
    pub fn programmatic(
        id: impl Into<String>,
        description: impl Into<String>,
        action: Arc<dyn Action>,
        signature: &Signature,
        returns: &[(String, Path)],
    ) -> Result<Self, SchemaError> {
        Ok(Self::new(
            id,
            NodeType::Programmatic,
            action,
            params_to_vars(&signature.params)?,
            returns_to_vars(&signature.ret, returns)?,
            description,
        ))
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }

    async fn invoke(&self, data: &DataMap) -> Result<Value, ChainError> {
        let unknown: Vec<String> = data
            .keys()
            .filter(|key| !self.has_field(key))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ChainError::UnknownInputs {
                node_id: self.id.clone(),
                keys: unknown,
            });
        }
        self.action
            .call(data)
            .await
            .map_err(|err| ChainError::NodeExecution {
                node_id: self.id.clone(),
                message: err.message,
                trace: err.trace,
            })
    }

    /// Invoke the callable and project the payload onto the declared output
    /// shape. An output whose path misses projects to JSON null.
    pub async fn call(&self, data: &DataMap) -> Result<DataMap, ChainError> {
        let payload = self.invoke(data).await?;
        let mut projected = DataMap::new();
        for output in &self.outputs {
            let value = get_path(&payload, &output.loc)
                .cloned()
                .unwrap_or(Value::Null);
            projected.insert(output.name.clone(), value);
        }
        Ok(projected)
    }

    /// Invoke the callable and return the raw payload unchanged.
    pub async fn call_raw(&self, data: &DataMap) -> Result<Value, ChainError> {
        self.invoke(data).await
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Node", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("type", &self.node_type)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("fields", &self.fields)?;
        state.serialize_field("outputs", &self.outputs)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    fn data(value: Value) -> DataMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn echo_node() -> Node {
        Node::new(
            "echo",
            NodeType::Programmatic,
            Arc::new(FnAction::new(|data: &DataMap| {
                Ok(json!({ "echoed": Value::Object(data.clone()) }))
            })),
            vec![Var::string().with_name("a").required().shown()],
            vec![Var::string().with_name("echoed").with_loc(path!["echoed"])],
            "echoes its input",
        )
    }

    #[tokio::test]
    async fn unknown_inputs_are_rejected() {
        let node = echo_node();
        let err = node.call(&data(json!({"a": "1", "b": "2"}))).await.unwrap_err();
        match err {
            ChainError::UnknownInputs { node_id, keys } => {
                assert_eq!(node_id, "echo");
                assert_eq!(keys, vec!["b"]);
            }
            other => panic!("expected UnknownInputs, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn outputs_are_projected_by_path() {
        let node = echo_node();
        let out = node.call(&data(json!({"a": "1"}))).await.unwrap();
        assert_eq!(out["echoed"], json!({"a": "1"}));
    }

    #[tokio::test]
    async fn missing_projection_paths_yield_null() {
        let node = Node::new(
            "sparse",
            NodeType::Programmatic,
            Arc::new(FnAction::new(|_: &DataMap| Ok(json!({})))),
            vec![],
            vec![Var::string().with_name("absent").with_loc(path!["nowhere"])],
            "",
        );
        let out = node.call(&DataMap::new()).await.unwrap();
        assert_eq!(out["absent"], Value::Null);
    }

    #[tokio::test]
    async fn call_raw_returns_the_payload_unchanged() {
        let node = echo_node();
        let raw = node.call_raw(&data(json!({"a": "1"}))).await.unwrap();
        assert_eq!(raw, json!({"echoed": {"a": "1"}}));
    }

    #[tokio::test]
    async fn action_failures_wrap_into_node_execution_errors() {
        let node = Node::new(
            "boom",
            NodeType::Programmatic,
            Arc::new(FnAction::new(|_: &DataMap| {
                Err(ActionError::with_trace("connection refused", "connect(127.0.0.1:80): refused"))
            })),
            vec![],
            vec![],
            "",
        );
        let err = node.call(&DataMap::new()).await.unwrap_err();
        match err {
            ChainError::NodeExecution { node_id, message, trace } => {
                assert_eq!(node_id, "boom");
                assert_eq!(message, "connection refused");
                assert!(trace.contains("refused"));
            }
            other => panic!("expected NodeExecution, got {other:?}"),
        }
    }

    #[test]
    fn wire_format_has_the_five_declared_keys() {
        let node = echo_node();
        let wire = serde_json::to_value(&node).unwrap();
        assert_eq!(wire["id"], "echo");
        assert_eq!(wire["type"], "programmatic");
        assert_eq!(wire["description"], "echoes its input");
        assert_eq!(
            wire["fields"],
            json!([{"type": "string", "required": true, "show": true, "name": "a"}])
        );
        assert_eq!(wire["outputs"], json!([{"type": "string", "name": "echoed"}]));
    }

    #[test]
    fn ai_node_type_serialises_with_its_wire_name() {
        assert_eq!(serde_json::to_value(NodeType::Ai).unwrap(), json!("ai-powered"));
        assert_eq!(
            serde_json::to_value(NodeType::Programmatic).unwrap(),
            json!("programmatic")
        );
    }
}
