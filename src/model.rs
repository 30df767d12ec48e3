//! Model providers — the seam to LLM backends
//!
//! Defines the provider trait AI actions dispatch to, the model descriptor
//! binding a provider to its parameter schema, and a concurrent registry.
//! Two provider implementations ship with the engine:
//! - concrete API clients live outside the core and implement
//!   [`ModelProvider`] against their own transport
//! - [`MockProvider`] returns preconfigured responses (testing)
//!
//! The engine never parses provider responses; AI nodes lift declared
//! outputs from the raw response with projection paths.

use crate::chain::{ActionError, DataMap};
use crate::schema::Var;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors from model provider operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not available: {0}")]
    Unavailable(String),

    #[error("invocation failed: {0}")]
    InvocationFailed(String),

    #[error("response parse error: {0}")]
    ParseError(String),
}

impl From<ModelError> for ActionError {
    fn from(err: ModelError) -> Self {
        ActionError::with_trace(err.to_string(), format!("{err:?}"))
    }
}

/// One role-tagged message of a rendered chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// What a provider receives after the engine renders an AI action's
/// templates: a text completion prompt, or an ordered chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RenderedPrompt {
    Completion(String),
    Chat(Vec<ChatMessage>),
}

/// Provider seam. `params` carries credentials, the model name and sampling
/// parameters; the prompt is fully rendered. Returns the provider's raw
/// response as an opaque value.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn invoke(&self, params: &DataMap, prompt: &RenderedPrompt) -> Result<Value, ModelError>;
}

/// Tags describing what a model transforms.
pub mod model_tags {
    pub const TEXT_TO_TEXT: &str = "text_to_text";
    pub const TEXT_TO_IMAGE: &str = "text_to_image";
    pub const IMAGE_TO_IMAGE: &str = "image_to_image";
}

/// Descriptor binding a provider to its parameter schema.
///
/// `vars` declares what callers may pass as model parameters: credentials
/// (marked `password`), the model name, sampling knobs with placeholder
/// defaults. AI nodes merge these into their recognised fields.
#[derive(Clone)]
pub struct Model {
    pub collection_name: String,
    pub model_id: String,
    pub description: String,
    pub tags: Vec<String>,
    pub vars: Vec<Var>,
    provider: Arc<dyn ModelProvider>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("collection_name", &self.collection_name)
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl Model {
    pub fn new(
        collection_name: impl Into<String>,
        model_id: impl Into<String>,
        description: impl Into<String>,
        vars: Vec<Var>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Model {
            collection_name: collection_name.into(),
            model_id: model_id.into(),
            description: description.into(),
            tags: Vec::new(),
            vars,
            provider,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.iter().any(|var| var.name == name)
    }

    pub async fn invoke(
        &self,
        params: &DataMap,
        prompt: &RenderedPrompt,
    ) -> Result<Value, ModelError> {
        self.provider.invoke(params, prompt).await
    }

    /// The wire form sent to UI builders.
    pub fn to_value(&self) -> Value {
        json!({
            "collection_name": self.collection_name,
            "model_id": self.model_id,
            "description": self.description,
            "tags": self.tags,
            "vars": self.vars,
        })
    }
}

/// Concurrent model_id → [`Model`] registry.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, model: Model) -> Arc<Model> {
        let model = Arc::new(model);
        self.models.insert(model.model_id.clone(), model.clone());
        model
    }

    pub fn get(&self, model_id: &str) -> Option<Arc<Model>> {
        self.models.get(model_id).map(|entry| entry.clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.models.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Mock provider for tests — returns a preconfigured response or failure,
/// or echoes the rendered prompt back in a chat-shaped response.
pub struct MockProvider {
    behaviour: MockBehaviour,
}

enum MockBehaviour {
    Respond(Value),
    Fail(String),
    Echo,
}

impl MockProvider {
    /// Always return `response`.
    pub fn with_response(response: Value) -> Self {
        MockProvider {
            behaviour: MockBehaviour::Respond(response),
        }
    }

    /// Always fail with an invocation error.
    pub fn failing(message: impl Into<String>) -> Self {
        MockProvider {
            behaviour: MockBehaviour::Fail(message.into()),
        }
    }

    /// Return a chat-shaped response whose content is the rendered prompt
    /// (the last message for chat prompts). Lets tests observe rendering
    /// through the standard `("choices", 0, "message", "content")` path.
    pub fn echo() -> Self {
        MockProvider {
            behaviour: MockBehaviour::Echo,
        }
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn invoke(&self, _params: &DataMap, prompt: &RenderedPrompt) -> Result<Value, ModelError> {
        match &self.behaviour {
            MockBehaviour::Respond(response) => Ok(response.clone()),
            MockBehaviour::Fail(message) => Err(ModelError::InvocationFailed(message.clone())),
            MockBehaviour::Echo => {
                let content = match prompt {
                    RenderedPrompt::Completion(text) => text.clone(),
                    RenderedPrompt::Chat(messages) => messages
                        .last()
                        .map(|message| message.content.clone())
                        .unwrap_or_default(),
                };
                Ok(json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}],
                    "prompt": prompt,
                }))
            }
        }
    }
}
