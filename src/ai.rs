//! AI actions — templated prompts dispatched to a model provider
//!
//! An AI action is built from a model, construction-time model parameters
//! and an unrendered template body. Its recognised fields are inferred, not
//! declared: the free variables of the templates, plus the model's own
//! parameter vars. At execution it renders the body with the node's inputs,
//! dispatches the result to the provider and hands back the raw response
//! for output projection.

use crate::chain::{Action, ActionError, DataMap, Node, NodeType};
use crate::model::{ChatMessage, Model, RenderedPrompt};
use crate::path::Path;
use crate::schema::Var;
use crate::template::{extract_template_indices, TemplateError};
use async_trait::async_trait;
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

impl From<minijinja::Error> for ActionError {
    fn from(err: minijinja::Error) -> Self {
        ActionError::with_trace(err.to_string(), format!("{err:#}"))
    }
}

/// One role-tagged template of a chat-completion body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTemplate {
    pub role: String,
    pub content: String,
}

impl ChatTemplate {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        ChatTemplate {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// The unrendered prompt body an AI action was built from: a single
/// completion template, or an ordered sequence of role-tagged message
/// templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateBody {
    Completion(String),
    Chat(Vec<ChatTemplate>),
}

impl TemplateBody {
    /// The body as a nested value, for template-variable extraction.
    fn to_value(&self) -> Value {
        match self {
            TemplateBody::Completion(source) => Value::String(source.clone()),
            TemplateBody::Chat(messages) => json!({ "messages": messages }),
        }
    }
}

/// The body of an ai-powered node.
pub struct AiAction {
    model: Arc<Model>,
    model_params: DataMap,
    body: TemplateBody,
}

impl AiAction {
    pub fn new(model: Arc<Model>, model_params: DataMap, body: TemplateBody) -> Self {
        AiAction {
            model,
            model_params,
            body,
        }
    }

    /// Vars inferred from every template leaf of the body, deduplicated by
    /// name in first-seen order.
    pub fn template_fields(&self) -> Result<Vec<Var>, TemplateError> {
        let mut fields: Vec<Var> = Vec::new();
        for (_, vars) in extract_template_indices(&self.body.to_value())? {
            for var in vars {
                if !fields.iter().any(|field| field.name == var.name) {
                    fields.push(var);
                }
            }
        }
        Ok(fields)
    }

    /// Build an ai-powered [`Node`]. Fields are the union of the
    /// template-inferred vars and the model's declared vars; each entry of
    /// `outputs` names a projection into the raw provider response, e.g.
    /// `("chat_reply", path!["choices", 0, "message", "content"])`.
    pub fn into_node(
        self,
        id: impl Into<String>,
        description: impl Into<String>,
        outputs: Vec<(String, Path)>,
    ) -> Result<Node, TemplateError> {
        let mut fields = self.template_fields()?;
        for var in &self.model.vars {
            if !fields.iter().any(|field| field.name == var.name) {
                fields.push(var.clone());
            }
        }
        let outputs = outputs
            .into_iter()
            .map(|(name, loc)| Var::string().with_name(name).with_loc(loc))
            .collect();
        Ok(Node::new(
            id,
            NodeType::Ai,
            Arc::new(self),
            fields,
            outputs,
            description,
        ))
    }

    fn render(&self, data: &DataMap) -> Result<RenderedPrompt, ActionError> {
        let env = Environment::new();
        match &self.body {
            TemplateBody::Completion(source) => {
                Ok(RenderedPrompt::Completion(env.render_str(source, data)?))
            }
            TemplateBody::Chat(messages) => {
                let rendered = messages
                    .iter()
                    .map(|message| {
                        Ok(ChatMessage {
                            role: message.role.clone(),
                            content: env.render_str(&message.content, data)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ActionError>>()?;
                Ok(RenderedPrompt::Chat(rendered))
            }
        }
    }
}

#[async_trait]
impl Action for AiAction {
    async fn call(&self, data: &DataMap) -> Result<Value, ActionError> {
        let prompt = self.render(data)?;
        // construction-time params first, then any input matching the
        // model's declared vars (credentials, sampling overrides) on top
        let mut params = self.model_params.clone();
        for (key, value) in data {
            if self.model.has_var(key) {
                params.insert(key.clone(), value.clone());
            }
        }
        let response = self.model.invoke(&params, &prompt).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MockProvider, ModelProvider};
    use crate::path;
    use crate::schema::VarKind;

    fn data(value: Value) -> DataMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn mock_model(provider: impl ModelProvider + 'static) -> Arc<Model> {
        Arc::new(Model::new(
            "mock",
            "mock-chat",
            "",
            vec![
                Var {
                    password: true,
                    ..Var::string()
                }
                .with_name("api_key")
                .required(),
                Var::number().with_name("temperature").with_placeholder("1.0"),
            ],
            Arc::new(provider),
        ))
    }

    fn chat_body() -> TemplateBody {
        TemplateBody::Chat(vec![
            ChatTemplate::new("system", "You add things wittily."),
            ChatTemplate::new("user", "Add {{ num1 }} and {{ num2 }}."),
        ])
    }

    #[test]
    fn template_fields_union_across_messages() {
        let action = AiAction::new(mock_model(MockProvider::echo()), DataMap::new(), chat_body());
        let fields = action.template_fields().unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["num1", "num2"]);
    }

    #[test]
    fn node_fields_include_the_model_vars() {
        let node = AiAction::new(mock_model(MockProvider::echo()), DataMap::new(), chat_body())
            .into_node("chat-sum", "adds two things", vec![])
            .unwrap();
        assert_eq!(node.node_type, NodeType::Ai);
        assert!(node.has_field("num1"));
        assert!(node.has_field("num2"));
        assert!(node.has_field("api_key"));
        assert!(node.has_field("temperature"));
    }

    #[test]
    fn template_fields_keep_inferred_schemas() {
        let body = TemplateBody::Completion(
            "{% for item in facts %}{{ item }}{% endfor %} ({{ count + 1 }})".to_string(),
        );
        let action = AiAction::new(mock_model(MockProvider::echo()), DataMap::new(), body);
        let fields = action.template_fields().unwrap();
        assert!(fields[0].var_type.is_kind(VarKind::Array));
        assert!(fields[1].var_type.is_kind(VarKind::Number));
    }

    #[test]
    fn invalid_templates_fail_at_node_construction() {
        let body = TemplateBody::Completion("Hello {{ name".to_string());
        let err = AiAction::new(mock_model(MockProvider::echo()), DataMap::new(), body)
            .into_node("broken", "", vec![])
            .unwrap_err();
        assert!(matches!(err, TemplateError::Parse(_)));
    }

    #[tokio::test]
    async fn renders_templates_and_projects_the_response() {
        let node = AiAction::new(mock_model(MockProvider::echo()), DataMap::new(), chat_body())
            .into_node(
                "chat-sum",
                "",
                vec![(
                    "chat_reply".to_string(),
                    path!["choices", 0, "message", "content"],
                )],
            )
            .unwrap();

        let out = node
            .call(&data(json!({"num1": "1023", "num2": "97", "api_key": "k"})))
            .await
            .unwrap();
        assert_eq!(out["chat_reply"], "Add 1023 and 97.");
    }

    #[tokio::test]
    async fn call_time_params_override_construction_defaults() {
        struct ParamProbe;

        #[async_trait]
        impl ModelProvider for ParamProbe {
            async fn invoke(
                &self,
                params: &DataMap,
                _prompt: &RenderedPrompt,
            ) -> Result<Value, crate::model::ModelError> {
                Ok(Value::Object(params.clone()))
            }
        }

        let node = AiAction::new(
            mock_model(ParamProbe),
            data(json!({"temperature": 0.2})),
            TemplateBody::Completion("{{ message }}".to_string()),
        )
        .into_node("probe", "", vec![("params".to_string(), path![])])
        .unwrap();

        let out = node
            .call(&data(json!({
                "message": "hi",
                "api_key": "secret",
                "temperature": 0.7,
            })))
            .await
            .unwrap();
        assert_eq!(out["params"]["temperature"], 0.7);
        assert_eq!(out["params"]["api_key"], "secret");
        // template inputs are not model params
        assert!(out["params"].get("message").is_none());
    }

    #[tokio::test]
    async fn provider_failures_surface_as_action_errors() {
        let node = AiAction::new(
            mock_model(MockProvider::failing("quota exceeded")),
            DataMap::new(),
            TemplateBody::Completion("{{ message }}".to_string()),
        )
        .into_node("failing", "", vec![])
        .unwrap();

        let err = node.call(&data(json!({"message": "hi"}))).await.unwrap_err();
        match err {
            crate::chain::ChainError::NodeExecution { message, .. } => {
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("expected NodeExecution, got {other:?}"),
        }
    }
}
