//! Var: the JSON-schema-like value descriptor
//!
//! Every input a node recognises and every output it projects is described
//! by a [`Var`]. The serialised form is the wire contract to UI builders:
//! only non-default attributes are emitted, so a default Var serialises to
//! exactly `{"type": "string"}`.

mod native;

pub use native::{params_to_vars, returns_to_vars, Param, SchemaError, Signature, TypeRepr};

use crate::path::Path;
use serde::{Deserialize, Serialize};

/// The closed set of kinds a Var can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
    Exception,
    Model,
}

/// A Var's `type` attribute: a single kind, or an any-of union of schemas.
///
/// Unions serialise as a list of serialised Vars nested under `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarType {
    Kind(VarKind),
    AnyOf(Vec<Var>),
}

impl Default for VarType {
    fn default() -> Self {
        VarType::Kind(VarKind::String)
    }
}

impl From<VarKind> for VarType {
    fn from(kind: VarKind) -> Self {
        VarType::Kind(kind)
    }
}

impl VarType {
    pub fn is_kind(&self, kind: VarKind) -> bool {
        matches!(self, VarType::Kind(k) if *k == kind)
    }

    pub fn as_any_of(&self) -> Option<&[Var]> {
        match self {
            VarType::AnyOf(members) => Some(members),
            VarType::Kind(_) => None,
        }
    }
}

/// Value schema(s) for an object-typed Var: one schema shared by every
/// value, or an ordered list of named property schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProps {
    #[default]
    None,
    Single(Box<Var>),
    Named(Vec<Var>),
}

impl AdditionalProps {
    pub fn is_empty(&self) -> bool {
        match self {
            AdditionalProps::None => true,
            AdditionalProps::Single(_) => false,
            AdditionalProps::Named(vars) => vars.is_empty(),
        }
    }
}

/// A JSON-schema-like descriptor of a single named value.
///
/// `loc` is the path used to extract this output's value from a raw node
/// payload; it is engine-internal and never serialised. Runtime values are
/// never stored on the Var itself — they live in the per-run IR map, which
/// keeps a Chain safely shareable across concurrent executions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Var {
    #[serde(rename = "type", default)]
    pub var_type: VarType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,

    /// Positional child schemas for array types: one entry for a homogeneous
    /// list, one per position for a tuple.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Var>,

    #[serde(
        rename = "additionalProperties",
        default,
        skip_serializing_if = "AdditionalProps::is_empty"
    )]
    pub additional_properties: AdditionalProps,

    /// UI rendering hint: mask the value like a password field.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub password: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,

    /// UI visibility hint.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub show: bool,

    /// Identifier within the parent scope. Set for every Var that is an
    /// element of a node's fields or outputs.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip)]
    pub loc: Path,
}

impl Var {
    pub fn new(kind: VarKind) -> Self {
        Var {
            var_type: VarType::Kind(kind),
            ..Default::default()
        }
    }

    pub fn string() -> Self {
        Self::new(VarKind::String)
    }

    pub fn number() -> Self {
        Self::new(VarKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(VarKind::Boolean)
    }

    pub fn array(items: Vec<Var>) -> Self {
        Var {
            items,
            ..Self::new(VarKind::Array)
        }
    }

    pub fn object() -> Self {
        Self::new(VarKind::Object)
    }

    /// An any-of union over `members`. Singleton unions unwrap to the lone
    /// member schema.
    pub fn any_of(mut members: Vec<Var>) -> Self {
        if members.len() == 1 {
            return members.remove(0);
        }
        Var {
            var_type: VarType::AnyOf(members),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_loc(mut self, loc: Path) -> Self {
        self.loc = loc;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn shown(mut self) -> Self {
        self.show = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_var_serialises_to_type_only() {
        let var = Var::default();
        assert_eq!(serde_json::to_value(&var).unwrap(), json!({"type": "string"}));
    }

    #[test]
    fn kinds_serialise_lowercase() {
        for (kind, expected) in [
            (VarKind::String, "string"),
            (VarKind::Number, "number"),
            (VarKind::Boolean, "boolean"),
            (VarKind::Array, "array"),
            (VarKind::Object, "object"),
            (VarKind::Null, "null"),
            (VarKind::Exception, "exception"),
            (VarKind::Model, "model"),
        ] {
            assert_eq!(serde_json::to_value(Var::new(kind)).unwrap(), json!({"type": expected}));
        }
    }

    #[test]
    fn non_default_attributes_are_emitted() {
        let var = Var::string()
            .with_name("url")
            .with_placeholder("https://example.com")
            .required()
            .shown();
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({
                "type": "string",
                "required": true,
                "placeholder": "https://example.com",
                "show": true,
                "name": "url",
            })
        );
    }

    #[test]
    fn union_serialises_as_nested_schemas() {
        let var = Var::any_of(vec![Var::string(), Var::new(VarKind::Exception)]);
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({"type": [{"type": "string"}, {"type": "exception"}]})
        );
    }

    #[test]
    fn singleton_union_unwraps() {
        let var = Var::any_of(vec![Var::number()]);
        assert_eq!(var, Var::number());
    }

    #[test]
    fn array_items_serialise_positionally() {
        let var = Var::array(vec![Var::string(), Var::number()]);
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({"type": "array", "items": [{"type": "string"}, {"type": "number"}]})
        );
    }

    #[test]
    fn object_with_single_value_schema() {
        let var = Var {
            additional_properties: AdditionalProps::Single(Box::new(Var::string())),
            ..Var::object()
        };
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({"type": "object", "additionalProperties": {"type": "string"}})
        );
    }

    #[test]
    fn object_with_named_properties() {
        let var = Var {
            additional_properties: AdditionalProps::Named(vec![
                Var::string().with_name("role"),
                Var::string().with_name("content"),
            ]),
            ..Var::object()
        };
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({
                "type": "object",
                "additionalProperties": [
                    {"type": "string", "name": "role"},
                    {"type": "string", "name": "content"},
                ],
            })
        );
    }

    #[test]
    fn password_marker_is_emitted() {
        let var = Var {
            password: true,
            ..Var::string()
        };
        assert_eq!(
            serde_json::to_value(&var).unwrap(),
            json!({"type": "string", "password": true})
        );
    }

    #[test]
    fn wire_roundtrip() {
        let var = Var::array(vec![Var::any_of(vec![Var::string(), Var::boolean()])])
            .with_name("results")
            .required();
        let wire = serde_json::to_value(&var).unwrap();
        let back: Var = serde_json::from_value(wire).unwrap();
        assert_eq!(back, var);
    }

    #[test]
    fn loc_never_reaches_the_wire() {
        let var = Var::string().with_loc(crate::path!["choices", 0]);
        assert_eq!(serde_json::to_value(&var).unwrap(), json!({"type": "string"}));
    }
}
