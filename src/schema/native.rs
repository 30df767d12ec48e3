//! Native-signature inference: declared callable signatures to Var schemas
//!
//! Programmatic actions are registered with a [`Signature`] describing what
//! the source language's reflection would report: one [`TypeRepr`] per
//! parameter plus the return annotation. Registration is the only moment the
//! engine looks at a callable's shape; execution binds inputs by name.

use super::{AdditionalProps, Var, VarKind, VarType};
use crate::path::Path;
use serde_json::Value;
use thiserror::Error;

/// Errors from signature introspection, raised at registration time.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("return annotation must be a pair (payload, any-of[_, exception]), got {0}")]
    InvalidReturnShape(String),

    #[error("returns names {names} outputs but the payload has arity {arity}")]
    ArityMismatch { names: usize, arity: usize },
}

/// A native annotation, as declared at registration time.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRepr {
    Str,
    Number,
    Bool,
    Bytes,
    /// Homogeneous sequence.
    List(Box<TypeRepr>),
    /// Homogeneous string-keyed mapping.
    Map(Box<TypeRepr>),
    /// Heterogeneous fixed-arity sequence.
    Tuple(Vec<TypeRepr>),
    Union(Vec<TypeRepr>),
    Optional(Box<TypeRepr>),
    /// A string the UI must mask.
    Secret,
    /// Reference to a registered model.
    Model,
    /// Return position only.
    Any,
    /// Return position only.
    Null,
    /// Return position only.
    Exception,
}

/// Whether an annotation appears in parameter or return position. `Any`,
/// `Null` and `Exception` are only meaningful for returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Parameter,
    Return,
}

fn annotation_to_var(ty: &TypeRepr, pos: Position) -> Result<Var, SchemaError> {
    match ty {
        TypeRepr::Str => Ok(Var::string()),
        TypeRepr::Number => Ok(Var::number()),
        TypeRepr::Bool => Ok(Var::boolean()),
        TypeRepr::Bytes => Ok(Var::string().with_format("byte")),
        TypeRepr::List(item) => Ok(Var::array(vec![annotation_to_var(item, pos)?])),
        TypeRepr::Map(value) => Ok(Var {
            additional_properties: AdditionalProps::Single(Box::new(annotation_to_var(value, pos)?)),
            ..Var::object()
        }),
        TypeRepr::Tuple(items) => Ok(Var::array(
            items
                .iter()
                .map(|item| annotation_to_var(item, pos))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        TypeRepr::Union(members) => union_to_var(members, pos),
        TypeRepr::Optional(inner) => {
            union_to_var(&[(**inner).clone(), TypeRepr::Null], pos)
        }
        TypeRepr::Secret => Ok(Var {
            password: true,
            ..Var::string()
        }),
        TypeRepr::Model => Ok(Var::new(VarKind::Model)),
        TypeRepr::Any if pos == Position::Return => Ok(Var::string()),
        TypeRepr::Null if pos == Position::Return => Ok(Var::new(VarKind::Null)),
        TypeRepr::Exception if pos == Position::Return => Ok(Var::new(VarKind::Exception)),
        other => Err(SchemaError::UnsupportedType(format!("{other:?}"))),
    }
}

/// Null members are dropped before conversion; a unary union unwraps to its
/// lone member.
fn union_to_var(members: &[TypeRepr], pos: Position) -> Result<Var, SchemaError> {
    let non_null: Vec<&TypeRepr> = members
        .iter()
        .filter(|member| !matches!(member, TypeRepr::Null))
        .collect();
    if non_null.is_empty() {
        return Err(SchemaError::UnsupportedType("union of only null".to_string()));
    }
    Ok(Var::any_of(
        non_null
            .into_iter()
            .map(|member| annotation_to_var(member, pos))
            .collect::<Result<Vec<_>, _>>()?,
    ))
}

/// A declared parameter of a native callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRepr,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRepr) -> Self {
        Param {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// The declared signature of a native callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub ret: TypeRepr,
}

impl Signature {
    pub fn new(params: Vec<Param>, ret: TypeRepr) -> Self {
        Signature { params, ret }
    }
}

/// Convert declared parameters to the node's recognised input fields.
///
/// A parameter is required when it has no default; a default becomes the
/// placeholder hint. Parameters whose name starts with `_` stay hidden.
pub fn params_to_vars(params: &[Param]) -> Result<Vec<Var>, SchemaError> {
    params
        .iter()
        .map(|param| {
            let mut var = annotation_to_var(&param.ty, Position::Parameter)?;
            var.required = param.default.is_none();
            var.name = param.name.clone();
            if let Some(default) = &param.default {
                var.placeholder = stringify_default(default);
            }
            var.show = !param.name.starts_with('_');
            Ok(var)
        })
        .collect()
}

fn stringify_default(default: &Value) -> String {
    match default {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Convert a return annotation to named output Vars.
///
/// The annotation must have the exact shape `(payload, any-of[_, exception])`
/// (a lone `exception` error slot, as an `Optional<Exception>` reduces to, is
/// also accepted). `returns` maps each output name to the path used to lift
/// its value out of the raw payload; for array payloads it must name either
/// one output or exactly one per item.
pub fn returns_to_vars(ret: &TypeRepr, returns: &[(String, Path)]) -> Result<Vec<Var>, SchemaError> {
    let schema = annotation_to_var(ret, Position::Return)?;
    let error_slot_ok = schema.items.get(1).is_some_and(|slot| {
        slot.var_type.is_kind(VarKind::Exception)
            || slot
                .var_type
                .as_any_of()
                .is_some_and(|members| members.iter().any(|m| m.var_type.is_kind(VarKind::Exception)))
    });
    if !schema.var_type.is_kind(VarKind::Array) || schema.items.len() != 2 || !error_slot_ok {
        return Err(SchemaError::InvalidReturnShape(format!("{ret:?}")));
    }

    let payload = schema.items.into_iter().next().unwrap_or_default();
    if payload.var_type.is_kind(VarKind::Array) {
        let arity = payload.items.len();
        if returns.len() != 1 && returns.len() != arity {
            return Err(SchemaError::ArityMismatch {
                names: returns.len(),
                arity,
            });
        }
        Ok(payload
            .items
            .into_iter()
            .zip(returns.iter())
            .map(|(item, (name, loc))| item.with_name(name.clone()).with_loc(loc.clone()))
            .collect())
    } else {
        if returns.len() != 1 {
            return Err(SchemaError::ArityMismatch {
                names: returns.len(),
                arity: 1,
            });
        }
        let (name, loc) = &returns[0];
        Ok(vec![payload.with_name(name.clone()).with_loc(loc.clone())])
    }
}
