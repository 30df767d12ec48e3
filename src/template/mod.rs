//! Template-signature inference
//!
//! AI actions declare their inputs implicitly: the free variables of their
//! prompt templates. This module parses template sources in the restricted
//! jinja dialect (iteration, conditionals, filters — no arbitrary
//! evaluation) and recovers those variables with usage-inferred schemas.

mod infer;

use crate::path::{Path, PathKey};
use crate::schema::Var;
use minijinja::machinery::{parse, WhitespaceConfig};
use minijinja::syntax::SyntaxConfig;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Errors from template introspection, raised at registration time.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(#[from] minijinja::Error),
}

/// Infer one Var per free variable of `source`.
///
/// Types come from usage: bare emission is a string, arithmetic use a
/// number, a condition test a boolean, attribute access an object with
/// named properties, iteration an array with an inferred element schema.
pub fn template_vars(source: &str) -> Result<Vec<Var>, TemplateError> {
    let stmt = parse(
        source,
        "<template>",
        SyntaxConfig::default(),
        WhitespaceConfig::default(),
    )
    .map_err(|err| {
        error!(
            "could not parse prompt template; only the for/if/filter subset \
             of the jinja dialect is supported"
        );
        TemplateError::Parse(err)
    })?;
    Ok(infer::infer_template(&stmt))
}

/// Walk a nested structure of maps and sequences whose leaves are template
/// strings, yielding `(path, vars)` for every leaf with at least one free
/// variable. `path` locates the template inside the structure.
pub fn extract_template_indices(data: &Value) -> Result<Vec<(Path, Vec<Var>)>, TemplateError> {
    let mut indices = Vec::new();
    walk(data, Path::new(), &mut indices)?;
    Ok(indices)
}

fn walk(
    data: &Value,
    current: Path,
    indices: &mut Vec<(Path, Vec<Var>)>,
) -> Result<(), TemplateError> {
    match data {
        Value::String(source) => {
            let vars = template_vars(source)?;
            if !vars.is_empty() {
                indices.push((current, vars));
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, current.child(PathKey::Index(i)), indices)?;
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                walk(value, current.child(PathKey::Key(key.clone())), indices)?;
            }
        }
        _ => {}
    }
    Ok(())
}
