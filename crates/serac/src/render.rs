//! SQL rendering.
//!
//! Two modes, selected by task kind:
//!
//! - **Strict expansion** (audit): every `{{ dotted.path }}` token in
//!   the script must resolve to a scalar in the merged parameter set;
//!   an unresolved token fails the render loudly. This is not a general
//!   templating language; variables only, no control structures.
//! - **Token substitution** (transform): exactly four fixed
//!   placeholders are replaced literally; anything else in the script,
//!   matched or not, is left verbatim.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use icefall_common::error::ContentError;

/// The fixed placeholder names substituted in transform scripts.
pub const TRANSFORM_PLACEHOLDERS: [&str; 4] = [
    "param_execution_date",
    "param_landing_db_name",
    "param_processed_db_name",
    "param_s3_landing_bucket_name",
];

static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\}\}")
        .expect("Invalid template token pattern")
});

/// Render a transform script by literal token substitution.
///
/// Only the four fixed placeholders are replaced, and only when the
/// runtime parameter set carries a value for them. Unmatched
/// placeholders stay in the text untouched.
pub fn render_transform(sql: &str, runtime_params: &IndexMap<String, String>) -> String {
    let mut rendered = sql.to_string();
    for key in TRANSFORM_PLACEHOLDERS {
        if let Some(value) = runtime_params.get(key) {
            rendered = rendered.replace(&format!("{{{{ {key} }}}}"), value);
        }
    }
    rendered
}

/// Merge audit parameter documents into one render parameter set.
///
/// Top-level keys of each document are merged in order (later documents
/// win), then the runtime parameters overlay them as strings. The
/// derived `globals` entries and the `audit` metadata object are
/// injected last so scripts can reference them uniformly.
pub fn merge_audit_params(
    param_documents: Vec<Value>,
    runtime_params: &IndexMap<String, String>,
    stage: &str,
) -> Value {
    let mut merged = serde_json::Map::new();

    for document in param_documents {
        if let Value::Object(object) = document {
            for (key, value) in object {
                merged.insert(key, value);
            }
        }
    }

    for (key, value) in runtime_params {
        merged.insert(key.clone(), Value::String(value.clone()));
    }

    let exec_date = merged.get("param_execution_date").cloned();
    let processed_db = merged.get("param_processed_db_name").cloned();
    let globals = merged
        .entry("globals".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(globals) = globals {
        if let Some(exec_date) = exec_date {
            globals.insert("param_exec_date".to_string(), exec_date);
        }
        if let Some(processed_db) = processed_db {
            globals.insert("param_processed_db_name".to_string(), processed_db);
        }
    }

    merged.insert(
        "audit".to_string(),
        serde_json::json!({
            "audit_db": format!("audit_db_{}", stage.to_lowercase()),
            "audit_table": "audit",
        }),
    );

    Value::Object(merged)
}

/// Render an audit script by strict template expansion.
///
/// Every `{{ dotted.path }}` token must resolve to a scalar in
/// `params`; a missing or non-scalar value fails the whole render.
pub fn render_strict(template: &str, params: &Value) -> Result<String, ContentError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last_end = 0;

    for captures in TEMPLATE_TOKEN.captures_iter(template) {
        let token = captures.get(0).expect("whole match present");
        let path = captures.get(1).expect("path group present").as_str();

        rendered.push_str(&template[last_end..token.start()]);
        rendered.push_str(&resolve_scalar(params, path)?);
        last_end = token.end();
    }
    rendered.push_str(&template[last_end..]);

    Ok(rendered)
}

/// Resolve a dotted path in the parameter set to a scalar string.
pub(crate) fn resolve_scalar(params: &Value, path: &str) -> Result<String, ContentError> {
    let mut current = params;
    for segment in path.split('.') {
        current = current
            .get(segment)
            .ok_or_else(|| ContentError::UndefinedTemplateVariable {
                variable: path.to_string(),
            })?;
    }

    match current {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(ContentError::UndefinedTemplateVariable {
            variable: path.to_string(),
        }),
        Value::Array(_) | Value::Object(_) => Err(ContentError::NonScalarTemplateVariable {
            variable: path.to_string(),
        }),
    }
}
