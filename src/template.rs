//! Template interpolation for catalog definitions
//!
//! Handles `{{ variable }}` interpolation in stream definitions.
//! Roots are `config` (source configuration), `slice` (the current slice:
//! `parent_id`, `parent_cursor_value`, `lower_bound` and extras) and
//! `stream` (the stream name and its settings).

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("valid template regex")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Source configuration values
    pub config: Value,
    /// Current slice values
    pub slice: Value,
    /// Stream values
    pub stream: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set slice values
    pub fn set_slice(&mut self, slice: Value) -> &mut Self {
        self.slice = slice;
        self
    }

    /// Set stream values
    pub fn set_stream(&mut self, stream: Value) -> &mut Self {
        self.stream = stream;
        self
    }

    /// Get a value by path (e.g., "config.access_token")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let root = match parts.next()? {
            "config" => &self.config,
            "slice" => &self.slice,
            "stream" => &self.stream,
            _ => return None,
        };
        parts.try_fold(root, |current, part| current.as_object()?.get(part))
    }
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut undefined = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        match ctx.get(&cap[1]) {
            Some(value) => value_to_string(value),
            None => {
                undefined.push(cap[1].to_string());
                String::new()
            }
        }
    });

    if undefined.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(undefined.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Variable name when the whole string is exactly one template
fn sole_variable(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let cap = TEMPLATE_REGEX.captures(trimmed)?;
    let whole = cap.get(0)?;
    if whole.start() == 0 && whole.end() == trimmed.len() {
        cap.get(1).map(|m| m.as_str())
    } else {
        None
    }
}

/// Render all string values in a JSON value
///
/// A string that is exactly one template keeps the referenced value's JSON
/// type, so `"{{ config.page_size }}"` renders to a number.
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) => {
            if let Some(var) = sole_variable(s) {
                return ctx
                    .get(var)
                    .cloned()
                    .ok_or_else(|| Error::undefined_var(var));
            }
            if has_templates(s) {
                Ok(Value::String(render(s, ctx)?))
            } else {
                Ok(value.clone())
            }
        }
        Value::Object(map) => {
            let mut rendered = serde_json::Map::new();
            for (k, v) in map {
                rendered.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(rendered))
        }
        Value::Array(arr) => arr
            .iter()
            .map(|v| render_value(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(value.clone()),
    }
}
