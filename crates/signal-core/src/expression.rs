//! Per-signal template expressions.
//!
//! An expression is a string evaluated against a [`Signal`]'s payload:
//! - no `{{ … }}` placeholder: a literal, evaluates to itself;
//! - exactly one `{{ $path }}` placeholder and nothing else: the raw value at `path`
//!   (lists stay lists, numbers stay numbers);
//! - anything else: rendered to a string with Handlebars (strict mode, no HTML escaping),
//!   where `$path` references are rewritten to Handlebars paths.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signal::Signal;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\$([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("placeholder pattern compiles")
});

static WHOLE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\{\{\s*\$([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}\s*$")
        .expect("placeholder pattern compiles")
});

/// Error from evaluating an expression against a signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("signal has no field `{path}`")]
    MissingField { path: String },
    #[error("template render failed: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn source(&self) -> &str {
        &self.0
    }

    pub fn is_literal(&self) -> bool {
        !(self.0.contains("{{") && self.0.contains("}}"))
    }

    pub fn evaluate(&self, signal: &Signal) -> Result<Value, ExpressionError> {
        if self.is_literal() {
            return Ok(Value::String(self.0.clone()));
        }
        if let Some(caps) = WHOLE_PLACEHOLDER.captures(&self.0) {
            return lookup(signal, &caps[1]).cloned();
        }
        for caps in PLACEHOLDER.captures_iter(&self.0) {
            lookup(signal, &caps[1])?;
        }
        let template = PLACEHOLDER.replace_all(&self.0, |caps: &Captures<'_>| {
            format!("{{{{{}}}}}", handlebars_path(&caps[1]))
        });
        render(&template, &signal.as_value()).map(Value::String)
    }

    /// Evaluate to a string: strings pass through, `null` becomes empty, other values render as JSON.
    pub fn evaluate_string(&self, signal: &Signal) -> Result<String, ExpressionError> {
        Ok(match self.evaluate(signal)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}

impl From<&str> for Expression {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Expression {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn lookup<'a>(signal: &'a Signal, path: &str) -> Result<&'a Value, ExpressionError> {
    signal.get(path).ok_or_else(|| ExpressionError::MissingField {
        path: path.to_string(),
    })
}

/// `items.0.name` -> `[items].[0].[name]`. Bracketed segments are literal keys, so field names
/// such as `else` or `this` are not read as Handlebars keywords.
fn handlebars_path(path: &str) -> String {
    path.split('.')
        .map(|seg| format!("[{seg}]"))
        .collect::<Vec<_>>()
        .join(".")
}

fn render(template: &str, data: &Value) -> Result<String, ExpressionError> {
    let mut reg = handlebars::Handlebars::new();
    reg.set_strict_mode(true);
    reg.register_escape_fn(handlebars::no_escape);
    reg.render_template(template, data)
        .map_err(|e| ExpressionError::Render(e.to_string()))
}
