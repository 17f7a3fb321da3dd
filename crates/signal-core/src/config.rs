//! Block config helpers. Config strings may reference environment variables as `[[NAME]]`;
//! [`resolve_env_placeholders`] substitutes them before the payload reaches a block factory.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([A-Za-z_][A-Za-z0-9_]*)\]\]").expect("env placeholder pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} referenced by block config is not set")]
    MissingEnv(String),
}

/// Replace every `[[NAME]]` inside string values with the value of env var `NAME`.
/// Walks objects and arrays recursively; keys are left untouched.
pub fn resolve_env_placeholders(value: Value) -> Result<Value, ConfigError> {
    resolve_with(value, &|name| std::env::var(name).ok())
}

/// Resolve `[[NAME]]` placeholders in a single string.
pub fn resolve_env_str(s: &str) -> Result<String, ConfigError> {
    resolve_str(s, &|name| std::env::var(name).ok())
}

fn resolve_with(
    value: Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<Value, ConfigError> {
    match value {
        Value::String(s) => resolve_str(&s, lookup).map(Value::String),
        Value::Array(items) => items
            .into_iter()
            .map(|v| resolve_with(v, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| resolve_with(v, lookup).map(|v| (k, v)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

fn resolve_str(s: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in ENV_PLACEHOLDER.captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value =
            lookup(name.as_str()).ok_or_else(|| ConfigError::MissingEnv(name.as_str().into()))?;
        out.push_str(&s[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(out)
}
