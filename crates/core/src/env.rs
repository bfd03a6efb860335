//! Environment handling for configuration values.
//!
//! Secrets and endpoints in the config file may be written as `${VAR_NAME}`
//! references. They are resolved once, at load time, against the process
//! environment (after an optional `.env` file has been applied).

use serde_json::Value;

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set or a reference
/// is not closed.
pub fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(ConfigError::EnvVar(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| ConfigError::EnvVar(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve env var references in every string of a JSON document, in place.
pub fn resolve_json_env(value: &mut Value) -> Result<(), ConfigError> {
    match value {
        Value::String(s) if s.contains("${") => {
            *s = resolve_env_vars(s)?;
        }
        Value::Array(items) => {
            for item in items {
                resolve_json_env(item)?;
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                resolve_json_env(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}
