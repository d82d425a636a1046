//! JSON Schema validation for backend replies.
//!
//! Replies are validated against schema/fatwa.schema.json before they are
//! trusted: the four school keys must be objects, and every text field that
//! is present must be a string (or null, which is read as absent).

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded reply schema (loaded at compile time).
const FATWA_SCHEMA_JSON: &str = include_str!("../../../schema/fatwa.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(FATWA_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a parsed reply against the schema.
///
/// Returns every violation as `"<instance path> violates <schema path>"`.
/// Offending values are left out so reply text never reaches an error message.
pub fn validate_reply_schema(reply: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(reply)
        .map(|e| format!("{} violates {}", e.instance_path, e.schema_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
