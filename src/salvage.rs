//! Tolerant JSON repair for model output.
//!
//! Model providers are asked for strict JSON but occasionally wrap it in
//! markdown fences or stray prose. This module tries a strict parse first and
//! falls back to stripping fences and extracting the first `{...}` block. It
//! produces either a validated typed value or a schema error; business logic
//! never sees the raw text.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::StageError;

/// Parse possibly-mangled model output into a JSON value.
pub fn salvage_json(raw: &str) -> Result<JsonValue, StageError> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
        return Ok(value);
    }

    tracing::warn!(len = raw.len(), "model output not strict JSON, attempting salvage");

    let mut text = trimmed.to_string();
    // Strip markdown code fences, with or without a language tag.
    if text.starts_with("```") {
        text = text
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```")
            .to_string();
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped.to_string();
    }
    let text = text.trim();

    if let Ok(value) = serde_json::from_str::<JsonValue>(text) {
        return Ok(value);
    }

    // Best effort: extract the first balanced-looking object.
    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if end > start {
            let candidate = &text[start..=end];
            if let Ok(value) = serde_json::from_str::<JsonValue>(candidate) {
                return Ok(value);
            }
        }
    }

    Err(StageError::Schema(format!(
        "unrepairable model output (first 120 chars): {}",
        raw.chars().take(120).collect::<String>()
    )))
}

/// Salvage and deserialize into a typed stage contract.
pub fn parse_stage_output<T: DeserializeOwned>(raw: &str) -> Result<T, StageError> {
    let value = salvage_json(raw)?;
    serde_json::from_value(value).map_err(|e| StageError::Schema(e.to_string()))
}
