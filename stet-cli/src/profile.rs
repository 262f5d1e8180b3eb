//! Bank profile: a STET version preset with optional JSON overrides.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use stet_pis::{EngineConfig, StetVersion};

/// Builds the engine configuration for a bank.
///
/// The overrides document uses the same field names as [`EngineConfig`] and
/// only needs the fields that differ from the preset; nested objects are
/// merged field by field.
pub fn engine_config(version: &str, overrides: Option<&Value>) -> Result<EngineConfig> {
    let version: StetVersion = version.parse().map_err(Error::invalid_parameter)?;
    let preset = EngineConfig::preset(version);

    let Some(overrides) = overrides else {
        return Ok(preset);
    };
    if !overrides.is_object() {
        return Err(Error::invalid_parameter(
            "the bank profile must be a JSON object",
        ));
    }

    let mut merged = serde_json::to_value(&preset)?;
    merge(&mut merged, overrides);
    Ok(serde_json::from_value(merged)?)
}

/// Reads a profile file and applies it on top of the version preset.
pub fn load_engine_config(version: &str, path: Option<&Path>) -> Result<EngineConfig> {
    let overrides = match path {
        Some(path) => Some(serde_json::from_str::<Value>(&fs::read_to_string(path)?)?),
        None => None,
    };
    engine_config(version, overrides.as_ref())
}

fn merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(current) => merge(current, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}
