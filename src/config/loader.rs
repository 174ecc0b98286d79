/// Configuration loading from a JSON file merged with command-line overrides
use crate::config::types::{GradeError, GradingConfig, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// Read a JSON object from `path`
pub fn load_json_object<P: AsRef<Path>>(path: P) -> Result<Map<String, Value>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        GradeError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GradeError::Config(format!(
            "Config file {} must contain a JSON object",
            path.display()
        ))),
        Err(e) => Err(GradeError::Config(format!(
            "Failed to parse config JSON {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Build the effective configuration.
///
/// Keys present in `overrides` replace the file's keys; everything else
/// falls back to the file and then to the serde defaults.
pub fn resolve(file: Option<&Path>, overrides: Map<String, Value>) -> Result<GradingConfig> {
    let mut merged = match file {
        Some(path) => load_json_object(path)?,
        None => Map::new(),
    };

    for (key, value) in overrides {
        if !value.is_null() {
            merged.insert(key, value);
        }
    }

    serde_json::from_value(Value::Object(merged))
        .map_err(|e| GradeError::Config(format!("Invalid grading configuration: {}", e)))
}

/// Split a comma separated CLI list, dropping empty items
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
