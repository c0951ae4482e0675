use std::collections::BTreeMap;
use std::path::Path;

use super::value::{yaml_key, ConfigValue};
use super::ConfigError;

/// Load and parse a YAML file, flattening it into the values map.
///
/// Returns `false` without touching `values` when the file does not exist.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut BTreeMap<String, ConfigValue>,
) -> Result<bool, ConfigError> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    flatten_yaml("", &yaml, values);
    Ok(true)
}

/// Parse a YAML string and flatten it into the values map.
pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut BTreeMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys.
pub(crate) fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut BTreeMap<String, ConfigValue>,
) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key_str = yaml_key(k);
                let full_key = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            if !prefix.is_empty() {
                out.insert(
                    prefix.to_string(),
                    ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect()),
                );
                // Also store each element individually (key.0, key.1, ...) for env var compat
                for (i, item) in seq.iter().enumerate() {
                    flatten_yaml(&format!("{prefix}.{i}"), item, out);
                }
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
            }
        }
    }
}
