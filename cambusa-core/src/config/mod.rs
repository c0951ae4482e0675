mod loader;
pub mod placeholders;
pub mod value;

use std::collections::BTreeMap;
use std::path::Path;

pub use placeholders::resolve_placeholders;
pub use value::{ConfigValue, FromConfigValue};

/// File name of the application manifest, relative to the project root.
pub const MANIFEST_FILE: &str = "application.yaml";

/// Environment variable selecting the active profile.
pub const PROFILE_ENV: &str = "CAMBUSA_PROFILE";

/// Top-level sections that environment variables may override.
const ENV_OVERLAY_SECTIONS: &[&str] = &["app", "database"];

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Project configuration loaded from the manifest, profile overrides, `.env`
/// files and environment variables.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml` (base)
/// 2. `application-{profile}.yaml` (profile override)
/// 3. `.env` file (loaded into process environment)
/// 4. `.env.{profile}` file (loaded into process environment)
/// 5. Environment variables under `app` and `database`
///    (e.g., `DATABASE_URL` overrides `database.url`)
///
/// `.env` files never overwrite already-set environment variables.
///
/// Profile is determined by: `CAMBUSA_PROFILE` env var > argument > default `"dev"`.
#[derive(Debug, Clone)]
pub struct CambusaConfig {
    values: BTreeMap<String, ConfigValue>,
    profile: String,
}

impl CambusaConfig {
    /// Load configuration rooted at `root` for the given profile.
    ///
    /// Fails with [`ConfigError::NotFound`] when `application.yaml` is absent.
    pub fn load(root: &Path, profile: &str) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var(PROFILE_ENV).unwrap_or_else(|_| profile.to_string());

        let mut values = BTreeMap::new();

        // 1. Base manifest
        let manifest = root.join(MANIFEST_FILE);
        if !loader::load_yaml_file(&manifest, &mut values)? {
            return Err(ConfigError::NotFound(manifest.display().to_string()));
        }

        // 2. Profile manifest
        let profile_path = root.join(format!("application-{active_profile}.yaml"));
        loader::load_yaml_file(&profile_path, &mut values)?;

        // 3. .env files (do NOT overwrite existing env vars)
        let _ = dotenvy::from_path(root.join(".env"));
        let _ = dotenvy::from_path(root.join(format!(".env.{active_profile}")));

        // 4. ${...} placeholders
        resolve_string_values(&mut values)?;

        // 5. Environment overlay: `DATABASE_POOL_SIZE` -> `database.pool_size`
        for (env_key, env_val) in std::env::vars() {
            if let Some(config_key) = overlay_key(&env_key) {
                values.insert(config_key, ConfigValue::String(env_val));
            }
        }

        tracing::debug!(profile = %active_profile, keys = values.len(), "configuration loaded");

        Ok(CambusaConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        resolve_string_values(&mut values)?;
        Ok(CambusaConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        CambusaConfig {
            values: BTreeMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for the given dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, returning a default if the key is missing.
    ///
    /// A present value of the wrong type is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.values.get(key) {
            Some(value) => V::from_config_value(value, key),
            None => Ok(default),
        }
    }

    /// Check whether a key exists in the config.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Rebuild the nested document from the flattened keys.
    ///
    /// Indexed list entries (`routes.0.path`) are folded back into their list.
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (key, value) in &self.values {
            if self.covered_by_parent(key) {
                continue;
            }
            insert_nested(&mut root, key, value.to_json());
        }
        serde_json::Value::Object(root)
    }

    fn covered_by_parent(&self, key: &str) -> bool {
        key.match_indices('.')
            .any(|(idx, _)| matches!(self.values.get(&key[..idx]), Some(ConfigValue::List(_))))
    }
}

fn insert_nested(
    root: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
    value: serde_json::Value,
) {
    match key.split_once('.') {
        None => {
            root.insert(key.to_string(), value);
        }
        Some((head, tail)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !child.is_object() {
                *child = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(map) = child {
                insert_nested(map, tail, value);
            }
        }
    }
}

/// Config key an environment variable overrides, if it names an overlay section.
fn overlay_key(env_key: &str) -> Option<String> {
    let (section, rest) = env_key.split_once('_')?;
    let section = section.to_lowercase();
    if rest.is_empty() || !ENV_OVERLAY_SECTIONS.contains(&section.as_str()) {
        return None;
    }
    Some(format!("{section}.{}", rest.to_lowercase()))
}

/// Resolve `${...}` placeholders in all string values of the config map.
fn resolve_string_values(values: &mut BTreeMap<String, ConfigValue>) -> Result<(), ConfigError> {
    for value in values.values_mut() {
        if let ConfigValue::String(s) = value {
            if s.contains("${") {
                *s = resolve_placeholders(s)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::overlay_key;

    #[test]
    fn overlay_keys_keep_underscores_after_section() {
        assert_eq!(overlay_key("DATABASE_URL").as_deref(), Some("database.url"));
        assert_eq!(
            overlay_key("DATABASE_MIGRATIONS_TABLE").as_deref(),
            Some("database.migrations_table")
        );
        assert_eq!(overlay_key("APP_NAME").as_deref(), Some("app.name"));
    }

    #[test]
    fn overlay_ignores_other_sections() {
        assert_eq!(overlay_key("HOME"), None);
        assert_eq!(overlay_key("RUST_LOG"), None);
        assert_eq!(overlay_key("DATABASE_"), None);
    }
}
