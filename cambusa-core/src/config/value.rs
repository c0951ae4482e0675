use std::collections::BTreeMap;

use super::ConfigError;

/// A single manifest value, kept in its YAML shape until a caller asks for a type.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub(crate) fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    ConfigValue::Float(f)
                } else {
                    ConfigValue::String(n.to_string())
                }
            }
            serde_yaml::Value::String(s) => ConfigValue::String(s.clone()),
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Sequence(seq) => {
                ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => ConfigValue::Map(
                map.iter()
                    .map(|(k, v)| (yaml_key(k), ConfigValue::from_yaml(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => ConfigValue::from_yaml(&tagged.value),
        }
    }

    /// Render the value as JSON, the shape scripts and the REPL see.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Integer(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

pub(crate) fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => format!("{other:?}"),
    }
}

/// Conversion from a [`ConfigValue`] into a concrete type.
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(f) => Ok(f.to_string()),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            _ => Err(mismatch(key, "String")),
        }
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(key, "i64")),
            _ => Err(mismatch(key, "i64")),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Bool(b) => Ok(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(mismatch(key, "bool")),
            },
            _ => Err(mismatch(key, "bool")),
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Null => Ok(None),
            v => T::from_config_value(v, key).map(Some),
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| T::from_config_value(v, &format!("{key}[{i}]")))
                .collect(),
            ConfigValue::Null => Ok(Vec::new()),
            other => Ok(vec![T::from_config_value(other, key)?]),
        }
    }
}

macro_rules! impl_from_config_int {
    ($($ty:ty),+) => {
        $(
            impl FromConfigValue for $ty {
                fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
                    let i = i64::from_config_value(value, key)?;
                    <$ty>::try_from(i).map_err(|_| mismatch(key, stringify!($ty)))
                }
            }
        )+
    };
}

impl_from_config_int!(u16, u32, u64, usize);

impl FromConfigValue for serde_json::Value {
    fn from_config_value(value: &ConfigValue, _key: &str) -> Result<Self, ConfigError> {
        Ok(value.to_json())
    }
}
