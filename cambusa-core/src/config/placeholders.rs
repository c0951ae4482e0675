use super::ConfigError;

/// Resolve `${VAR}` and `${VAR:default}` placeholders from the environment.
///
/// A placeholder without a default whose variable is unset is an error, so a
/// manifest never silently connects to an empty URL.
pub fn resolve_placeholders(value: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("Unclosed placeholder in: {value}")))?;
        let reference = &after[..end];
        let (var, default) = match reference.split_once(':') {
            Some((var, default)) => (var.trim(), Some(default)),
            None => (reference.trim(), None),
        };
        match (std::env::var(var), default) {
            (Ok(resolved), _) => result.push_str(&resolved),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => return Err(ConfigError::NotFound(format!("env:{var}"))),
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
