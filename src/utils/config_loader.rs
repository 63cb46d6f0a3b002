use dotenvy::dotenv;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::LazyLock;
use std::{env, fs};
use thiserror::Error;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Error loading config: {0}")]
    ConfigError(String),
}

impl LoadConfigError {
    pub fn invalid(key: &str, reason: impl ToString) -> Self {
        Self::InvalidValue { key: key.to_string(), reason: reason.to_string() }
    }
}

/// A config section that can be read from a TOML file.
pub trait WatchConfigLoader: Sized {
    fn load_section_from_file(file_name: &str) -> Result<Self, LoadConfigError>;
}

pub fn load_from_file_sync<T: DeserializeOwned>(file_name: &str) -> Result<T, LoadConfigError> {
    dotenv().ok();
    let contents = fs::read_to_string(file_name)?;
    let contents = expand_vars(&contents);
    let config: T = toml::from_str(&contents)?;
    Ok(config)
}

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][0-9a-zA-Z_]*)\}").unwrap());

/// Replaces `${NAME}` with the environment value of `NAME`; unknown names are kept verbatim.
pub fn expand_vars(raw_config: &str) -> String {
    expand_vars_with(raw_config, |name| env::var(name).ok())
}

pub fn expand_vars_with(raw_config: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    VAR_PATTERN
        .replace_all(raw_config, |caps: &Captures| lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string()))
        .to_string()
}

/// Parses `key` from the lookup when present.
pub fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, LoadConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| LoadConfigError::invalid(key, e)),
        None => Ok(None),
    }
}

/// Parses a boolean flag, accepting `true/false`, `1/0`, `yes/no` and `on/off`.
pub fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, LoadConfigError> {
    let raw = match lookup(key) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        other => Err(LoadConfigError::invalid(key, format!("expected a boolean, got {other:?}"))),
    }
}

/// Parses a JSON value such as an address array.
pub fn parse_json_var<T: DeserializeOwned>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, LoadConfigError> {
    match lookup(key) {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| LoadConfigError::invalid(key, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_expand_vars() {
        let vars = lookup(&[("RPC_URL", "http://node:8545")]);
        let expanded = expand_vars_with("rpc_url = \"${RPC_URL}\"\nother = \"${MISSING}\"", vars);
        assert_eq!(expanded, "rpc_url = \"http://node:8545\"\nother = \"${MISSING}\"");
    }

    #[test]
    fn test_parse_var() {
        let vars = lookup(&[("CONFIRMATIONS", " 12 "), ("WINDOW_BLOCKS", "many")]);
        assert_eq!(parse_var::<u64>(&vars, "CONFIRMATIONS").unwrap(), Some(12));
        assert_eq!(parse_var::<u64>(&vars, "ABSENT").unwrap(), None);
        assert!(matches!(parse_var::<u64>(&vars, "WINDOW_BLOCKS"), Err(LoadConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_flag() {
        let vars = lookup(&[("A", "YES"), ("B", "0"), ("C", "maybe")]);
        assert_eq!(parse_flag(&vars, "A").unwrap(), Some(true));
        assert_eq!(parse_flag(&vars, "B").unwrap(), Some(false));
        assert!(parse_flag(&vars, "C").is_err());
    }
}
