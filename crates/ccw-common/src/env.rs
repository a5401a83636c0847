//! Typed access to environment settings
//!
//! Unset and blank variables read as absent. A variable that is set but cannot
//! be parsed is an error rather than a silent fallback to the default.

use crate::error::{CcwError, Result};
use std::fmt::Display;
use std::str::FromStr;

/// Read a raw variable, treating blank values as unset
pub fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read the first set variable out of `keys`
pub fn var_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| var(key))
}

/// Parse an optional variable
pub fn parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| CcwError::InvalidSetting {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Parse a variable, falling back to `default` when it is unset
pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse(key)?.unwrap_or(default))
}

/// Parse a boolean flag; accepts `true/false`, `1/0`, `yes/no`, `on/off`
pub fn flag_or(key: &str, default: bool) -> Result<bool> {
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(CcwError::InvalidSetting {
                key: key.to_string(),
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}
