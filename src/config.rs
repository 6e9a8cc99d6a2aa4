//! Compile options, with an environment loader for the binary and for hosts
//! that configure the adapter through the process environment.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validator::UnknownKeys;

pub const ENV_COERCE: &str = "TOOLSHAPE_COERCE";
pub const ENV_UNKNOWN_KEYS: &str = "TOOLSHAPE_UNKNOWN_KEYS";
pub const ENV_STRICT: &str = "TOOLSHAPE_STRICT";

/// Which input shape a tree was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// recursive `SchemaField`
    Field,
    /// legacy `ToolParameters`
    Flat,
}

/// Whether `number` and `date` nodes accept string-encoded input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// coerce for `SchemaField` trees, not for flat parameter maps
    #[default]
    Default,
    Always,
    Never,
}

impl CoercionPolicy {
    pub fn resolve(self, shape: Shape) -> bool {
        match self {
            Self::Default => shape == Shape::Field,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub coercion: CoercionPolicy,
    pub unknown_keys: UnknownKeys,
    /// Fail on malformed trees instead of degrading them.
    pub strict: bool,
}

impl CompileOptions {
    pub fn strict() -> Self {
        Self { strict: true, ..Self::default() }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from any key lookup. Missing or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut options = Self::default();
        if let Some(value) = get(ENV_COERCE) {
            options.coercion = parse_enum(ENV_COERCE, &value)?;
        }
        if let Some(value) = get(ENV_UNKNOWN_KEYS) {
            options.unknown_keys = parse_enum(ENV_UNKNOWN_KEYS, &value)?;
        }
        if let Some(value) = get(ENV_STRICT) {
            options.strict = match value.to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidValue { var: ENV_STRICT, value }),
            };
        }
        Ok(options)
    }
}

fn parse_enum<T: ValueEnum>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    T::from_str(value, true).map_err(|_| ConfigError::InvalidValue { var, value: value.to_string() })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(CompileOptions::from_lookup(lookup(&[])).unwrap(), CompileOptions::default());
    }

    #[test]
    fn reads_every_variable() {
        let options = CompileOptions::from_lookup(lookup(&[
            (ENV_COERCE, "Always"),
            (ENV_UNKNOWN_KEYS, "reject"),
            (ENV_STRICT, "1"),
        ]))
        .unwrap();
        assert_eq!(options.coercion, CoercionPolicy::Always);
        assert_eq!(options.unknown_keys, UnknownKeys::Reject);
        assert!(options.strict);
    }

    #[test]
    fn rejects_garbage() {
        let err = CompileOptions::from_lookup(lookup(&[(ENV_STRICT, "maybe")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value `maybe` for TOOLSHAPE_STRICT");
        assert!(CompileOptions::from_lookup(lookup(&[(ENV_COERCE, "sometimes")])).is_err());
    }

    #[test]
    fn default_coercion_depends_on_shape() {
        assert!(CoercionPolicy::Default.resolve(Shape::Field));
        assert!(!CoercionPolicy::Default.resolve(Shape::Flat));
        assert!(CoercionPolicy::Always.resolve(Shape::Flat));
        assert!(!CoercionPolicy::Never.resolve(Shape::Field));
    }
}
