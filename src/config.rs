//! Untyped parameter bundle fed to the validator.
//!
//! Parameters arrive from two places: a flat TOML file and command-line flags.
//! Both end up as a [`RawParams`] map whose values still need coercion, so the
//! validator sees the same shape no matter where a value came from.

use crate::device::error::ParameterError;
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = ".config/meross-toggle";
const CONFIG_FILE: &str = "config.toml";

/// A single value as supplied by the user, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{}", value),
            ParamValue::Integer(value) => write!(f, "{}", value),
            ParamValue::Float(value) => write!(f, "{}", value),
            ParamValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Key-value parameters in their raw form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParams {
    values: BTreeMap<String, ParamValue>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlays `other` on top of `self`; keys present in both take `other`'s value.
    pub fn merge(mut self, other: RawParams) -> Self {
        self.values.extend(other.values);
        self
    }

    /// Parses a flat TOML document. Only scalar values are accepted.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e| eyre!("Failed to parse parameter file: {}", e))?;

        let mut params = RawParams::new();
        for (key, value) in table {
            let value = match value {
                toml::Value::Boolean(b) => ParamValue::Bool(b),
                toml::Value::Integer(i) => ParamValue::Integer(i),
                toml::Value::Float(f) => ParamValue::Float(f),
                toml::Value::String(s) => ParamValue::Text(s),
                _ => return Err(ParameterError::invalid(&key).into()),
            };
            params.values.insert(key, value);
        }
        Ok(params)
    }

    /// Reads and parses a parameter file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read parameter file {}: {}", path.display(), e))?;

        let params = Self::from_toml_str(&content)?;
        info!("Loaded {} parameters from {}", params.len(), path.display());
        Ok(params)
    }

    /// Loads the default parameter file if it exists, otherwise returns an empty bundle.
    pub async fn load_default() -> Result<Self> {
        let Some(path) = Self::default_path() else {
            debug!("No home directory, skipping default parameter file");
            return Ok(RawParams::new());
        };

        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if parameter file exists: {}", e))?
        {
            debug!("No parameter file at {}", path.display());
            return Ok(RawParams::new());
        }

        Self::load(&path).await
    }

    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::home_dir()?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Some(path)
    }
}
