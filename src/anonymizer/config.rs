//! Configuration types for the anonymizer.
//!
//! ```yaml
//! seed: 0
//! locale: en_US
//! columns:
//!   users.email:
//!     method: faker
//!     arguments: { formatter: safeEmail }
//!     cascades: [orders.email]
//! truncate: [sessions]
//! drop: [tmp_*, users.legacy_*]
//! flags:
//!   drop-empty-tables: true
//!   drop-null-columns: false
//! ```

use crate::db::Value;
use crate::error::{AnonymizeError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Method specific arguments, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(IndexMap<String, serde_yaml::Value>);

impl Arguments {
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.get(key)
    }

    /// A string argument; numbers and booleans are accepted in their textual form
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(AnonymizeError::config(format!(
                "argument '{}' must be a scalar",
                key
            ))),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                AnonymizeError::config(format!("argument '{}' must be a non-negative integer", key))
            }),
            Some(_) => Err(AnonymizeError::config(format!(
                "argument '{}' must be a non-negative integer",
                key
            ))),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(serde_yaml::Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(AnonymizeError::config(format!(
                "argument '{}' must be true or false",
                key
            ))),
        }
    }

    /// A scalar argument converted to a column value
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => Value::from_yaml(v).map(Some).ok_or_else(|| {
                AnonymizeError::config(format!("argument '{}' must be a scalar", key))
            }),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, serde_yaml::Value)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, serde_yaml::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One entry under `columns:`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnEntry {
    /// Method identifier, e.g. `faker` or `fixed`
    pub method: String,
    #[serde(default)]
    pub arguments: Arguments,
    /// Secondary `table.column` copies to keep in sync
    #[serde(default)]
    pub cascades: Vec<String>,
}

/// Boolean switches for the cleanup passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Flags {
    pub drop_empty_tables: bool,
    pub drop_null_columns: bool,
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizerConfig {
    /// Seed for generative methods (default 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Locale for generative methods (default en_US)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Column rules keyed by `table.column`, applied in order
    pub columns: IndexMap<String, ColumnEntry>,

    /// Tables to empty
    pub truncate: Vec<String>,

    /// `table` or `table.column` glob patterns to drop
    pub drop: Vec<String>,

    pub flags: Flags,
}

impl AnonymizerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AnonymizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| {
            AnonymizeError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        config.column_rules()?;
        Ok(config)
    }

    /// Split each `columns:` key into a [`ColumnRule`]
    pub fn column_rules(&self) -> Result<Vec<ColumnRule>> {
        self.columns
            .iter()
            .map(|(key, entry)| {
                let (table, column) = split_column_key(key)?;
                Ok(ColumnRule {
                    table: table.to_string(),
                    column: column.to_string(),
                    method: entry.method.clone(),
                    arguments: entry.arguments.clone(),
                    cascades: entry.cascades.clone(),
                })
            })
            .collect()
    }
}

/// A column to anonymize. Identity is `table.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRule {
    pub table: String,
    pub column: String,
    pub method: String,
    pub arguments: Arguments,
    pub cascades: Vec<String>,
}

impl ColumnRule {
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Split `table.column`, rejecting anything that is not exactly two parts
pub(crate) fn split_column_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        [table, column] if !table.is_empty() && !column.is_empty() => Ok((table, column)),
        _ => Err(AnonymizeError::config(format!(
            "expected 'table.column', got '{}'",
            key
        ))),
    }
}
