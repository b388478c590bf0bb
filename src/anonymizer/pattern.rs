//! Shell-glob expansion of table and column patterns against the schema snapshot.

use crate::error::{AnonymizeError, Result};
use crate::schema::SchemaSnapshot;
use glob::Pattern;

/// Resolves `tmp_*` style patterns to concrete names, in snapshot order
pub struct PatternExpander<'a> {
    schema: &'a SchemaSnapshot,
}

impl<'a> PatternExpander<'a> {
    pub fn new(schema: &'a SchemaSnapshot) -> Self {
        Self { schema }
    }

    /// Table names matching `pattern`. No match is an empty list, not an error.
    pub fn expand_tables(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = compile(pattern)?;
        Ok(self
            .schema
            .table_names()
            .filter(|name| pattern.matches(name))
            .map(str::to_string)
            .collect())
    }

    /// Column names of `table` matching `pattern`. An unknown table yields no columns.
    pub fn expand_columns(&self, table: &str, pattern: &str) -> Result<Vec<String>> {
        let pattern = compile(pattern)?;
        let Some(table) = self.schema.table(table) else {
            return Ok(Vec::new());
        };
        Ok(table
            .column_names()
            .filter(|name| pattern.matches(name))
            .map(str::to_string)
            .collect())
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern)
        .map_err(|e| AnonymizeError::config(format!("invalid pattern '{}': {}", pattern, e)))
}
