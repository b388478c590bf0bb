//! Old value → new value mapping for one column rule.
//!
//! The mapping is insertion ordered: keys are visited in the order the
//! originals were first read, so a seeded generator hands out the same
//! replacements on every run.

use super::method::{Method, RowContext};
use crate::db::{Database, Value};
use crate::error::{AnonymizeError, Result};
use crate::progress::Progress;
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use log::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueMapping {
    entries: IndexMap<Value, Value>,
    /// Entry indices in the order their updates can be issued
    order: Vec<usize>,
}

impl ValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping, invoking `method` once per distinct non-NULL original.
    ///
    /// The originals are reserved on `method` first. Replacements that are
    /// themselves originals are ordered so each is rewritten before it is
    /// reused; replacements that form a cycle fail with
    /// [`AnonymizeError::Collision`].
    pub fn build<I>(originals: I, method: &mut dyn Method, context: &RowContext<'_>) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let keys: Vec<Value> = originals
            .into_iter()
            .filter(|value| !value.is_null())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        method.reserve(&keys);

        let mut mapping = Self::new();
        for original in keys {
            mapping.get_or_insert(original, method, context)?;
        }
        mapping.order = mapping.update_order()?;
        Ok(mapping)
    }

    /// Index of the entry that must be applied before entry `i`, if any
    fn depends_on(&self, i: usize) -> Option<usize> {
        let (_, replacement) = self.entries.get_index(i)?;
        let j = self.entries.get_index_of(replacement)?;
        let (original, next) = self.entries.get_index(j)?;
        // An original mapped to itself never moves, so it is no obstacle
        (original != next).then_some(j)
    }

    fn update_order(&self) -> Result<Vec<usize>> {
        let mut placed = vec![false; self.entries.len()];
        let mut order = Vec::with_capacity(self.entries.len());

        for start in 0..self.entries.len() {
            let mut chain = Vec::new();
            let mut current = Some(start);
            while let Some(i) = current {
                if placed[i] {
                    break;
                }
                if chain.contains(&i) {
                    let (original, replacement) = self
                        .entries
                        .get_index(i)
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .unwrap_or_default();
                    return Err(AnonymizeError::Collision {
                        original,
                        replacement,
                    });
                }
                chain.push(i);
                current = self.depends_on(i);
            }
            for &i in chain.iter().rev() {
                placed[i] = true;
                order.push(i);
            }
        }
        Ok(order)
    }

    /// Existing replacement for `original`, or a fresh one from `method`
    fn get_or_insert(
        &mut self,
        original: Value,
        method: &mut dyn Method,
        context: &RowContext<'_>,
    ) -> Result<&Value> {
        match self.entries.entry(original) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let replacement = method.apply(Some(entry.key()), Some(context))?;
                Ok(entry.insert(replacement))
            }
        }
    }

    pub fn get(&self, original: &Value) -> Option<&Value> {
        self.entries.get(original)
    }

    /// Entries in the order the originals were first read
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }

    /// Entries in the order their `UPDATE ... WHERE col = original` can run
    pub fn updates(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.order
            .iter()
            .filter_map(|&i| self.entries.get_index(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Distinct non-NULL values of `table.column`, in first-seen order
pub fn distinct_values(db: &mut dyn Database, table: &str, column: &str) -> Result<Vec<Value>> {
    let sql = db.dialect().select_column(table, column);
    let rows = db.query(&sql, &[])?;
    let distinct: IndexSet<Value> = rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter(|value| !value.is_null())
        .collect();
    debug!("{}.{}: {} distinct values", table, column, distinct.len());
    Ok(distinct.into_iter().collect())
}

/// Rewrite `table.column` entry by entry, in update order. Returns the number of statements issued.
pub fn apply_mapping(
    db: &mut dyn Database,
    table: &str,
    column: &str,
    mapping: &ValueMapping,
    progress: &mut dyn Progress,
) -> Result<u64> {
    let sql = db.dialect().update_matching(table, column);
    let mut statements = 0;
    for (original, replacement) in mapping.updates() {
        db.execute(&sql, &[replacement.clone(), original.clone()])?;
        statements += 1;
        progress.advance();
    }
    Ok(statements)
}

/// Set every row of `table.column` to `value` in a single statement
pub fn apply_table_value(
    db: &mut dyn Database,
    table: &str,
    column: &str,
    value: Value,
) -> Result<u64> {
    let sql = db.dialect().update_all(table, column);
    let affected = db.execute(&sql, &[value])?;
    debug!("{}.{}: {} rows set", table, column, affected);
    Ok(1)
}
