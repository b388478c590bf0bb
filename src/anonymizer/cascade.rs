//! Propagation of a rule's mapping to denormalized copies of the column.
//!
//! Per cascade target the resolver first records every non-NULL value that
//! has no equal in the rule's column, before anything is written. Equality is
//! decided by the database, so collations apply. It then sets the recorded
//! ones to NULL and rewrites the mapped values.

use super::config::split_column_key;
use super::mapping::{distinct_values, ValueMapping};
use indexmap::IndexSet;
use crate::db::{Database, Value};
use crate::error::Result;
use crate::progress::Progress;
use crate::schema::SchemaSnapshot;
use log::{debug, info};
use std::fmt;
use std::str::FromStr;

/// A secondary `table.column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeTarget {
    pub table: String,
    pub column: String,
}

impl FromStr for CascadeTarget {
    type Err = crate::error::AnonymizeError;

    fn from_str(s: &str) -> Result<Self> {
        let (table, column) = split_column_key(s)?;
        Ok(Self {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

impl fmt::Display for CascadeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

impl CascadeTarget {
    pub fn validate(&self, schema: &SchemaSnapshot) -> Result<()> {
        schema.require_column(&self.table, &self.column)
    }
}

/// A cascade target with the values it holds that the mapping does not cover
#[derive(Debug, Clone)]
pub struct PendingCascade<'a> {
    pub target: &'a CascadeTarget,
    pub missing: Vec<Value>,
}

/// Counts from resolving one cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub updates: u64,
    pub nulled: u64,
}

impl<'a> PendingCascade<'a> {
    /// Read the values of `target` that have no equal in `table.column`.
    ///
    /// Must run before the rule writes anything.
    pub fn read(
        db: &mut dyn Database,
        target: &'a CascadeTarget,
        table: &str,
        column: &str,
    ) -> Result<Self> {
        let sql = db
            .dialect()
            .select_unmatched(&target.table, &target.column, table, column);
        let missing: IndexSet<Value> = db
            .query(&sql, &[])?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|value| !value.is_null())
            .collect();
        if !missing.is_empty() {
            info!(
                "{}: {} values without a source will be set to NULL",
                target,
                missing.len()
            );
        }
        Ok(Self {
            target,
            missing: missing.into_iter().collect(),
        })
    }
}

/// Distinct non-NULL values of every target
pub fn read_targets(db: &mut dyn Database, targets: &[CascadeTarget]) -> Result<Vec<Vec<Value>>> {
    targets
        .iter()
        .map(|target| distinct_values(db, &target.table, &target.column))
        .collect()
}

/// Null out the recorded orphans, then rewrite mapped values.
///
/// Orphans go first so a replacement equal to one of them is not erased
/// with it. Only the mapped updates advance `progress`.
pub fn resolve(
    db: &mut dyn Database,
    pending: &PendingCascade<'_>,
    mapping: &ValueMapping,
    progress: &mut dyn Progress,
) -> Result<CascadeOutcome> {
    let target = pending.target;
    let dialect = db.dialect();
    let mut outcome = CascadeOutcome::default();

    let null_out = dialect.null_matching(&target.table, &target.column);
    for value in &pending.missing {
        let affected = db.execute(&null_out, std::slice::from_ref(value))?;
        debug!("{}: {} set to NULL in {} rows", target, value, affected);
        outcome.nulled += 1;
    }

    let update = dialect.update_matching(&target.table, &target.column);
    for (original, replacement) in mapping.updates() {
        db.execute(&update, &[replacement.clone(), original.clone()])?;
        outcome.updates += 1;
        progress.advance();
    }

    Ok(outcome)
}
