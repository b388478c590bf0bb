//! Structural cleanup: truncate, declared drops, drop-empty-tables, drop-null-columns.
//!
//! Declared drops are expanded against the load-time snapshot. The two flag
//! passes look at live state. Everything this run drops is kept in a ledger
//! so later passes never touch it again.

use super::pattern::{compile, PatternExpander};
use super::RunStats;
use crate::db::{Database, Value};
use crate::error::{AnonymizeError, Result};
use crate::progress::Progress;
use crate::schema::SchemaSnapshot;
use ahash::AHashSet;
use log::debug;
use std::fmt;
use std::str::FromStr;

/// A `drop:` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropDirective {
    /// `tmp_*`
    Tables { pattern: String },
    /// `users.legacy_*`
    Columns { table: String, column: String },
}

impl FromStr for DropDirective {
    type Err = AnonymizeError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let directive = match parts.as_slice() {
            [table] if !table.is_empty() => DropDirective::Tables {
                pattern: table.to_string(),
            },
            [table, column] if !table.is_empty() && !column.is_empty() => DropDirective::Columns {
                table: table.to_string(),
                column: column.to_string(),
            },
            [_] | [_, _] => {
                return Err(AnonymizeError::config(format!("empty drop pattern '{}'", s)))
            }
            _ => {
                return Err(AnonymizeError::config(format!(
                    "unexpected part count {} in drop directive '{}'",
                    parts.len(),
                    s
                )))
            }
        };
        match &directive {
            DropDirective::Tables { pattern } => {
                compile(pattern)?;
            }
            DropDirective::Columns { table, column } => {
                compile(table)?;
                compile(column)?;
            }
        }
        Ok(directive)
    }
}

impl fmt::Display for DropDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropDirective::Tables { pattern } => write!(f, "{}", pattern),
            DropDirective::Columns { table, column } => write!(f, "{}.{}", table, column),
        }
    }
}

/// Tables and columns dropped so far in this run
#[derive(Debug, Default)]
struct DropLedger {
    tables: AHashSet<String>,
    columns: AHashSet<(String, String)>,
}

impl DropLedger {
    fn table_dropped(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    fn column_dropped(&self, table: &str, column: &str) -> bool {
        self.table_dropped(table)
            || self
                .columns
                .contains(&(table.to_string(), column.to_string()))
    }

    fn columns_dropped_from(&self, table: &str) -> usize {
        self.columns.iter().filter(|(t, _)| t == table).count()
    }
}

pub struct StructuralCleaner<'a> {
    schema: &'a SchemaSnapshot,
    expander: PatternExpander<'a>,
    ledger: DropLedger,
}

impl<'a> StructuralCleaner<'a> {
    pub fn new(schema: &'a SchemaSnapshot) -> Self {
        Self {
            schema,
            expander: PatternExpander::new(schema),
            ledger: DropLedger::default(),
        }
    }

    /// Empty each table. Tables must already be known to the snapshot.
    pub fn truncate(
        &mut self,
        db: &mut dyn Database,
        tables: &[String],
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        for table in tables {
            progress.message(&format!("Truncating table: {}", table));
            self.truncate_one(db, table)
                .map_err(|e| e.in_directive(format!("truncate {}", table)))?;
            stats.tables_truncated += 1;
        }
        Ok(())
    }

    fn truncate_one(&self, db: &mut dyn Database, table: &str) -> Result<()> {
        self.schema.require_table(table)?;
        let sql = db.dialect().truncate(table);
        db.execute(&sql, &[])?;
        Ok(())
    }

    /// Drop tables and columns named by the directives, as of load time
    pub fn drop_declared(
        &mut self,
        db: &mut dyn Database,
        directives: &[DropDirective],
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        for directive in directives {
            self.drop_one(db, directive, progress, stats)
                .map_err(|e| e.in_directive(format!("drop {}", directive)))?;
        }
        Ok(())
    }

    fn drop_one(
        &mut self,
        db: &mut dyn Database,
        directive: &DropDirective,
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        match directive {
            DropDirective::Tables { pattern } => {
                for table in self.expander.expand_tables(pattern)? {
                    if self.ledger.table_dropped(&table) {
                        debug!("table {} already dropped", table);
                        continue;
                    }
                    progress.message(&format!("Dropping table: {}", table));
                    self.drop_table(db, &table, stats)?;
                }
            }
            DropDirective::Columns { table, column } => {
                for table in self.expander.expand_tables(table)? {
                    if self.ledger.table_dropped(&table) {
                        debug!("table {} already dropped", table);
                        continue;
                    }
                    for column in self.expander.expand_columns(&table, column)? {
                        if self.ledger.column_dropped(&table, &column) {
                            continue;
                        }
                        progress.message(&format!("Dropping column: {}.{}", table, column));
                        self.drop_column(db, &table, &column, stats)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Drop every snapshot table whose live row count is zero
    pub fn drop_empty_tables(
        &mut self,
        db: &mut dyn Database,
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        self.drop_empty_inner(db, progress, stats)
            .map_err(|e| e.in_directive("drop-empty-tables"))
    }

    fn drop_empty_inner(
        &mut self,
        db: &mut dyn Database,
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        for (table, rows) in db.table_row_counts()? {
            if rows > 0 || self.ledger.table_dropped(&table) {
                continue;
            }
            if !self.schema.has_table(&table) {
                debug!("skipping {}: not in the schema snapshot", table);
                continue;
            }
            progress.message(&format!("Dropping empty table: {}", table));
            self.drop_table(db, &table, stats)?;
        }
        Ok(())
    }

    /// Drop every snapshot column that holds no non-NULL value.
    ///
    /// The live table list is re-read first; tables gone since load time are
    /// skipped with a warning.
    pub fn drop_null_columns(
        &mut self,
        db: &mut dyn Database,
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        self.drop_null_inner(db, progress, stats)
            .map_err(|e| e.in_directive("drop-null-columns"))
    }

    fn drop_null_inner(
        &mut self,
        db: &mut dyn Database,
        progress: &mut dyn Progress,
        stats: &mut RunStats,
    ) -> Result<()> {
        let live: AHashSet<String> = db.list_tables()?.into_iter().collect();
        let schema = self.schema;

        for (table, columns) in schema.tables() {
            if self.ledger.table_dropped(table) {
                continue;
            }
            if !live.contains(table) {
                stats.warn(format!("table {} no longer exists, skipped", table));
                continue;
            }
            for column in columns.column_names() {
                if self.ledger.column_dropped(table, column) {
                    continue;
                }
                if count_non_null(db, table, column)? > 0 {
                    continue;
                }
                progress.message(&format!("Dropping null column {}.{}", table, column));
                self.drop_column(db, table, column, stats)?;
            }
        }
        Ok(())
    }

    fn drop_table(&mut self, db: &mut dyn Database, table: &str, stats: &mut RunStats) -> Result<()> {
        let sql = db.dialect().drop_table(table);
        db.execute(&sql, &[])?;
        self.ledger.tables.insert(table.to_string());
        stats.tables_dropped += 1;
        Ok(())
    }

    /// Drops the column unless it is the last one its table has left
    fn drop_column(
        &mut self,
        db: &mut dyn Database,
        table: &str,
        column: &str,
        stats: &mut RunStats,
    ) -> Result<()> {
        let total = self.schema.table(table).map_or(0, |t| t.len());
        if total - self.ledger.columns_dropped_from(table).min(total) <= 1 {
            stats.warn(format!(
                "column {}.{} not dropped: it is the last column of {}",
                table, column, table
            ));
            return Ok(());
        }
        let sql = db.dialect().drop_column(table, column);
        db.execute(&sql, &[])?;
        self.ledger
            .columns
            .insert((table.to_string(), column.to_string()));
        stats.columns_dropped += 1;
        Ok(())
    }
}

fn count_non_null(db: &mut dyn Database, table: &str, column: &str) -> Result<u64> {
    let sql = db.dialect().count_non_null(table, column);
    let rows = db.query(&sql, &[])?;
    rows.first()
        .and_then(|row| row.first())
        .and_then(Value::as_count)
        .ok_or_else(|| AnonymizeError::query(&sql, "count returned no result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drop_directive() {
        assert_eq!(
            "tmp_*".parse::<DropDirective>().unwrap(),
            DropDirective::Tables {
                pattern: "tmp_*".to_string()
            }
        );
        assert_eq!(
            "users.legacy_*".parse::<DropDirective>().unwrap(),
            DropDirective::Columns {
                table: "users".to_string(),
                column: "legacy_*".to_string()
            }
        );
        assert_eq!(
            "users.legacy_*".parse::<DropDirective>().unwrap().to_string(),
            "users.legacy_*"
        );
    }

    #[test]
    fn test_drop_directive_part_count() {
        let err = "db.users.email".parse::<DropDirective>().unwrap_err();
        assert!(matches!(err, AnonymizeError::Config(_)));
        assert!(err.to_string().contains("part count 3"));

        assert!("users.".parse::<DropDirective>().is_err());
        assert!("".parse::<DropDirective>().is_err());
        assert!("tmp_[".parse::<DropDirective>().is_err());
    }

    #[test]
    fn test_ledger() {
        let mut ledger = DropLedger::default();
        ledger.tables.insert("tmp".to_string());
        ledger
            .columns
            .insert(("users".to_string(), "fax".to_string()));

        assert!(ledger.table_dropped("tmp"));
        assert!(ledger.column_dropped("tmp", "anything"));
        assert!(ledger.column_dropped("users", "fax"));
        assert!(!ledger.column_dropped("users", "email"));
        assert_eq!(ledger.columns_dropped_from("users"), 1);
    }
}
