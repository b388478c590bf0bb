//! Schema snapshot: table → column → metadata, as of load time.
//!
//! Loaded once at the start of a run and never refreshed, even after the run
//! drops or truncates things. It doubles as the whitelist every identifier
//! must pass before being interpolated into statement text.

use crate::db::{ColumnDescription, Database};
use crate::error::{AnonymizeError, Result};
use indexmap::IndexMap;

/// Metadata for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Declared SQL type as reported by the database
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// Backend specific extra information (e.g. `auto_increment`)
    pub extra: String,
}

impl ColumnInfo {
    /// A nullable column of the given type with no default
    pub fn of_type(data_type: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
            extra: String::new(),
        }
    }
}

impl From<ColumnDescription> for (String, ColumnInfo) {
    fn from(desc: ColumnDescription) -> Self {
        (
            desc.name,
            ColumnInfo {
                data_type: desc.data_type,
                nullable: desc.nullable,
                default: desc.default,
                extra: desc.extra,
            },
        )
    }
}

/// Columns of one table in ordinal order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: IndexMap<String, ColumnInfo>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, ColumnInfo)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (String, ColumnInfo)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Immutable map of every table and its columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    tables: IndexMap<String, TableSchema>,
}

impl SchemaSnapshot {
    /// List all tables, then describe each one.
    ///
    /// Any introspection failure is reported as a connection error and no
    /// partial snapshot is returned.
    pub fn load(db: &mut dyn Database) -> Result<Self> {
        let names = db.list_tables().map_err(into_connection)?;

        let mut tables = IndexMap::with_capacity(names.len());
        for name in names {
            let columns = db.describe_table(&name).map_err(into_connection)?;
            let table: TableSchema = columns
                .into_iter()
                .map(<(String, ColumnInfo)>::from)
                .collect();
            tables.insert(name, table);
        }

        Ok(Self { tables })
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table)
            .is_some_and(|t| t.column(column).is_some())
    }

    /// Table names in snapshot order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableSchema)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Whitelist check for a table identifier
    pub fn require_table(&self, table: &str) -> Result<()> {
        if self.has_table(table) {
            Ok(())
        } else {
            Err(AnonymizeError::config(format!("unknown table '{}'", table)))
        }
    }

    /// Whitelist check for a `table.column` identifier
    pub fn require_column(&self, table: &str, column: &str) -> Result<()> {
        self.require_table(table)?;
        if self.has_column(table, column) {
            Ok(())
        } else {
            Err(AnonymizeError::config(format!(
                "unknown column '{}.{}'",
                table, column
            )))
        }
    }
}

impl FromIterator<(String, TableSchema)> for SchemaSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, TableSchema)>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().collect(),
        }
    }
}

fn into_connection(err: AnonymizeError) -> AnonymizeError {
    match err {
        AnonymizeError::Connection(_) => err,
        other => AnonymizeError::Connection(other.to_string()),
    }
}
