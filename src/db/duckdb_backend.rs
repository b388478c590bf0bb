//! Embedded DuckDB backend.

use super::{ColumnDescription, Database, Dialect, Value};
use crate::error::{AnonymizeError, Result};
use duckdb::types::{TimeUnit, ToSql, ToSqlOutput, ValueRef};
use duckdb::Connection;
use log::debug;
use std::path::Path;

/// A DuckDB database, either on disk or in memory
pub struct DuckDbDatabase {
    conn: Connection,
}

impl DuckDbDatabase {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            AnonymizeError::Connection(format!(
                "failed to open DuckDB database {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { conn })
    }

    /// Create a fresh in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            AnonymizeError::Connection(format!("failed to create in-memory DuckDB database: {}", e))
        })?;
        Ok(Self { conn })
    }

    /// Get the underlying DuckDB connection (for seeding and inspection)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn introspect(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        self.query(sql, params)
            .map_err(|e| AnonymizeError::Connection(e.to_string()))
    }
}

impl Database for DuckDbDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = self.introspect(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
            &[],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(|v| v.to_text()))
            .collect())
    }

    fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnDescription>> {
        let rows = self.introspect(
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = ? \
             ORDER BY ordinal_position",
            &[Value::from(table)],
        )?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let mut fields = row.into_iter().map(|v| v.to_text());
            let (Some(Some(name)), Some(data_type), Some(nullable), Some(default)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(AnonymizeError::Connection(format!(
                    "unexpected column description for table {}",
                    table
                )));
            };
            columns.push(ColumnDescription {
                name,
                data_type: data_type.unwrap_or_default(),
                nullable: nullable.is_some_and(|n| n.eq_ignore_ascii_case("YES")),
                default,
                extra: String::new(),
            });
        }
        Ok(columns)
    }

    fn table_row_counts(&mut self) -> Result<Vec<(String, u64)>> {
        // DuckDB keeps no maintained row statistic, so count each table.
        let tables = self.list_tables()?;
        let mut counts = Vec::with_capacity(tables.len());
        for table in tables {
            let sql = format!("SELECT COUNT(*) FROM {}", Dialect::DuckDb.quote_ident(&table));
            let rows = self.introspect(&sql, &[])?;
            let count = rows
                .first()
                .and_then(|row| row.first())
                .and_then(Value::as_count)
                .unwrap_or(0);
            counts.push((table, count));
        }
        Ok(counts)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        debug!("duckdb query: {}", sql);
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| AnonymizeError::query(sql, e))?;

        let mut rows_result = stmt
            .query(duckdb::params_from_iter(params.iter()))
            .map_err(|e| AnonymizeError::query(sql, e))?;

        let mut rows = Vec::new();
        let mut column_count = 0;
        while let Some(row) = rows_result.next().map_err(|e| AnonymizeError::query(sql, e))? {
            if column_count == 0 {
                column_count = row.as_ref().column_count();
            }
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i).map_err(|e| AnonymizeError::query(sql, e))?;
                values.push(from_value_ref(value));
            }
            rows.push(values);
        }
        Ok(rows)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!("duckdb execute: {} {:?}", sql, params);
        self.conn
            .execute(sql, duckdb::params_from_iter(params.iter()))
            .map(|n| n as u64)
            .map_err(|e| AnonymizeError::query(sql, e))
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| AnonymizeError::query("BEGIN TRANSACTION", e))
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| AnonymizeError::query("COMMIT", e))
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| AnonymizeError::query("ROLLBACK", e))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(duckdb::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned(duckdb::types::Value::BigInt(*i)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Convert a DuckDB cell into a [`Value`]
fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Integer(i64::from(b)),
        ValueRef::TinyInt(n) => Value::Integer(n.into()),
        ValueRef::SmallInt(n) => Value::Integer(n.into()),
        ValueRef::Int(n) => Value::Integer(n.into()),
        ValueRef::BigInt(n) => Value::Integer(n),
        ValueRef::UTinyInt(n) => Value::Integer(n.into()),
        ValueRef::USmallInt(n) => Value::Integer(n.into()),
        ValueRef::UInt(n) => Value::Integer(n.into()),
        ValueRef::UBigInt(n) => match i64::try_from(n) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::String(n.to_string()),
        },
        ValueRef::HugeInt(n) => match i64::try_from(n) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::String(n.to_string()),
        },
        ValueRef::Float(f) => Value::String(f.to_string()),
        ValueRef::Double(f) => Value::String(f.to_string()),
        ValueRef::Decimal(d) => Value::String(d.to_string()),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        ValueRef::Timestamp(unit, ts) => {
            let (secs, nanos) = split_seconds(unit, ts);
            match chrono::DateTime::from_timestamp(secs, nanos) {
                Some(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
                None => Value::String(ts.to_string()),
            }
        }
        ValueRef::Date32(days) => {
            // 719163 = days from 0001-01-01 to 1970-01-01
            match chrono::NaiveDate::from_num_days_from_ce_opt(719163 + days) {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::String(days.to_string()),
            }
        }
        ValueRef::Time64(unit, t) => {
            let (secs, nanos) = split_seconds(unit, t);
            let time = u32::try_from(secs)
                .ok()
                .and_then(|secs| chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos));
            match time {
                Some(time) => Value::String(time.format("%H:%M:%S%.f").to_string()),
                None => Value::String(t.to_string()),
            }
        }
        ValueRef::Enum(..) => match duckdb::types::Value::from(value) {
            duckdb::types::Value::Enum(label) => Value::String(label),
            other => Value::String(format!("{:?}", other)),
        },
        // Nested and interval values have no scalar form to compare against
        other => Value::String(format!("{:?}", other)),
    }
}

/// Whole seconds and the nanosecond remainder of a count of `unit`
fn split_seconds(unit: TimeUnit, value: i64) -> (i64, u32) {
    let per_second = match unit {
        TimeUnit::Second => 1,
        TimeUnit::Millisecond => 1_000,
        TimeUnit::Microsecond => 1_000_000,
        TimeUnit::Nanosecond => 1_000_000_000,
    };
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    (value.div_euclid(per_second), nanos as u32)
}
