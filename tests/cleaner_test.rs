//! Structural cleanup tests: truncate, drop, drop-empty-tables, drop-null-columns.

use db_anonymizer::anonymizer::{Anonymizer, AnonymizerConfig, MethodRegistry, RunStats};
use db_anonymizer::db::{Database, DuckDbDatabase, Value};
use db_anonymizer::error::AnonymizeError;
use db_anonymizer::progress::NoProgress;

fn database(setup: &str) -> DuckDbDatabase {
    let db = DuckDbDatabase::open_in_memory().unwrap();
    db.connection().execute_batch(setup).unwrap();
    db
}

fn run(db: &mut DuckDbDatabase, yaml: &str) -> RunStats {
    let config: AnonymizerConfig = serde_yaml::from_str(yaml).unwrap();
    Anonymizer::from_config(&config, &MethodRegistry::builtin())
        .unwrap()
        .execute(db, &mut NoProgress)
        .unwrap()
}

fn columns(db: &mut DuckDbDatabase, table: &str) -> Vec<String> {
    db.describe_table(table)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

fn row_count(db: &mut DuckDbDatabase, table: &str) -> u64 {
    let rows = db
        .query(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .unwrap();
    rows[0][0].as_count().unwrap()
}

const TMP_TABLES: &str = "
    CREATE TABLE tmp_logs (id INTEGER, line VARCHAR);
    CREATE TABLE tmp_cache (id INTEGER, k VARCHAR);
    CREATE TABLE users (id INTEGER, email VARCHAR);
    INSERT INTO tmp_logs VALUES (1, 'x');
    INSERT INTO users VALUES (1, 'a@x.io');
";

#[test]
fn test_drop_tables_by_pattern() {
    let mut db = database(TMP_TABLES);
    let stats = run(&mut db, "drop: [\"tmp_*\"]");

    assert_eq!(stats.tables_dropped, 2);
    assert_eq!(db.list_tables().unwrap(), vec!["users"]);
}

#[test]
fn test_drop_columns_by_pattern() {
    let mut db = database(
        "CREATE TABLE users (id INTEGER, legacy_ssn VARCHAR, email VARCHAR, legacy_notes VARCHAR);
         INSERT INTO users VALUES (1, '123', 'a@x.io', 'n');",
    );
    let stats = run(&mut db, "drop: [\"users.legacy_*\"]");

    assert_eq!(stats.columns_dropped, 2);
    assert_eq!(columns(&mut db, "users"), vec!["id", "email"]);
}

#[test]
fn test_drop_without_match_is_noop() {
    let mut db = database(TMP_TABLES);
    let stats = run(&mut db, "drop: [\"archive_*\", \"users.fax*\"]");

    assert_eq!(stats.tables_dropped, 0);
    assert_eq!(stats.columns_dropped, 0);
    assert_eq!(db.list_tables().unwrap().len(), 3);
}

#[test]
fn test_overlapping_drops_are_idempotent() {
    let mut db = database(TMP_TABLES);
    let stats = run(
        &mut db,
        r#"
drop:
  - "tmp_*"
  - tmp_logs
  - "tmp_cache.k"
"#,
    );

    assert_eq!(stats.tables_dropped, 2);
    assert_eq!(stats.columns_dropped, 0);
    assert!(stats.warnings.is_empty());
}

#[test]
fn test_truncate() {
    let mut db = database(TMP_TABLES);
    let stats = run(&mut db, "truncate: [tmp_logs, tmp_cache]");

    // tmp_cache was already empty
    assert_eq!(stats.tables_truncated, 2);
    assert_eq!(row_count(&mut db, "tmp_logs"), 0);
    assert_eq!(row_count(&mut db, "users"), 1);
}

#[test]
fn test_drop_empty_tables() {
    let mut db = database(
        "CREATE TABLE audit_log (id INTEGER, action VARCHAR);
         CREATE TABLE users (id INTEGER, email VARCHAR);
         INSERT INTO users VALUES (1, 'a@x.io');",
    );
    let stats = run(&mut db, "flags: { drop-empty-tables: true }");

    assert_eq!(stats.tables_dropped, 1);
    assert_eq!(db.list_tables().unwrap(), vec!["users"]);
}

#[test]
fn test_empty_tables_kept_without_flag() {
    let mut db = database("CREATE TABLE audit_log (id INTEGER);");
    run(&mut db, "flags: { drop-empty-tables: false }");
    assert_eq!(db.list_tables().unwrap(), vec!["audit_log"]);
}

#[test]
fn test_drop_empty_sees_truncated_tables() {
    let mut db = database(TMP_TABLES);
    let stats = run(
        &mut db,
        r#"
truncate: [tmp_logs]
flags:
  drop-empty-tables: true
"#,
    );

    assert_eq!(stats.tables_dropped, 2);
    assert_eq!(db.list_tables().unwrap(), vec!["users"]);
}

#[test]
fn test_drop_null_columns() {
    let mut db = database(
        "CREATE TABLE users (id INTEGER, email VARCHAR, fax VARCHAR);
         INSERT INTO users VALUES (1, 'a@x.io', NULL), (2, NULL, NULL);",
    );
    let stats = run(&mut db, "flags: { drop-null-columns: true }");

    assert_eq!(stats.columns_dropped, 1);
    assert_eq!(columns(&mut db, "users"), vec!["id", "email"]);
}

#[test]
fn test_null_columns_kept_without_flag() {
    let mut db = database(
        "CREATE TABLE users (id INTEGER, fax VARCHAR);
         INSERT INTO users VALUES (1, NULL);",
    );
    run(&mut db, "{}");
    assert_eq!(columns(&mut db, "users"), vec!["id", "fax"]);
}

#[test]
fn test_null_rule_feeds_drop_null_columns() {
    let mut db = database(
        "CREATE TABLE users (id INTEGER, email VARCHAR, phone VARCHAR);
         INSERT INTO users VALUES (1, 'a@x.io', '555');",
    );
    let stats = run(
        &mut db,
        r#"
columns:
  users.phone:
    method: "null"
flags:
  drop-null-columns: true
"#,
    );

    assert_eq!(stats.columns_dropped, 1);
    assert_eq!(columns(&mut db, "users"), vec!["id", "email"]);
}

#[test]
fn test_dropped_tables_skipped_by_later_passes() {
    let mut db = database(
        "CREATE TABLE tmp_logs (id INTEGER, line VARCHAR);
         INSERT INTO tmp_logs VALUES (NULL, NULL);
         CREATE TABLE audit_log (id INTEGER, note VARCHAR);
         CREATE TABLE users (id INTEGER, email VARCHAR, fax VARCHAR);
         INSERT INTO users VALUES (1, 'a@x.io', NULL);",
    );
    let stats = run(
        &mut db,
        r#"
drop: ["tmp_*"]
flags:
  drop-empty-tables: true
  drop-null-columns: true
"#,
    );

    assert_eq!(stats.tables_dropped, 2);
    assert_eq!(stats.columns_dropped, 1);
    assert!(stats.warnings.is_empty());
    assert_eq!(db.list_tables().unwrap(), vec!["users"]);
    assert_eq!(columns(&mut db, "users"), vec!["id", "email"]);
}

#[test]
fn test_last_column_is_never_dropped() {
    let mut db = database(
        "CREATE TABLE blank (a VARCHAR, b VARCHAR);
         INSERT INTO blank VALUES (NULL, NULL);",
    );
    let stats = run(&mut db, "flags: { drop-null-columns: true }");

    assert_eq!(stats.columns_dropped, 1);
    assert_eq!(columns(&mut db, "blank"), vec!["b"]);
    assert_eq!(stats.warnings.len(), 1);
    assert!(stats.warnings[0].contains("blank.b"));
}

#[test]
fn test_table_removed_outside_the_run_is_skipped() {
    use db_anonymizer::db::{ColumnDescription, Dialect};
    use db_anonymizer::error::Result;

    /// Drops `ghost` right after the schema has been read
    struct Vanishing {
        inner: DuckDbDatabase,
        listings: usize,
    }

    impl Database for Vanishing {
        fn dialect(&self) -> Dialect {
            self.inner.dialect()
        }

        fn list_tables(&mut self) -> Result<Vec<String>> {
            self.listings += 1;
            if self.listings == 2 {
                self.inner.execute("DROP TABLE ghost", &[])?;
            }
            self.inner.list_tables()
        }

        fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnDescription>> {
            self.inner.describe_table(table)
        }

        fn table_row_counts(&mut self) -> Result<Vec<(String, u64)>> {
            self.inner.table_row_counts()
        }

        fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
            self.inner.query(sql, params)
        }

        fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            self.inner.execute(sql, params)
        }

        fn begin(&mut self) -> Result<()> {
            self.inner.begin()
        }

        fn commit(&mut self) -> Result<()> {
            self.inner.commit()
        }

        fn rollback(&mut self) -> Result<()> {
            self.inner.rollback()
        }
    }

    let mut db = Vanishing {
        inner: database(
            "CREATE TABLE ghost (id INTEGER, x VARCHAR);
             CREATE TABLE users (id INTEGER, fax VARCHAR);
             INSERT INTO users VALUES (1, NULL);",
        ),
        listings: 0,
    };
    let config: AnonymizerConfig =
        serde_yaml::from_str("flags: { drop-null-columns: true }").unwrap();
    let stats = Anonymizer::from_config(&config, &MethodRegistry::builtin())
        .unwrap()
        .execute(&mut db, &mut NoProgress)
        .unwrap();

    assert_eq!(stats.warnings.len(), 1);
    assert!(stats.warnings[0].contains("ghost"));
    assert_eq!(stats.columns_dropped, 1);
    assert_eq!(columns(&mut db.inner, "users"), vec!["id"]);
}

#[test]
fn test_drop_with_three_parts_is_rejected() {
    let config: AnonymizerConfig = serde_yaml::from_str("drop: [shop.users.email]").unwrap();
    let err = Anonymizer::from_config(&config, &MethodRegistry::builtin())
        .err()
        .unwrap();
    assert!(matches!(err.root(), AnonymizeError::Config(_)));
}
