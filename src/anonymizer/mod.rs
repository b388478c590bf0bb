//! Anonymization engine.
//!
//! A run goes through a fixed sequence of phases:
//!
//! 1. load the schema snapshot and check every configured identifier against it
//! 2. apply the column rules in declaration order, each with its cascades
//! 3. truncate
//! 4. declared drops
//! 5. drop empty tables (flag)
//! 6. drop all-NULL columns (flag)
//!
//! Any error aborts the run where it happened. Mutations already applied stay
//! in place unless per-rule transactions are enabled, in which case only the
//! failing rule is rolled back.

pub mod cascade;
pub mod cleaner;
pub mod config;
pub mod mapping;
pub mod method;
pub mod pattern;

pub use cascade::CascadeTarget;
pub use cleaner::{DropDirective, StructuralCleaner};
pub use config::{AnonymizerConfig, Arguments, ColumnRule, Flags};
pub use mapping::ValueMapping;
pub use method::{Method, MethodDefaults, MethodRegistry, RowContext, Scope};
pub use pattern::PatternExpander;

use crate::db::Database;
use crate::error::Result;
use crate::progress::Progress;
use crate::schema::SchemaSnapshot;
use log::{debug, info, warn};
use mapping::{apply_mapping, apply_table_value, distinct_values};
use serde::Serialize;

/// Statistics from an anonymization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Column rules completed
    pub rules_applied: u64,
    /// Distinct original values given a replacement
    pub values_mapped: u64,
    /// UPDATE statements issued, cascades included
    pub update_statements: u64,
    /// Distinct cascade values set to NULL for lack of a source
    pub cascade_values_nulled: u64,
    pub tables_truncated: u64,
    pub tables_dropped: u64,
    pub columns_dropped: u64,
    /// Things skipped instead of failing the run
    pub warnings: Vec<String>,
}

impl RunStats {
    pub(crate) fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// A column rule with its method constructed and cascades parsed
struct PreparedRule {
    table: String,
    column: String,
    method: Box<dyn Method>,
    cascades: Vec<CascadeTarget>,
}

impl PreparedRule {
    fn identifier(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

pub struct Anonymizer {
    rules: Vec<PreparedRule>,
    truncate: Vec<String>,
    drops: Vec<DropDirective>,
    flags: Flags,
    rule_transactions: bool,
    list_schema: bool,
}

impl Anonymizer {
    /// Build the engine from parsed configuration.
    ///
    /// Methods are constructed, and cascade and drop directives parsed, here,
    /// so unknown methods and malformed directives fail before any query runs.
    pub fn from_config(config: &AnonymizerConfig, registry: &MethodRegistry) -> Result<Self> {
        let defaults = MethodDefaults {
            seed: config.seed.unwrap_or_default(),
            locale: config
                .locale
                .clone()
                .unwrap_or_else(|| MethodDefaults::default().locale),
        };

        let mut rules = Vec::with_capacity(config.columns.len());
        for rule in config.column_rules()? {
            rules.push(Self::prepare(rule, registry, &defaults)?);
        }

        let drops = config
            .drop
            .iter()
            .map(|d| d.parse::<DropDirective>().map_err(|e| e.in_directive(format!("drop {}", d))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            truncate: config.truncate.clone(),
            drops,
            flags: config.flags,
            rule_transactions: false,
            list_schema: false,
        })
    }

    fn prepare(
        rule: ColumnRule,
        registry: &MethodRegistry,
        defaults: &MethodDefaults,
    ) -> Result<PreparedRule> {
        let identifier = rule.identifier();
        let method = registry.create(&rule.method, &identifier, &rule.arguments, defaults)?;
        let cascades = rule
            .cascades
            .iter()
            .map(|c| c.parse::<CascadeTarget>())
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.in_rule(&identifier))?;
        Ok(PreparedRule {
            table: rule.table,
            column: rule.column,
            method,
            cascades,
        })
    }

    /// Wrap each column rule, cascades included, in its own transaction
    pub fn with_rule_transactions(mut self, enabled: bool) -> Self {
        self.rule_transactions = enabled;
        self
    }

    /// Print every `table.column` of the loaded schema
    pub fn with_schema_listing(mut self, enabled: bool) -> Self {
        self.list_schema = enabled;
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run every phase against `db`
    pub fn execute(
        &mut self,
        db: &mut dyn Database,
        progress: &mut dyn Progress,
    ) -> Result<RunStats> {
        let schema = SchemaSnapshot::load(db)?;
        info!("Loaded schema: {} tables", schema.len());
        if self.list_schema {
            for (table, columns) in schema.tables() {
                for column in columns.column_names() {
                    progress.message(&format!("{}.{}", table, column));
                }
            }
        }
        self.validate(&schema)?;

        let mut stats = RunStats::default();

        for rule in &mut self.rules {
            let identifier = rule.identifier();
            progress.message(&format!(
                "Anonymizing column: {} ({})",
                identifier,
                rule.method.describe()
            ));
            info!("Applying {} with {}", identifier, rule.method.describe());

            let result = if self.rule_transactions {
                in_transaction(db, |db| apply_rule(db, rule, progress, &mut stats))
            } else {
                apply_rule(db, rule, progress, &mut stats)
            };
            progress.finish();
            result.map_err(|e| e.in_rule(&identifier))?;
            stats.rules_applied += 1;
        }

        let mut cleaner = StructuralCleaner::new(&schema);
        cleaner.truncate(db, &self.truncate, progress, &mut stats)?;
        cleaner.drop_declared(db, &self.drops, progress, &mut stats)?;
        if self.flags.drop_empty_tables {
            cleaner.drop_empty_tables(db, progress, &mut stats)?;
        }
        if self.flags.drop_null_columns {
            cleaner.drop_null_columns(db, progress, &mut stats)?;
        }

        info!(
            "Run complete: {} rules, {} values mapped, {} updates",
            stats.rules_applied, stats.values_mapped, stats.update_statements
        );
        Ok(stats)
    }

    /// Every identifier that ends up in statement text must exist at load time
    fn validate(&self, schema: &SchemaSnapshot) -> Result<()> {
        for rule in &self.rules {
            let identifier = rule.identifier();
            schema
                .require_column(&rule.table, &rule.column)
                .map_err(|e| e.in_rule(&identifier))?;
            for cascade in &rule.cascades {
                cascade
                    .validate(schema)
                    .map_err(|e| e.in_rule(&identifier))?;
            }
        }
        for table in &self.truncate {
            schema
                .require_table(table)
                .map_err(|e| e.in_directive(format!("truncate {}", table)))?;
        }
        Ok(())
    }
}

fn in_transaction<T>(
    db: &mut dyn Database,
    body: impl FnOnce(&mut dyn Database) -> Result<T>,
) -> Result<T> {
    db.begin()?;
    match body(db) {
        Ok(value) => {
            db.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = db.rollback() {
                warn!("rollback failed: {}", rollback);
            }
            Err(err)
        }
    }
}

fn apply_rule(
    db: &mut dyn Database,
    rule: &mut PreparedRule,
    progress: &mut dyn Progress,
    stats: &mut RunStats,
) -> Result<()> {
    let context = RowContext {
        table: &rule.table,
        column: &rule.column,
    };

    // Orphans are read while both columns still hold their originals
    match rule.method.scope() {
        Scope::Table => {
            let value = rule.method.apply(None, None)?;
            let mapping = if rule.cascades.is_empty() {
                ValueMapping::new()
            } else {
                let originals = distinct_values(db, &rule.table, &rule.column)?;
                let mut fixed = method::FixedMethod::new(value.clone());
                ValueMapping::build(originals, &mut fixed, &context)?
            };
            let pending = pending_cascades(db, rule)?;

            stats.update_statements +=
                apply_table_value(db, &rule.table, &rule.column, value)?;
            if !pending.is_empty() {
                progress.start(mapping.len() as u64 * pending.len() as u64);
            }
            resolve_cascades(db, &pending, &mapping, progress, stats)?;
        }
        Scope::Row => {
            let originals = distinct_values(db, &rule.table, &rule.column)?;
            // Cascade values are taken too, so no replacement repeats one of them
            for values in cascade::read_targets(db, &rule.cascades)? {
                rule.method.reserve(&values);
            }
            let mapping = ValueMapping::build(originals, rule.method.as_mut(), &context)?;
            debug!("{}: {} distinct values mapped", rule.identifier(), mapping.len());
            stats.values_mapped += mapping.len() as u64;

            let pending = pending_cascades(db, rule)?;

            progress.start(mapping.len() as u64 * (1 + rule.cascades.len() as u64));
            stats.update_statements +=
                apply_mapping(db, &rule.table, &rule.column, &mapping, progress)?;
            resolve_cascades(db, &pending, &mapping, progress, stats)?;
        }
    }
    Ok(())
}

fn pending_cascades<'a>(
    db: &mut dyn Database,
    rule: &'a PreparedRule,
) -> Result<Vec<cascade::PendingCascade<'a>>> {
    rule.cascades
        .iter()
        .map(|target| cascade::PendingCascade::read(db, target, &rule.table, &rule.column))
        .collect()
}

fn resolve_cascades(
    db: &mut dyn Database,
    pending: &[cascade::PendingCascade<'_>],
    mapping: &ValueMapping,
    progress: &mut dyn Progress,
    stats: &mut RunStats,
) -> Result<()> {
    for cascade in pending {
        let outcome = cascade::resolve(db, cascade, mapping, progress)?;
        stats.update_statements += outcome.updates + outcome.nulled;
        stats.cascade_values_nulled += outcome.nulled;
    }
    Ok(())
}
