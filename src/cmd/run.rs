//! CLI handler for the run command.

use anyhow::bail;
use db_anonymizer::anonymizer::{Anonymizer, AnonymizerConfig, MethodRegistry, RunStats};
use db_anonymizer::db::{self, mask_password};
use db_anonymizer::progress::{Progress, ProgressReporter};
use log::info;
use std::env;
use std::path::PathBuf;

const CONFIG_ENV: &str = "ANONYMIZER_FILENAME";
const DSN_ENV: &str = "ANONYMIZER_DSN";
/// Older deployments set the DSN under this name
const LEGACY_DSN_ENV: &str = "PDO";
const DEFAULT_CONFIG: &str = "anonymizer.yml";

/// Run the anonymizer with the given options
pub fn run(
    config: Option<PathBuf>,
    dsn: Option<String>,
    transaction: bool,
    json: bool,
    no_progress: bool,
    verbose: u8,
) -> anyhow::Result<()> {
    let (config_path, warning) = resolve_config(config, env::var(CONFIG_ENV).ok());
    if let Some(warning) = warning {
        eprintln!("Warning: {}", warning);
    }
    let dsn = resolve_dsn(
        dsn,
        env::var(DSN_ENV).ok(),
        env::var(LEGACY_DSN_ENV).ok(),
    )?;

    let mut progress = ProgressReporter::new(!no_progress && !json).quiet(json);
    progress.message("Anonymizer");
    progress.message(&format!(" * DSN: {}", mask_password(&dsn)));
    progress.message(&format!(" * Config: {}", config_path.display()));

    // Everything that can be rejected without a connection is checked first
    let config = AnonymizerConfig::load(&config_path)?;
    let mut engine = Anonymizer::from_config(&config, &MethodRegistry::builtin())?
        .with_rule_transactions(transaction)
        .with_schema_listing(verbose > 0);
    info!("{} column rules loaded", engine.rule_count());

    let mut db = db::connect(&dsn)?;
    let stats = engine.execute(db.as_mut(), &mut progress)?;
    progress.finish();

    output_stats(&stats, json)?;
    if !json {
        println!("Done");
    }
    Ok(())
}

/// Positional argument, then environment, then the default file
fn resolve_config(arg: Option<PathBuf>, env: Option<String>) -> (PathBuf, Option<String>) {
    let env = env.filter(|v| !v.is_empty());
    match (arg, env) {
        (Some(path), Some(_)) => (
            path,
            Some(format!(
                "both the config argument and {} are set, using the argument",
                CONFIG_ENV
            )),
        ),
        (Some(path), None) => (path, None),
        (None, Some(path)) => (PathBuf::from(path), None),
        (None, None) => (
            PathBuf::from(DEFAULT_CONFIG),
            Some(format!(
                "No configuration specified, assuming default configuration file {}",
                DEFAULT_CONFIG
            )),
        ),
    }
}

fn resolve_dsn(
    arg: Option<String>,
    env: Option<String>,
    legacy: Option<String>,
) -> anyhow::Result<String> {
    match arg.into_iter().chain(env).chain(legacy).find(|v| !v.is_empty()) {
        Some(dsn) => Ok(dsn),
        None => bail!(
            "DSN not specified. Pass it as an argument or set {}",
            DSN_ENV
        ),
    }
}

fn output_stats(stats: &RunStats, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("\nAnonymization complete:");
    println!("  Column rules applied: {}", stats.rules_applied);
    println!("  Values mapped: {}", stats.values_mapped);
    println!("  Update statements: {}", stats.update_statements);
    if stats.cascade_values_nulled > 0 {
        println!("  Orphaned cascade values nulled: {}", stats.cascade_values_nulled);
    }
    if stats.tables_truncated > 0 {
        println!("  Tables truncated: {}", stats.tables_truncated);
    }
    if stats.tables_dropped > 0 || stats.columns_dropped > 0 {
        println!(
            "  Dropped: {} tables, {} columns",
            stats.tables_dropped, stats.columns_dropped
        );
    }

    if !stats.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &stats.warnings {
            eprintln!("  - {}", warning);
        }
    }
    Ok(())
}
