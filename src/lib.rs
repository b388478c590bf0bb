//! Anonymize sensitive columns of a live database from a YAML rule set.
//!
//! ```no_run
//! use db_anonymizer::anonymizer::{Anonymizer, AnonymizerConfig, MethodRegistry};
//! use db_anonymizer::progress::NoProgress;
//!
//! # fn main() -> db_anonymizer::error::Result<()> {
//! let config = AnonymizerConfig::load("anonymizer.yml".as_ref())?;
//! let mut engine = Anonymizer::from_config(&config, &MethodRegistry::builtin())?;
//! let mut db = db_anonymizer::db::connect("duckdb://snapshot.duckdb")?;
//! let stats = engine.execute(db.as_mut(), &mut NoProgress)?;
//! println!("{} values mapped", stats.values_mapped);
//! # Ok(())
//! # }
//! ```

pub mod anonymizer;
pub mod db;
pub mod error;
pub mod progress;
pub mod schema;
