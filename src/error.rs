//! Error taxonomy for an anonymization run.
//!
//! None of these are retried internally. Every failure surfaces to the caller
//! and halts the run where it occurred; mutations already applied stay in place.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnonymizeError>;

#[derive(Debug, Error)]
pub enum AnonymizeError {
    /// Malformed cascade/drop directive, unknown identifier, missing argument.
    #[error("configuration error: {0}")]
    Config(String),

    /// A rule references a method id the registry does not know.
    #[error("unsupported method '{method}' for column {column}")]
    UnsupportedMethod { column: String, method: String },

    /// Database unreachable or schema introspection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A uniqueness-guaranteeing generator ran out of fresh values.
    #[error("generator '{formatter}' could not produce a unique value after {attempts} attempts")]
    GeneratorExhausted { formatter: String, attempts: usize },

    /// Replacements that lead back to their own original through other
    /// originals of the column; no update order rewrites them correctly.
    #[error("replacement {replacement} for {original} starts a cycle through other original values of the column")]
    Collision { original: String, replacement: String },

    /// A statement failed once the run was under way.
    #[error("query failed: {message}\n  statement: {sql}")]
    Query { sql: String, message: String },

    #[error("failed to parse configuration {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("column rule {rule}: {source}")]
    Rule {
        rule: String,
        #[source]
        source: Box<AnonymizeError>,
    },

    #[error("{directive}: {source}")]
    Directive {
        directive: String,
        #[source]
        source: Box<AnonymizeError>,
    },
}

impl AnonymizeError {
    pub fn config(message: impl Into<String>) -> Self {
        AnonymizeError::Config(message.into())
    }

    pub fn query(sql: &str, err: impl std::fmt::Display) -> Self {
        AnonymizeError::Query {
            sql: sql.to_string(),
            message: err.to_string(),
        }
    }

    /// Attach the identity of the column rule that failed.
    pub fn in_rule(self, rule: &str) -> Self {
        AnonymizeError::Rule {
            rule: rule.to_string(),
            source: Box::new(self),
        }
    }

    /// Attach the structural directive (truncate/drop/flag pass) that failed.
    pub fn in_directive(self, directive: impl Into<String>) -> Self {
        AnonymizeError::Directive {
            directive: directive.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with rule/directive context stripped.
    pub fn root(&self) -> &AnonymizeError {
        match self {
            AnonymizeError::Rule { source, .. } | AnonymizeError::Directive { source, .. } => {
                source.root()
            }
            other => other,
        }
    }
}
