//! Hash method - salted one-way SHA-256.

use super::{Method, MethodDefaults, RowContext, Scope};
use crate::anonymizer::config::Arguments;
use crate::db::Value;
use crate::error::{AnonymizeError, Result};
use sha2::{Digest, Sha256};

const DEFAULT_LENGTH: usize = 16;
const MIN_LENGTH: usize = 8;
const MAX_LENGTH: usize = 64;

/// Replaces a value with a truncated hex digest of `salt + value`
#[derive(Debug, Clone)]
pub struct HashMethod {
    salt: String,
    length: usize,
    /// Keep `@domain` of e-mail addresses
    preserve_domain: bool,
}

impl HashMethod {
    pub fn new(salt: impl Into<String>, length: usize, preserve_domain: bool) -> Self {
        Self {
            salt: salt.into(),
            length: length.clamp(MIN_LENGTH, MAX_LENGTH),
            preserve_domain,
        }
    }

    /// Arguments: `salt`, `length` (8..=64, default 16), `preserve_domain`
    pub fn from_arguments(args: &Arguments) -> Result<Self> {
        let salt = args.get_str("salt")?.unwrap_or_default();
        let length = match args.get_u64("length")? {
            None => DEFAULT_LENGTH,
            Some(n) if (MIN_LENGTH as u64..=MAX_LENGTH as u64).contains(&n) => n as usize,
            Some(n) => {
                return Err(AnonymizeError::config(format!(
                    "hash length must be between {} and {}, got {}",
                    MIN_LENGTH, MAX_LENGTH, n
                )))
            }
        };
        let preserve_domain = args.get_bool("preserve_domain")?.unwrap_or(false);
        Ok(Self::new(salt, length, preserve_domain))
    }

    pub fn boxed(args: &Arguments, _defaults: &MethodDefaults) -> Result<Box<dyn Method>> {
        Ok(Box::new(Self::from_arguments(args)?))
    }

    fn hash_value(&self, value: &str) -> String {
        if self.preserve_domain {
            if let Some((local, domain)) = value.rsplit_once('@') {
                return format!("{}@{}", self.digest(local), domain);
            }
        }
        self.digest(value)
    }

    fn digest(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(value.as_bytes());
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(self.length);
        hex
    }
}

impl Method for HashMethod {
    fn apply(&mut self, original: Option<&Value>, _context: Option<&RowContext<'_>>) -> Result<Value> {
        Ok(match original.and_then(Value::to_text) {
            Some(text) => Value::String(self.hash_value(&text)),
            None => Value::Null,
        })
    }

    fn scope(&self) -> Scope {
        Scope::Row
    }

    fn describe(&self) -> String {
        "hash".to_string()
    }
}
