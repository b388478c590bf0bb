//! Anonymization methods.
//!
//! A method turns an original column value into its replacement and declares
//! whether it computes one value per column or one per distinct original:
//! - `faker`: generated, unique per rule (row scope)
//! - `fixed`: one configured value (table scope)
//! - `hash`: salted SHA-256 of the original (row scope)
//! - `null`: NULL (table scope)
//!
//! Methods are looked up by identifier in a [`MethodRegistry`].

pub mod faker;
mod fixed;
mod hash;
mod null;

pub use faker::FakerMethod;
pub use fixed::FixedMethod;
pub use hash::HashMethod;
pub use null::NullMethod;

use super::config::Arguments;
use crate::db::Value;
use crate::error::{AnonymizeError, Result};
use ahash::AHashMap;
use std::fmt;

/// How many replacement values a method computes for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One value for the whole column
    Table,
    /// One value per distinct original value
    Row,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Table => write!(f, "table"),
            Scope::Row => write!(f, "row"),
        }
    }
}

/// Where the value being replaced lives
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub table: &'a str,
    pub column: &'a str,
}

pub trait Method {
    /// Produce the replacement for `original`.
    ///
    /// Table-scope methods are called once with `None` for both arguments.
    fn apply(&mut self, original: Option<&Value>, context: Option<&RowContext<'_>>)
        -> Result<Value>;

    /// Fixed per method kind
    fn scope(&self) -> Scope;

    /// Short label for output, e.g. `faker:safeEmail`
    fn describe(&self) -> String;

    /// Values this method must never hand out as a replacement
    fn reserve(&mut self, _values: &[Value]) {}
}

/// Run-wide defaults for generative methods, overridable per rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefaults {
    pub seed: u64,
    pub locale: String,
}

impl Default for MethodDefaults {
    fn default() -> Self {
        Self {
            seed: 0,
            locale: "en_US".to_string(),
        }
    }
}

pub type MethodFactory = fn(&Arguments, &MethodDefaults) -> Result<Box<dyn Method>>;

/// Maps method identifiers to constructors
#[derive(Clone)]
pub struct MethodRegistry {
    factories: AHashMap<String, MethodFactory>,
}

impl MethodRegistry {
    pub fn empty() -> Self {
        Self {
            factories: AHashMap::new(),
        }
    }

    /// Registry holding `faker`, `fixed`, `hash` and `null`
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("faker", FakerMethod::boxed);
        registry.register("fixed", FixedMethod::boxed);
        registry.register("hash", HashMethod::boxed);
        registry.register("null", NullMethod::boxed);
        registry
    }

    /// Add or replace a method
    pub fn register(&mut self, id: impl Into<String>, factory: MethodFactory) {
        self.factories.insert(id.into(), factory);
    }

    /// Construct the method for one column rule.
    pub fn create(
        &self,
        id: &str,
        column: &str,
        arguments: &Arguments,
        defaults: &MethodDefaults,
    ) -> Result<Box<dyn Method>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| AnonymizeError::UnsupportedMethod {
                column: column.to_string(),
                method: id.to_string(),
            })?;
        factory(arguments, defaults)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = MethodRegistry::builtin();
        for id in ["faker", "fixed", "hash", "null"] {
            assert!(registry.factories.contains_key(id), "missing {}", id);
        }

        let defaults = MethodDefaults::default();
        let faker = registry
            .create("faker", "users.email", &Arguments::default(), &defaults)
            .unwrap();
        assert_eq!(faker.scope(), Scope::Row);

        let null = registry
            .create("null", "users.fax", &Arguments::default(), &defaults)
            .unwrap();
        assert_eq!(null.scope(), Scope::Table);
    }

    #[test]
    fn test_unknown_method() {
        let registry = MethodRegistry::builtin();
        let err = registry
            .create("shuffle", "users.email", &Arguments::default(), &MethodDefaults::default())
            .err()
            .unwrap();
        match err {
            AnonymizeError::UnsupportedMethod { column, method } => {
                assert_eq!(column, "users.email");
                assert_eq!(method, "shuffle");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_register_custom_method() {
        struct Upper;

        impl Method for Upper {
            fn apply(&mut self, original: Option<&Value>, _: Option<&RowContext<'_>>) -> Result<Value> {
                Ok(original
                    .and_then(Value::to_text)
                    .map(|s| Value::String(s.to_uppercase()))
                    .unwrap_or(Value::Null))
            }

            fn scope(&self) -> Scope {
                Scope::Row
            }

            fn describe(&self) -> String {
                "upper".to_string()
            }
        }

        fn upper(_: &Arguments, _: &MethodDefaults) -> Result<Box<dyn Method>> {
            Ok(Box::new(Upper))
        }

        let mut registry = MethodRegistry::empty();
        registry.register("upper", upper);
        let mut method = registry
            .create("upper", "t.c", &Arguments::default(), &MethodDefaults::default())
            .unwrap();
        assert_eq!(
            method.apply(Some(&Value::from("abc")), None).unwrap(),
            Value::from("ABC")
        );
        assert!(registry
            .create("faker", "t.c", &Arguments::default(), &MethodDefaults::default())
            .is_err());
    }
}
