//! Fixed method - replace every value with one configured value.

use super::{Method, MethodDefaults, RowContext, Scope};
use crate::anonymizer::config::Arguments;
use crate::db::Value;
use crate::error::{AnonymizeError, Result};

#[derive(Debug, Clone)]
pub struct FixedMethod {
    value: Value,
}

impl FixedMethod {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Requires a scalar `value` argument (`~` is accepted and means NULL)
    pub fn from_arguments(args: &Arguments) -> Result<Self> {
        args.get_value("value")?
            .map(Self::new)
            .ok_or_else(|| AnonymizeError::config("method 'fixed' requires a 'value' argument"))
    }

    pub fn boxed(args: &Arguments, _defaults: &MethodDefaults) -> Result<Box<dyn Method>> {
        Ok(Box::new(Self::from_arguments(args)?))
    }
}

impl Method for FixedMethod {
    fn apply(&mut self, _original: Option<&Value>, _context: Option<&RowContext<'_>>) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn scope(&self) -> Scope {
        Scope::Table
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}
