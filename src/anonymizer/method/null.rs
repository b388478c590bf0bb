//! Null method - clear the column.

use super::{Method, MethodDefaults, RowContext, Scope};
use crate::anonymizer::config::Arguments;
use crate::db::Value;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullMethod;

impl NullMethod {
    pub fn boxed(_args: &Arguments, _defaults: &MethodDefaults) -> Result<Box<dyn Method>> {
        Ok(Box::new(NullMethod))
    }
}

impl Method for NullMethod {
    fn apply(&mut self, _original: Option<&Value>, _context: Option<&RowContext<'_>>) -> Result<Value> {
        Ok(Value::Null)
    }

    fn scope(&self) -> Scope {
        Scope::Table
    }

    fn describe(&self) -> String {
        "null".to_string()
    }
}
