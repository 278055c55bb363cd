//! Grouping dimensions: a named key function over records.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::key::Record;

/// One level of grouping: either a record field or a derived key function.
///
/// The display name defaults to the field name; derived dimensions name
/// themselves at construction. `renamed` overrides either.
#[derive(Clone)]
pub struct Dimension {
    name: String,
    kind: DimKind,
}

#[derive(Clone)]
enum DimKind {
    Field(String),
    Derived(Rc<dyn Fn(&Record) -> Value>),
}

impl Dimension {
    /// Group by a record field.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: name.clone(),
            kind: DimKind::Field(name),
        }
    }

    /// Group by a derived key computed from each record.
    pub fn derived(name: impl Into<String>, func: impl Fn(&Record) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            kind: DimKind::Derived(Rc::new(func)),
        }
    }

    /// Override the display name without changing the key function.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw dimension value for one record; missing fields yield null.
    pub fn extract(&self, record: &Record) -> Value {
        match &self.kind {
            DimKind::Field(field) => record.get(field).cloned().unwrap_or(Value::Null),
            DimKind::Derived(func) => func(record),
        }
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DimKind::Field(field) => f.debug_tuple("Dimension::field").field(field).finish(),
            DimKind::Derived(_) => f.debug_tuple("Dimension::derived").field(&self.name).finish(),
        }
    }
}
