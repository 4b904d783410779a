//! Environment variable rows.

use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;

use crate::editor::Error;
use crate::editor::Row;

/// An environment variable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnvVar {
    /// The variable name.
    pub name: String,

    /// The variable value.
    pub value: String,
}

impl EnvVar {
    /// Creates an environment variable.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An environment variable row being edited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvRow {
    /// The name field.
    pub name: String,

    /// The value field.
    pub value: String,
}

impl EnvRow {
    /// Creates a row.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Row for EnvRow {
    type Item = EnvVar;

    fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.value.trim().is_empty()
    }

    fn parse(&self, row: usize) -> Result<EnvVar, Error> {
        let name = self.name.trim();

        if name.is_empty() {
            return Err(Error::BlankName { row });
        }

        if self.value.trim().is_empty() {
            return Err(Error::BlankValue { row });
        }

        Ok(EnvVar::new(name, self.value.clone()))
    }

    fn from_item(item: &EnvVar) -> Self {
        Self::new(item.name.clone(), item.value.clone())
    }

    fn check(items: &[EnvVar]) -> Result<(), Error> {
        let mut seen = IndexSet::new();

        for var in items {
            if !seen.insert(var.name.as_str()) {
                return Err(Error::DuplicateName(var.name.clone()));
            }
        }

        Ok(())
    }
}
