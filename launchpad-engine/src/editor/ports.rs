//! Pre-opened port rows.

use std::ops::RangeInclusive;

use crate::editor::Error;
use crate::editor::Row;

/// The ports a session may pre-open.
pub const PORT_RANGE: RangeInclusive<u16> = 1024..=65535;

/// A port row being edited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortRow(pub String);

impl PortRow {
    /// Creates a row.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl Row for PortRow {
    type Item = u16;

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn parse(&self, row: usize) -> Result<u16, Error> {
        let value = self.0.trim();

        value
            .parse::<u16>()
            .ok()
            .filter(|port| PORT_RANGE.contains(port))
            .ok_or_else(|| Error::InvalidPort {
                row,
                value: value.to_string(),
            })
    }

    fn from_item(item: &u16) -> Self {
        Self(item.to_string())
    }
}
