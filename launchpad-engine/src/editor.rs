//! Row based editors for environment variables and pre-opened ports.
//!
//! An [`Editor`] holds the rows being edited alongside the last committed
//! list. Rows that are entirely blank are an input affordance and never make
//! it into the committed list.

use thiserror::Error;
use tracing::debug;

pub mod env;
pub mod ports;

pub use env::EnvRow;
pub use env::EnvVar;
pub use ports::PortRow;

/// An editor of environment variables.
pub type EnvEditor = Editor<EnvRow>;

/// An editor of pre-opened ports.
pub type PortEditor = Editor<PortRow>;

/// An error when committing edited rows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A row has a value but no name.
    #[error("row {row} has a value but no name")]
    BlankName {
        /// The row number (starting at one).
        row: usize,
    },

    /// A row has a name but no value.
    #[error("row {row} has a name but no value")]
    BlankValue {
        /// The row number (starting at one).
        row: usize,
    },

    /// A name appears more than once.
    #[error("`{0}` is defined more than once")]
    DuplicateName(String),

    /// A port is not a number in the allowed range.
    #[error("row {row}: `{value}` is not a port between 1024 and 65535")]
    InvalidPort {
        /// The row number (starting at one).
        row: usize,
        /// The value entered.
        value: String,
    },

    /// There are more entries than allowed.
    #[error("at most {max} entries are allowed")]
    TooMany {
        /// The maximum number of entries.
        max: usize,
    },
}

/// An editable row.
pub trait Row: Clone + Default + PartialEq {
    /// The committed form of the row.
    type Item: Clone + PartialEq;

    /// Whether every field of the row is blank.
    fn is_blank(&self) -> bool;

    /// Parses a non-blank row.
    ///
    /// `row` is the row number (starting at one) used in errors.
    fn parse(&self, row: usize) -> Result<Self::Item, Error>;

    /// Creates a row from a committed item.
    fn from_item(item: &Self::Item) -> Self;

    /// Checks the parsed items as a whole.
    fn check(_items: &[Self::Item]) -> Result<(), Error> {
        Ok(())
    }
}

/// The outcome of asking to close an editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Close {
    /// The editor closed.
    Closed,

    /// The editor has unsaved changes; the discard has to be confirmed.
    ConfirmDiscard,
}

/// An editor of rows with a committed snapshot.
#[derive(Clone, Debug)]
pub struct Editor<R: Row> {
    /// The rows being edited.
    rows: Vec<R>,

    /// The last committed items.
    committed: Vec<R::Item>,

    /// The maximum number of committed items.
    max_items: Option<usize>,
}

impl<R: Row> Default for Editor<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: Row> Editor<R> {
    /// Creates an editor from committed items.
    pub fn new(committed: Vec<R::Item>) -> Self {
        let mut editor = Self {
            rows: Vec::new(),
            committed,
            max_items: None,
        };

        editor.reset_rows();
        editor
    }

    /// Limits the number of committed items.
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Gets the rows being edited.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Appends a blank row.
    pub fn push_row(&mut self) {
        self.rows.push(R::default());
    }

    /// Replaces a row, appending blank rows as needed.
    pub fn set_row(&mut self, index: usize, row: R) {
        if index >= self.rows.len() {
            self.rows.resize(index + 1, R::default());
        }

        self.rows[index] = row;
    }

    /// Removes a row.
    pub fn remove_row(&mut self, index: usize) -> Option<R> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    /// Gets the last committed items.
    pub fn committed(&self) -> &[R::Item] {
        &self.committed
    }

    /// Whether the rows differ from the committed items.
    pub fn is_dirty(&self) -> bool {
        let mut rows = self.rows.iter().filter(|row| !row.is_blank());
        let mut committed = self.committed.iter().map(R::from_item);

        loop {
            match (rows.next(), committed.next()) {
                (Some(row), Some(item)) if *row == item => continue,
                (None, None) => return false,
                _ => return true,
            }
        }
    }

    /// Commits the rows.
    ///
    /// Blank rows are dropped. Nothing is committed if any row fails to parse.
    pub fn commit(&mut self) -> Result<&[R::Item], Error> {
        let items = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_blank())
            .map(|(index, row)| row.parse(index + 1))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(max) = self.max_items {
            if items.len() > max {
                return Err(Error::TooMany { max });
            }
        }

        R::check(&items)?;

        debug!("committed {count} row(s)", count = items.len());
        self.committed = items;
        self.reset_rows();
        Ok(&self.committed)
    }

    /// Asks to close the editor.
    ///
    /// A clean editor closes immediately. A dirty editor keeps its rows until
    /// the discard is confirmed with [`confirm_discard`](Self::confirm_discard).
    pub fn request_close(&mut self) -> Close {
        if self.is_dirty() {
            return Close::ConfirmDiscard;
        }

        self.reset_rows();
        Close::Closed
    }

    /// Discards the edits, reverting to the last committed items.
    pub fn confirm_discard(&mut self) {
        debug!("discarding uncommitted rows");
        self.reset_rows();
    }

    /// Rebuilds the rows from the committed items plus a blank row.
    fn reset_rows(&mut self) {
        self.rows = self.committed.iter().map(R::from_item).collect();
        self.rows.push(R::default());
    }
}
