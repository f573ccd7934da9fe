//! In-memory representation of changeset contents: table metadata and
//! row-level change entries.

use crate::encoding::Value;

/// The operation performed by a [`ChangesetEntry`].
///
/// Discriminants are the wire opcodes, which equal the action codes of
/// SQLite's authorizer (`SQLITE_INSERT`/`SQLITE_UPDATE`/`SQLITE_DELETE`)
/// for compatibility with session-extension changesets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum OperationType {
    /// A new row; `new_values` holds the full row.
    Insert = 0x12,
    /// A modified row; both value arrays are populated.
    Update = 0x17,
    /// A removed row; `old_values` holds the full row.
    Delete = 0x09,
}

impl OperationType {
    /// Map a wire opcode back to an operation.
    pub(crate) fn from_wire(code: u8) -> Option<Self> {
        match code {
            0x12 => Some(OperationType::Insert),
            0x17 => Some(OperationType::Update),
            0x09 => Some(OperationType::Delete),
            _ => None,
        }
    }
}

/// Table metadata announced in the changeset stream.
///
/// A table record pins the column count and primary-key layout for every
/// row record that follows it, until the next table record supersedes it.
///
/// The name must be non-empty UTF-8 without embedded NUL, and at least one
/// column must be flagged as primary key; the writer asserts both in debug
/// builds when the table is announced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangesetTable {
    name: String,
    primary_keys: Vec<bool>,
}

impl ChangesetTable {
    /// Create table metadata from a name and per-column primary-key flags.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_keys: Vec<bool>) -> Self {
        Self {
            name: name.into(),
            primary_keys,
        }
    }

    /// Returns the name of the table.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-column primary-key flags.
    #[inline]
    #[must_use]
    pub fn primary_keys(&self) -> &[bool] {
        &self.primary_keys
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.primary_keys.len()
    }

    /// Whether column `index` is part of the primary key.
    ///
    /// Out-of-range indices are not primary keys.
    #[must_use]
    pub fn is_primary_key(&self, index: usize) -> bool {
        self.primary_keys.get(index).copied().unwrap_or(false)
    }
}

/// A single row-level change, yielded by the reader and accepted by the
/// writer.
///
/// Which value arrays are populated depends on the operation:
/// - INSERT: `new_values` holds one defined value per column, `old_values`
///   is empty
/// - DELETE: `old_values` holds one defined value per column, `new_values`
///   is empty
/// - UPDATE: both arrays have one slot per column; a column the update did
///   not touch is undefined in both slots, a changed column is defined in
///   both (NULL counts as defined), and primary-key columns always carry a
///   defined old value
///
/// The entry borrows the table metadata it was decoded against (the
/// reader's current-table slot). It does not own the table: callers that
/// keep an entry beyond the next
/// [`next_entry`](crate::ChangesetReader::next_entry) call must clone the
/// table themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetEntry<'a> {
    /// The operation this entry performs.
    pub op: OperationType,
    /// Column values of the old row; populated for UPDATE and DELETE.
    pub old_values: Vec<Value>,
    /// Column values of the new row; populated for INSERT and UPDATE.
    pub new_values: Vec<Value>,
    /// The table this entry belongs to.
    pub table: &'a ChangesetTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_wire_codes() {
        assert_eq!(OperationType::Insert as u8, 0x12);
        assert_eq!(OperationType::Update as u8, 0x17);
        assert_eq!(OperationType::Delete as u8, 0x09);

        assert_eq!(OperationType::from_wire(0x12), Some(OperationType::Insert));
        assert_eq!(OperationType::from_wire(0x17), Some(OperationType::Update));
        assert_eq!(OperationType::from_wire(0x09), Some(OperationType::Delete));
        assert_eq!(OperationType::from_wire(0x54), None);
        assert_eq!(OperationType::from_wire(0x00), None);
    }

    #[test]
    fn test_table_accessors() {
        let table = ChangesetTable::new("points", vec![true, false, false]);
        assert_eq!(table.name(), "points");
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.primary_keys(), &[true, false, false]);
        assert!(table.is_primary_key(0));
        assert!(!table.is_primary_key(2));
        assert!(!table.is_primary_key(17));
    }
}
