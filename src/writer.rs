//! Writer for binary changeset files.
//!
//! Encoding mirrors the reader exactly: table records announce metadata,
//! row records carry one value payload per populated array, numeric
//! payloads are big-endian, and the reserved indirect byte is written as
//! zero.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::changeset::{ChangesetEntry, ChangesetTable, OperationType};
use crate::encoding::constants::{INDIRECT_FLAG, TABLE_MARKER};
use crate::encoding::varint::encode_varint;
use crate::encoding::{Value, encode_value};
use crate::errors::Error;

/// Writer of binary changeset files.
///
/// Use [`open`](Self::open), announce a table with
/// [`begin_table`](Self::begin_table), then emit that table's changes with
/// [`write_entry`](Self::write_entry); call `begin_table` again to switch
/// tables. Output is append-only and buffered; the buffer is flushed when
/// the writer is dropped.
///
/// The writer does not validate call order or entry contents beyond debug
/// assertions. An undisciplined caller gets a structurally well-formed file
/// that a reader will reject when the entries contradict their table.
#[derive(Debug)]
pub struct ChangesetWriter {
    out: BufWriter<File>,
    /// Most recently announced table; entries are written against it.
    current_table: Option<ChangesetTable>,
}

impl ChangesetWriter {
    /// Create (or truncate) a changeset file for writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::create(path)?;
        debug!(path = %path.display(), "opened changeset for writing");
        Ok(Self {
            out: BufWriter::new(file),
            current_table: None,
        })
    }

    /// Emit a table record and make `table` the current table.
    ///
    /// Must be called before the first [`write_entry`](Self::write_entry).
    /// The metadata is copied into the writer's current-table slot, so the
    /// caller's table need not outlive the writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the record cannot be written.
    pub fn begin_table(&mut self, table: &ChangesetTable) -> Result<(), Error> {
        debug_assert!(!table.name().is_empty(), "table name must be non-empty");
        debug_assert!(
            !table.name().as_bytes().contains(&0),
            "table name must not contain NUL"
        );
        debug_assert!(
            table.primary_keys().iter().any(|&pk| pk),
            "table needs at least one primary-key column"
        );
        debug_assert!(u32::try_from(table.column_count()).is_ok());

        let mut record = Vec::with_capacity(table.column_count() + table.name().len() + 4);
        record.push(TABLE_MARKER);
        record.extend(encode_varint(table.column_count() as u32));
        record.extend(table.primary_keys().iter().map(|&pk| u8::from(pk)));
        record.extend(table.name().as_bytes());
        record.push(0x00);
        self.out.write_all(&record)?;

        trace!(table = table.name(), columns = table.column_count(), "table record written");
        self.current_table = Some(table.clone());
        Ok(())
    }

    /// Emit one row record against the current table.
    ///
    /// The entry's populated value arrays must match the current table's
    /// column count (asserted in debug builds): INSERT writes `new_values`,
    /// DELETE writes `old_values`, UPDATE writes both in old-then-new
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the record cannot be written.
    pub fn write_entry(&mut self, entry: &ChangesetEntry<'_>) -> Result<(), Error> {
        debug_assert!(
            self.current_table.is_some(),
            "begin_table must precede write_entry"
        );
        if let Some(table) = &self.current_table {
            let columns = table.column_count();
            match entry.op {
                OperationType::Insert => debug_assert_eq!(entry.new_values.len(), columns),
                OperationType::Delete => debug_assert_eq!(entry.old_values.len(), columns),
                OperationType::Update => {
                    debug_assert_eq!(entry.old_values.len(), columns);
                    debug_assert_eq!(entry.new_values.len(), columns);
                }
            }
        }

        let mut record = Vec::new();
        record.push(entry.op as u8);
        record.push(INDIRECT_FLAG);
        match entry.op {
            OperationType::Insert => encode_row_values(&mut record, &entry.new_values),
            OperationType::Delete => encode_row_values(&mut record, &entry.old_values),
            OperationType::Update => {
                encode_row_values(&mut record, &entry.old_values);
                encode_row_values(&mut record, &entry.new_values);
            }
        }
        self.out.write_all(&record)?;
        Ok(())
    }

    /// Flush buffered output to disk.
    ///
    /// Dropping the writer also flushes, but silently; call this to observe
    /// a write failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the flush fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.out.flush()?;
        Ok(())
    }
}

fn encode_row_values(out: &mut Vec<u8>, values: &[Value]) {
    for value in values {
        encode_value(out, value);
    }
}
