//! Reader for binary changeset files.
//!
//! The stream is a concatenation of table records and row records,
//! self-delimited:
//!
//! ```text
//! Table record:
//! ├── Marker 'T' (0x54)
//! ├── Column count (varint)
//! ├── Primary-key flags (1 byte per column, nonzero = primary key)
//! └── Table name (NUL-terminated UTF-8)
//!
//! Row record:
//! ├── Operation code: INSERT=0x12, DELETE=0x09, UPDATE=0x17
//! ├── Indirect flag (1 byte, read and ignored)
//! └── One row-value payload (INSERT: new, DELETE: old),
//!     or two (UPDATE: old, then new)
//! ```
//!
//! A table record replaces the current-table context; every row record is
//! interpreted against the most recent table. The whole file is loaded at
//! open and records are decoded on demand as
//! [`next_entry`](ChangesetReader::next_entry) is called.

use std::path::Path;

use tracing::{debug, trace};

use crate::changeset::{ChangesetEntry, ChangesetTable, OperationType};
use crate::encoding::constants::TABLE_MARKER;
use crate::encoding::varint::{VarintError, decode_varint};
use crate::encoding::{Value, decode_value};
use crate::errors::{Error, ParseError};

/// Byte cursor over the in-memory changeset buffer.
#[derive(Debug)]
struct Cursor {
    data: Vec<u8>,
    offset: usize,
}

impl Cursor {
    fn new(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    fn read_byte(&mut self) -> Result<u8, ParseError> {
        let byte = *self
            .data
            .get(self.offset)
            .ok_or(ParseError::UnexpectedEof(self.offset))?;
        self.offset += 1;
        Ok(byte)
    }

    fn read_varint(&mut self) -> Result<u32, ParseError> {
        let start = self.offset;
        let (value, len) = decode_varint(self.remaining()).map_err(|err| match err {
            VarintError::Truncated => ParseError::UnexpectedEof(self.data.len()),
            VarintError::TooLong => ParseError::OversizedVarint(start),
        })?;
        self.offset += len;
        Ok(value)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&[u8], ParseError> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or(ParseError::UnexpectedEof(self.data.len()))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    /// Consume up to and including the next NUL byte; returns the bytes
    /// before it.
    fn read_until_nul(&mut self) -> Result<&[u8], ParseError> {
        let start = self.offset;
        let len = self
            .remaining()
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(ParseError::UnterminatedTableName(start))?;
        let bytes = &self.data[start..start + len];
        self.offset = start + len + 1;
        Ok(bytes)
    }

    fn read_value(&mut self) -> Result<Value, ParseError> {
        let (value, len) = decode_value(self.remaining(), self.offset)?;
        self.offset += len;
        Ok(value)
    }

    fn read_row_values(&mut self, count: usize) -> Result<Vec<Value>, ParseError> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_value()?);
        }
        Ok(values)
    }
}

/// Row record decoded from the stream, before the table borrow is attached.
struct RowRecord {
    op: OperationType,
    old_values: Vec<Value>,
    new_values: Vec<Value>,
    /// Offset of the operation byte.
    offset: usize,
}

/// Reader of binary changeset files.
///
/// Use [`open`](Self::open) (or [`from_bytes`](Self::from_bytes)) once,
/// then call [`next_entry`](Self::next_entry) until it returns `Ok(None)`.
///
/// The sequence is one-shot: there is no rewind, and after a parse error
/// the reader stays failed. Re-reading a file takes a fresh reader.
#[derive(Debug)]
pub struct ChangesetReader {
    cursor: Cursor,
    /// Most recently announced table; row records are decoded against it.
    current_table: Option<ChangesetTable>,
    /// First parse error, replayed by every later call.
    fault: Option<ParseError>,
}

impl ChangesetReader {
    /// Open a changeset file and load it fully into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "opened changeset for reading");
        Ok(Self::from_bytes(data))
    }

    /// Create a reader over an in-memory changeset.
    #[must_use]
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: Cursor::new(data.into()),
            current_table: None,
            fault: None,
        }
    }

    /// Decode the next change entry.
    ///
    /// Returns `Ok(None)` at a clean end of stream. The returned entry
    /// borrows the reader's current-table slot, so it must be dropped
    /// before the next call; clone the table metadata to retain it longer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on malformed input, carrying the byte
    /// offset. The reader is poisoned afterwards: every further call
    /// reports the same error.
    pub fn next_entry(&mut self) -> Result<Option<ChangesetEntry<'_>>, Error> {
        if let Some(err) = &self.fault {
            return Err(err.clone().into());
        }

        let row = match self.next_row() {
            Ok(row) => row,
            Err(err) => {
                self.fault = Some(err.clone());
                return Err(err.into());
            }
        };
        let Some(row) = row else {
            trace!("end of changeset stream");
            return Ok(None);
        };

        // next_row only yields a row once a table record has been seen
        let table = self
            .current_table
            .as_ref()
            .ok_or(ParseError::RowBeforeTable(row.offset))?;
        Ok(Some(ChangesetEntry {
            op: row.op,
            old_values: row.old_values,
            new_values: row.new_values,
            table,
        }))
    }

    /// Advance past any table records to the next row record and decode it.
    ///
    /// Returns `Ok(None)` when the buffer is exhausted at a record
    /// boundary.
    fn next_row(&mut self) -> Result<Option<RowRecord>, ParseError> {
        loop {
            if self.cursor.is_at_end() {
                return Ok(None);
            }

            let offset = self.cursor.offset;
            let marker = self.cursor.read_byte()?;
            if marker == TABLE_MARKER {
                self.read_table_record()?;
                continue;
            }

            let Some(op) = OperationType::from_wire(marker) else {
                return Err(ParseError::InvalidOpCode(marker, offset));
            };
            let Some(table) = self.current_table.as_ref() else {
                return Err(ParseError::RowBeforeTable(offset));
            };
            let column_count = table.column_count();

            // Indirect flag: read and ignored
            self.cursor.read_byte()?;

            let (old_values, new_values) = match op {
                OperationType::Insert => (Vec::new(), self.cursor.read_row_values(column_count)?),
                OperationType::Delete => (self.cursor.read_row_values(column_count)?, Vec::new()),
                OperationType::Update => {
                    let old_values = self.cursor.read_row_values(column_count)?;
                    let new_values = self.cursor.read_row_values(column_count)?;
                    (old_values, new_values)
                }
            };

            return Ok(Some(RowRecord {
                op,
                old_values,
                new_values,
                offset,
            }));
        }
    }

    /// Decode a table record (marker byte already consumed) and make it the
    /// current table.
    fn read_table_record(&mut self) -> Result<(), ParseError> {
        let column_count = self.cursor.read_varint()? as usize;
        let flags = self.cursor.read_bytes(column_count)?;
        let primary_keys: Vec<bool> = flags.iter().map(|&byte| byte != 0).collect();

        let name_offset = self.cursor.offset;
        let name_bytes = self.cursor.read_until_nul()?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| ParseError::InvalidTableName(name_offset))?
            .to_owned();

        trace!(table = %name, columns = column_count, "table record");
        self.current_table = Some(ChangesetTable::new(name, primary_keys));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Table record for a two-column table "t" with the first column as
    /// primary key.
    fn table_record() -> Vec<u8> {
        vec![0x54, 0x02, 0x01, 0x00, b't', 0x00]
    }

    fn int_value(v: i64) -> Vec<u8> {
        let mut bytes = vec![0x01];
        bytes.extend(v.to_be_bytes());
        bytes
    }

    fn parse_err(reader: &mut ChangesetReader) -> ParseError {
        match reader.next_entry() {
            Err(Error::Parse(err)) => err,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_stream_is_clean_end() {
        let mut reader = ChangesetReader::from_bytes(Vec::new());
        assert!(reader.next_entry().unwrap().is_none());
        // Still clean on repeated calls
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_table_record_only_is_clean_end() {
        let mut reader = ChangesetReader::from_bytes(table_record());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_parses_insert() {
        let mut data = table_record();
        data.push(0x12);
        data.push(0x00);
        data.extend(int_value(7));
        data.extend([0x03, 0x01, b'a']);

        let mut reader = ChangesetReader::from_bytes(data);
        let entry = reader.next_entry().unwrap().expect("one entry");
        assert_eq!(entry.op, OperationType::Insert);
        assert!(entry.old_values.is_empty());
        assert_eq!(entry.new_values, vec![Value::Int(7), Value::from("a")]);
        assert_eq!(entry.table.name(), "t");
        assert_eq!(entry.table.primary_keys(), &[true, false]);
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_parses_update_with_undefined_slots() {
        let mut data = table_record();
        data.push(0x17);
        data.push(0x00);
        // old: [7, "a"]
        data.extend(int_value(7));
        data.extend([0x03, 0x01, b'a']);
        // new: [undefined, "b"]
        data.push(0x00);
        data.extend([0x03, 0x01, b'b']);

        let mut reader = ChangesetReader::from_bytes(data);
        let entry = reader.next_entry().unwrap().expect("one entry");
        assert_eq!(entry.op, OperationType::Update);
        assert_eq!(entry.old_values, vec![Value::Int(7), Value::from("a")]);
        assert_eq!(entry.new_values, vec![Value::Undefined, Value::from("b")]);
    }

    #[test]
    fn test_row_before_table_record() {
        let mut reader = ChangesetReader::from_bytes(vec![0x12]);
        assert_eq!(parse_err(&mut reader), ParseError::RowBeforeTable(0));
    }

    #[test]
    fn test_unknown_record_marker() {
        let mut data = table_record();
        data.push(0x99);
        let mut reader = ChangesetReader::from_bytes(data);
        assert_eq!(parse_err(&mut reader), ParseError::InvalidOpCode(0x99, 6));
    }

    #[test]
    fn test_unknown_value_tag_offset() {
        let mut data = table_record();
        data.extend([0x12, 0x00, 0x07]);
        let mut reader = ChangesetReader::from_bytes(data);
        assert_eq!(parse_err(&mut reader), ParseError::UnknownValueTag(0x07, 8));
    }

    #[test]
    fn test_truncated_row_record() {
        let mut data = table_record();
        data.extend([0x12, 0x00]);
        data.extend([0x01, 0x00, 0x00]); // integer cut short
        let len = data.len();
        let mut reader = ChangesetReader::from_bytes(data);
        assert_eq!(parse_err(&mut reader), ParseError::UnexpectedEof(len));
    }

    #[test]
    fn test_oversized_varint_in_table_record() {
        let data = vec![0x54, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        let mut reader = ChangesetReader::from_bytes(data);
        assert_eq!(parse_err(&mut reader), ParseError::OversizedVarint(1));
    }

    #[test]
    fn test_unterminated_table_name() {
        let data = vec![0x54, 0x01, 0x01, b't'];
        let mut reader = ChangesetReader::from_bytes(data);
        assert_eq!(parse_err(&mut reader), ParseError::UnterminatedTableName(3));
    }

    #[test]
    fn test_invalid_utf8_table_name() {
        let data = vec![0x54, 0x01, 0x01, 0xff, 0x00];
        let mut reader = ChangesetReader::from_bytes(data);
        assert_eq!(parse_err(&mut reader), ParseError::InvalidTableName(3));
    }

    #[test]
    fn test_reader_is_poisoned_after_failure() {
        let mut reader = ChangesetReader::from_bytes(vec![0x12]);
        let first = parse_err(&mut reader);
        let second = parse_err(&mut reader);
        assert_eq!(first, second);
    }

    #[test]
    fn test_indirect_flag_is_ignored() {
        let mut data = table_record();
        data.push(0x12);
        data.push(0x7f); // nonzero indirect flag
        data.extend(int_value(1));
        data.push(0x05);

        let mut reader = ChangesetReader::from_bytes(data);
        let entry = reader.next_entry().unwrap().expect("one entry");
        assert_eq!(entry.new_values, vec![Value::Int(1), Value::Null]);
    }

    #[test]
    fn test_table_switch_between_rows() {
        let mut data = table_record();
        data.extend([0x12, 0x00]);
        data.extend(int_value(1));
        data.push(0x05);
        // one-column table "u", then a delete against it
        data.extend([0x54, 0x01, 0x01, b'u', 0x00]);
        data.extend([0x09, 0x00]);
        data.extend(int_value(2));

        let mut reader = ChangesetReader::from_bytes(data);

        let entry = reader.next_entry().unwrap().expect("first entry");
        assert_eq!(entry.table.name(), "t");
        assert_eq!(entry.table.column_count(), 2);

        let entry = reader.next_entry().unwrap().expect("second entry");
        assert_eq!(entry.table.name(), "u");
        assert_eq!(entry.table.column_count(), 1);
        assert_eq!(entry.op, OperationType::Delete);
        assert_eq!(entry.old_values, vec![Value::Int(2)]);

        assert!(reader.next_entry().unwrap().is_none());
    }
}
