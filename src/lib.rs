#![doc = include_str!("../README.md")]
#![deny(clippy::mod_module_files)]

pub mod changeset;
pub(crate) mod encoding;
pub mod errors;
pub mod reader;
pub mod writer;

// Re-export main types
pub use changeset::{ChangesetEntry, ChangesetTable, OperationType};
pub use encoding::{Value, ValueType};
pub use errors::{Error, ParseError};
pub use reader::ChangesetReader;
pub use writer::ChangesetWriter;
