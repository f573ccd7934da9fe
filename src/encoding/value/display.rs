//! Display implementation for Value as SQL-style literals.

use super::Value;

impl core::fmt::Display for Value {
    /// Format a value as a SQL-style literal.
    ///
    /// Text is rendered lossily when it is not valid UTF-8; the undefined
    /// tag, which has no SQL spelling, renders as `undefined`.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(bytes) => {
                // Escape single quotes by doubling them
                write!(f, "'")?;
                for c in String::from_utf8_lossy(bytes).chars() {
                    if c == '\'' {
                        write!(f, "''")?;
                    } else {
                        core::fmt::Write::write_char(f, c)?;
                    }
                }
                write!(f, "'")
            }
            Value::Blob(bytes) => {
                write!(f, "X'")?;
                for byte in bytes {
                    write!(f, "{byte:02X}")?;
                }
                write!(f, "'")
            }
        }
    }
}
