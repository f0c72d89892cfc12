//! Stored value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use rusqlite::Error as SqlError;

/// Parse an epoch-millis timestamp stored as a decimal string
pub fn parse_epoch_millis(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok().filter(|ms| *ms >= 0)
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
