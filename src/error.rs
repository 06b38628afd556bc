//! Error types for the prefixdb library

use std::fmt;

/// Result type alias for prefixdb operations
pub type Result<T> = std::result::Result<T, PrefixDbError>;

/// Numeric status code: success
pub const ERROR_OK: i32 = 0;
/// Numeric status code: invalid parameter
pub const ERROR_PARAM: i32 = 1;
/// Numeric status code: allocation failure
pub const ERROR_MEMORY: i32 = 2;
/// Numeric status code: file access failure
pub const ERROR_ACCESS: i32 = 3;
/// Numeric status code: no covering prefix (a normal lookup outcome)
pub const ERROR_NOTFOUND: i32 = 4;

/// Main error type for prefixdb operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixDbError {
    /// Bad arguments, malformed prefix text, or a rejected footer
    InvalidParameter(String),

    /// An output or copy buffer could not be allocated
    OutOfMemory(String),

    /// File open/read/write/map failure
    Access(String),

    /// Record pointers inconsistent with an otherwise valid footer
    Corrupt(String),

    /// The handle was already released
    Released,
}

impl PrefixDbError {
    /// Status code compatible with the C interface
    pub fn code(&self) -> i32 {
        match self {
            PrefixDbError::InvalidParameter(_) => ERROR_PARAM,
            PrefixDbError::OutOfMemory(_) => ERROR_MEMORY,
            PrefixDbError::Access(_) => ERROR_ACCESS,
            PrefixDbError::Corrupt(_) | PrefixDbError::Released => ERROR_PARAM,
        }
    }
}

impl fmt::Display for PrefixDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixDbError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            PrefixDbError::OutOfMemory(msg) => write!(f, "Out of memory: {}", msg),
            PrefixDbError::Access(msg) => write!(f, "Access error: {}", msg),
            PrefixDbError::Corrupt(msg) => write!(f, "Corrupt database: {}", msg),
            PrefixDbError::Released => write!(f, "Database handle already released"),
        }
    }
}

impl std::error::Error for PrefixDbError {}

impl From<std::io::Error> for PrefixDbError {
    fn from(err: std::io::Error) -> Self {
        PrefixDbError::Access(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for PrefixDbError {
    fn from(err: std::collections::TryReserveError) -> Self {
        PrefixDbError::OutOfMemory(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_c_interface() {
        assert_eq!(PrefixDbError::InvalidParameter(String::new()).code(), 1);
        assert_eq!(PrefixDbError::OutOfMemory(String::new()).code(), 2);
        assert_eq!(PrefixDbError::Access(String::new()).code(), 3);
        assert_eq!(PrefixDbError::Released.code(), ERROR_PARAM);
    }

    #[test]
    fn test_io_error_is_access() {
        let err: PrefixDbError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, PrefixDbError::Access(_)));
    }
}
