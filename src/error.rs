//! Error type shared by the query facade, the generic query builder and the drivers.
//!
//! "Not found" is never an error here: lookups return `Ok(None)` or an empty `Vec`.
//! [`OrmError::InvalidArguments`] is reserved for caller misuse, everything else is a
//! failure reported by the connection layer and is propagated as-is.

use may_postgres::Error as PostgresError;
use std::fmt;

/// Error type for every fallible operation in this crate
#[derive(Debug)]
pub enum OrmError {
    /// Required criteria or update data were missing or malformed
    InvalidArguments(String),
    /// No connection is registered under the requested name
    ConnectionNotFound(String),
    /// A table or column name failed identifier validation
    InvalidIdentifier(String),
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query construction or execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::InvalidArguments(s) => {
                write!(f, "Invalid parameters: {s}")
            }
            OrmError::ConnectionNotFound(name) => {
                write!(f, "Connection not found: {name}")
            }
            OrmError::InvalidIdentifier(s) => {
                write!(f, "Invalid identifier: {s}")
            }
            OrmError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            OrmError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            OrmError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
        }
    }
}

impl std::error::Error for OrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrmError::PostgresError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for OrmError {
    fn from(err: PostgresError) -> Self {
        OrmError::PostgresError(err)
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::ParseError(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, OrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orm_error_display() {
        let err = OrmError::InvalidArguments("criteria must not be empty".to_string());
        assert!(err.to_string().contains("Invalid parameters"));
        assert!(err.to_string().contains("criteria must not be empty"));
    }

    #[test]
    fn test_orm_error_all_variants() {
        // PostgresError needs a live connection to construct, the rest can be checked here
        let err = OrmError::ConnectionNotFound("reporting".to_string());
        assert_eq!(err.to_string(), "Connection not found: reporting");

        let err = OrmError::InvalidIdentifier("users; drop".to_string());
        assert!(err.to_string().contains("Invalid identifier"));

        let err = OrmError::QueryError("test".to_string());
        assert!(err.to_string().contains("Query error"));

        let err = OrmError::ParseError("test".to_string());
        assert!(err.to_string().contains("Parse error"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: OrmError = json_err.into();
        assert!(matches!(err, OrmError::ParseError(_)));
    }
}
