//! Model descriptors.
//!
//! A [`Model`] tells the query facade where its rows live (table, primary key, connection)
//! and how to turn a raw row into an instance. The facade only ever borrows the model,
//! it never mutates it.
//!
//! # Example
//!
//! ```no_run
//! use rowbind::{hydrate, Model, Result, Row};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct User {
//!     id: i64,
//!     email: String,
//! }
//!
//! impl Model for User {
//!     fn table(&self) -> &str {
//!         "users"
//!     }
//!
//!     fn new_from_builder(&self, row: Row) -> Result<Self> {
//!         hydrate(row)
//!     }
//! }
//! ```

use crate::error::{OrmError, Result};
use serde::de::DeserializeOwned;

/// A result row in "assoc" shape: field name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Connection name used when a model does not pick one
pub const DEFAULT_CONNECTION: &str = "default";

/// Primary key name used when a model does not pick one
pub const DEFAULT_KEY_NAME: &str = "id";

/// Descriptor binding a Rust type to a relational table
pub trait Model: Sized {
    /// Unprefixed table name
    fn table(&self) -> &str;

    /// Primary key field name
    fn key_name(&self) -> &str {
        DEFAULT_KEY_NAME
    }

    /// Name of the registered connection this model reads from
    fn connection(&self) -> &str {
        DEFAULT_CONNECTION
    }

    /// Explicit field list.
    ///
    /// When non-empty it is authoritative: the builder uses it as-is and never consults the
    /// schema cache or the connection.
    fn table_fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Build a new instance from a raw row
    fn new_from_builder(&self, row: Row) -> Result<Self>;
}

/// Deserialize a row into any `serde` type.
///
/// Convenience for [`Model::new_from_builder`] implementations whose fields line up with the
/// table columns.
pub fn hydrate<T: DeserializeOwned>(row: Row) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| OrmError::ParseError(format!("Failed to hydrate row: {e}")))
}
