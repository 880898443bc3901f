//! The connection seam.
//!
//! A [`Connection`] is everything the query layer needs from a database driver: run a
//! parameterized statement, return rows in assoc shape, and describe a table's fields.
//! Query building stays on this side of the seam in [`Query`](crate::Query), so drivers
//! never see criteria or models, only SQL with `$n` placeholders and the bound values.

use crate::error::Result;
use crate::model::Row;
use sea_query::Values;
use std::sync::Arc;

/// Column metadata reported by [`Connection::table_fields`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

/// Trait implemented by database drivers
///
/// Implementations must be shareable across threads: they are stored in the process-wide
/// [`ConnectionRegistry`](crate::ConnectionRegistry).
pub trait Connection: Send + Sync {
    /// Prefix prepended to every table name this connection serves
    fn table_prefix(&self) -> &str {
        ""
    }

    /// Fields of `table`, in declaration order.
    ///
    /// `table` is already prefixed. Only called when a builder misses the schema cache.
    fn table_fields(&self, table: &str) -> Result<Vec<FieldInfo>>;

    /// Run a query and return its rows
    fn fetch(&self, sql: &str, values: &Values) -> Result<Vec<Row>>;

    /// Run a statement and return the number of rows affected
    fn execute(&self, sql: &str, values: &Values) -> Result<u64>;
}

/// Shared handle to a registered connection
pub type ConnectionRef = Arc<dyn Connection>;
