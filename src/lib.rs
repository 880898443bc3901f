//! # Rowbind
//!
//! Model-bound query facade for PostgreSQL.
//!
//! A [`Model`] names its table, primary key and connection. A [`Builder`] created from it
//! resolves the connection through the [`ConnectionRegistry`], discovers the table's fields
//! once per process through the [`SchemaCache`], and offers lookups and mutations that build
//! parameterized SQL with `sea_query` and hydrate the resulting rows back into models.
//!
//! "Not found" is `Ok(None)` or an empty `Vec`; missing criteria or update data is
//! [`OrmError::InvalidArguments`]; everything the driver reports is propagated unchanged.

pub mod builder;
pub mod config;
pub mod connection;
pub mod criteria;
pub mod dispatch;
pub mod driver;
pub mod error;
mod ident;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod query;
pub mod registry;
pub mod schema_cache;

pub use builder::Builder;
pub use config::{ConnectionConfig, DatabaseConfig};
pub use connection::{Connection, ConnectionRef, FieldInfo};
pub use criteria::{Criteria, Criterion, Data, Operator};
pub use dispatch::{Passthrough, QueryCall, QueryOutput, TERMINAL_CALLS};
pub use driver::PostgresConnection;
pub use error::{OrmError, Result};
pub use ident::validate as validate_identifier;
pub use model::{hydrate, Model, Row};
pub use query::Query;
pub use registry::ConnectionRegistry;
pub use schema_cache::SchemaCache;
