//! Database drivers implementing [`Connection`](crate::Connection).

mod decode;
mod params;
pub mod postgres;

pub use postgres::{validate_connection_string, PostgresConnection};
