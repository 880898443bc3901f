//! `may_postgres` rows to assoc rows.
//!
//! Column values are decoded by their PostgreSQL type into `serde_json::Value`. Types with
//! no natural JSON form (timestamps, UUID, NUMERIC) are rendered as strings; BYTEA becomes
//! lowercase hex.

use crate::error::{OrmError, Result};
use crate::model::Row;
use may_postgres::types::{FromSql, Type};
use serde_json::Value as Json;

pub(crate) fn decode_row(row: &may_postgres::Row) -> Result<Row> {
    let mut out = Row::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, col.type_()).map_err(|e| {
            OrmError::ParseError(format!("Failed to decode column '{}': {e}", col.name()))
        })?;
        out.insert(col.name().to_string(), value);
    }
    Ok(out)
}

fn get<'a, T>(
    row: &'a may_postgres::Row,
    idx: usize,
) -> std::result::Result<Option<T>, may_postgres::Error>
where
    T: FromSql<'a>,
{
    row.try_get::<usize, Option<T>>(idx)
}

fn decode_column(
    row: &may_postgres::Row,
    idx: usize,
    ty: &Type,
) -> std::result::Result<Json, may_postgres::Error> {
    let value = if *ty == Type::BOOL {
        get::<bool>(row, idx)?.map(Json::from)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)?.map(Json::from)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)?.map(Json::from)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)?.map(Json::from)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)?.map(|f| Json::from(f64::from(f)))
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)?.map(Json::from)
    } else if *ty == Type::NUMERIC {
        get::<rust_decimal::Decimal>(row, idx)?.map(|d| Json::String(d.to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<Json>(row, idx)?
    } else if *ty == Type::UUID {
        get::<uuid::Uuid>(row, idx)?.map(|u| Json::String(u.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(|t| Json::String(t.to_rfc3339()))
    } else if *ty == Type::TIMESTAMP {
        get::<chrono::NaiveDateTime>(row, idx)?.map(|t| Json::String(t.to_string()))
    } else if *ty == Type::DATE {
        get::<chrono::NaiveDate>(row, idx)?.map(|d| Json::String(d.to_string()))
    } else if *ty == Type::TIME {
        get::<chrono::NaiveTime>(row, idx)?.map(|t| Json::String(t.to_string()))
    } else if *ty == Type::OID {
        get::<u32>(row, idx)?.map(Json::from)
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, idx)?.map(|bytes| Json::String(to_hex(&bytes)))
    } else if text_readable(ty) {
        get::<String>(row, idx)?.map(Json::String)
    } else {
        log::warn!("no decoder for column type {ty}, returning null");
        None
    };
    Ok(value.unwrap_or(Json::Null))
}

/// TEXT, VARCHAR, BPCHAR, NAME, enums and the other types `String` can read
fn text_readable(ty: &Type) -> bool {
    <String as FromSql<'_>>::accepts(ty)
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
