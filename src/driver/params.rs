//! `sea_query` values to `may_postgres` parameters.
//!
//! Every value is copied into an owned box so the parameter slice handed to the client
//! borrows from one vector instead of a family of typed side tables.

use crate::error::{OrmError, Result};
use may_postgres::types::ToSql;
use sea_query::{Value, Values};

/// Owned parameter list; borrow it with [`as_params`]
pub(crate) type OwnedParams = Vec<Box<dyn ToSql>>;

pub(crate) fn to_params(values: &Values) -> Result<OwnedParams> {
    values.iter().map(to_param).collect()
}

pub(crate) fn as_params(owned: &OwnedParams) -> Vec<&dyn ToSql> {
    owned.iter().map(|p| &**p).collect()
}

fn to_param(value: &Value) -> Result<Box<dyn ToSql>> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i16::from)),
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i16::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(v) => {
            let converted = v
                .map(|u| {
                    i64::try_from(u).map_err(|_| {
                        OrmError::QueryError(format!(
                            "BigUnsigned value {u} exceeds i64::MAX and cannot be bound"
                        ))
                    })
                })
                .transpose()?;
            Box::new(converted)
        }
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::String(v) => Box::new(v.as_ref().map(|s| s.to_string())),
        Value::Char(v) => Box::new(v.map(|c| c.to_string())),
        Value::Bytes(v) => Box::new(v.as_ref().map(|b| b.to_vec())),
        Value::Json(v) => Box::new(v.as_ref().map(|j| serde_json::Value::clone(j))),
        Value::Uuid(v) => Box::new(v.as_ref().map(|u| uuid::Uuid::clone(u))),
        Value::Decimal(v) => Box::new(v.as_ref().map(|d| rust_decimal::Decimal::clone(d))),
        Value::ChronoDate(v) => Box::new(v.as_ref().map(|d| chrono::NaiveDate::clone(d))),
        Value::ChronoTime(v) => Box::new(v.as_ref().map(|t| chrono::NaiveTime::clone(t))),
        Value::ChronoDateTime(v) => {
            Box::new(v.as_ref().map(|dt| chrono::NaiveDateTime::clone(dt)))
        }
        Value::ChronoDateTimeUtc(v) => {
            Box::new(v.as_ref().map(|dt| chrono::DateTime::<chrono::Utc>::clone(dt)))
        }
        other => {
            return Err(OrmError::QueryError(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}
