//! Passthrough calls from the model facade to its underlying [`Query`].
//!
//! Instead of redeclaring every query-builder method on [`Builder`](crate::Builder), callers
//! hand it a [`QueryCall`]. Calls named in [`TERMINAL_CALLS`] run the statement and hand the
//! raw outcome back; every other call mutates the builder's query and returns the builder so
//! the chain can continue.

use crate::criteria::{Criteria, Data};
use crate::error::{OrmError, Result};
use crate::model::Row;
use crate::query::Query;
use sea_query::{Order, Value, Values};

/// Names of the calls whose result is returned instead of the facade
pub const TERMINAL_CALLS: [&str; 9] = [
    "insert",
    "insertIgnore",
    "replace",
    "update",
    "updateOrInsert",
    "delete",
    "count",
    "query",
    "addTablePrefix",
];

/// A forwarded query-builder method together with its arguments
#[derive(Debug, Clone)]
pub enum QueryCall {
    Where(Criteria),
    OrWhere(Criteria),
    WhereIn(String, Vec<Value>),
    WhereNotIn(String, Vec<Value>),
    WhereNull(String),
    WhereNotNull(String),
    Select(Vec<String>),
    OrderBy(String, Order),
    GroupBy(Vec<String>),
    Limit(u64),
    Offset(u64),
    Insert(Data),
    InsertIgnore(Data),
    Replace(Data),
    Update(Data),
    UpdateOrInsert(Criteria, Data),
    Delete,
    Count,
    Query(String, Values),
    AddTablePrefix(String, bool),
}

impl QueryCall {
    /// Query-builder method name this call forwards to
    pub fn name(&self) -> &'static str {
        match self {
            QueryCall::Where(_) => "where",
            QueryCall::OrWhere(_) => "orWhere",
            QueryCall::WhereIn(..) => "whereIn",
            QueryCall::WhereNotIn(..) => "whereNotIn",
            QueryCall::WhereNull(_) => "whereNull",
            QueryCall::WhereNotNull(_) => "whereNotNull",
            QueryCall::Select(_) => "select",
            QueryCall::OrderBy(..) => "orderBy",
            QueryCall::GroupBy(_) => "groupBy",
            QueryCall::Limit(_) => "limit",
            QueryCall::Offset(_) => "offset",
            QueryCall::Insert(_) => "insert",
            QueryCall::InsertIgnore(_) => "insertIgnore",
            QueryCall::Replace(_) => "replace",
            QueryCall::Update(_) => "update",
            QueryCall::UpdateOrInsert(..) => "updateOrInsert",
            QueryCall::Delete => "delete",
            QueryCall::Count => "count",
            QueryCall::Query(..) => "query",
            QueryCall::AddTablePrefix(..) => "addTablePrefix",
        }
    }

    pub fn is_terminal(&self) -> bool {
        TERMINAL_CALLS.contains(&self.name())
    }

    /// Forward to `query`.
    ///
    /// Returns `None` for chainable calls and the raw outcome for terminal ones.
    pub fn apply(self, query: &mut Query) -> Result<Option<QueryOutput>> {
        log::trace!("forwarding {}", self.name());
        match self {
            QueryCall::Where(criteria) => {
                query.filter(criteria)?;
            }
            QueryCall::OrWhere(criteria) => {
                query.or_filter(criteria)?;
            }
            QueryCall::WhereIn(field, values) => {
                query.where_in(&field, values)?;
            }
            QueryCall::WhereNotIn(field, values) => {
                query.where_not_in(&field, values)?;
            }
            QueryCall::WhereNull(field) => {
                query.where_null(&field)?;
            }
            QueryCall::WhereNotNull(field) => {
                query.where_not_null(&field)?;
            }
            QueryCall::Select(columns) => {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                query.select(&columns)?;
            }
            QueryCall::OrderBy(field, order) => {
                query.order_by(&field, order)?;
            }
            QueryCall::GroupBy(fields) => {
                for field in &fields {
                    query.group_by(field)?;
                }
            }
            QueryCall::Limit(n) => {
                query.limit(n);
            }
            QueryCall::Offset(n) => {
                query.offset(n);
            }
            QueryCall::Insert(data) => {
                return Ok(Some(QueryOutput::Affected(query.insert(&data)?)))
            }
            QueryCall::InsertIgnore(data) => {
                return Ok(Some(QueryOutput::Affected(query.insert_ignore(&data)?)))
            }
            QueryCall::Replace(data) => {
                return Ok(Some(QueryOutput::Affected(query.replace(&data)?)))
            }
            QueryCall::Update(data) => {
                return Ok(Some(QueryOutput::Affected(query.update(&data)?)))
            }
            QueryCall::UpdateOrInsert(criteria, data) => {
                return Ok(Some(QueryOutput::Affected(
                    query.update_or_insert(&criteria, &data)?,
                )))
            }
            QueryCall::Delete => {
                return Ok(Some(QueryOutput::Affected(query.delete()?)))
            }
            QueryCall::Count => {
                return Ok(Some(QueryOutput::Count(query.count()?)))
            }
            QueryCall::Query(sql, values) => {
                return Ok(Some(QueryOutput::Rows(query.raw(&sql, &values)?)))
            }
            QueryCall::AddTablePrefix(name, apply_alias) => {
                return Ok(Some(QueryOutput::Table(
                    query.add_table_prefix(&name, apply_alias),
                )))
            }
        }
        Ok(None)
    }
}

/// Raw outcome of a terminal call
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Affected(u64),
    Count(u64),
    Rows(Vec<Row>),
    Table(String),
}

impl QueryOutput {
    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryOutput::Affected(n) => Some(*n),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            QueryOutput::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn rows(self) -> Option<Vec<Row>> {
        match self {
            QueryOutput::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            QueryOutput::Table(name) => Some(name),
            _ => None,
        }
    }
}

/// What a forwarded call hands back: the facade, or a terminal outcome
pub enum Passthrough<'b, B> {
    Chain(&'b mut B),
    Result(QueryOutput),
}

impl<'b, B> Passthrough<'b, B> {
    /// Continue the chain, failing if the call was terminal
    pub fn chain(self) -> Result<&'b mut B> {
        match self {
            Passthrough::Chain(builder) => Ok(builder),
            Passthrough::Result(output) => Err(OrmError::InvalidArguments(format!(
                "terminal call produced {output:?}, nothing to chain on"
            ))),
        }
    }

    pub fn into_output(self) -> Option<QueryOutput> {
        match self {
            Passthrough::Chain(_) => None,
            Passthrough::Result(output) => Some(output),
        }
    }
}
