//! Scripted in-memory [`Connection`] for tests.
//!
//! `MockConnection` never parses SQL. Each `fetch`/`execute` pops the next queued
//! [`MockResult`] and every statement is captured with its bound values, so tests assert on
//! the SQL the query layer produced and feed back whatever rows the scenario needs.
//!
//! ```
//! use rowbind::mock::MockConnection;
//! use rowbind::{Connection, FieldInfo};
//! use sea_query::Values;
//!
//! let conn = MockConnection::new()
//!     .with_table("users", vec![FieldInfo::new("id", "bigint", false)])
//!     .with_count(3);
//!
//! let sql = "SELECT COUNT(*) AS \"aggregate\" FROM \"users\"";
//! let rows = conn.fetch(sql, &Values(vec![])).unwrap();
//! assert_eq!(rows[0]["aggregate"], 3);
//! assert_eq!(conn.statements().len(), 1);
//! ```

use crate::connection::{Connection, FieldInfo};
use crate::error::{OrmError, Result};
use crate::model::Row;
use sea_query::{Value, Values};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Outcome handed back for the next statement
#[derive(Debug, Clone)]
pub enum MockResult {
    Rows(Vec<Row>),
    Affected(u64),
    Error(String),
}

/// A statement the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MockConnection {
    prefix: String,
    tables: HashMap<String, Vec<FieldInfo>>,
    results: Mutex<VecDeque<MockResult>>,
    statements: Mutex<Vec<CapturedStatement>>,
    field_lookups: AtomicUsize,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Declare the fields reported for `table` (as the connection sees it, i.e. prefixed)
    pub fn with_table(mut self, table: impl Into<String>, fields: Vec<FieldInfo>) -> Self {
        self.tables.insert(table.into(), fields);
        self
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.push(MockResult::Rows(rows));
        self
    }

    /// Queue the single-row result of a `COUNT(*)` query
    pub fn with_count(self, count: u64) -> Self {
        self.push_count(count);
        self
    }

    pub fn with_affected(self, affected: u64) -> Self {
        self.push(MockResult::Affected(affected));
        self
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(MockResult::Error(message.into()));
        self
    }

    pub fn push(&self, result: MockResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    pub fn push_count(&self, count: u64) {
        let mut row = Row::new();
        row.insert("aggregate".to_string(), count.into());
        self.push(MockResult::Rows(vec![row]));
    }

    /// Every statement received so far, oldest first
    pub fn statements(&self) -> Vec<CapturedStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_statement(&self) -> Option<CapturedStatement> {
        self.statements().pop()
    }

    /// How many times `table_fields` was called
    pub fn field_lookups(&self) -> usize {
        self.field_lookups.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn capture(&self, sql: &str, values: &Values) -> Option<MockResult> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedStatement {
                sql: sql.to_string(),
                values: values.iter().cloned().collect(),
            });
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Connection for MockConnection {
    fn table_prefix(&self) -> &str {
        &self.prefix
    }

    fn table_fields(&self, table: &str) -> Result<Vec<FieldInfo>> {
        self.field_lookups.fetch_add(1, Ordering::SeqCst);
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| OrmError::QueryError(format!("relation \"{table}\" does not exist")))
    }

    fn fetch(&self, sql: &str, values: &Values) -> Result<Vec<Row>> {
        match self.capture(sql, values) {
            Some(MockResult::Rows(rows)) => Ok(rows),
            Some(MockResult::Affected(_)) => Err(OrmError::QueryError(
                "MockConnection: expected rows, an affected count was queued".to_string(),
            )),
            Some(MockResult::Error(message)) => Err(OrmError::QueryError(message)),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64> {
        match self.capture(sql, values) {
            Some(MockResult::Affected(n)) => Ok(n),
            Some(MockResult::Rows(rows)) => Ok(rows.len() as u64),
            Some(MockResult::Error(message)) => Err(OrmError::QueryError(message)),
            None => Ok(0),
        }
    }
}
