//! Generic, table-scoped query builder.
//!
//! `Query` accumulates WHERE / ORDER / GROUP / LIMIT state and turns it into `sea_query`
//! statements rendered for PostgreSQL. Every value is bound as a `$n` parameter and every
//! identifier is validated before it reaches SQL. Execution goes through the
//! [`Connection`](crate::Connection) the query was created from.
//!
//! Terminal methods (`first`, `get`, `count`, `update`, ...) take `&self`: they render the
//! accumulated state without consuming it.
//!
//! # Example
//!
//! ```no_run
//! use rowbind::{ConnectionRegistry, Criterion, Query};
//! use sea_query::Order;
//!
//! # fn main() -> rowbind::Result<()> {
//! let conn = ConnectionRegistry::global().get_connection("default")?;
//! let mut query = Query::new(conn);
//! query
//!     .table("users")?
//!     .filter(Criterion::eq("active", true))?
//!     .order_by("created_at", Order::Desc)?
//!     .limit(10);
//! let rows = query.get()?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionRef;
use crate::criteria::{Criteria, Criterion, Data};
use crate::error::{OrmError, Result};
use crate::ident::{column, validate, Ident};
use crate::model::{Row, DEFAULT_KEY_NAME};
use sea_query::{
    Asterisk, Condition, ConditionalStatement, Expr, ExprTrait, OnConflict, Order,
    PostgresQueryBuilder, Query as SeaQuery, SelectStatement, Value, Values,
};
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Column alias used for `COUNT(*)` results
pub const AGGREGATE_ALIAS: &str = "aggregate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    And,
    Or,
}

/// Table-scoped query builder bound to one connection
#[derive(Clone)]
pub struct Query {
    connection: ConnectionRef,
    table: Option<String>,
    key_name: String,
    columns: Vec<String>,
    wheres: Vec<(Conjunction, Condition)>,
    orders: Vec<(String, Order)>,
    groups: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table)
            .field("key_name", &self.key_name)
            .field("columns", &self.columns)
            .field("wheres", &self.wheres.len())
            .field("orders", &self.orders)
            .field("groups", &self.groups)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl Query {
    /// Fresh, unconditioned builder on `connection`
    pub fn new(connection: ConnectionRef) -> Self {
        Self {
            connection,
            table: None,
            key_name: DEFAULT_KEY_NAME.to_string(),
            columns: Vec::new(),
            wheres: Vec::new(),
            orders: Vec::new(),
            groups: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&mut self, name: &str) -> Result<&mut Self> {
        self.table = Some(validate(name)?.to_string());
        Ok(self)
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Conflict target used by [`Query::replace`]
    pub fn key_name(&mut self, name: &str) -> Result<&mut Self> {
        self.key_name = validate(name)?.to_string();
        Ok(self)
    }

    /// Prefix `name` with the connection's table prefix.
    ///
    /// With `apply_alias` and a non-empty prefix the result is aliased back to the
    /// unprefixed name (`app_users AS users`), which is how the table appears in SELECTs.
    pub fn add_table_prefix(&self, name: &str, apply_alias: bool) -> String {
        let prefix = self.connection.table_prefix();
        if prefix.is_empty() {
            return name.to_string();
        }
        if apply_alias {
            format!("{prefix}{name} AS {name}")
        } else {
            format!("{prefix}{name}")
        }
    }

    /// `users.id` on a `users` query is plain `id`.
    ///
    /// UPDATE and DELETE address the prefixed table without an alias, so conditions must not
    /// be qualified by the bare table name.
    fn unqualified<'a>(&self, field: &'a str) -> &'a str {
        match (field.split_once('.'), self.table.as_deref()) {
            (Some((table, name)), Some(own)) if table == own => name,
            _ => field,
        }
    }

    fn condition_expr(&self, mut criterion: Criterion) -> Result<Expr> {
        criterion.field = self.unqualified(&criterion.field).to_string();
        criterion.to_expr()
    }

    /// AND every criterion onto the WHERE clause
    pub fn filter(&mut self, criteria: impl Into<Criteria>) -> Result<&mut Self> {
        for criterion in criteria.into() {
            let expr = self.condition_expr(criterion)?;
            self.wheres.push((Conjunction::And, Condition::all().add(expr)));
        }
        Ok(self)
    }

    /// OR a group of criteria (ANDed together) onto the WHERE clause
    pub fn or_filter(&mut self, criteria: impl Into<Criteria>) -> Result<&mut Self> {
        let criteria = criteria.into();
        if criteria.is_empty() {
            return Ok(self);
        }
        let mut group = Condition::all();
        for criterion in criteria {
            group = group.add(self.condition_expr(criterion)?);
        }
        self.wheres.push((Conjunction::Or, group));
        Ok(self)
    }

    pub fn where_in(&mut self, field: &str, values: Vec<Value>) -> Result<&mut Self> {
        let expr = column(self.unqualified(field))?.is_in(values);
        self.wheres.push((Conjunction::And, Condition::all().add(expr)));
        Ok(self)
    }

    pub fn where_not_in(&mut self, field: &str, values: Vec<Value>) -> Result<&mut Self> {
        let expr = column(self.unqualified(field))?.is_not_in(values);
        self.wheres.push((Conjunction::And, Condition::all().add(expr)));
        Ok(self)
    }

    pub fn where_null(&mut self, field: &str) -> Result<&mut Self> {
        let expr = column(self.unqualified(field))?.is_null();
        self.wheres.push((Conjunction::And, Condition::all().add(expr)));
        Ok(self)
    }

    pub fn where_not_null(&mut self, field: &str) -> Result<&mut Self> {
        let expr = column(self.unqualified(field))?.is_not_null();
        self.wheres.push((Conjunction::And, Condition::all().add(expr)));
        Ok(self)
    }

    /// Restrict the selected columns; `*` when never called
    pub fn select(&mut self, columns: &[&str]) -> Result<&mut Self> {
        for name in columns {
            self.columns.push(validate(name)?.to_string());
        }
        Ok(self)
    }

    pub fn order_by(&mut self, field: &str, order: Order) -> Result<&mut Self> {
        self.orders.push((validate(field)?.to_string(), order));
        Ok(self)
    }

    pub fn group_by(&mut self, field: &str) -> Result<&mut Self> {
        self.groups.push(validate(field)?.to_string());
        Ok(self)
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn has_conditions(&self) -> bool {
        !self.wheres.is_empty()
    }

    /// `a AND b OR c AND d` grouped the way SQL precedence reads it
    fn condition(&self) -> Option<Condition> {
        let mut groups: Vec<Condition> = Vec::new();
        for (conjunction, cond) in &self.wheres {
            match (conjunction, groups.pop()) {
                (Conjunction::Or, Some(prev)) => {
                    groups.push(prev);
                    groups.push(Condition::all().add(cond.clone()));
                }
                (_, Some(prev)) => groups.push(prev.add(cond.clone())),
                (_, None) => groups.push(Condition::all().add(cond.clone())),
            }
        }
        match groups.len() {
            0 => None,
            1 => groups.pop(),
            _ => Some(
                groups
                    .into_iter()
                    .fold(Condition::any(), |any, group| any.add(group)),
            ),
        }
    }

    fn require_table(&self) -> Result<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| OrmError::QueryError("no table selected".to_string()))
    }

    fn from_clause(&self, stmt: &mut SelectStatement) -> Result<()> {
        let table = self.require_table()?;
        let prefix = self.connection.table_prefix();
        if prefix.is_empty() {
            stmt.from(Ident::new(table));
        } else {
            stmt.from_as(Ident::new(format!("{prefix}{table}")), Ident::new(table));
        }
        Ok(())
    }

    fn prefixed_table(&self) -> Result<Ident> {
        let table = self.require_table()?;
        Ok(Ident::new(self.add_table_prefix(table, false)))
    }

    /// SELECT for the accumulated state
    pub fn select_statement(&self) -> Result<SelectStatement> {
        let mut stmt = SeaQuery::select();
        if self.columns.is_empty() {
            stmt.column(Asterisk);
        } else {
            for name in &self.columns {
                stmt.expr(column(name)?);
            }
        }
        self.from_clause(&mut stmt)?;
        if let Some(cond) = self.condition() {
            stmt.cond_where(cond);
        }
        if !self.groups.is_empty() {
            let exprs = self
                .groups
                .iter()
                .map(|name| column(name))
                .collect::<Result<Vec<Expr>>>()?;
            stmt.add_group_by(exprs);
        }
        for (name, order) in &self.orders {
            stmt.order_by_expr(column(name)?, order.clone());
        }
        if let Some(limit) = self.limit {
            stmt.limit(limit);
        }
        if let Some(offset) = self.offset {
            stmt.offset(offset);
        }
        Ok(stmt)
    }

    /// SQL and bound values of the SELECT this query would run
    pub fn to_sql(&self) -> Result<(String, Values)> {
        Ok(self.select_statement()?.build(PostgresQueryBuilder))
    }

    /// First row of the accumulated query
    pub fn first(&self) -> Result<Option<Row>> {
        let mut stmt = self.select_statement()?;
        stmt.limit(1);
        let (sql, values) = stmt.build(PostgresQueryBuilder);
        Ok(self.run_fetch(&sql, &values)?.into_iter().next())
    }

    /// All rows of the accumulated query
    pub fn get(&self) -> Result<Vec<Row>> {
        let (sql, values) = self.to_sql()?;
        self.run_fetch(&sql, &values)
    }

    /// Rows whose `key` is one of `values`; no query is issued for an empty list
    pub fn find_many(&self, key: &str, values: Vec<Value>) -> Result<Vec<Row>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = self.clone();
        query.where_in(key, values)?;
        query.get()
    }

    /// `COUNT(*)` over the accumulated conditions; ordering and paging are ignored
    pub fn count(&self) -> Result<u64> {
        let mut stmt = SeaQuery::select();
        stmt.expr_as(Expr::cust("COUNT(*)"), Ident::new(AGGREGATE_ALIAS));
        self.from_clause(&mut stmt)?;
        if let Some(cond) = self.condition() {
            stmt.cond_where(cond);
        }
        let (sql, values) = stmt.build(PostgresQueryBuilder);
        aggregate(&self.run_fetch(&sql, &values)?)
    }

    pub fn insert(&self, data: &Data) -> Result<u64> {
        self.insert_with(data, None)
    }

    /// Insert, silently skipping rows that violate a unique constraint
    pub fn insert_ignore(&self, data: &Data) -> Result<u64> {
        self.insert_with(data, Some(OnConflict::new().do_nothing().to_owned()))
    }

    /// Insert, or overwrite the row holding the same primary key
    pub fn replace(&self, data: &Data) -> Result<u64> {
        let mut on_conflict = OnConflict::column(Ident::new(self.key_name.clone()));
        let updates: Vec<Ident> = data
            .fields()
            .filter(|field| *field != self.key_name)
            .map(Ident::new)
            .collect();
        if updates.is_empty() {
            on_conflict.do_nothing();
        } else {
            on_conflict.update_columns(updates);
        }
        self.insert_with(data, Some(on_conflict))
    }

    fn insert_with(&self, data: &Data, on_conflict: Option<OnConflict>) -> Result<u64> {
        data.require_non_empty()?;
        let mut stmt = SeaQuery::insert();
        stmt.into_table(self.prefixed_table()?);
        let mut columns = Vec::with_capacity(data.len());
        let mut row = Vec::with_capacity(data.len());
        for (field, value) in data.iter() {
            columns.push(Ident::new(validate(field)?));
            row.push(Expr::val(value.clone()));
        }
        stmt.columns(columns);
        stmt.values(row)
            .map_err(|e| OrmError::QueryError(format!("Failed to build INSERT: {e}")))?;
        if let Some(on_conflict) = on_conflict {
            stmt.on_conflict(on_conflict);
        }
        let (sql, values) = stmt.build(PostgresQueryBuilder);
        self.run_execute(&sql, &values)
    }

    /// UPDATE every row matching the accumulated conditions
    pub fn update(&self, data: &Data) -> Result<u64> {
        data.require_non_empty()?;
        let mut stmt = SeaQuery::update();
        stmt.table(self.prefixed_table()?);
        for (field, value) in data.iter() {
            stmt.value(Ident::new(validate(field)?), value.clone());
        }
        if let Some(cond) = self.condition() {
            stmt.cond_where(cond);
        }
        let (sql, values) = stmt.build(PostgresQueryBuilder);
        self.run_execute(&sql, &values)
    }

    /// Update the rows matching `criteria`, or insert `criteria + data` when none match
    pub fn update_or_insert(&self, criteria: &Criteria, data: &Data) -> Result<u64> {
        criteria.require_non_empty()?;
        let mut scoped = self.clone();
        scoped.filter(criteria.clone())?;
        if scoped.count()? > 0 {
            if data.is_empty() {
                return Ok(0);
            }
            return scoped.update(data);
        }
        let row = criteria.as_assignments()?.merged(data);
        self.insert(&row)
    }

    /// DELETE every row matching the accumulated conditions
    pub fn delete(&self) -> Result<u64> {
        let mut stmt = SeaQuery::delete();
        stmt.from_table(self.prefixed_table()?);
        if let Some(cond) = self.condition() {
            stmt.cond_where(cond);
        }
        let (sql, values) = stmt.build(PostgresQueryBuilder);
        self.run_execute(&sql, &values)
    }

    /// Run raw SQL on this query's connection
    pub fn raw(&self, sql: &str, values: &Values) -> Result<Vec<Row>> {
        self.run_fetch(sql, values)
    }

    fn run_fetch(&self, sql: &str, values: &Values) -> Result<Vec<Row>> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        log::debug!("fetch: {sql} ({} params)", values.0.len());
        let start = Instant::now();
        let result = self.connection.fetch(sql, values);
        record(start, result.is_err());
        result
    }

    fn run_execute(&self, sql: &str, values: &Values) -> Result<u64> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        log::debug!("execute: {sql} ({} params)", values.0.len());
        let start = Instant::now();
        let result = self.connection.execute(sql, values);
        record(start, result.is_err());
        result
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record(start: Instant, failed: bool) {
    let elapsed = start.elapsed();
    #[cfg(feature = "metrics")]
    {
        if failed {
            METRICS.record_query_error();
        }
        METRICS.record_query(elapsed);
    }
    log::trace!("statement finished in {elapsed:?}");
}

/// Read the `COUNT(*)` column of a one-row result; no row counts as zero
fn aggregate(rows: &[Row]) -> Result<u64> {
    let Some(row) = rows.first() else {
        return Ok(0);
    };
    let value = row
        .get(AGGREGATE_ALIAS)
        .or_else(|| row.values().next())
        .ok_or_else(|| OrmError::ParseError("COUNT result has no columns".to_string()))?;
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| OrmError::ParseError(format!("COUNT returned {n}"))),
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|_| OrmError::ParseError(format!("COUNT returned '{s}'"))),
        other => Err(OrmError::ParseError(format!("COUNT returned {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{Criterion, Operator};
    use crate::mock::MockConnection;
    use serde_json::json;
    use std::sync::Arc;

    fn query_on(conn: &Arc<MockConnection>, table: &str) -> Query {
        let mut query = Query::new(conn.clone());
        query.table(table).unwrap();
        query
    }

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test rows are objects"),
        }
    }

    #[test]
    fn test_select_without_conditions() {
        let conn = Arc::new(MockConnection::new());
        let (sql, values) = query_on(&conn, "users").to_sql().unwrap();
        assert_eq!(sql, r#"SELECT * FROM "users""#);
        assert!(values.0.is_empty());
    }

    #[test]
    fn test_filters_are_parameterized() {
        let conn = Arc::new(MockConnection::new());
        let mut query = query_on(&conn, "users");
        query
            .filter(Criterion::eq("email", "a@x.com"))
            .unwrap()
            .filter(Criterion::new("age", Operator::Gte, 18))
            .unwrap();
        let (sql, values) = query.to_sql().unwrap();
        assert!(sql.contains(r#""email" = $1"#), "{sql}");
        assert!(sql.contains(r#""age" >= $2"#), "{sql}");
        assert!(!sql.contains("a@x.com"));
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_or_filter_groups() {
        let conn = Arc::new(MockConnection::new());
        let mut query = query_on(&conn, "users");
        query
            .filter(Criterion::eq("role", "admin"))
            .unwrap()
            .or_filter(Criterion::eq("role", "owner"))
            .unwrap();
        let (sql, _) = query.to_sql().unwrap();
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn test_prefix_is_aliased_in_selects() {
        let conn = Arc::new(MockConnection::new().with_prefix("app_"));
        let query = query_on(&conn, "users");
        let (sql, _) = query.to_sql().unwrap();
        assert_eq!(sql, r#"SELECT * FROM "app_users" AS "users""#);
        assert_eq!(query.add_table_prefix("users", true), "app_users AS users");
        assert_eq!(query.add_table_prefix("users", false), "app_users");
    }

    #[test]
    fn test_no_prefix() {
        let conn = Arc::new(MockConnection::new());
        let query = query_on(&conn, "users");
        assert_eq!(query.add_table_prefix("users", true), "users");
    }

    #[test]
    fn test_order_limit_offset() {
        let conn = Arc::new(MockConnection::new());
        let mut query = query_on(&conn, "posts");
        query.order_by("created_at", Order::Desc).unwrap();
        query.limit(10).offset(20);
        let (sql, _) = query.to_sql().unwrap();
        assert!(sql.contains(r#"ORDER BY "created_at" DESC"#), "{sql}");
        assert!(sql.contains("LIMIT"), "{sql}");
        assert!(sql.contains("OFFSET"), "{sql}");
    }

    #[test]
    fn test_select_columns_and_qualified_names() {
        let conn = Arc::new(MockConnection::new());
        let mut query = query_on(&conn, "users");
        query.select(&["users.id", "email"]).unwrap();
        let (sql, _) = query.to_sql().unwrap();
        assert!(sql.starts_with(r#"SELECT "users"."id", "email" FROM"#), "{sql}");
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let conn = Arc::new(MockConnection::new());
        let mut query = Query::new(conn.clone());
        assert!(matches!(
            query.table("users; DROP TABLE x"),
            Err(OrmError::InvalidIdentifier(_))
        ));
        let mut query = query_on(&conn, "users");
        assert!(query.order_by("id DESC", Order::Asc).is_err());
    }

    #[test]
    fn test_missing_table() {
        let conn = Arc::new(MockConnection::new());
        let err = Query::new(conn).get().unwrap_err();
        assert!(err.to_string().contains("no table selected"));
    }

    #[test]
    fn test_first_limits_to_one_and_keeps_state() {
        let conn = Arc::new(MockConnection::new().with_rows(vec![row(json!({ "id": 1 }))]));
        let query = query_on(&conn, "users");

        let first = query.first().unwrap();
        assert_eq!(first.unwrap()["id"], 1);
        assert!(conn.last_statement().unwrap().sql.contains("LIMIT"));
        // limit was applied to a copy
        assert!(!query.to_sql().unwrap().0.contains("LIMIT"));
    }

    #[test]
    fn test_first_on_empty_result() {
        let conn = Arc::new(MockConnection::new());
        assert!(query_on(&conn, "users").first().unwrap().is_none());
    }

    #[test]
    fn test_find_many() {
        let conn = Arc::new(
            MockConnection::new().with_rows(vec![row(json!({ "id": 1 })), row(json!({ "id": 2 }))]),
        );
        let query = query_on(&conn, "users");
        let rows = query
            .find_many("id", vec![Value::from(1), Value::from(2)])
            .unwrap();
        assert_eq!(rows.len(), 2);
        let stmt = conn.last_statement().unwrap();
        assert!(stmt.sql.contains(r#""id" IN ($1, $2)"#), "{}", stmt.sql);
        assert!(!query.has_conditions());
    }

    #[test]
    fn test_find_many_with_no_values_skips_the_query() {
        let conn = Arc::new(MockConnection::new());
        let rows = query_on(&conn, "users").find_many("id", Vec::new()).unwrap();
        assert!(rows.is_empty());
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn test_count() {
        let conn = Arc::new(MockConnection::new().with_count(42));
        let mut query = query_on(&conn, "users");
        query.filter(Criterion::eq("active", true)).unwrap();
        query.order_by("id", Order::Asc).unwrap();
        assert_eq!(query.count().unwrap(), 42);

        let sql = conn.last_statement().unwrap().sql;
        assert!(sql.starts_with(r#"SELECT COUNT(*) AS "aggregate" FROM "users""#), "{sql}");
        assert!(sql.contains(r#""active" = $1"#));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_count_accepts_string_and_missing_rows() {
        let mut text = Row::new();
        text.insert(AGGREGATE_ALIAS.to_string(), json!("7"));
        assert_eq!(aggregate(&[text]).unwrap(), 7);
        assert_eq!(aggregate(&[]).unwrap(), 0);
    }

    #[test]
    fn test_update_carries_conditions() {
        let conn = Arc::new(MockConnection::new().with_affected(2));
        let mut query = query_on(&conn, "users");
        query.filter(Criterion::eq("id", 5)).unwrap();

        let affected = query.update(&Data::new().set("name", "Ada")).unwrap();
        assert_eq!(affected, 2);
        let stmt = conn.last_statement().unwrap();
        assert!(stmt.sql.starts_with(r#"UPDATE "users" SET "name" = $1"#), "{}", stmt.sql);
        assert!(stmt.sql.contains(r#"WHERE "id" = $2"#), "{}", stmt.sql);
        assert_eq!(stmt.values, vec![Value::from("Ada"), Value::from(5)]);
    }

    #[test]
    fn test_update_requires_data() {
        let conn = Arc::new(MockConnection::new());
        let err = query_on(&conn, "users").update(&Data::new()).unwrap_err();
        assert!(matches!(err, OrmError::InvalidArguments(_)));
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn test_delete_uses_prefixed_table() {
        let conn = Arc::new(MockConnection::new().with_prefix("app_").with_affected(1));
        let mut query = query_on(&conn, "sessions");
        query.where_null("user_id").unwrap();
        assert_eq!(query.delete().unwrap(), 1);
        let sql = conn.last_statement().unwrap().sql;
        assert_eq!(sql, r#"DELETE FROM "app_sessions" WHERE "user_id" IS NULL"#);
    }

    #[test]
    fn test_own_table_qualifier_is_dropped_on_prefixed_writes() {
        let conn = Arc::new(MockConnection::new().with_prefix("app_"));
        let mut query = query_on(&conn, "users");
        query
            .filter(Criterion::eq("users.id", 1))
            .unwrap()
            .where_not_null("users.email")
            .unwrap();

        query.update(&Data::new().set("name", "Ada")).unwrap();
        assert_eq!(
            conn.last_statement().unwrap().sql,
            r#"UPDATE "app_users" SET "name" = $1 WHERE "id" = $2 AND "email" IS NOT NULL"#
        );

        query.delete().unwrap();
        assert_eq!(
            conn.last_statement().unwrap().sql,
            r#"DELETE FROM "app_users" WHERE "id" = $1 AND "email" IS NOT NULL"#
        );

        let (sql, _) = query.to_sql().unwrap();
        assert!(
            sql.starts_with(r#"SELECT * FROM "app_users" AS "users" WHERE "id" = $1"#),
            "{sql}"
        );
    }

    #[test]
    fn test_foreign_qualifier_is_kept() {
        let conn = Arc::new(MockConnection::new());
        let mut query = query_on(&conn, "users");
        query.filter(Criterion::eq("teams.id", 3)).unwrap();
        let (sql, _) = query.to_sql().unwrap();
        assert!(sql.contains(r#""teams"."id" = $1"#), "{sql}");
    }

    #[test]
    fn test_insert_variants() {
        let conn = Arc::new(MockConnection::new());
        let query = query_on(&conn, "users");
        let data = Data::new().set("id", 1).set("email", "a@x.com");

        query.insert(&data).unwrap();
        let sql = conn.last_statement().unwrap().sql;
        assert!(sql.starts_with(r#"INSERT INTO "users" ("id", "email") VALUES ($1, $2)"#), "{sql}");

        query.insert_ignore(&data).unwrap();
        let sql = conn.last_statement().unwrap().sql;
        assert!(sql.contains("ON CONFLICT") && sql.contains("DO NOTHING"), "{sql}");

        query.replace(&data).unwrap();
        let sql = conn.last_statement().unwrap().sql;
        assert!(
            sql.contains(r#"ON CONFLICT ("id") DO UPDATE SET "email" = "excluded"."email""#),
            "{sql}"
        );
    }

    #[test]
    fn test_update_or_insert_updates_when_present() {
        let conn = Arc::new(MockConnection::new().with_count(1).with_affected(1));
        let query = query_on(&conn, "settings");
        let criteria = Criteria::from(Criterion::eq("key", "theme"));

        query
            .update_or_insert(&criteria, &Data::new().set("value", "dark"))
            .unwrap();
        let stmts = conn.statements();
        assert_eq!(stmts.len(), 2);
        assert!(stmts[1].sql.starts_with(r#"UPDATE "settings""#));
        assert!(stmts[1].sql.contains(r#""key" = $2"#));
    }

    #[test]
    fn test_update_or_insert_inserts_when_absent() {
        let conn = Arc::new(MockConnection::new().with_count(0).with_affected(1));
        let query = query_on(&conn, "settings");
        let criteria = Criteria::from(Criterion::eq("key", "theme"));

        query
            .update_or_insert(&criteria, &Data::new().set("value", "dark"))
            .unwrap();
        let insert = conn.last_statement().unwrap();
        assert!(
            insert.sql.starts_with(r#"INSERT INTO "settings" ("key", "value")"#),
            "{}",
            insert.sql
        );
        assert_eq!(insert.values, vec![Value::from("theme"), Value::from("dark")]);
    }

    #[test]
    fn test_driver_errors_propagate() {
        let conn = Arc::new(MockConnection::new().with_error("relation does not exist"));
        let err = query_on(&conn, "users").get().unwrap_err();
        assert!(matches!(err, OrmError::QueryError(ref m) if m.contains("relation")));
    }
}
