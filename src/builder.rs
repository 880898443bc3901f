//! The per-model query facade.
//!
//! A [`Builder`] is created for one model, resolves the model's connection and table fields
//! once, and then exposes model-aware lookups (`find`, `find_by`, `count_by`, ...) that
//! hydrate rows through [`Model::new_from_builder`]. Anything else the generic [`Query`]
//! can do is reached through [`Builder::call`] with a [`QueryCall`].
//!
//! Two kinds of operations exist:
//!
//! - `find`, `find_many`, `count_by`, `count_all` and `is_unique` each start from a fresh
//!   base query, so nothing chained earlier leaks into them.
//! - `find_by`, `find_all`, `first`, `update_by`, `delete_by` and the passthrough calls work
//!   on the builder's primary query and see whatever was chained on it.
//!
//! # Example
//!
//! ```no_run
//! use rowbind::{hydrate, Builder, Criterion, Data, Model, Result, Row};
//! use sea_query::Order;
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
//!
//! # fn main() -> Result<()> {
//! let model = User::default();
//! let mut users = Builder::new(&model)?;
//!
//! let ada = users.find(1, None)?;
//! let taken = !users.is_unique("email", "ada@example.com", None)?;
//!
//! users.order_by("id", Order::Desc)?.limit(10)?;
//! let latest = users.find_all(Criterion::eq("active", true))?;
//!
//! users.update_by(Criterion::eq("id", 1), &Data::new().set("email", "ada@new.org"))?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionRef;
use crate::criteria::{Criteria, Criterion, Data, Operator};
use crate::dispatch::{Passthrough, QueryCall};
use crate::error::Result;
use crate::model::{Model, Row};
use crate::query::Query;
use crate::registry::{self, ConnectionRegistry};
use crate::schema_cache::{self, SchemaCache};
use sea_query::{Order, Value};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Query facade bound to one model
pub struct Builder<'m, M: Model> {
    model: &'m M,
    connection: String,
    db: ConnectionRef,
    table: String,
    primary_key: String,
    fields: Vec<String>,
    query: Query,
}

impl<'m, M: Model> Builder<'m, M> {
    /// Builder on the model's own connection, using the global registry and schema cache
    pub fn new(model: &'m M) -> Result<Self> {
        Self::with_context(model, None, ConnectionRegistry::global(), SchemaCache::global())
    }

    /// Builder on an explicitly named connection instead of the model's
    pub fn with_connection(model: &'m M, connection: &str) -> Result<Self> {
        Self::with_context(
            model,
            Some(connection),
            ConnectionRegistry::global(),
            SchemaCache::global(),
        )
    }

    /// Builder with an injected registry and schema cache.
    ///
    /// Fails with `ConnectionNotFound` when the resolved connection is not registered.
    pub fn with_context(
        model: &'m M,
        connection: Option<&str>,
        registry: &ConnectionRegistry,
        cache: &SchemaCache,
    ) -> Result<Self> {
        let (connection, db) = registry::resolve(model, connection, registry)?;
        let mut query = Query::new(db.clone());
        query.table(model.table())?.key_name(model.key_name())?;

        let mut builder = Self {
            model,
            connection,
            db,
            table: model.table().to_string(),
            primary_key: model.key_name().to_string(),
            fields: Vec::new(),
            query,
        };
        builder.fields = builder.resolve_fields(cache)?;
        Ok(builder)
    }

    fn resolve_fields(&self, cache: &SchemaCache) -> Result<Vec<String>> {
        let declared = self.model.table_fields();
        if !declared.is_empty() {
            return Ok(declared);
        }

        let token = schema_cache::token(&self.connection, &self.table);
        if let Some(fields) = cache.get_cache(&token) {
            log::trace!("schema cache hit for {token}");
            #[cfg(feature = "metrics")]
            METRICS.record_cache_hit();
            return Ok(fields);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::table_fields_span(&self.table).entered();

        let prefixed = self.query.add_table_prefix(&self.table, false);
        let fields: Vec<String> = self
            .db
            .table_fields(&prefixed)?
            .into_iter()
            .map(|field| field.name)
            .collect();
        log::debug!(
            "discovered {} fields for {prefixed} on connection '{}'",
            fields.len(),
            self.connection
        );
        #[cfg(feature = "metrics")]
        METRICS.record_cache_miss();
        cache.set_cache(token, fields.clone());
        Ok(fields)
    }

    /// Fresh, unconditioned query on this model's table
    pub fn new_base_query(&self) -> Result<Query> {
        let mut query = Query::new(self.db.clone());
        query.table(&self.table)?.key_name(&self.primary_key)?;
        Ok(query)
    }

    pub fn model(&self) -> &M {
        self.model
    }

    /// Unprefixed table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Prefixed table name, aliased back to the bare name when a prefix applies
    pub fn prefixed_table(&self) -> String {
        self.query.add_table_prefix(&self.table, true)
    }

    pub fn key_name(&self) -> &str {
        &self.primary_key
    }

    /// Declared or discovered field names
    pub fn table_fields(&self) -> &[String] {
        &self.fields
    }

    pub fn connection_name(&self) -> &str {
        &self.connection
    }

    pub fn link(&self) -> &ConnectionRef {
        &self.db
    }

    /// The primary query that chained calls accumulate on
    pub fn base_query(&self) -> &Query {
        &self.query
    }

    pub fn base_query_mut(&mut self) -> &mut Query {
        &mut self.query
    }

    fn hydrate(&self, row: Row) -> Result<M> {
        self.model.new_from_builder(row)
    }

    fn hydrate_all(&self, rows: Vec<Row>) -> Result<Vec<M>> {
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    /// Look up one row by primary key, or by `field` when given
    pub fn find(&self, id: impl Into<Value>, field: Option<&str>) -> Result<Option<M>> {
        let field = field.unwrap_or(self.primary_key.as_str());
        let mut query = self.new_base_query()?;
        query.filter(Criterion::eq(field, id))?;
        query.first()?.map(|row| self.hydrate(row)).transpose()
    }

    /// First row matching `criteria` on the primary query
    pub fn find_by(&mut self, criteria: impl Into<Criteria>) -> Result<Option<M>> {
        let criteria = criteria.into();
        criteria.require_non_empty()?;
        self.query.filter(criteria)?;
        self.query.first()?.map(|row| self.hydrate(row)).transpose()
    }

    /// Rows whose primary key is in `values`; an empty list matches nothing
    pub fn find_many<V: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Vec<M>> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let rows = self
            .new_base_query()?
            .find_many(&self.primary_key, values)?;
        self.hydrate_all(rows)
    }

    /// Every row of the primary query, narrowed by `criteria` when it is non-empty
    pub fn find_all(&mut self, criteria: impl Into<Criteria>) -> Result<Vec<M>> {
        let criteria = criteria.into();
        if !criteria.is_empty() {
            self.query.filter(criteria)?;
        }
        let rows = self.query.get()?;
        self.hydrate_all(rows)
    }

    /// First row of whatever the primary query has accumulated
    pub fn first(&self) -> Result<Option<M>> {
        self.query.first()?.map(|row| self.hydrate(row)).transpose()
    }

    /// Update the rows matching `criteria` with `data`
    pub fn update_by(&mut self, criteria: impl Into<Criteria>, data: &Data) -> Result<u64> {
        let criteria = criteria.into();
        criteria.require_non_empty()?;
        data.require_non_empty()?;
        self.query.filter(criteria)?;
        self.query.update(data)
    }

    pub fn delete_by(&mut self, criteria: impl Into<Criteria>) -> Result<u64> {
        let criteria = criteria.into();
        criteria.require_non_empty()?;
        self.query.filter(criteria)?;
        self.query.delete()
    }

    pub fn count_by(&self, criteria: impl Into<Criteria>) -> Result<u64> {
        let criteria = criteria.into();
        criteria.require_non_empty()?;
        let mut query = self.new_base_query()?;
        query.filter(criteria)?;
        query.count()
    }

    pub fn count_all(&self) -> Result<u64> {
        self.new_base_query()?.count()
    }

    /// True when no row has `field = value`, not counting the row whose primary key is `ignore`
    pub fn is_unique(
        &self,
        field: &str,
        value: impl Into<Value>,
        ignore: Option<Value>,
    ) -> Result<bool> {
        let mut criteria = Criteria::from(Criterion::eq(field, value));
        if let Some(ignore) = ignore {
            criteria.push(Criterion::new(&self.primary_key, Operator::Ne, ignore));
        }
        let mut query = self.new_base_query()?;
        query.filter(criteria)?;
        Ok(query.count()? == 0)
    }

    /// Forward a query-builder call to the primary query.
    ///
    /// Terminal calls hand back their outcome, every other call hands back the builder.
    pub fn call(&mut self, call: QueryCall) -> Result<Passthrough<'_, Self>> {
        match call.apply(&mut self.query)? {
            Some(output) => Ok(Passthrough::Result(output)),
            None => Ok(Passthrough::Chain(self)),
        }
    }

    pub fn filter(&mut self, criteria: impl Into<Criteria>) -> Result<&mut Self> {
        self.call(QueryCall::Where(criteria.into()))?.chain()
    }

    pub fn or_filter(&mut self, criteria: impl Into<Criteria>) -> Result<&mut Self> {
        self.call(QueryCall::OrWhere(criteria.into()))?.chain()
    }

    pub fn order_by(&mut self, field: &str, order: Order) -> Result<&mut Self> {
        self.call(QueryCall::OrderBy(field.to_string(), order))?.chain()
    }

    pub fn limit(&mut self, limit: u64) -> Result<&mut Self> {
        self.call(QueryCall::Limit(limit))?.chain()
    }

    pub fn offset(&mut self, offset: u64) -> Result<&mut Self> {
        self.call(QueryCall::Offset(offset))?.chain()
    }

    pub fn select(&mut self, columns: &[&str]) -> Result<&mut Self> {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.call(QueryCall::Select(columns))?.chain()
    }
}
