//! WHERE criteria and update data.
//!
//! Criteria are an explicit list of `(field, operator, value)` clauses. The two-argument
//! shorthand `(field, value)` is [`Criterion::eq`]. Operators can also be parsed from their
//! SQL spelling with [`Operator::from_str`](std::str::FromStr), which is handy when filters
//! come from request parameters.
//!
//! ```
//! use rowbind::{Criteria, Criterion, Data, Operator};
//!
//! let criteria = Criteria::new()
//!     .and(Criterion::eq("status", "active"))
//!     .and(Criterion::new("age", Operator::Gte, 18));
//! assert_eq!(criteria.len(), 2);
//!
//! let data = Data::new().set("status", "archived");
//! assert!(!data.is_empty());
//! ```

use crate::error::{OrmError, Result};
use crate::ident::column;
use sea_query::{Expr, ExprTrait, Value};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a single criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "<>" | "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "LIKE" => Ok(Operator::Like),
            "NOT LIKE" => Ok(Operator::NotLike),
            other => Err(OrmError::InvalidArguments(format!(
                "unsupported operator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Criterion {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    /// Build a criterion from an operator spelled as SQL, e.g. `">="`
    pub fn parse(
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        Ok(Self::new(field, operator.parse()?, value))
    }

    /// Render as a `sea_query` expression, validating the field name
    pub(crate) fn to_expr(&self) -> Result<Expr> {
        let col = column(&self.field)?;
        let value = self.value.clone();
        Ok(match self.operator {
            Operator::Eq => col.eq(value),
            Operator::Ne => col.ne(value),
            Operator::Lt => col.lt(value),
            Operator::Lte => col.lte(value),
            Operator::Gt => col.gt(value),
            Operator::Gte => col.gte(value),
            Operator::Like => col.like(like_pattern(&self.value)?),
            Operator::NotLike => col.not_like(like_pattern(&self.value)?),
        })
    }
}

fn like_pattern(value: &Value) -> Result<String> {
    match value {
        Value::String(Some(pattern)) => Ok(pattern.to_string()),
        other => Err(OrmError::InvalidArguments(format!(
            "LIKE expects a string pattern, got {other:?}"
        ))),
    }
}

/// A non-ordered conjunction of [`Criterion`] clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    clauses: Vec<Criterion>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clause
    pub fn and(mut self, criterion: Criterion) -> Self {
        self.clauses.push(criterion);
        self
    }

    pub fn push(&mut self, criterion: Criterion) {
        self.clauses.push(criterion);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.clauses.iter()
    }

    /// Fail with `InvalidArguments` when no clause was supplied
    pub fn require_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(OrmError::InvalidArguments(
                "at least one criterion is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Turn equality clauses into column/value pairs.
    ///
    /// Used when criteria double as the identifying columns of a row to insert.
    pub(crate) fn as_assignments(&self) -> Result<Data> {
        self.clauses
            .iter()
            .map(|c| match c.operator {
                Operator::Eq => Ok((c.field.clone(), c.value.clone())),
                op => Err(OrmError::InvalidArguments(format!(
                    "cannot derive an inserted value from '{} {op}'",
                    c.field
                ))),
            })
            .collect()
    }
}

impl From<Criterion> for Criteria {
    fn from(criterion: Criterion) -> Self {
        Self {
            clauses: vec![criterion],
        }
    }
}

impl From<Vec<Criterion>> for Criteria {
    fn from(clauses: Vec<Criterion>) -> Self {
        Self { clauses }
    }
}

impl FromIterator<Criterion> for Criteria {
    fn from_iter<I: IntoIterator<Item = Criterion>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Criteria {
    type Item = Criterion;
    type IntoIter = std::vec::IntoIter<Criterion>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.into_iter()
    }
}

/// Ordered field to value mapping written by inserts and updates.
///
/// Setting a field twice keeps its original position and replaces the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    entries: Vec<(String, Value)>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Fail with `InvalidArguments` when there is nothing to write
    pub fn require_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(OrmError::InvalidArguments(
                "update data must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge `other` into `self`, `other` winning on conflicts
    pub(crate) fn merged(mut self, other: &Data) -> Data {
        for (field, value) in other.iter() {
            self.insert(field, value.clone());
        }
        self
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Data::new();
        for (field, value) in iter {
            data.insert(field, value);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{ConditionalStatement, PostgresQueryBuilder, Query};

    fn render(criterion: &Criterion) -> String {
        Query::select()
            .expr(Expr::cust("1"))
            .and_where(criterion.to_expr().unwrap())
            .to_owned()
            .build(PostgresQueryBuilder)
            .0
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!(" >= ".parse::<Operator>().unwrap(), Operator::Gte);
        assert_eq!("not like".parse::<Operator>().unwrap(), Operator::NotLike);

        let err = "~~".parse::<Operator>().unwrap_err();
        assert!(matches!(err, OrmError::InvalidArguments(_)));
    }

    #[test]
    fn test_shorthand_is_equality() {
        let c = Criterion::eq("email", "a@x.com");
        assert_eq!(c.operator, Operator::Eq);
        assert_eq!(c.value, Value::from("a@x.com"));
    }

    #[test]
    fn test_criterion_renders_parameterized() {
        let sql = render(&Criterion::new("age", Operator::Gt, 18));
        assert!(sql.contains(r#""age" > $1"#), "{sql}");

        let sql = render(&Criterion::parse("name", "like", "Jo%").unwrap());
        assert!(sql.contains(r#""name" LIKE $1"#), "{sql}");
    }

    #[test]
    fn test_like_requires_string() {
        let err = Criterion::new("age", Operator::Like, 3).to_expr().unwrap_err();
        assert!(matches!(err, OrmError::InvalidArguments(_)));
    }

    #[test]
    fn test_bad_field_name_rejected() {
        let err = Criterion::eq("id; DROP TABLE users", 1).to_expr().unwrap_err();
        assert!(matches!(err, OrmError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_empty_criteria_is_invalid() {
        assert!(matches!(
            Criteria::new().require_non_empty(),
            Err(OrmError::InvalidArguments(_))
        ));
        assert!(Criteria::from(Criterion::eq("id", 1)).require_non_empty().is_ok());
    }

    #[test]
    fn test_data_keeps_first_position_on_overwrite() {
        let data = Data::new().set("name", "a").set("email", "b").set("name", "c");
        let fields: Vec<&str> = data.fields().collect();
        assert_eq!(fields, vec!["name", "email"]);
        assert_eq!(data.get("name"), Some(&Value::from("c")));
    }

    #[test]
    fn test_empty_data_is_invalid() {
        assert!(matches!(
            Data::new().require_non_empty(),
            Err(OrmError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_assignments_only_from_equality() {
        let ok = Criteria::new().and(Criterion::eq("email", "a@x.com"));
        assert_eq!(ok.as_assignments().unwrap().len(), 1);

        let bad = Criteria::new().and(Criterion::new("age", Operator::Gt, 1));
        assert!(bad.as_assignments().is_err());
    }
}
