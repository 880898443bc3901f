//! Identifier handling for table and column names.
//!
//! Values always travel as bound parameters; identifiers cannot, so every table and column
//! name that reaches SQL generation is checked against a conservative pattern first and then
//! quoted by `sea_query`.

use crate::error::{OrmError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{Expr, Iden};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// Runtime identifier for `sea_query`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ident(String);

impl Ident {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Check that `name` is a plain or `table.column` identifier
pub fn validate(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(OrmError::InvalidIdentifier(name.to_string()))
    }
}

/// Column expression for a plain or table-qualified name
pub(crate) fn column(name: &str) -> Result<Expr> {
    validate(name)?;
    Ok(match name.split_once('.') {
        Some((table, col)) => Expr::col((Ident::new(table), Ident::new(col))),
        None => Expr::col(Ident::new(name)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_qualified_names() {
        assert!(validate("users").is_ok());
        assert!(validate("_tmp1").is_ok());
        assert!(validate("users.email").is_ok());
    }

    #[test]
    fn test_rejects_anything_else() {
        for name in ["", "1abc", "users.email.x", "a b", "id;--", "\"id\"", "users."] {
            assert!(
                matches!(validate(name), Err(OrmError::InvalidIdentifier(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
