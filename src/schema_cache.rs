//! Process-wide cache of discovered table field lists.
//!
//! Entries are keyed by a schema token (`"{connection}_{table}"`) and are written once,
//! the first time a [`Builder`](crate::Builder) needs the fields of a table that its model
//! does not declare. Nothing is evicted: the key space is bounded by the distinct
//! connection/table pairs an application touches, and table schemas are treated as
//! static for the lifetime of the cache.
//!
//! Two builders racing to populate the same token both write the same list, so the
//! last write simply wins.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

static GLOBAL_CACHE: Lazy<SchemaCache> = Lazy::new(SchemaCache::new);

/// Build the cache token for a connection/table pair
pub fn token(connection: &str, table: &str) -> String {
    format!("{connection}_{table}")
}

/// Shared mapping from schema token to ordered field names
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl SchemaCache {
    /// Create an empty, isolated cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every builder that is not given one explicitly
    pub fn global() -> &'static SchemaCache {
        &GLOBAL_CACHE
    }

    pub fn has_cached(&self, token: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(token)
    }

    pub fn get_cache(&self, token: &str) -> Option<Vec<String>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    pub fn set_cache(&self, token: impl Into<String>, fields: Vec<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), fields);
    }

    /// Number of cached tokens
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    ///
    /// Builders never call this; it exists for tooling that knows a schema changed
    /// underneath a long-running process.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_token_combines_connection_and_table() {
        assert_eq!(token("default", "users"), "default_users");
        assert_ne!(token("a", "b_c"), token("a_b", "d"));
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = SchemaCache::new();
        let key = token("default", "users");

        assert!(!cache.has_cached(&key));
        assert_eq!(cache.get_cache(&key), None);

        cache.set_cache(key.clone(), vec!["id".to_string(), "email".to_string()]);

        assert!(cache.has_cached(&key));
        assert_eq!(
            cache.get_cache(&key),
            Some(vec!["id".to_string(), "email".to_string()])
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_repopulating_is_idempotent() {
        let cache = SchemaCache::new();
        let fields = vec!["id".to_string(), "name".to_string()];

        cache.set_cache("default_posts", fields.clone());
        cache.set_cache("default_posts", fields.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_cache("default_posts"), Some(fields));
    }

    #[test]
    fn test_isolated_caches_do_not_share_entries() {
        let first = SchemaCache::new();
        let second = SchemaCache::new();

        first.set_cache("default_users", vec!["id".to_string()]);

        assert!(first.has_cached("default_users"));
        assert!(!second.has_cached("default_users"));
    }

    #[test]
    fn test_concurrent_population_of_same_token() {
        let cache = Arc::new(SchemaCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.set_cache("default_users", vec!["id".to_string(), "email".to_string()]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get_cache("default_users"),
            Some(vec!["id".to_string(), "email".to_string()])
        );
    }

    #[test]
    fn test_clear() {
        let cache = SchemaCache::new();
        cache.set_cache("default_users", vec!["id".to_string()]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
