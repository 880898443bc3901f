//! Named connections and model connection resolution.

use crate::config::DatabaseConfig;
use crate::connection::ConnectionRef;
use crate::driver::PostgresConnection;
use crate::error::{OrmError, Result};
use crate::model::{Model, DEFAULT_CONNECTION};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

static GLOBAL_REGISTRY: Lazy<ConnectionRegistry> = Lazy::new(ConnectionRegistry::new);

/// Registry of named connections
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionRef>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by builders that are not given one explicitly
    pub fn global() -> &'static ConnectionRegistry {
        &GLOBAL_REGISTRY
    }

    /// Connect every configured connection with the PostgreSQL driver.
    ///
    /// The connection named by `default_connection` is also registered under
    /// [`DEFAULT_CONNECTION`], so models that keep the default resolve to it.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let registry = Self::new();
        for (name, cfg) in &config.connections {
            let conn = PostgresConnection::connect(&cfg.url, cfg.prefix.clone())?;
            registry.register(name.clone(), Arc::new(conn));
        }
        if config.default_connection != DEFAULT_CONNECTION {
            if let Ok(conn) = registry.get_connection(&config.default_connection) {
                registry.register(DEFAULT_CONNECTION, conn);
            }
        }
        Ok(registry)
    }

    /// Register (or replace) a connection under `name`
    pub fn register(&self, name: impl Into<String>, connection: ConnectionRef) {
        let name = name.into();
        log::debug!("registering connection '{name}'");
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, connection);
    }

    pub fn remove(&self, name: &str) -> Option<ConnectionRef> {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Look up a connection, failing with `ConnectionNotFound` when unregistered
    pub fn get_connection(&self, name: &str) -> Result<ConnectionRef> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::ConnectionNotFound(name.to_string()))
    }
}

/// Resolve the connection a model should use.
///
/// An explicit `override_name` wins over [`Model::connection`]. Returns the resolved name
/// together with the handle.
pub fn resolve<M: Model>(
    model: &M,
    override_name: Option<&str>,
    registry: &ConnectionRegistry,
) -> Result<(String, ConnectionRef)> {
    let name = override_name.unwrap_or_else(|| model.connection()).to_string();
    let connection = registry.get_connection(&name)?;
    Ok((name, connection))
}
