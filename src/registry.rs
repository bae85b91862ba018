//! Named resource registry.
//!
//! Resources are registered under a name and looked up later to build
//! providers. Lookups run concurrently; registration and removal are
//! exclusive.

use crate::db::{DbResource, Resource};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, ConnectionInfo};
use crate::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Registry of resources by name. Clones share the same entries.
#[derive(Debug)]
pub struct ResourceRegistry<R = DbResource> {
    resources: Arc<RwLock<HashMap<String, R>>>,
}

impl<R> Clone for ResourceRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            resources: Arc::clone(&self.resources),
        }
    }
}

impl<R> Default for ResourceRegistry<R> {
    fn default() -> Self {
        Self {
            resources: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<R: Resource> ResourceRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource` under `name`.
    ///
    /// Fails with [`DbError::NameConflict`] if the name is taken; the
    /// existing entry is left untouched.
    pub async fn register(&self, name: impl Into<String>, resource: R) -> DbResult<()> {
        let name = name.into();
        let mut resources = self.resources.write().await;
        if resources.contains_key(&name) {
            return Err(DbError::name_conflict(name));
        }
        resources.insert(name.clone(), resource);
        info!(name = %name, "Resource registered");
        Ok(())
    }

    /// Remove the resource registered under `name` and return it.
    ///
    /// The resource is not closed; providers still holding it keep working.
    pub async fn unregister(&self, name: &str) -> DbResult<R> {
        let removed = self.resources.write().await.remove(name);
        match removed {
            Some(resource) => {
                info!(name = %name, "Resource unregistered");
                Ok(resource)
            }
            None => Err(DbError::name_not_found(name)),
        }
    }

    /// Get a handle to the resource registered under `name`.
    pub async fn lookup(&self, name: &str) -> DbResult<R> {
        let resources = self.resources.read().await;
        resources
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::name_not_found(name))
    }

    /// Build a fresh provider over the resource registered under `name`.
    pub async fn provider(&self, name: &str) -> DbResult<Provider<R>> {
        let resource = self.lookup(name).await?;
        let provider = Provider::new(resource);
        debug!(name = %name, provider_id = %provider.id(), "Provider created from registry");
        Ok(provider)
    }

    /// Registered names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.resources.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    /// Unregister and close every resource.
    pub async fn close_all(&self) {
        let drained: Vec<(String, R)> = self.resources.write().await.drain().collect();
        // Close outside the lock; closing waits for connections to come back
        futures_util::future::join_all(drained.iter().map(|(name, resource)| async move {
            info!(name = %name, "Closing resource");
            resource.close().await;
        }))
        .await;
        info!(count = drained.len(), "All resources closed");
    }
}

impl ResourceRegistry<DbResource> {
    /// Connect a pool for `config` and register it under `config.id`.
    ///
    /// The name is checked before connecting and again before inserting; if a
    /// concurrent registration took the name in between, the new pool is
    /// closed and [`DbError::NameConflict`] returned.
    pub async fn register_database(&self, config: &ConnectionConfig) -> DbResult<ConnectionInfo> {
        let name = config.id.clone();

        if self.contains(&name).await {
            return Err(DbError::name_conflict(name));
        }

        info!(name = %name, db_type = %config.db_type, "Connecting to database");
        let resource = DbResource::connect(config).await?;
        let server_version = resource.server_version().await;

        // Re-check after async work to prevent TOCTOU race
        let loser = {
            let mut resources = self.resources.write().await;
            if resources.contains_key(&name) {
                Some(resource)
            } else {
                resources.insert(name.clone(), resource);
                None
            }
        };

        if let Some(resource) = loser {
            resource.close().await;
            return Err(DbError::name_conflict(name));
        }

        info!(name = %name, server_version = ?server_version, "Database registered");
        Ok(ConnectionInfo {
            name,
            database_type: config.db_type,
            server_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockResource;

    #[tokio::test]
    async fn test_register_twice_is_a_conflict() {
        let registry = ResourceRegistry::new();
        let first = MockResource::new();
        registry.register("db", first.clone()).await.unwrap();

        let err = registry
            .register("db", MockResource::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NameConflict { ref name } if name == "db"));
        assert_eq!(registry.len().await, 1);

        // The original entry survives
        let mut provider = registry.provider("db").await.unwrap();
        provider.enter_transaction().await.unwrap();
        assert_eq!(first.journal(), vec!["BEGIN".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_and_unregister_missing() {
        let registry: ResourceRegistry<MockResource> = ResourceRegistry::new();
        assert!(matches!(
            registry.lookup("missing").await,
            Err(DbError::NameNotFound { .. })
        ));
        assert!(matches!(
            registry.unregister("missing").await,
            Err(DbError::NameNotFound { .. })
        ));
        assert!(matches!(
            registry.provider("missing").await,
            Err(DbError::NameNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unregister_returns_resource() {
        let registry = ResourceRegistry::new();
        let resource = MockResource::new();
        registry.register("a", resource.clone()).await.unwrap();
        registry.register("b", MockResource::new()).await.unwrap();
        assert_eq!(registry.names().await, vec!["a", "b"]);

        let removed = registry.unregister("a").await.unwrap();
        assert!(!registry.contains("a").await);
        assert!(!removed.is_closed());

        // The name can be reused
        registry.register("a", resource).await.unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_providers_from_registry_are_independent() {
        let registry = ResourceRegistry::new();
        registry.register("db", MockResource::new()).await.unwrap();

        let mut a = registry.provider("db").await.unwrap();
        let b = registry.provider("db").await.unwrap();
        a.enter_transaction().await.unwrap();
        assert!(a.in_transaction());
        assert!(!b.in_transaction());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_concurrent_lookups() {
        let registry = ResourceRegistry::new();
        registry.register("db", MockResource::new()).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.lookup("db").await.is_ok() })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = ResourceRegistry::new();
        let a = MockResource::new();
        let b = MockResource::new();
        registry.register("a", a.clone()).await.unwrap();
        registry.register("b", b.clone()).await.unwrap();

        registry.close_all().await;
        assert!(registry.is_empty().await);
        assert!(a.is_closed() && b.is_closed());
    }
}
