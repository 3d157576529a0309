//! Datasource resolution cache.
//!
//! # Responsibilities
//! - Resolve a datasource id for a signed-in caller
//! - Reuse recent lookups for a short TTL
//! - Honor per-request cache bypass
//! - Enforce org scoping and datasource permissions

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::datasource::store::DataSourceStore;
use crate::datasource::types::{DataSource, DataSourceError, DataSourceResult};
use crate::identity::SignedInUser;
use crate::observability::metrics;

/// Resolves a datasource id into a backend target for a caller.
#[async_trait]
pub trait DataSourceResolver: Send + Sync {
    /// Fails with `AccessDenied` when the caller may not query the
    /// datasource, `NotFound` when it does not exist in the caller's org.
    async fn get_datasource(
        &self,
        id: i64,
        user: &SignedInUser,
        skip_cache: bool,
    ) -> DataSourceResult<Arc<DataSource>>;
}

#[derive(Debug, Clone)]
struct CachedDataSource {
    datasource: Arc<DataSource>,
    fetched_at: Instant,
}

/// TTL cache in front of a `DataSourceStore`.
pub struct DataSourceCache {
    store: Arc<dyn DataSourceStore>,
    entries: DashMap<i64, CachedDataSource>,
    ttl: Duration,
}

impl DataSourceCache {
    pub fn new(store: Arc<dyn DataSourceStore>, ttl: Duration) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop the cached entry for one datasource.
    pub fn invalidate(&self, id: i64) {
        self.entries.remove(&id);
    }

    fn cached(&self, id: i64) -> Option<Arc<DataSource>> {
        let entry = self.entries.get(&id)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.datasource.clone())
        } else {
            None
        }
    }

    async fn fetch(&self, id: i64) -> DataSourceResult<Arc<DataSource>> {
        let datasource = Arc::new(self.store.get_by_id(id).await?);
        self.entries.insert(
            id,
            CachedDataSource {
                datasource: datasource.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(datasource)
    }
}

#[async_trait]
impl DataSourceResolver for DataSourceCache {
    async fn get_datasource(
        &self,
        id: i64,
        user: &SignedInUser,
        skip_cache: bool,
    ) -> DataSourceResult<Arc<DataSource>> {
        let datasource = if skip_cache {
            metrics::record_cache_lookup("bypass");
            self.fetch(id).await?
        } else if let Some(ds) = self.cached(id) {
            metrics::record_cache_lookup("hit");
            ds
        } else {
            metrics::record_cache_lookup("miss");
            self.fetch(id).await?
        };

        if datasource.org_id != user.org_id {
            return Err(DataSourceError::NotFound);
        }

        if !datasource.allows(user) {
            tracing::debug!(
                datasource_id = id,
                user_id = user.user_id,
                role = %user.org_role,
                "Datasource permission check failed"
            );
            return Err(DataSourceError::AccessDenied);
        }

        Ok(datasource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::store::InMemoryDataSourceStore;
    use crate::datasource::types::test_support::{datasource, user};
    use crate::datasource::types::DataSourcePermission;
    use crate::identity::OrgRole;

    async fn setup(ttl: Duration) -> (Arc<InMemoryDataSourceStore>, DataSourceCache) {
        let store = Arc::new(InMemoryDataSourceStore::new());
        store.upsert(datasource(7, "prometheus")).await.unwrap();
        let cache = DataSourceCache::new(store.clone(), ttl);
        (store, cache)
    }

    #[tokio::test]
    async fn test_resolves_for_org_member() {
        let (_, cache) = setup(Duration::from_secs(5)).await;
        let ds = cache.get_datasource(7, &user(2, 1, OrgRole::Viewer), false).await.unwrap();
        assert_eq!(ds.id, 7);
    }

    #[tokio::test]
    async fn test_other_org_is_not_found() {
        let (_, cache) = setup(Duration::from_secs(5)).await;
        let err = cache.get_datasource(7, &user(2, 9, OrgRole::Admin), false).await.unwrap_err();
        assert_eq!(err, DataSourceError::NotFound);
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let (_, cache) = setup(Duration::from_secs(5)).await;
        let err = cache.get_datasource(99, &user(2, 1, OrgRole::Admin), false).await.unwrap_err();
        assert_eq!(err, DataSourceError::NotFound);
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let (store, cache) = setup(Duration::from_secs(5)).await;
        let mut restricted = datasource(42, "prometheus");
        restricted.permissions = vec![DataSourcePermission::User { user_id: 3 }];
        store.upsert(restricted).await.unwrap();

        let err = cache.get_datasource(42, &user(2, 1, OrgRole::Editor), false).await.unwrap_err();
        assert_eq!(err, DataSourceError::AccessDenied);
        assert!(cache.get_datasource(42, &user(3, 1, OrgRole::Viewer), false).await.is_ok());
    }

    #[tokio::test]
    async fn test_cached_until_bypassed() {
        let (store, cache) = setup(Duration::from_secs(60)).await;
        let caller = user(2, 1, OrgRole::Viewer);
        cache.get_datasource(7, &caller, false).await.unwrap();

        let mut changed = datasource(7, "prometheus");
        changed.url = "http://10.0.0.1:9090".to_string();
        store.upsert(changed).await.unwrap();

        let stale = cache.get_datasource(7, &caller, false).await.unwrap();
        assert_eq!(stale.url, "http://127.0.0.1:9090");

        let fresh = cache.get_datasource(7, &caller, true).await.unwrap();
        assert_eq!(fresh.url, "http://10.0.0.1:9090");

        // Bypass refreshes the entry for later callers.
        let cached = cache.get_datasource(7, &caller, false).await.unwrap();
        assert_eq!(cached.url, "http://10.0.0.1:9090");
    }

    #[tokio::test]
    async fn test_expired_entry_refetched() {
        let (store, cache) = setup(Duration::ZERO).await;
        let caller = user(2, 1, OrgRole::Viewer);
        cache.get_datasource(7, &caller, false).await.unwrap();

        let mut changed = datasource(7, "prometheus");
        changed.name = "renamed".to_string();
        store.upsert(changed).await.unwrap();

        let ds = cache.get_datasource(7, &caller, false).await.unwrap();
        assert_eq!(ds.name, "renamed");
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (store, cache) = setup(Duration::from_secs(60)).await;
        let caller = user(2, 1, OrgRole::Viewer);
        cache.get_datasource(7, &caller, false).await.unwrap();

        let mut changed = datasource(7, "prometheus");
        changed.name = "renamed".to_string();
        store.upsert(changed).await.unwrap();
        cache.invalidate(7);

        assert_eq!(cache.get_datasource(7, &caller, false).await.unwrap().name, "renamed");
    }
}
