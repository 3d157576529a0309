//! Datasource storage.
//!
//! # Responsibilities
//! - Hold the authoritative datasource records
//! - Allocate ids for datasources created at runtime
//! - Keep at most one default datasource per org
//! - Apply configured datasources all at once or not at all

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::config::DataSourceConfig;
use crate::datasource::types::{AddDataSourceCommand, DataSource, DataSourceError, DataSourceResult};

/// Storage port for datasource records.
#[async_trait]
pub trait DataSourceStore: Send + Sync {
    /// Get a datasource by id regardless of org.
    async fn get_by_id(&self, id: i64) -> DataSourceResult<DataSource>;

    /// Get a datasource by id within a specific org.
    async fn get_in_org(&self, org_id: i64, id: i64) -> DataSourceResult<DataSource>;

    /// Create a datasource, assigning a fresh id.
    async fn add(&self, cmd: AddDataSourceCommand) -> DataSourceResult<DataSource>;

    /// Insert or replace a datasource keeping its id.
    async fn upsert(&self, ds: DataSource) -> DataSourceResult<()>;

    /// All datasources of an org, ordered by id.
    async fn list_in_org(&self, org_id: i64) -> Vec<DataSource>;
}

/// Datasource store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryDataSourceStore {
    records: DashMap<i64, DataSource>,
    last_id: AtomicI64,
    /// Ids written by `provision`; only these may be replaced by config.
    provisioned: DashSet<i64>,
    /// Serializes writers so name and default checks see a stable view.
    write_lock: Mutex<()>,
}

impl InMemoryDataSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Upsert every configured datasource.
    ///
    /// Every entry is checked before any is written; on conflict the store
    /// is left untouched.
    pub fn provision(&self, configs: &[DataSourceConfig]) -> DataSourceResult<()> {
        let _guard = self.write_lock.lock().expect("datasource store mutex poisoned");

        let incoming: Vec<DataSource> = configs.iter().cloned().map(DataSource::from).collect();
        self.check_provisioning(&incoming)?;

        for ds in incoming {
            self.provisioned.insert(ds.id);
            self.write_record(ds);
        }
        tracing::info!(count = configs.len(), "Datasources provisioned");
        Ok(())
    }

    fn check_provisioning(&self, incoming: &[DataSource]) -> DataSourceResult<()> {
        let mut names: HashSet<(i64, &str)> = HashSet::new();
        let incoming_ids: HashMap<i64, &DataSource> = incoming.iter().map(|ds| (ds.id, ds)).collect();

        for ds in incoming {
            if let Some(existing) = self.records.get(&ds.id) {
                if existing.org_id != ds.org_id || !self.provisioned.contains(&ds.id) {
                    return Err(DataSourceError::IdConflict(ds.id));
                }
            }

            if !names.insert((ds.org_id, ds.name.as_str())) {
                return Err(DataSourceError::NameExists(ds.name.clone()));
            }

            // A stored name only clashes if that record keeps it after this batch.
            let name_taken = self.records.iter().any(|r| {
                r.org_id == ds.org_id
                    && r.name == ds.name
                    && r.id != ds.id
                    && !incoming_ids.contains_key(&r.id)
            });
            if name_taken {
                return Err(DataSourceError::NameExists(ds.name.clone()));
            }
        }
        Ok(())
    }

    fn upsert_record(&self, ds: DataSource) -> DataSourceResult<()> {
        let _guard = self.write_lock.lock().expect("datasource store mutex poisoned");

        if let Some(existing) = self.records.get(&ds.id) {
            if existing.org_id != ds.org_id {
                return Err(DataSourceError::IdConflict(ds.id));
            }
        }

        let name_taken = self
            .records
            .iter()
            .any(|r| r.org_id == ds.org_id && r.name == ds.name && r.id != ds.id);
        if name_taken {
            return Err(DataSourceError::NameExists(ds.name));
        }

        self.write_record(ds);
        Ok(())
    }

    /// Caller holds `write_lock`.
    fn write_record(&self, ds: DataSource) {
        self.last_id.fetch_max(ds.id, Ordering::SeqCst);
        if ds.is_default {
            self.clear_default(ds.org_id, ds.id);
        }
        self.records.insert(ds.id, ds);
    }

    fn clear_default(&self, org_id: i64, except: i64) {
        for mut entry in self.records.iter_mut() {
            let ds = entry.value_mut();
            if ds.org_id == org_id && ds.id != except && ds.is_default {
                ds.is_default = false;
            }
        }
    }
}

#[async_trait]
impl DataSourceStore for InMemoryDataSourceStore {
    async fn get_by_id(&self, id: i64) -> DataSourceResult<DataSource> {
        self.records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(DataSourceError::NotFound)
    }

    async fn get_in_org(&self, org_id: i64, id: i64) -> DataSourceResult<DataSource> {
        match self.records.get(&id) {
            Some(r) if r.org_id == org_id => Ok(r.value().clone()),
            _ => Err(DataSourceError::NotFound),
        }
    }

    async fn add(&self, cmd: AddDataSourceCommand) -> DataSourceResult<DataSource> {
        let _guard = self.write_lock.lock().expect("datasource store mutex poisoned");

        let name_taken = self
            .records
            .iter()
            .any(|r| r.org_id == cmd.org_id && r.name == cmd.name);
        if name_taken {
            return Err(DataSourceError::NameExists(cmd.name));
        }

        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let ds = DataSource {
            id,
            org_id: cmd.org_id,
            name: cmd.name,
            ds_type: cmd.ds_type,
            access: cmd.access,
            url: cmd.url,
            basic_auth_user: None,
            basic_auth_password: None,
            is_default: cmd.is_default,
            read_only: cmd.read_only,
            permissions: Vec::new(),
        };

        if ds.is_default {
            self.clear_default(ds.org_id, id);
        }
        self.records.insert(id, ds.clone());

        tracing::info!(datasource_id = id, org_id = ds.org_id, name = %ds.name, "Datasource added");
        Ok(ds)
    }

    async fn upsert(&self, ds: DataSource) -> DataSourceResult<()> {
        self.upsert_record(ds)
    }

    async fn list_in_org(&self, org_id: i64) -> Vec<DataSource> {
        let mut list: Vec<DataSource> = self
            .records
            .iter()
            .filter(|r| r.org_id == org_id)
            .map(|r| r.value().clone())
            .collect();
        list.sort_by_key(|ds| ds.id);
        list
    }
}
