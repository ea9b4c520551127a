//! Watch registry, diff engine, and periodic re-evaluation.
//!
//! This module provides:
//! - The snapshot model and diff engine for cell/row/column/sheet watches
//! - A per-owner registry of tables with name and reference indices
//! - A scheduler running one recurring re-evaluation ticker per table
//! - SQLite persistence of the full registry for restart recovery

pub mod diff;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod types;

// Re-export commonly used types and functions
pub use diff::{diff_region, RegionDiff};
pub use registry::Registry;
pub use scheduler::Scheduler;
pub use types::*;

use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use crate::config::MonitorConfig;
use crate::database::Database;
use crate::error::{SourceError, WatchError};
use crate::source::SheetSource;

use registry::SharedTable;

/// Facade the dialogue collaborator talks to. Owns the registry, the
/// scheduler, the data source, and the persistence handle.
///
/// All six entry points mutate or read one owner's slice of the
/// registry; every successful mutation persists that owner's tables.
pub struct Monitor {
    config: MonitorConfig,
    source: Arc<dyn SheetSource>,
    db: Database,
    registry: Mutex<Registry>,
    scheduler: Scheduler,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SheetSource>,
        notifier: Arc<dyn Notifier>,
        db: Database,
    ) -> Result<Self, WatchError> {
        db.create_monitor_tables()?;
        let scheduler = Scheduler::new(config.clone(), source.clone(), notifier);
        Ok(Monitor {
            config,
            source,
            db,
            registry: Mutex::new(Registry::new()),
            scheduler,
        })
    }

    /// Load the persisted registry and restart every table's ticker.
    /// Called once at process startup, before any dialogue traffic.
    pub async fn restore(&self) -> Result<(), WatchError> {
        let owners = self.db.load_registry()?;
        let mut registry = self.registry.lock().await;
        let mut restored = 0usize;
        for (owner, tables) in owners {
            for table in tables {
                let name = table.name.clone();
                let shared = registry.insert_table(&owner, table)?;
                self.scheduler.register(&owner, &name, shared);
                restored += 1;
            }
        }
        info!("restored {} table(s) from storage", restored);
        Ok(())
    }

    /// Create an empty table. The reference must pass a reachability
    /// probe before the table is admitted; both registry indices update
    /// together and the new table's ticker starts immediately.
    pub async fn create_table(
        &self,
        owner: &str,
        name: &str,
        reference: &str,
    ) -> Result<(), WatchError> {
        // The registry lock is held across the probe so a concurrent
        // create cannot slip a duplicate in between check and insert.
        let mut registry = self.registry.lock().await;
        registry.check_available(owner, name, reference)?;
        self.probe_reachable(reference).await?;

        let shared = registry.insert_table(owner, Table::new(reference, name))?;
        self.persist_owner(&registry, owner).await?;
        self.scheduler.register(owner, name, shared);
        info!("owner {} created table '{}' -> {}", owner, name, reference);
        Ok(())
    }

    /// Delete a table, cancel its ticker, and persist the removal. A
    /// tick already in flight finishes against the removed state and
    /// delivers nothing afterwards.
    pub async fn delete_table(&self, owner: &str, key: &TableKey) -> Result<(), WatchError> {
        let mut registry = self.registry.lock().await;
        let (name, _table) = registry.remove_table(owner, key)?;
        self.scheduler.unregister(owner, &name);
        self.persist_owner(&registry, owner).await?;
        info!("owner {} deleted table '{}'", owner, name);
        Ok(())
    }

    /// Add a watch to a table. The watch is evaluated once before it is
    /// admitted, so its baseline is in place and the next tick reports
    /// only real deltas; a failing fetch aborts the whole add.
    pub async fn add_watch(
        &self,
        owner: &str,
        table_key: &TableKey,
        worksheet_index: u32,
        region: Region,
    ) -> Result<(), WatchError> {
        let shared = self.lookup(owner, table_key).await?;

        {
            let mut table = shared.lock().await;
            let key = WatchKey {
                reference: table.reference.clone(),
                worksheet_index,
                region,
            };
            // Refuse duplicates before paying for the first fetch.
            if table.has_watch(&key) {
                return Err(WatchError::DuplicateWatch);
            }
            let mut watch = Watch::new(key);
            scheduler::evaluate_watch(&self.config, &self.source, &mut watch).await?;
            table.add_watch(watch)?;
        }

        let registry = self.registry.lock().await;
        self.persist_owner(&registry, owner).await?;
        Ok(())
    }

    /// Remove the watch matching the reconstructed structural key.
    pub async fn remove_watch(
        &self,
        owner: &str,
        table_key: &TableKey,
        worksheet_index: u32,
        region: Region,
    ) -> Result<(), WatchError> {
        let shared = self.lookup(owner, table_key).await?;

        {
            let mut table = shared.lock().await;
            let key = WatchKey {
                reference: table.reference.clone(),
                worksheet_index,
                region,
            };
            table.remove_watch(&key)?;
        }

        let registry = self.registry.lock().await;
        self.persist_owner(&registry, owner).await?;
        Ok(())
    }

    /// Read-only snapshot of one owner's tables, ordered by name.
    pub async fn list_tables(&self, owner: &str) -> Vec<TableInfo> {
        let registry = self.registry.lock().await;
        let mut infos = Vec::new();
        for shared in registry.tables_of(owner) {
            let table = shared.lock().await;
            infos.push(TableInfo {
                name: table.name.clone(),
                reference: table.reference.clone(),
                watch_count: table.watches.len(),
            });
        }
        infos
    }

    async fn lookup(&self, owner: &str, key: &TableKey) -> Result<SharedTable, WatchError> {
        self.registry
            .lock()
            .await
            .get(owner, key)
            .ok_or_else(|| WatchError::TableNotFound(key.describe().to_string()))
    }

    async fn probe_reachable(&self, reference: &str) -> Result<(), SourceError> {
        let source = self.source.clone();
        let target = reference.to_string();
        scheduler::run_bounded(&self.config, reference, move || source.reachable(&target)).await
    }

    /// Write one owner's current tables to storage. Callers hold the
    /// registry lock; table locks are taken briefly one at a time.
    async fn persist_owner(&self, registry: &Registry, owner: &str) -> Result<(), WatchError> {
        let mut records = Vec::new();
        for shared in registry.tables_of(owner) {
            records.push(shared.lock().await.clone());
        }
        self.db.save_owner_tables(owner, &records)?;
        Ok(())
    }
}
