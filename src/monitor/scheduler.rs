//! Per-table re-evaluation loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::MonitorConfig;
use crate::error::SourceError;
use crate::source::SheetSource;

use super::registry::SharedTable;
use super::types::{ChangeNotification, Notifier, Owner, Snapshot, Table, Watch, WatchKey};

/// Owns one recurring ticker per live table.
///
/// Registration happens exactly once per table, at creation time and at
/// startup recovery; cancellation exactly once, at deletion. Tickers for
/// different tables run independently, so one slow source only delays
/// its own table.
pub struct Scheduler {
    config: MonitorConfig,
    source: Arc<dyn SheetSource>,
    notifier: Arc<dyn Notifier>,
    tickers: Mutex<HashMap<(Owner, String), JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SheetSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Scheduler {
            config,
            source,
            notifier,
            tickers: Mutex::new(HashMap::new()),
        }
    }

    /// Start the recurring re-evaluation for one table.
    pub fn register(&self, owner: &str, name: &str, table: SharedTable) {
        let key = (owner.to_string(), name.to_string());
        let mut tickers = self.tickers.lock().unwrap();
        if tickers.contains_key(&key) {
            return;
        }

        let handle = tokio::spawn(run_ticker(
            self.config.clone(),
            self.source.clone(),
            self.notifier.clone(),
            owner.to_string(),
            name.to_string(),
            table,
        ));
        tickers.insert(key, handle);
        info!("scheduled table '{}' for owner {}", name, owner);
    }

    /// Stop and forget the ticker for one table. An in-flight tick is
    /// aborted at its next await point and never delivers afterwards.
    pub fn unregister(&self, owner: &str, name: &str) {
        let key = (owner.to_string(), name.to_string());
        if let Some(handle) = self.tickers.lock().unwrap().remove(&key) {
            handle.abort();
            info!("unscheduled table '{}' for owner {}", name, owner);
        }
    }

    pub fn is_registered(&self, owner: &str, name: &str) -> bool {
        self.tickers
            .lock()
            .unwrap()
            .contains_key(&(owner.to_string(), name.to_string()))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in self.tickers.lock().unwrap().values() {
            handle.abort();
        }
    }
}

async fn run_ticker(
    config: MonitorConfig,
    source: Arc<dyn SheetSource>,
    notifier: Arc<dyn Notifier>,
    owner: Owner,
    name: String,
    table: SharedTable,
) {
    let mut interval = time::interval(config.poll_interval());
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately; the
    // table was just evaluated at creation, so skip it.
    interval.tick().await;

    loop {
        interval.tick().await;

        let report = {
            let mut guard = table.lock().await;
            reevaluate_table(&config, &source, &mut guard).await
        };

        if report.is_empty() {
            debug!("no changes in table '{}' of owner {}", name, owner);
            continue;
        }
        notifier.notify(ChangeNotification {
            owner: owner.clone(),
            table_name: name.clone(),
            report,
        });
    }
}

/// Evaluate every watch of a table in insertion order and return the
/// concatenated non-empty reports for this tick.
///
/// A failing fetch leaves that watch's baseline and report untouched
/// (the next tick retries from the same baseline) and never aborts the
/// remaining watches.
pub async fn reevaluate_table(
    config: &MonitorConfig,
    source: &Arc<dyn SheetSource>,
    table: &mut Table,
) -> String {
    let mut combined = String::new();
    for watch in &mut table.watches {
        match evaluate_watch(config, source, watch).await {
            Ok(()) => combined.push_str(&watch.last_report),
            Err(err) => warn!(
                "{} watch on '{}' (worksheet {}) failed: {}",
                watch.key.region.kind_name(),
                watch.key.reference,
                watch.key.worksheet_index,
                err
            ),
        }
    }
    combined
}

/// Fetch one watch's region and fold the result into the watch. On
/// failure nothing mutates.
pub async fn evaluate_watch(
    config: &MonitorConfig,
    source: &Arc<dyn SheetSource>,
    watch: &mut Watch,
) -> Result<(), SourceError> {
    let snapshot = fetch_region(config, source, &watch.key).await?;
    watch.observe(snapshot);
    Ok(())
}

/// Run one region fetch on the blocking pool, bounded by the configured
/// timeout.
pub(crate) async fn fetch_region(
    config: &MonitorConfig,
    source: &Arc<dyn SheetSource>,
    key: &WatchKey,
) -> Result<Snapshot, SourceError> {
    let source = source.clone();
    let key = key.clone();
    let reference = key.reference.clone();
    run_bounded(config, &reference, move || {
        source.fetch(&key.reference, key.worksheet_index, &key.region)
    })
    .await
}

/// Run a blocking source call off the async runtime, bounded by the
/// fetch timeout so other tables' tickers are never starved.
pub(crate) async fn run_bounded<T, F>(
    config: &MonitorConfig,
    reference: &str,
    job: F,
) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
{
    let job = tokio::task::spawn_blocking(job);
    match time::timeout(config.fetch_timeout(), job).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SourceError::unreachable(reference, join_err)),
        Err(_elapsed) => Err(SourceError::Timeout),
    }
}
