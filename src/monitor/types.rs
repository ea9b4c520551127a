use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::WatchError;

use super::diff;

/// Identity of the chat session a table belongs to. Opaque to the core;
/// tables of different owners are invisible to each other.
pub type Owner = String;

/// The watched sub-region of a worksheet.
///
/// The `kind` tag is also the persisted discriminator: decoding never
/// infers the kind from which addressing field happens to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Region {
    /// One cell, addressed in A1 notation ("B3").
    Cell { address: String },
    /// One row, 1-based.
    Row { index: u32 },
    /// One column, 1-based.
    Column { index: u32 },
    /// The whole worksheet.
    Sheet,
}

impl Region {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Region::Cell { .. } => "cell",
            Region::Row { .. } => "row",
            Region::Column { .. } => "column",
            Region::Sheet => "sheet",
        }
    }
}

/// Last-observed content of a watched region, used as the diff baseline.
///
/// A sheet snapshot is not guaranteed rectangular across fetches; row
/// lengths may differ and the diff engine tolerates that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Snapshot {
    Cell(Option<String>),
    Row(Vec<String>),
    Column(Vec<String>),
    Sheet(Vec<Vec<String>>),
}

/// Structural identity of a watch. Two watches with equal keys are the
/// same watch as far as duplicate detection and removal-by-value are
/// concerned; there is no opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchKey {
    /// Copied from the owning table so the key alone identifies the
    /// watched region.
    pub reference: String,
    pub worksheet_index: u32,
    #[serde(flatten)]
    pub region: Region,
}

/// A single monitored region plus its diff baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watch {
    #[serde(flatten)]
    pub key: WatchKey,
    /// Baseline for the next diff; absent until the first evaluation.
    #[serde(default)]
    pub last_snapshot: Option<Snapshot>,
    /// Report produced by the most recent evaluation; never persisted.
    #[serde(skip)]
    pub last_report: String,
}

impl Watch {
    pub fn new(key: WatchKey) -> Self {
        Watch {
            key,
            last_snapshot: None,
            last_report: String::new(),
        }
    }

    /// Fold a freshly fetched snapshot into the watch: diff against the
    /// baseline, remember the rendered report, advance the baseline.
    ///
    /// The very first observation only establishes the baseline and
    /// reports nothing, so a new watch never announces "everything
    /// appeared".
    pub fn observe(&mut self, new: Snapshot) {
        self.last_report = match &self.last_snapshot {
            Some(old) => diff::diff_region(&self.key.region, old, &new).report,
            None => String::new(),
        };
        self.last_snapshot = Some(new);
    }
}

/// A named aggregate of watches over one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub reference: String,
    pub name: String,
    /// Insertion order is report order.
    #[serde(default)]
    pub watches: Vec<Watch>,
}

impl Table {
    pub fn new(reference: impl Into<String>, name: impl Into<String>) -> Self {
        Table {
            reference: reference.into(),
            name: name.into(),
            watches: Vec::new(),
        }
    }

    pub fn has_watch(&self, key: &WatchKey) -> bool {
        self.watches.iter().any(|w| &w.key == key)
    }

    /// Append a watch; rejects a structurally-equal duplicate.
    pub fn add_watch(&mut self, watch: Watch) -> Result<(), WatchError> {
        if self.has_watch(&watch.key) {
            return Err(WatchError::DuplicateWatch);
        }
        self.watches.push(watch);
        Ok(())
    }

    /// Remove the first watch matching `key`.
    pub fn remove_watch(&mut self, key: &WatchKey) -> Result<(), WatchError> {
        match self.watches.iter().position(|w| &w.key == key) {
            Some(index) => {
                self.watches.remove(index);
                Ok(())
            }
            None => Err(WatchError::WatchNotFound),
        }
    }
}

/// How the dialogue flow points at an existing table: by display name or
/// by data-source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKey {
    Name(String),
    Reference(String),
}

impl TableKey {
    pub fn describe(&self) -> &str {
        match self {
            TableKey::Name(name) => name,
            TableKey::Reference(reference) => reference,
        }
    }
}

/// Read-only listing entry for the dialogue flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub reference: String,
    pub watch_count: usize,
}

/// A rendered change report ready for delivery to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub owner: Owner,
    pub table_name: String,
    pub report: String,
}

/// Fire-and-forget sink the scheduler pushes non-empty reports into.
/// The core never awaits delivery confirmation.
pub trait Notifier: Send + Sync {
    fn notify(&self, note: ChangeNotification);
}

/// Notifier backed by an unbounded channel; the chat transport drains
/// the receiving end.
pub struct ChannelNotifier {
    sender: UnboundedSender<ChangeNotification>,
}

impl Notifier for ChannelNotifier {
    fn notify(&self, note: ChangeNotification) {
        // A closed receiver means the transport is shutting down; reports
        // are best-effort and simply dropped.
        let _ = self.sender.send(note);
    }
}

/// Create the notification channel pair.
pub fn notification_channel() -> (ChannelNotifier, UnboundedReceiver<ChangeNotification>) {
    let (sender, receiver) = unbounded_channel();
    (ChannelNotifier { sender }, receiver)
}
