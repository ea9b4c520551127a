//! Backend core of a spreadsheet change-monitoring assistant.
//!
//! Owners (one per chat session) register named tables pointing at
//! workbook references; each table accumulates watches over a cell, a
//! row, a column, or a whole worksheet. A background scheduler
//! re-fetches every watched region, diffs it against the last snapshot,
//! and pushes human-readable change reports into a notification sink.
//! The registry persists to SQLite and is restored on startup.
//!
//! The dialogue flow that collects names, references, and watch
//! parameters lives outside this crate; it drives the [`Monitor`]
//! facade and drains the notification channel.

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod source;

pub use config::MonitorConfig;
pub use database::{Database, DbError};
pub use error::{SourceError, WatchError};
pub use monitor::types::{
    notification_channel, ChangeNotification, ChannelNotifier, Notifier, Owner, Region, Snapshot,
    Table, TableInfo, TableKey, Watch, WatchKey,
};
pub use monitor::Monitor;
pub use source::{SheetSource, WorkbookSource};
