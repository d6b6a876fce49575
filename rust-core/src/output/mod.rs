//! Record files, spectrum snapshots and alerts

pub mod alert;
pub mod format;
pub mod records;
pub mod snapshot;

pub use alert::{Alerter, LogAlerter, Termination};
pub use records::{OutputError, Record, RecordWriter};
pub use snapshot::SnapshotWriter;
