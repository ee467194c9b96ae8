//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, HttpClient)
//! but are themselves concrete structs, not traits.

mod backup;
mod prober;
mod pruner;
mod store;
mod writer;

pub use backup::{backup_path_for, BackupManager, Snapshot, BACKUP_TIMESTAMP_FORMAT};
pub use prober::{
    LivenessProber, ProbeJob, ProbeOptions, ProbeReport, Progress, DEFAULT_USER_AGENT,
};
pub use pruner::{
    CheckOutcome, CheckRequest, CheckedBookmark, PlannedRow, PruneOutcome, PruneRequest,
    PruneService,
};
pub use store::{LoadedStore, StoreHandle, TreeStore};
pub use writer::TreeWriter;
