//! # Reconciliation
//!
//! Single-run orchestration of the document sync pipeline: crawl the
//! configured source targets, export and upload every fresh item, sweep out
//! destination documents whose source disappeared, and persist the id
//! mapping once at the end of the run.
//!
//! The reconciler works purely through the trait seams in
//! `connector-traits`; it has no knowledge of any concrete platform or
//! ingestion service.

pub mod error;
pub mod reconciler;
pub mod stats;

pub use error::{Result, SyncError};
pub use reconciler::{ReconcileConfig, Reconciler};
pub use stats::{ItemFailure, SyncRunId, SyncStats};
