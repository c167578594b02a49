//! # Connector Traits
//!
//! Seam crate for the sync pipeline's external collaborators.
//!
//! The pipeline core never talks to the network directly; it is written
//! against the traits defined here:
//!
//! - [`SourcePlatform`](source::SourcePlatform): the remote hierarchical
//!   workspace (node resolution, paginated child listing, export tasks,
//!   authenticated downloads)
//! - [`IngestService`](ingest::IngestService): the destination
//!   ingestion/search service (upload, batched delete, parse trigger,
//!   metadata update)
//! - [`Notifier`](notify::Notifier): best-effort outbound run reports
//!
//! All collaborators share the [`ConnectorError`](error::ConnectorError)
//! taxonomy so call sites can make uniform retry/abort decisions.

pub mod error;
pub mod ingest;
pub mod notify;
pub mod source;

pub use error::{ConnectorError, Result};
pub use ingest::IngestService;
pub use notify::Notifier;
pub use source::{
    ChildNode, ExportTask, ExportTaskState, NodeKind, NodePage, ResolvedNode, SourcePlatform,
};
