//! Workspace facade crate.
//!
//! Host applications can depend on `docsync-workspace` and reach the whole
//! pipeline through one dependency instead of wiring each workspace crate
//! individually.

pub use connector_traits;
pub use core_runtime;
pub use core_sync;
pub use provider_ingest;
