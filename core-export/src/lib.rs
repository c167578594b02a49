//! # Export Engine
//!
//! Turns crawled items into local files, either via a direct download link
//! or through a server-side export task (editable document to PDF, grid
//! document to XLSX). Remote phases run under a bounded geometric retry
//! policy; completed downloads are recorded in an atomically rewritten run
//! state ledger for later inspection.

pub mod engine;
pub mod error;
pub mod run_state;

pub use engine::{is_exportable, output_extension, ExportConfig, ExportEngine};
pub use error::{ExportError, Result};
pub use run_state::RunState;
