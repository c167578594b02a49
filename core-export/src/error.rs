use std::path::PathBuf;

use connector_traits::ConnectorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

/// Failure modes of materializing a single item.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The item's kind and extension map to no supported output format.
    #[error("no supported output format for item {id} (kind {kind})")]
    Unsupported { id: String, kind: String },

    /// A remote phase kept failing after the configured retry budget.
    #[error("{phase} failed for item {id} after {attempts} attempts")]
    Exhausted {
        phase: &'static str,
        id: String,
        attempts: u32,
        #[source]
        source: ConnectorError,
    },

    /// The platform reported the export task as failed.
    #[error("export task {task_id} failed for item {id}")]
    ExportFailed { id: String, task_id: String },

    /// The export task never reached a terminal state within the poll budget.
    #[error("export task {task_id} for item {id} still pending after {polls} polls")]
    Timeout {
        id: String,
        task_id: String,
        polls: u32,
    },

    /// Every download attempt produced an empty file.
    #[error("downloaded file was empty for item {id} ({path})")]
    EmptyDownload { id: String, path: PathBuf },

    /// A fatal platform error that retrying cannot help.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// True when the whole run should stop rather than move to the next item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExportError::Connector(e) if e.is_fatal())
    }
}
