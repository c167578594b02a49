use std::path::PathBuf;

use connector_traits::ConnectorError;
use core_export::ExportError;
use core_mapping::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by a reconciliation run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("mapping store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no sync targets configured")]
    NoTargets,
}

impl SyncError {
    /// True when continuing with the next item cannot succeed either.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Connector(e) => e.is_fatal(),
            SyncError::Export(e) => e.is_fatal(),
            _ => false,
        }
    }
}
