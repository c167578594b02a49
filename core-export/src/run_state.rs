//! Per-run download ledger.
//!
//! Write-only record of which item produced which file, kept for later
//! inspection of a run; it never feeds back into export decisions. The
//! file is rewritten atomically after every successful materialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ExportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedDownload {
    pub file: PathBuf,
}

/// Item id to completed download, serialized as a flat JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub completed: HashMap<String, CompletedDownload>,
}

impl RunState {
    /// Read the ledger from disk. A missing or unreadable file yields an
    /// empty state; this is a cache, not a source of truth.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(error) => {
                warn!(path = %path.display(), %error, "run state unreadable; starting empty");
                Self::default()
            }
        }
    }

    pub fn record(&mut self, item_id: &str, file: PathBuf) {
        self.completed
            .insert(item_id.to_string(), CompletedDownload { file });
    }

    /// Rewrite the ledger via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        let io = |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io)?;
            }
        }
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| io(std::io::Error::other(e)))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)?;
        Ok(())
    }
}
