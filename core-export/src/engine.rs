//! Materializes source items into local files.
//!
//! Two routes exist: binary formats the platform serves directly, and
//! editable documents that need a server-side export task converting them
//! to a portable format before download.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use connector_traits::{ConnectorError, ExportTaskState, NodeKind, SourcePlatform};
use core_crawl::SourceItem;
use tracing::{debug, info, instrument, warn};

use crate::error::{ExportError, Result};
use crate::run_state::RunState;

/// Extensions downloaded as-is, without an export task.
const PASS_THROUGH_EXTENSIONS: &[&str] = &["docx", "xlsx", "pdf"];

/// How an item becomes a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    /// The stored binary is fetched through a direct download link.
    Direct { extension: String },
    /// A server-side export task converts the item to `format` first.
    Task { format: &'static str },
}

fn route_for(item: &SourceItem) -> Option<Route> {
    if let Some(extension) = &item.extension {
        if PASS_THROUGH_EXTENSIONS.contains(&extension.as_str()) {
            return Some(Route::Direct {
                extension: extension.clone(),
            });
        }
    }
    match item.kind {
        NodeKind::Doc => Some(Route::Task { format: "pdf" }),
        NodeKind::Sheet => Some(Route::Task { format: "xlsx" }),
        _ => None,
    }
}

/// Whether the engine can produce a file for this item. Task routes also
/// need the export key the listing reported.
pub fn is_exportable(item: &SourceItem) -> bool {
    match route_for(item) {
        Some(Route::Direct { .. }) => true,
        Some(Route::Task { .. }) => item.export_key.is_some(),
        None => false,
    }
}

/// Output file extension for the item, if it is exportable at all.
pub fn output_extension(item: &SourceItem) -> Option<String> {
    match route_for(item)? {
        Route::Direct { extension } => Some(extension),
        Route::Task { format } => Some(format.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory receiving materialized files.
    pub download_dir: PathBuf,
    /// Ledger of completed downloads, rewritten after every success.
    pub run_state_path: PathBuf,
    /// Attempts per remote phase (task creation, link lookup, download).
    pub retry_attempts: u32,
    /// First retry delay; each further retry multiplies it by `backoff_factor`.
    pub backoff_base: Duration,
    pub backoff_factor: u32,
    /// Delay between export task status polls.
    pub poll_interval: Duration,
    /// Polls before a still-pending task is declared timed out.
    pub poll_ceiling: u32,
}

impl ExportConfig {
    pub fn new(download_dir: PathBuf, run_state_path: PathBuf) -> Self {
        Self {
            download_dir,
            run_state_path,
            retry_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_factor: 3,
            poll_interval: Duration::from_secs(2),
            poll_ceiling: 30,
        }
    }
}

pub struct ExportEngine {
    platform: Arc<dyn SourcePlatform>,
    config: ExportConfig,
    run_state: Mutex<RunState>,
}

impl ExportEngine {
    /// Loads any ledger left by a previous run so its records are kept.
    pub fn new(platform: Arc<dyn SourcePlatform>, config: ExportConfig) -> Self {
        let run_state = RunState::load(&config.run_state_path);
        Self {
            platform,
            config,
            run_state: Mutex::new(run_state),
        }
    }

    /// Produce a local file for `item`, returning its path. Always exports
    /// and downloads afresh; any file left at the target path is replaced.
    #[instrument(skip(self, item), fields(item_id = %item.id, name = %item.name))]
    pub async fn materialize(&self, item: &SourceItem) -> Result<PathBuf> {
        let route = route_for(item).ok_or_else(|| ExportError::Unsupported {
            id: item.id.clone(),
            kind: item.kind.as_str().to_string(),
        })?;

        let extension = match &route {
            Route::Direct { extension } => extension.clone(),
            Route::Task { format } => format.to_string(),
        };
        let out_path = self
            .config
            .download_dir
            .join(format!("{}.{extension}", item.name));
        self.prepare_output(&out_path).await?;

        let url = match route {
            Route::Direct { .. } => {
                self.with_retry("download-link", &item.id, || {
                    self.platform.download_document(&item.id)
                })
                .await?
            }
            Route::Task { format } => {
                let export_key =
                    item.export_key
                        .as_deref()
                        .ok_or_else(|| ExportError::Unsupported {
                            id: item.id.clone(),
                            kind: item.kind.as_str().to_string(),
                        })?;
                let task_id = self
                    .with_retry("export-task", &item.id, || {
                        self.platform.create_export_task(export_key, format)
                    })
                    .await?;
                self.poll_task(&item.id, &task_id).await?
            }
        };

        self.fetch_to_file(&item.id, &url, &out_path).await?;

        {
            let mut state = self.lock_state();
            state.record(&item.id, out_path.clone());
            state.save(&self.config.run_state_path)?;
        }
        info!(path = %out_path.display(), "item materialized");
        Ok(out_path)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.run_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ensure the download directory exists and remove any stale file at
    /// the target path, so a later failure cannot leave old content behind.
    async fn prepare_output(&self, out_path: &Path) -> Result<()> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ExportError::Io { path, source }
        };
        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(io(&self.config.download_dir))?;
        match tokio::fs::remove_file(out_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io(out_path)(source)),
        }
    }

    /// Retry a remote call with geometric backoff. Fatal errors propagate
    /// immediately; transient ones burn an attempt.
    async fn with_retry<T, F, Fut>(&self, phase: &'static str, item_id: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = connector_traits::Result<T>>,
    {
        let attempts = self.config.retry_attempts.max(1);
        let mut delay = self.config.backoff_base;
        let mut last = ConnectorError::Network("no attempt made".into());
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() => return Err(ExportError::Connector(e)),
                Err(e) => {
                    warn!(phase, attempt, error = %e, "remote call failed");
                    last = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay *= self.config.backoff_factor;
            }
        }
        Err(ExportError::Exhausted {
            phase,
            id: item_id.to_string(),
            attempts,
            source: last,
        })
    }

    /// Poll the export task until it yields a download link, fails, or the
    /// poll budget runs out. Transient poll errors burn a poll slot.
    async fn poll_task(&self, item_id: &str, task_id: &str) -> Result<String> {
        let polls = self.config.poll_ceiling.max(1);
        for poll in 1..=polls {
            match self.platform.get_export_task(task_id).await {
                Ok(task) => match task.state {
                    ExportTaskState::Succeeded => {
                        // Succeeded without a link counts as still pending.
                        if let Some(url) = task.download_url {
                            debug!(poll, "export task ready");
                            return Ok(url);
                        }
                    }
                    ExportTaskState::Failed => {
                        return Err(ExportError::ExportFailed {
                            id: item_id.to_string(),
                            task_id: task_id.to_string(),
                        })
                    }
                    ExportTaskState::Pending => {}
                },
                Err(e) if e.is_fatal() => return Err(ExportError::Connector(e)),
                Err(e) => warn!(poll, error = %e, "export task poll failed"),
            }
            if poll < polls {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        Err(ExportError::Timeout {
            id: item_id.to_string(),
            task_id: task_id.to_string(),
            polls,
        })
    }

    /// Download `url` into `out_path`. A success needs both a fetched body
    /// and a non-empty one; empty bodies are retried like transient errors.
    async fn fetch_to_file(&self, item_id: &str, url: &str, out_path: &Path) -> Result<()> {
        let attempts = self.config.retry_attempts.max(1);
        let mut delay = self.config.backoff_base;
        let mut last: Option<ConnectorError> = None;
        for attempt in 1..=attempts {
            match self.platform.fetch(url).await {
                Ok(bytes) if !bytes.is_empty() => {
                    tokio::fs::write(out_path, &bytes)
                        .await
                        .map_err(|source| ExportError::Io {
                            path: out_path.to_path_buf(),
                            source,
                        })?;
                    return Ok(());
                }
                Ok(_) => warn!(attempt, "download body was empty"),
                Err(e) if e.is_fatal() => return Err(ExportError::Connector(e)),
                Err(e) => {
                    warn!(attempt, error = %e, "download failed");
                    last = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay *= self.config.backoff_factor;
            }
        }
        match last {
            Some(source) => Err(ExportError::Exhausted {
                phase: "download",
                id: item_id.to_string(),
                attempts,
                source,
            }),
            None => Err(ExportError::EmptyDownload {
                id: item_id.to_string(),
                path: out_path.to_path_buf(),
            }),
        }
    }
}
