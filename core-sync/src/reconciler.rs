//! # Reconciler
//!
//! Drives one reconciliation run: crawl the configured targets, bring every
//! fresh exportable item up to date in the destination, then sweep out
//! documents whose source item disappeared.
//!
//! ## Run shape
//!
//! 1. Snapshot the mapping store (the "before" keys).
//! 2. Crawl every target; a failed target is skipped, not fatal.
//! 3. Filter crawled items to exportable ones at or past the freshness
//!    threshold.
//! 4. Delete the previous destination copies of all re-synced items in one
//!    batched call.
//! 5. Per item: materialize, upload, record the mapping, push metadata,
//!    remove the local file. Parse triggers are buffered and flushed in
//!    batches.
//! 6. Stale sweep: before-keys minus crawled ids, deleted remotely in one
//!    batch; mapping entries are dropped only when that batch succeeds.
//! 7. Persist the mapping once, render the report, notify best-effort.
//!
//! Per-item failures are recorded and skipped; only errors marked fatal
//! (failed authentication) abort the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use connector_traits::{IngestService, Notifier, SourcePlatform};
use core_crawl::{SourceItem, TreeCrawler};
use core_export::{is_exportable, ExportEngine};
use core_mapping::{MappingEntry, MappingStore};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::stats::{SyncRunId, SyncStats};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Root node ids to crawl.
    pub targets: Vec<String>,
    /// Items whose update time (epoch seconds) is below this are left alone.
    pub min_update_ts: i64,
    /// Base URL for canonical source links, joined with the item id.
    pub canonical_url_base: String,
    /// Uploaded documents per parse trigger.
    pub parse_batch_size: usize,
}

pub struct Reconciler {
    platform: Arc<dyn SourcePlatform>,
    ingest: Arc<dyn IngestService>,
    notifier: Option<Arc<dyn Notifier>>,
    mapping: Arc<MappingStore>,
    crawler: TreeCrawler,
    engine: ExportEngine,
    config: ReconcileConfig,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn SourcePlatform>,
        ingest: Arc<dyn IngestService>,
        notifier: Option<Arc<dyn Notifier>>,
        mapping: Arc<MappingStore>,
        crawler: TreeCrawler,
        engine: ExportEngine,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            platform,
            ingest,
            notifier,
            mapping,
            crawler,
            engine,
            config,
        }
    }

    /// Execute one reconciliation run and return its statistics.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncStats> {
        if self.config.targets.is_empty() {
            return Err(SyncError::NoTargets);
        }

        let run_id = SyncRunId::new();
        let mut stats = SyncStats::new(run_id);
        info!(%run_id, targets = self.config.targets.len(), "reconciliation run starting");

        self.mapping.load(false)?;
        let before = self.mapping.snapshot_items()?;
        // Keys include legacy scalar values, so stale ones get cleaned up.
        let before_keys: HashSet<String> = self.mapping.snapshot_keys()?.into_iter().collect();

        // Crawl every target; a failed target is skipped, not fatal.
        let mut items: Vec<SourceItem> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        for target in &self.config.targets {
            // Targets may be share URLs or bare node ids; resolve first.
            let root = match self.platform.resolve_node(target).await {
                Ok(node) => node.node_id,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(target = %target, error = %e, "target did not resolve; skipping");
                    stats.targets_failed += 1;
                    continue;
                }
            };
            match self.crawler.crawl(&root).await {
                Ok(outcome) => {
                    stats.targets_crawled += 1;
                    seen_ids.extend(outcome.seen_ids);
                    items.extend(outcome.items);
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(target = %target, error = %e, "crawl failed; skipping target");
                    stats.targets_failed += 1;
                }
            }
        }

        // The same item can be reachable from two targets.
        let mut unique_ids = HashSet::new();
        items.retain(|item| unique_ids.insert(item.id.clone()));

        let candidates = self.select_candidates(items, &mut stats);
        info!(candidates = candidates.len(), "selection complete");

        // Delete the destination copies of every re-synced item up front,
        // in one batch. Items whose old copy survives are not re-uploaded.
        let blocked = self.pre_delete(&candidates, &mut stats).await?;

        let mut parse_buffer: Vec<String> = Vec::new();
        for item in &candidates {
            if blocked.contains(&item.id) {
                continue;
            }
            match self.process_item(item, &mut parse_buffer, &mut stats).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "item failed; continuing");
                    stats.record_failure(&item.id, &item.name, e.to_string());
                }
            }
            if parse_buffer.len() >= self.config.parse_batch_size {
                self.flush_parse(&mut parse_buffer).await?;
            }
        }
        self.flush_parse(&mut parse_buffer).await?;

        self.sweep_stale(&before, &before_keys, &seen_ids, &mut stats)
            .await?;

        self.mapping.persist()?;
        stats.finish();

        info!(
            %run_id,
            added = stats.items_added,
            updated = stats.items_updated,
            deleted = stats.items_deleted,
            failed = stats.items_failed,
            "reconciliation run finished"
        );
        self.notify(&stats).await;
        Ok(stats)
    }

    /// Keep exportable items at or past the freshness threshold.
    fn select_candidates(
        &self,
        items: Vec<SourceItem>,
        stats: &mut SyncStats,
    ) -> Vec<SourceItem> {
        items
            .into_iter()
            .filter(|item| {
                if !is_exportable(item) {
                    debug!(item_id = %item.id, "no supported output format; skipping");
                    stats.items_skipped += 1;
                    return false;
                }
                let fresh = item
                    .updated_time_secs()
                    .map(|secs| secs >= self.config.min_update_ts)
                    .unwrap_or(false);
                if !fresh {
                    debug!(item_id = %item.id, "below freshness threshold; skipping");
                    stats.items_skipped += 1;
                }
                fresh
            })
            .collect()
    }

    /// Batch-delete old destination copies of items about to be re-synced.
    ///
    /// Returns the ids of items whose old copy could not be removed; those
    /// are recorded as failures and excluded from upload, since re-uploading
    /// would duplicate the document.
    async fn pre_delete(
        &self,
        candidates: &[SourceItem],
        stats: &mut SyncStats,
    ) -> Result<HashSet<String>> {
        let mut replacing: HashMap<String, &SourceItem> = HashMap::new();
        let mut doc_ids = Vec::new();
        for item in candidates {
            if let Some(entry) = self.mapping.get(&item.id)? {
                doc_ids.push(entry.destination_doc_id);
                replacing.insert(item.id.clone(), item);
            }
        }
        if doc_ids.is_empty() {
            return Ok(HashSet::new());
        }

        debug!(count = doc_ids.len(), "deleting previous destination copies");
        let ok = match self.ingest.delete_documents(&doc_ids).await {
            Ok(ok) => ok,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "batched pre-delete failed");
                false
            }
        };
        if ok {
            return Ok(HashSet::new());
        }

        for (id, item) in &replacing {
            stats.record_failure(
                id,
                &item.name,
                "previous destination copy could not be removed".into(),
            );
        }
        Ok(replacing.into_keys().collect())
    }

    /// Bring one item up to date: materialize, upload, map, push metadata,
    /// clean up the local file.
    async fn process_item(
        &self,
        item: &SourceItem,
        parse_buffer: &mut Vec<String>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let was_update = self.mapping.get(&item.id)?.is_some();

        let path = self.engine.materialize(item).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| SyncError::Io {
            path: path.clone(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.name.clone());

        let doc_id = self.ingest.upload_document(&file_name, bytes.into()).await?;
        let canonical = self.canonical_url(&item.id);
        self.mapping.put(
            &item.id,
            MappingEntry {
                destination_doc_id: doc_id.clone(),
                canonical_source_url: canonical.clone(),
            },
            false,
        )?;

        let mut fields = Map::new();
        fields.insert("source_url".to_string(), Value::String(canonical));
        fields.insert(
            "source_path".to_string(),
            Value::String(item.relative_path()),
        );
        if let Some(ts) = item.updated_time_secs() {
            fields.insert("source_updated_at".to_string(), Value::from(ts));
        }
        match self.ingest.update_document_metadata(&doc_id, &fields).await {
            Ok(true) => {}
            Ok(false) => warn!(item_id = %item.id, %doc_id, "metadata update rejected"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!(item_id = %item.id, error = %e, "metadata update failed"),
        }

        parse_buffer.push(doc_id);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %e, "could not remove downloaded file");
        }

        stats.record_success(item.kind.as_str(), was_update);
        Ok(())
    }

    async fn flush_parse(&self, parse_buffer: &mut Vec<String>) -> Result<()> {
        if parse_buffer.is_empty() {
            return Ok(());
        }
        let doc_ids = std::mem::take(parse_buffer);
        match self.ingest.trigger_parse(&doc_ids).await {
            Ok(true) => debug!(count = doc_ids.len(), "parse triggered"),
            Ok(false) => warn!(count = doc_ids.len(), "parse trigger rejected"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!(error = %e, "parse trigger failed"),
        }
        Ok(())
    }

    /// Remove destination documents whose source item was not seen by any
    /// crawl. Mapping entries are only dropped when the remote batch delete
    /// succeeds, so a failed delete retries next run. Stale legacy values
    /// carry no destination document and are simply dropped locally.
    async fn sweep_stale(
        &self,
        before: &[(String, MappingEntry)],
        before_keys: &HashSet<String>,
        seen_ids: &HashSet<String>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let mut stale_keys: Vec<&String> = before_keys
            .iter()
            .filter(|key| !seen_ids.contains(*key))
            .collect();
        stale_keys.sort();
        if stale_keys.is_empty() {
            return Ok(());
        }

        let doc_ids: Vec<String> = before
            .iter()
            .filter(|(key, _)| !seen_ids.contains(key))
            .map(|(_, entry)| entry.destination_doc_id.clone())
            .collect();
        info!(count = stale_keys.len(), "sweeping stale documents");

        let ok = if doc_ids.is_empty() {
            true
        } else {
            match self.ingest.delete_documents(&doc_ids).await {
                Ok(ok) => ok,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "stale sweep delete failed");
                    false
                }
            }
        };
        if !ok {
            warn!("stale sweep rejected; keeping mapping entries for next run");
            return Ok(());
        }

        for key in stale_keys {
            if self.mapping.delete(key, false)?.is_some() {
                stats.items_deleted += 1;
            } else {
                debug!(key = %key, "dropped stale legacy mapping value");
            }
        }
        Ok(())
    }

    async fn notify(&self, stats: &SyncStats) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let title = format!("Document sync: run {}", stats.run_id);
        if let Err(e) = notifier.send_markdown(&title, &stats.markdown()).await {
            warn!(error = %e, "report notification failed");
        }
    }

    fn canonical_url(&self, item_id: &str) -> String {
        format!(
            "{}/{}",
            self.config.canonical_url_base.trim_end_matches('/'),
            item_id
        )
    }
}
