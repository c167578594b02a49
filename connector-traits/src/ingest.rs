//! Destination Ingestion Service Abstraction
//!
//! The destination holds one document per mirrored source item. Batch
//! operations (`delete_documents`, `trigger_parse`) take the full id set in
//! one call; implementations may retry internally but report a single
//! boolean outcome.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::Result;

/// Async operations against the ingestion/search service.
#[async_trait]
pub trait IngestService: Send + Sync {
    /// Upload one document; returns the created destination document id.
    async fn upload_document(&self, file_name: &str, bytes: Bytes) -> Result<String>;

    /// Delete the given destination documents in one batched call.
    ///
    /// Returns `true` only when the service reports the whole batch as
    /// deleted. A `false` return is not attributable to individual ids.
    async fn delete_documents(&self, doc_ids: &[String]) -> Result<bool>;

    /// Trigger parsing (chunking/indexing) for the given documents.
    ///
    /// Implementations retry internally within their own budget; `false`
    /// means the budget was exhausted.
    async fn trigger_parse(&self, doc_ids: &[String]) -> Result<bool>;

    /// Update metadata fields on one destination document.
    async fn update_document_metadata(
        &self,
        doc_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<bool>;
}
