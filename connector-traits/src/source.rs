//! Source Platform Abstraction
//!
//! Trait seam for the remote hierarchical workspace the pipeline mirrors.
//! Session/browser lifecycle is owned by the implementation; a missing or
//! expired session surfaces as [`ConnectorError::NotAuthenticated`] from any
//! operation.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of a node in the remote workspace tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Doc,
    Sheet,
    File,
}

impl NodeKind {
    pub fn is_folder(&self) -> bool {
        matches!(self, NodeKind::Folder)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Doc => "doc",
            NodeKind::Sheet => "sheet",
            NodeKind::File => "file",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A root node resolved from a target URL or raw id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub node_id: String,
    pub kind: NodeKind,
}

/// A child entry returned by one listing page.
///
/// `has_children` is independent of `kind`: leaf-typed nodes can still carry
/// children and the crawler must descend into them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    /// File extension as reported by the platform, if any.
    pub extension: Option<String>,
    /// Key required to create an export task for transformable kinds.
    pub export_key: Option<String>,
    /// Last-modified time in epoch milliseconds.
    pub updated_time_ms: Option<i64>,
    pub has_children: bool,
}

/// One page of a cursor-paginated child listing.
#[derive(Debug, Clone, Default)]
pub struct NodePage {
    pub items: Vec<ChildNode>,
    pub next_cursor: Option<String>,
}

/// State of an asynchronous server-side export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTaskState {
    Pending,
    Succeeded,
    Failed,
}

/// Snapshot of an export task as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTask {
    pub state: ExportTaskState,
    /// Present once `state` is [`ExportTaskState::Succeeded`].
    pub download_url: Option<String>,
}

/// Async operations against the remote workspace.
///
/// Implementations own the session (cookies, tokens, browser context) and
/// inject it into every call; the pipeline only sees ids, cursors and URLs.
#[async_trait]
pub trait SourcePlatform: Send + Sync {
    /// Resolve a target URL or raw node id to a concrete node.
    async fn resolve_node(&self, url_or_id: &str) -> Result<ResolvedNode>;

    /// List one page of children of `parent_id`.
    ///
    /// `cursor` of `None` requests the first page. Termination policy
    /// (missing cursor, empty page, cursor cycles, page ceiling) is the
    /// caller's responsibility.
    async fn list_children(&self, parent_id: &str, cursor: Option<&str>) -> Result<NodePage>;

    /// Create an export task converting `node_id` into `target_format`.
    ///
    /// Returns the task id to poll via [`get_export_task`](Self::get_export_task).
    async fn create_export_task(&self, node_id: &str, target_format: &str) -> Result<String>;

    /// Fetch the current state of an export task.
    async fn get_export_task(&self, task_id: &str) -> Result<ExportTask>;

    /// Obtain a direct download URL for a pass-through document.
    async fn download_document(&self, node_id: &str) -> Result<String>;

    /// Fetch raw bytes from `url` with the platform session's credentials.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}
