//! Source item model.
//!
//! Items are ephemeral: rebuilt on every crawl, never persisted.

use connector_traits::{ChildNode, NodeKind};

/// Characters not allowed in downloaded file names.
const ILLEGAL_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Default cap applied to sanitized names.
pub const MAX_NAME_LEN: usize = 200;

/// Replace filesystem-hostile characters and cap the length.
///
/// Empty or all-illegal names become `"untitled"`.
pub fn sanitize_name(name: &str, max_len: usize) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if ILLEGAL_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    let base = if trimmed.is_empty() { "untitled" } else { trimmed };
    base.chars().take(max_len).collect()
}

/// A non-folder node discovered during a crawl, with its ancestor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub id: String,
    pub kind: NodeKind,
    /// Sanitized display name, safe to use as a file name stem.
    pub name: String,
    /// Sanitized names of all ancestors below the crawl root, top-down.
    pub path_segments: Vec<String>,
    pub extension: Option<String>,
    pub export_key: Option<String>,
    pub updated_time_ms: Option<i64>,
    pub has_children: bool,
}

impl SourceItem {
    /// Build an item from a listing entry and its ancestor path.
    pub fn from_child(child: &ChildNode, path_segments: Vec<String>) -> Self {
        Self {
            id: child.id.clone(),
            kind: child.kind,
            name: sanitize_name(&child.name, MAX_NAME_LEN),
            path_segments,
            extension: child.extension.as_ref().map(|e| e.to_lowercase()),
            export_key: child.export_key.clone(),
            updated_time_ms: child.updated_time_ms,
            has_children: child.has_children,
        }
    }

    /// Slash-joined relative path, for logging.
    pub fn relative_path(&self) -> String {
        if self.path_segments.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path_segments.join("/"), self.name)
        }
    }

    /// Item's update time in epoch seconds, if reported.
    pub fn updated_time_secs(&self) -> Option<i64> {
        self.updated_time_ms.map(|ms| ms / 1000)
    }
}
