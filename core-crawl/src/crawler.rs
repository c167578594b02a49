//! Depth-first crawler over the source platform's listing API.

use std::collections::HashSet;
use std::sync::Arc;

use connector_traits::{Result, SourcePlatform};
use tracing::{debug, info, instrument, warn};

use crate::item::{sanitize_name, SourceItem, MAX_NAME_LEN};

/// Crawler tuning.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hard ceiling on listing pages consumed per frontier node. A node
    /// exceeding it is truncated, not failed.
    pub max_pages_per_node: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages_per_node: 200,
        }
    }
}

/// Result of crawling one root.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Every non-folder item encountered, with accumulated ancestor path.
    pub items: Vec<SourceItem>,
    /// Every non-folder id encountered, independent of any export filter.
    pub seen_ids: HashSet<String>,
}

/// One pending frontier node: id plus the path of sanitized ancestor names.
struct Frontier {
    id: String,
    path: Vec<String>,
}

/// Paginated DFS traversal producing a flat item list.
pub struct TreeCrawler {
    platform: Arc<dyn SourcePlatform>,
    config: CrawlConfig,
}

impl TreeCrawler {
    pub fn new(platform: Arc<dyn SourcePlatform>, config: CrawlConfig) -> Self {
        Self { platform, config }
    }

    /// Crawl the subtree rooted at `root_id`.
    ///
    /// A listing error aborts this crawl target only; the caller is
    /// responsible for isolating per-target failures.
    #[instrument(skip(self), fields(root_id = %root_id))]
    pub async fn crawl(&self, root_id: &str) -> Result<CrawlOutcome> {
        let mut outcome = CrawlOutcome::default();
        let mut stack = vec![Frontier {
            id: root_id.to_string(),
            path: Vec::new(),
        }];

        while let Some(frontier) = stack.pop() {
            self.list_node(&frontier, &mut stack, &mut outcome).await?;
        }

        info!(
            items = outcome.items.len(),
            seen = outcome.seen_ids.len(),
            "crawl complete"
        );
        Ok(outcome)
    }

    /// Page through one node's children, pushing descendants and recording
    /// items.
    ///
    /// Pagination stops on the first of: no next cursor, an empty page, a
    /// cursor that does not advance or repeats an earlier one, or the page
    /// ceiling.
    async fn list_node(
        &self,
        frontier: &Frontier,
        stack: &mut Vec<Frontier>,
        outcome: &mut CrawlOutcome,
    ) -> Result<()> {
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut page_count: u32 = 0;

        loop {
            let page = self
                .platform
                .list_children(&frontier.id, cursor.as_deref())
                .await?;

            let page_len = page.items.len();
            for child in &page.items {
                let name = sanitize_name(&child.name, MAX_NAME_LEN);
                // Leaf-typed nodes can still carry children; descend into
                // anything that declares them.
                if child.kind.is_folder() || child.has_children {
                    let mut path = frontier.path.clone();
                    path.push(name.clone());
                    stack.push(Frontier {
                        id: child.id.clone(),
                        path,
                    });
                }
                if !child.kind.is_folder() {
                    outcome.seen_ids.insert(child.id.clone());
                    outcome
                        .items
                        .push(SourceItem::from_child(child, frontier.path.clone()));
                }
            }

            let Some(next) = page.next_cursor else {
                break;
            };
            if page_len == 0 {
                break;
            }
            if Some(next.as_str()) == cursor.as_deref() || seen_cursors.contains(&next) {
                warn!(parent_id = %frontier.id, cursor = %next, "cursor did not advance; stopping pagination");
                break;
            }
            seen_cursors.insert(next.clone());
            cursor = Some(next);
            page_count += 1;
            if page_count >= self.config.max_pages_per_node {
                warn!(parent_id = %frontier.id, pages = page_count, "page ceiling reached; truncating listing");
                break;
            }
        }

        debug!(parent_id = %frontier.id, pages = page_count + 1, "node listed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use connector_traits::{
        ChildNode, ConnectorError, ExportTask, NodeKind, NodePage, ResolvedNode,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted platform: maps (parent id, cursor) to a page or an error.
    #[derive(Default)]
    struct ScriptedPlatform {
        pages: Mutex<HashMap<(String, Option<String>), std::result::Result<NodePage, String>>>,
    }

    impl ScriptedPlatform {
        fn page(
            &self,
            parent: &str,
            cursor: Option<&str>,
            items: Vec<ChildNode>,
            next: Option<&str>,
        ) {
            self.pages.lock().unwrap().insert(
                (parent.to_string(), cursor.map(str::to_string)),
                Ok(NodePage {
                    items,
                    next_cursor: next.map(str::to_string),
                }),
            );
        }

        fn fail(&self, parent: &str, cursor: Option<&str>, message: &str) {
            self.pages.lock().unwrap().insert(
                (parent.to_string(), cursor.map(str::to_string)),
                Err(message.to_string()),
            );
        }
    }

    #[async_trait]
    impl SourcePlatform for ScriptedPlatform {
        async fn resolve_node(&self, _url_or_id: &str) -> Result<ResolvedNode> {
            Err(ConnectorError::Parse("unscripted".into()))
        }

        async fn list_children(&self, parent_id: &str, cursor: Option<&str>) -> Result<NodePage> {
            let key = (parent_id.to_string(), cursor.map(str::to_string));
            match self.pages.lock().unwrap().get(&key) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(message)) => Err(ConnectorError::Remote {
                    status: 500,
                    message: message.clone(),
                }),
                None => Ok(NodePage::default()),
            }
        }

        async fn create_export_task(&self, _node_id: &str, _format: &str) -> Result<String> {
            Err(ConnectorError::Parse("unscripted".into()))
        }

        async fn get_export_task(&self, _task_id: &str) -> Result<ExportTask> {
            Err(ConnectorError::Parse("unscripted".into()))
        }

        async fn download_document(&self, _node_id: &str) -> Result<String> {
            Err(ConnectorError::Parse("unscripted".into()))
        }

        async fn fetch(&self, _url: &str) -> Result<Bytes> {
            Err(ConnectorError::Parse("unscripted".into()))
        }
    }

    fn folder(id: &str, name: &str) -> ChildNode {
        ChildNode {
            id: id.into(),
            kind: NodeKind::Folder,
            name: name.into(),
            extension: None,
            export_key: None,
            updated_time_ms: None,
            has_children: true,
        }
    }

    fn doc(id: &str, name: &str) -> ChildNode {
        ChildNode {
            id: id.into(),
            kind: NodeKind::Doc,
            name: name.into(),
            extension: Some("adoc".into()),
            export_key: Some(format!("k-{id}")),
            updated_time_ms: Some(1_700_000_000_000),
            has_children: false,
        }
    }

    fn crawler(platform: ScriptedPlatform) -> TreeCrawler {
        TreeCrawler::new(Arc::new(platform), CrawlConfig::default())
    }

    #[tokio::test]
    async fn collects_items_with_ancestor_paths() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![folder("f1", "team"), doc("d1", "top")], None);
        platform.page("f1", None, vec![doc("d2", "nested")], None);

        let outcome = crawler(platform).crawl("root").await.unwrap();

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.seen_ids.len(), 2);
        let nested = outcome.items.iter().find(|i| i.id == "d2").unwrap();
        assert_eq!(nested.path_segments, vec!["team".to_string()]);
        let top = outcome.items.iter().find(|i| i.id == "d1").unwrap();
        assert!(top.path_segments.is_empty());
    }

    #[tokio::test]
    async fn leaf_with_children_is_descended_and_collected() {
        let platform = ScriptedPlatform::default();
        let mut parent_doc = doc("d1", "carrier");
        parent_doc.has_children = true;
        platform.page("root", None, vec![parent_doc], None);
        platform.page("d1", None, vec![doc("d2", "attachment")], None);

        let outcome = crawler(platform).crawl("root").await.unwrap();

        // The carrier doc itself is an item, and so is its child.
        assert!(outcome.seen_ids.contains("d1"));
        assert!(outcome.seen_ids.contains("d2"));
        let child = outcome.items.iter().find(|i| i.id == "d2").unwrap();
        assert_eq!(child.path_segments, vec!["carrier".to_string()]);
    }

    #[tokio::test]
    async fn pagination_follows_cursors_until_exhausted() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![doc("d1", "a")], Some("c1"));
        platform.page("root", Some("c1"), vec![doc("d2", "b")], Some("c2"));
        platform.page("root", Some("c2"), vec![doc("d3", "c")], None);

        let outcome = crawler(platform).crawl("root").await.unwrap();
        assert_eq!(outcome.items.len(), 3);
    }

    #[tokio::test]
    async fn cursor_cycle_terminates() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![doc("d1", "a")], Some("A"));
        platform.page("root", Some("A"), vec![doc("d2", "b")], Some("B"));
        // B points back to A: the loop must stop instead of spinning.
        platform.page("root", Some("B"), vec![doc("d3", "c")], Some("A"));

        let outcome = crawler(platform).crawl("root").await.unwrap();
        assert_eq!(outcome.items.len(), 3);
    }

    #[tokio::test]
    async fn stalled_cursor_terminates() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![doc("d1", "a")], Some("same"));
        platform.page("root", Some("same"), vec![doc("d2", "b")], Some("same"));

        let outcome = crawler(platform).crawl("root").await.unwrap();
        assert_eq!(outcome.items.len(), 2);
    }

    #[tokio::test]
    async fn empty_page_with_cursor_terminates() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![], Some("c1"));

        let outcome = crawler(platform).crawl("root").await.unwrap();
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn page_ceiling_truncates_listing() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![doc("d0", "a")], Some("c1"));
        platform.page("root", Some("c1"), vec![doc("d1", "b")], Some("c2"));
        platform.page("root", Some("c2"), vec![doc("d2", "c")], Some("c3"));
        platform.page("root", Some("c3"), vec![doc("d3", "d")], Some("c4"));

        let crawler = TreeCrawler::new(
            Arc::new(platform),
            CrawlConfig {
                max_pages_per_node: 2,
            },
        );
        let outcome = crawler.crawl("root").await.unwrap();
        // At most two pages are fetched per node, ceiling included.
        assert_eq!(outcome.items.len(), 2);
    }

    #[tokio::test]
    async fn listing_error_aborts_this_target() {
        let platform = ScriptedPlatform::default();
        platform.fail("root", None, "listing exploded");

        let result = crawler(platform).crawl("root").await;
        assert!(matches!(
            result,
            Err(ConnectorError::Remote { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn folders_are_not_items() {
        let platform = ScriptedPlatform::default();
        platform.page("root", None, vec![folder("f1", "only-folder")], None);

        let outcome = crawler(platform).crawl("root").await.unwrap();
        assert!(outcome.items.is_empty());
        assert!(outcome.seen_ids.is_empty());
    }
}
