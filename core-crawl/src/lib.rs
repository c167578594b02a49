//! # Tree Crawler
//!
//! Paginated depth-first traversal of the remote workspace hierarchy.
//!
//! ## Overview
//!
//! The crawler walks one root at a time with an explicit LIFO frontier
//! stack, paging through each node's children via the platform's cursor
//! API. It produces a flat list of every non-folder item (with accumulated
//! ancestor path) plus the full set of non-folder ids seen. The id set
//! drives stale detection downstream and is independent of any export
//! filter.
//!
//! Traversal order is not a correctness guarantee; DFS only bounds frontier
//! memory to branch depth.

pub mod crawler;
pub mod item;

pub use crawler::{CrawlConfig, CrawlOutcome, TreeCrawler};
pub use item::{sanitize_name, SourceItem};
