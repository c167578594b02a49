//! # Mapping Store
//!
//! Durable correspondence between source item ids and destination document
//! ids, persisted as one pretty-printed JSON object.
//!
//! ## Overview
//!
//! The store is an owned object constructed once with an injected file path;
//! callers hold and pass the instance rather than relying on process-global
//! state. A single mutex guards every operation and the in-memory map, so
//! the store may be shared between a scheduled run and a concurrently
//! running trigger. Hydration from disk is lazy: the first guarded operation
//! reads the file, and `load(reset = true)` forces a fresh read that
//! discards in-memory state.
//!
//! ## Durability
//!
//! `persist` writes the whole map to a temporary sibling file and renames it
//! over the target, so a half-written file is never observable. A missing
//! file, or one that fails to parse, loads as an empty map; the pipeline
//! stays operational, at the cost of re-uploading everything on genuine
//! corruption (the condition is logged at `warn`).

pub mod store;

pub use store::{MappingEntry, MappingStore, StoreError};
