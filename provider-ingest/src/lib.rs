//! # Ingestion Service Provider
//!
//! Implements the `IngestService` trait against a RAGFlow-style
//! ingestion/search HTTP API.
//!
//! ## Overview
//!
//! - Multipart document upload into a configured dataset
//! - Batched document deletion
//! - Batched parse (chunking) triggers with internal linear-backoff retries
//! - Per-document metadata updates
//!
//! All responses share one JSON envelope (`code`/`data`/`message`); a
//! non-zero `code` on an HTTP 200 is an application-level rejection.

pub mod client;
pub mod error;
mod types;

pub use client::{IngestClient, IngestClientConfig};
pub use error::{IngestApiError, Result};
