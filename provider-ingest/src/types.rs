//! Wire types for the ingestion service API.
//!
//! Every endpoint wraps its payload in the same envelope:
//! `{ "code": 0, "data": ..., "message": "..." }` with `code != 0`
//! signalling an application-level failure even on HTTP 200.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub code: i64,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadedDocument {
    pub id: String,
}
