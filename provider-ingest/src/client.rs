//! Ingestion service client.
//!
//! Implements `IngestService` against the service's dataset-scoped REST
//! API: multipart document upload, batched delete, batched parse triggers
//! with internal retries, and per-document metadata updates.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use connector_traits::IngestService;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestApiError, Result};
use crate::types::{ApiEnvelope, UploadedDocument};

#[derive(Debug, Clone)]
pub struct IngestClientConfig {
    /// Service base URL, e.g. `https://ragflow.internal`.
    pub base_url: String,
    /// Bearer token for the API.
    pub api_token: String,
    /// Dataset (knowledge base) receiving the documents.
    pub dataset_id: String,
    /// Attempts per parse trigger; delay grows linearly between them.
    pub parse_retries: u32,
    pub parse_retry_delay: Duration,
}

impl IngestClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            dataset_id: dataset_id.into(),
            parse_retries: 3,
            parse_retry_delay: Duration::from_secs(1),
        }
    }
}

pub struct IngestClient {
    http: reqwest::Client,
    config: IngestClientConfig,
}

impl IngestClient {
    pub fn new(config: IngestClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Dataset-scoped endpoint URL.
    fn endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/datasets/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.dataset_id,
            suffix
        )
    }

    async fn read_payload<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        parse_payload(status, &body)
    }

    async fn read_ack(response: reqwest::Response) -> Result<bool> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        parse_ack(status, &body)
    }

    /// One parse attempt; separated out so the retry loop stays readable.
    async fn trigger_parse_once(&self, doc_ids: &[String]) -> Result<bool> {
        let response = self
            .http
            .post(self.endpoint("chunks"))
            .bearer_auth(&self.config.api_token)
            .json(&json!({ "document_ids": doc_ids }))
            .send()
            .await?;
        Self::read_ack(response).await
    }
}

/// Interpret an envelope response that carries a payload.
fn parse_payload<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T> {
    let envelope = parse_envelope::<T>(status, body)?;
    envelope
        .data
        .ok_or_else(|| IngestApiError::Parse("envelope has no data field".into()))
}

/// Interpret an envelope response where only the code matters.
fn parse_ack(status: u16, body: &[u8]) -> Result<bool> {
    match parse_envelope::<Value>(status, body) {
        Ok(_) => Ok(true),
        Err(IngestApiError::Api {
            status_code: 200,
            message,
        }) => {
            // HTTP success with a non-zero envelope code: the service
            // processed and rejected the request.
            warn!(message = %message, "request rejected by service");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn parse_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<ApiEnvelope<T>> {
    if !(200..300).contains(&status) {
        return Err(IngestApiError::Api {
            status_code: status,
            message: String::from_utf8_lossy(body).into_owned(),
        });
    }
    let envelope: ApiEnvelope<T> = serde_json::from_slice(body)
        .map_err(|e| IngestApiError::Parse(format!("invalid envelope: {e}")))?;
    if envelope.code != 0 {
        return Err(IngestApiError::Api {
            status_code: status,
            message: envelope
                .message
                .unwrap_or_else(|| format!("service error code {}", envelope.code)),
        });
    }
    Ok(envelope)
}

#[async_trait]
impl IngestService for IngestClient {
    #[instrument(skip(self, bytes), fields(file_name = %file_name, size = bytes.len()))]
    async fn upload_document(
        &self,
        file_name: &str,
        bytes: Bytes,
    ) -> connector_traits::Result<String> {
        let part = multipart::Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("documents"))
            .bearer_auth(&self.config.api_token)
            .multipart(form)
            .send()
            .await
            .map_err(IngestApiError::from)?;

        let uploaded: Vec<UploadedDocument> = Self::read_payload(response).await?;
        let doc = uploaded
            .into_iter()
            .next()
            .ok_or_else(|| IngestApiError::Parse("upload response listed no documents".into()))?;
        info!(doc_id = %doc.id, "document uploaded");
        Ok(doc.id)
    }

    #[instrument(skip(self), fields(count = doc_ids.len()))]
    async fn delete_documents(&self, doc_ids: &[String]) -> connector_traits::Result<bool> {
        if doc_ids.is_empty() {
            return Ok(true);
        }
        let response = self
            .http
            .delete(self.endpoint("documents"))
            .bearer_auth(&self.config.api_token)
            .json(&json!({ "ids": doc_ids }))
            .send()
            .await
            .map_err(IngestApiError::from)?;
        let ok = Self::read_ack(response).await?;
        debug!(ok, "batch delete finished");
        Ok(ok)
    }

    #[instrument(skip(self), fields(count = doc_ids.len()))]
    async fn trigger_parse(&self, doc_ids: &[String]) -> connector_traits::Result<bool> {
        if doc_ids.is_empty() {
            return Ok(true);
        }
        let attempts = self.config.parse_retries.max(1);
        for attempt in 1..=attempts {
            match self.trigger_parse_once(doc_ids).await {
                Ok(true) => return Ok(true),
                Ok(false) => warn!(attempt, "parse trigger rejected"),
                Err(e) => {
                    let mapped = connector_traits::ConnectorError::from(e);
                    if mapped.is_fatal() {
                        return Err(mapped);
                    }
                    warn!(attempt, error = %mapped, "parse trigger failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.parse_retry_delay * attempt).await;
            }
        }
        Ok(false)
    }

    #[instrument(skip(self, fields), fields(doc_id = %doc_id))]
    async fn update_document_metadata(
        &self,
        doc_id: &str,
        fields: &Map<String, Value>,
    ) -> connector_traits::Result<bool> {
        let response = self
            .http
            .put(self.endpoint(&format!("documents/{doc_id}")))
            .bearer_auth(&self.config.api_token)
            .json(&json!({ "meta_fields": fields }))
            .send()
            .await
            .map_err(IngestApiError::from)?;
        Ok(Self::read_ack(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IngestClient {
        IngestClient::new(IngestClientConfig::new(
            "https://ragflow.internal/",
            "token",
            "ds-1",
        ))
    }

    #[test]
    fn endpoint_joins_base_dataset_and_suffix() {
        let client = client();
        assert_eq!(
            client.endpoint("documents"),
            "https://ragflow.internal/api/v1/datasets/ds-1/documents"
        );
        assert_eq!(
            client.endpoint("documents/d-9"),
            "https://ragflow.internal/api/v1/datasets/ds-1/documents/d-9"
        );
    }

    #[test]
    fn payload_parses_successful_envelope() {
        let body = br#"{"code": 0, "data": [{"id": "d-1"}]}"#;
        let docs: Vec<UploadedDocument> = parse_payload(200, body).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "d-1");
    }

    #[test]
    fn payload_rejects_non_zero_code() {
        let body = br#"{"code": 102, "message": "dataset not found"}"#;
        let result: Result<Vec<UploadedDocument>> = parse_payload(200, body);
        assert!(matches!(
            result,
            Err(IngestApiError::Api { status_code: 200, ref message }) if message == "dataset not found"
        ));
    }

    #[test]
    fn payload_rejects_http_failure_with_raw_body() {
        let result: Result<Vec<UploadedDocument>> = parse_payload(502, b"bad gateway");
        assert!(matches!(
            result,
            Err(IngestApiError::Api { status_code: 502, ref message }) if message == "bad gateway"
        ));
    }

    #[test]
    fn payload_rejects_malformed_json() {
        let result: Result<Vec<UploadedDocument>> = parse_payload(200, b"{ nope");
        assert!(matches!(result, Err(IngestApiError::Parse(_))));
    }

    #[test]
    fn payload_requires_a_data_field() {
        let result: Result<Vec<UploadedDocument>> = parse_payload(200, br#"{"code": 0}"#);
        assert!(matches!(result, Err(IngestApiError::Parse(_))));
    }

    #[test]
    fn envelope_tolerates_missing_data_and_message() {
        let envelope: ApiEnvelope<Vec<UploadedDocument>> =
            parse_envelope(200, br#"{"code": 0}"#).unwrap();
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
    }

    #[test]
    fn ack_is_true_on_code_zero() {
        assert!(parse_ack(200, br#"{"code": 0}"#).unwrap());
        assert!(parse_ack(200, br#"{"code": 0, "data": true}"#).unwrap());
    }

    #[test]
    fn ack_is_false_on_service_rejection() {
        let body = br#"{"code": 102, "message": "document locked"}"#;
        assert!(!parse_ack(200, body).unwrap());
    }

    #[test]
    fn ack_propagates_http_failures() {
        assert!(matches!(
            parse_ack(500, b"boom"),
            Err(IngestApiError::Api { status_code: 500, .. })
        ));
    }
}
