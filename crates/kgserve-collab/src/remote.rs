//! Remote collaborator backed by a GraphRAG sidecar over HTTP.
//!
//! The sidecar wraps the actual inference/extraction SDK and the graph
//! store client; this side only speaks JSON to it. The credential is sent
//! per request in the `x-api-key` header.

use crate::error::CollabError;
use crate::schema::SchemaDoc;
use crate::traits::{GraphExtractor, GraphStore, SchemaDetector};
use async_trait::async_trait;
use kgserve_core::{ApiKey, GraphTarget, SourceRef};
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for the GraphRAG sidecar. Implements all three collaborator
/// seams against one base URL.
#[derive(Debug, Clone)]
pub struct RemoteCollaborator {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteCollaborator {
    /// Create a client for the sidecar at `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    srcs: &'a [SourceRef],
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct PersistRequest<'a> {
    host: &'a str,
    port: u16,
    graph: &'a str,
    schema: &'a SchemaDoc,
}

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    host: &'a str,
    port: u16,
    graph: &'a str,
    src: &'a SourceRef,
}

/// Map a non-2xx sidecar reply onto `CollabError::Service`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CollabError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(CollabError::Service {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SchemaDetector for RemoteCollaborator {
    async fn auto_detect(
        &self,
        sources: &[SourceRef],
        key: &ApiKey,
    ) -> Result<SchemaDoc, CollabError> {
        tracing::debug!(sources = sources.len(), "requesting schema detection");

        let response = self
            .client
            .post(self.endpoint("schema/auto_detect"))
            .header(API_KEY_HEADER, key.expose())
            .json(&DetectRequest { srcs: sources })
            .send()
            .await?;

        let body: DetectResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CollabError::InvalidResponse(e.to_string()))?;

        Ok(SchemaDoc::new(body.schema))
    }
}

#[async_trait]
impl GraphStore for RemoteCollaborator {
    async fn persist_schema(
        &self,
        target: &GraphTarget,
        schema: &SchemaDoc,
    ) -> Result<(), CollabError> {
        tracing::debug!(graph = %target.graph, "persisting schema");

        let response = self
            .client
            .post(self.endpoint("graph/save_schema"))
            .json(&PersistRequest {
                host: &target.host,
                port: target.port,
                graph: &target.graph,
                schema,
            })
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl GraphExtractor for RemoteCollaborator {
    async fn process_source(
        &self,
        target: &GraphTarget,
        source: &SourceRef,
        key: &ApiKey,
    ) -> Result<(), CollabError> {
        tracing::debug!(graph = %target.graph, %source, "processing source");

        let response = self
            .client
            .post(self.endpoint("kg/process_source"))
            .header(API_KEY_HEADER, key.expose())
            .json(&ProcessRequest {
                host: &target.host,
                port: target.port,
                graph: &target.graph,
                src: source,
            })
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
