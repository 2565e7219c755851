//! Schema Registry client - main interface
//!
//! Typed accessors for a Confluent-compatible registry:
//! - Schema lookup by global ID or by subject and version
//! - Subject and version listing
//! - Schema registration (single best-effort create call)
//! - Registry mode
//! - Reference closure resolution via [`ReferenceWalker`]

use crate::config::ClientConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::signer::{NoopSigner, RequestSigner};
use crate::transport::{escape_segment, Response, Transport};
use crate::types::{ModeResponse, SchemaInfo, SchemaReference, SchemaVersion};
use crate::walker::{ReferenceVisitor, ReferenceWalker, SchemaFetcher};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Client for a Confluent-compatible Schema Registry
///
/// Cheap to clone and safe to share across tasks; clones share one
/// connection pool. Independent reference walks may run concurrently
/// against the same client.
#[derive(Debug, Clone)]
pub struct SchemaRegistryClient {
    transport: Transport,
}

impl SchemaRegistryClient {
    /// Create a client that sends unsigned requests
    pub fn new(config: ClientConfig) -> SchemaResult<Self> {
        Self::with_signer(config, NoopSigner)
    }

    /// Create a client that signs every request attempt with `signer`
    pub fn with_signer(config: ClientConfig, signer: impl RequestSigner + 'static) -> SchemaResult<Self> {
        let transport = Transport::from_config(&config, Arc::new(signer))?;
        info!(url = %transport.base_url(), "Created schema registry client");
        Ok(Self { transport })
    }

    /// Create a client over a prepared transport
    pub fn from_transport(transport: Transport) -> Self {
        Self { transport }
    }

    /// Derive a handle whose requests abort when `token` is cancelled
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            transport: self.transport.clone().with_cancellation(token),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    async fn get(&self, path: &str, context: &str) -> SchemaResult<Response> {
        self.transport
            .send(Method::GET, path, None)
            .await
            .inspect_err(|e| error!("request failed for {}: {}", context, e))
    }

    /// Fetch and decode a single schema; 404 maps to `NotFound`
    async fn fetch_schema(&self, path: &str, context: String) -> SchemaResult<SchemaInfo> {
        let response = self.get(path, &context).await?;

        if response.status == StatusCode::NOT_FOUND {
            error!("{} not found by registry", context);
            return Err(SchemaError::NotFound(context));
        }
        if response.body.is_empty() {
            error!("request for {} returned an empty body", context);
            return Err(SchemaError::EmptyResponse(context));
        }
        decode(&response.body, context)
    }

    /// Get a schema by its global ID
    pub async fn schema_by_id(&self, id: u32) -> SchemaResult<SchemaInfo> {
        let mut info = self
            .fetch_schema(&format!("/schemas/ids/{}", id), format!("schema '{}'", id))
            .await?;
        if info.id == 0 {
            info.id = id;
        }

        debug!(id, references = info.references.len(), "Fetched schema by id");
        Ok(info)
    }

    /// Get a schema by subject and version (`SchemaVersion::latest()` for the newest)
    pub async fn schema_by_subject_version(
        &self,
        subject: &str,
        version: SchemaVersion,
    ) -> SchemaResult<SchemaInfo> {
        let path = format!(
            "/subjects/{}/versions/{}",
            escape_segment(subject),
            version
        );
        let context = format!("schema subject '{}' version {}", subject, version);
        let info = self.fetch_schema(&path, context).await?;

        debug!(
            subject = %subject,
            version = %version,
            id = info.id,
            references = info.references.len(),
            "Fetched schema by subject"
        );
        Ok(info)
    }

    /// Get the latest schema registered under a subject
    pub async fn latest_schema(&self, subject: &str) -> SchemaResult<SchemaInfo> {
        self.schema_by_subject_version(subject, SchemaVersion::latest())
            .await
    }

    /// List all registered subjects
    pub async fn list_subjects(&self) -> SchemaResult<Vec<String>> {
        let body = self.get_ok("/subjects", "subjects").await?;
        decode(&body, "subjects".to_string())
    }

    /// List the versions registered under a subject
    pub async fn list_versions(&self, subject: &str) -> SchemaResult<Vec<u32>> {
        let path = format!("/subjects/{}/versions", escape_segment(subject));
        let context = format!("versions of subject '{}'", subject);
        let body = self.get_ok(&path, &context).await?;
        decode(&body, context)
    }

    /// Get the registry mode (e.g. `READWRITE`, `READONLY`, `IMPORT`)
    pub async fn mode(&self) -> SchemaResult<String> {
        let body = self.get_ok("/mode", "mode").await?;
        let payload: ModeResponse = decode(&body, "mode".to_string())?;
        Ok(payload.mode)
    }

    /// Register a schema under a subject
    ///
    /// `payload` is the JSON body sent as-is (see
    /// [`CreateSchemaRequest`](crate::types::CreateSchemaRequest)). The
    /// response body is not interpreted.
    pub async fn create_schema(&self, subject: &str, payload: impl Into<Bytes>) -> SchemaResult<()> {
        let path = format!("/subjects/{}/versions", escape_segment(subject));
        let response = self
            .transport
            .send(Method::POST, &path, Some(payload.into()))
            .await
            .inspect_err(|e| error!(subject = %subject, "Failed to create schema: {}", e))?;

        require_ok(&response)?;
        info!(subject = %subject, attempts = response.attempts, "Created schema");
        Ok(())
    }

    /// Walk the reference closure of `references`, visiting each distinct
    /// reference name once
    pub async fn walk_references<V>(
        &self,
        references: &[SchemaReference],
        visitor: &mut V,
    ) -> SchemaResult<()>
    where
        V: ReferenceVisitor + ?Sized,
    {
        ReferenceWalker::new(self).walk(references, visitor).await
    }

    /// Fetch a schema and walk its references
    ///
    /// The root schema itself is returned rather than visited.
    pub async fn resolve<V>(
        &self,
        subject: &str,
        version: SchemaVersion,
        visitor: &mut V,
    ) -> SchemaResult<SchemaInfo>
    where
        V: ReferenceVisitor + ?Sized,
    {
        let root = self.schema_by_subject_version(subject, version).await?;
        self.walk_references(&root.references, visitor).await?;
        Ok(root)
    }

    async fn get_ok(&self, path: &str, context: &str) -> SchemaResult<Bytes> {
        let response = self.get(path, context).await?;
        require_ok(&response).inspect_err(|e| error!("request for {} failed: {}", context, e))?;
        Ok(response.body)
    }
}

#[async_trait]
impl SchemaFetcher for SchemaRegistryClient {
    async fn fetch_by_subject_version(
        &self,
        subject: &str,
        version: SchemaVersion,
    ) -> SchemaResult<SchemaInfo> {
        self.schema_by_subject_version(subject, version).await
    }
}

fn require_ok(response: &Response) -> SchemaResult<()> {
    if response.status == StatusCode::OK {
        Ok(())
    } else {
        Err(SchemaError::unexpected_status(
            response.status.as_u16(),
            &response.body,
        ))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], context: String) -> SchemaResult<T> {
    serde_json::from_slice(body).map_err(|source| {
        error!("failed to parse response for {}: {}", context, source);
        SchemaError::Decode { context, source }
    })
}
