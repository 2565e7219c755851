//! HTTP transport for registry requests
//!
//! One [`Transport::send`] call issues a single logical request:
//!
//! 1. the relative path is appended to the base URL without re-escaping
//!    existing escape sequences, so an escaped slash (`%2F`) inside a subject
//!    segment reaches the registry as `%2F` and never as `%252F`
//! 2. exactly one content negotiation header is set (`Accept` for reads,
//!    `Content-Type` for writes)
//! 3. the [`RequestSigner`] is invoked before each attempt
//! 4. the request is dispatched under a bounded retry policy
//!
//! # Retry policy
//!
//! ```text
//!              ┌──────────────────────────────┐
//!              ▼                              │ attempt < MAX_ATTEMPTS
//!        ┌────────────┐  connection error  ┌──────────────────┐
//!   ───▶ │ Attempting │ ─────────────────▶ │ TransientFailure │
//!        └────────────┘                    └──────────────────┘
//!              │ 200 / 404 / other status         │ attempts exhausted
//!              ▼                                  ▼
//!        ┌──────────┐                      Err(Transport)
//!        │ Terminal │
//!        └──────────┘
//! ```
//!
//! A 404 is conclusive and returned to the caller as a response. Any other
//! non-200 status is terminal and surfaced as
//! [`SchemaError::UnexpectedStatus`]. Non-idempotent verbs (POST) are only
//! retried when the connection could not be established at all.

use crate::config::ClientConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::signer::{CredentialFs, NoopSigner, RequestSigner};
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

/// Maximum number of attempts per request
pub const MAX_ATTEMPTS: u32 = 3;

/// Media type of the registry API
pub const REGISTRY_MEDIA_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Characters escaped inside a single path segment: everything except
/// unreserved characters and the sub-delimiters safe in a segment. `/`, `%`,
/// `;` and `,` are escaped so a subject always occupies exactly one segment
/// and cannot be read as path parameters by the registry.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Percent-escape a value for use as one path segment
pub fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

// ============================================================================
// Dispatch seam
// ============================================================================

/// Response as received from the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Failure while dispatching a single attempt
#[derive(Debug, Clone)]
pub enum DispatchError {
    /// No connection could be established; the request never left the client
    Connect(String),
    /// The request failed after it may have reached the server (timeout, reset)
    Request(String),
    /// A response arrived but its body could not be read
    Body(String),
    /// The request could not be built or followed (builder, redirect, decode)
    Invalid(String),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Connect(msg) => write!(f, "connection failed: {}", msg),
            DispatchError::Request(msg) => write!(f, "request failed: {}", msg),
            DispatchError::Body(msg) => write!(f, "failed to read response body: {}", msg),
            DispatchError::Invalid(msg) => write!(f, "request error: {}", msg),
        }
    }
}

/// Map a reqwest failure onto the retry taxonomy
///
/// Only connection and in-flight request failures (including timeouts) are
/// transient; builder, redirect and decode errors repeat on every attempt.
fn classify(err: reqwest::Error) -> DispatchError {
    if err.is_connect() {
        DispatchError::Connect(err.to_string())
    } else if err.is_timeout() || err.is_request() {
        DispatchError::Request(err.to_string())
    } else {
        DispatchError::Invalid(err.to_string())
    }
}

/// Sends one prepared request
#[async_trait]
pub trait HttpDispatch: Send + Sync {
    async fn dispatch(&self, request: reqwest::Request) -> Result<RawResponse, DispatchError>;
}

/// [`HttpDispatch`] backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestDispatch {
    client: reqwest::Client,
}

impl ReqwestDispatch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build the HTTP client from configuration, applying TLS settings
    pub fn from_config(config: &ClientConfig) -> SchemaResult<Self> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl HttpDispatch for ReqwestDispatch {
    async fn dispatch(&self, request: reqwest::Request) -> Result<RawResponse, DispatchError> {
        let response = self.client.execute(request).await.map_err(classify)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| DispatchError::Body(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

fn read_pem(path: &std::path::Path, what: &str) -> SchemaResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| SchemaError::Config(format!("Failed to read {} {:?}: {}", what, path, e)))
}

/// Create the `reqwest` client used for registry traffic
pub fn build_http_client(config: &ClientConfig) -> SchemaResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout());

    if let Some(tls) = &config.tls {
        builder = builder.use_rustls_tls();

        if let Some(ca_path) = &tls.ca_cert {
            let pem = read_pem(ca_path, "CA certificate")?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                SchemaError::Config(format!("Failed to parse CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        match (&tls.client_cert, &tls.client_key) {
            (Some(cert_path), Some(key_path)) => {
                let mut pem = read_pem(cert_path, "client certificate")?;
                pem.push(b'\n');
                pem.extend(read_pem(key_path, "client key")?);
                let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                    SchemaError::Config(format!("Failed to parse client identity: {}", e))
                })?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(SchemaError::Config(
                    "client_cert and client_key must be configured together".to_string(),
                ))
            }
        }

        if tls.insecure_skip_verify {
            warn!("TLS certificate verification disabled for schema registry connections");
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| SchemaError::Config(format!("Failed to create HTTP client: {}", e)))
}

// ============================================================================
// Retry state machine
// ============================================================================

/// Successful outcome of [`Transport::send`]: status 200 or 404
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
    /// Attempts used, at most [`MAX_ATTEMPTS`]
    pub attempts: u32,
}

#[derive(Debug)]
enum RetryState {
    Attempting { attempt: u32 },
    TransientFailure { attempt: u32, message: String },
    Terminal(SchemaResult<Response>),
}

impl RetryState {
    /// Next state after the given attempt produced `outcome`
    fn after_attempt(
        attempt: u32,
        idempotent: bool,
        outcome: Result<RawResponse, DispatchError>,
    ) -> Self {
        match outcome {
            Ok(raw) if raw.status == StatusCode::OK || raw.status == StatusCode::NOT_FOUND => {
                RetryState::Terminal(Ok(Response {
                    status: raw.status,
                    body: raw.body,
                    attempts: attempt,
                }))
            }
            Ok(raw) => {
                let err = SchemaError::unexpected_status(raw.status.as_u16(), &raw.body);
                error!(attempt, status = raw.status.as_u16(), "{}", err);
                RetryState::Terminal(Err(err))
            }
            Err(DispatchError::Connect(message)) => {
                warn!(attempt, "request failed: {}", message);
                RetryState::TransientFailure { attempt, message }
            }
            Err(DispatchError::Request(message)) if idempotent => {
                warn!(attempt, "request failed: {}", message);
                RetryState::TransientFailure { attempt, message }
            }
            Err(e) => {
                error!(attempt, "{}", e);
                RetryState::Terminal(Err(SchemaError::Transport {
                    attempts: attempt,
                    message: e.to_string(),
                }))
            }
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    !matches!(*method, Method::POST | Method::PATCH)
}

fn negotiation_header(method: &Method) -> HeaderName {
    if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        CONTENT_TYPE
    } else {
        ACCEPT
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Registry HTTP transport
///
/// Cheap to clone; clones share the connection pool and signer.
#[derive(Clone)]
pub struct Transport {
    base_url: Url,
    dispatch: Arc<dyn HttpDispatch>,
    signer: Arc<dyn RequestSigner>,
    fs: CredentialFs,
    retry_backoff: Duration,
    cancel: CancellationToken,
}

impl Transport {
    /// Create a transport for `base_url` over the given dispatcher
    pub fn new(base_url: &str, dispatch: Arc<dyn HttpDispatch>) -> SchemaResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SchemaError::Config(format!("failed to parse url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SchemaError::Config(format!(
                "registry url {} cannot be used as a base",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            dispatch,
            signer: Arc::new(NoopSigner),
            fs: CredentialFs::current_dir(),
            retry_backoff: Duration::from_millis(100),
            cancel: CancellationToken::new(),
        })
    }

    /// Create a `reqwest`-backed transport from configuration
    pub fn from_config(config: &ClientConfig, signer: Arc<dyn RequestSigner>) -> SchemaResult<Self> {
        let dispatch = Arc::new(ReqwestDispatch::from_config(config)?);
        let fs = config
            .credentials_dir
            .clone()
            .map(CredentialFs::new)
            .unwrap_or_default();

        Ok(Self::new(&config.url, dispatch)?
            .with_signer(signer)
            .with_credentials(fs)
            .with_retry_backoff(config.retry_backoff()))
    }

    /// Set the request signer
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Set the filesystem handle passed to the signer
    pub fn with_credentials(mut self, fs: CredentialFs) -> Self {
        self.fs = fs;
        self
    }

    /// Set the delay between attempts
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Bind requests to a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Absolute URL for a relative, already segment-escaped path
    pub fn request_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        // `set_path` leaves existing %XX sequences alone, so `%2F` stays an
        // escaped slash instead of turning into `%252F`.
        url.set_path(&joined);
        url
    }

    fn prepare(&self, method: &Method, url: &Url, body: Option<&Bytes>) -> SchemaResult<reqwest::Request> {
        let mut request = reqwest::Request::new(method.clone(), url.clone());
        request.headers_mut().insert(
            negotiation_header(method),
            HeaderValue::from_static(REGISTRY_MEDIA_TYPE),
        );
        if let Some(body) = body {
            *request.body_mut() = Some(body.clone().into());
        }

        self.signer
            .sign(&self.fs, &mut request)
            .map_err(SchemaError::Signing)?;
        Ok(request)
    }

    /// Send a request, retrying transient failures up to [`MAX_ATTEMPTS`]
    ///
    /// Returns the response for status 200 and 404; every other status is an
    /// error.
    pub async fn send(&self, method: Method, path: &str, body: Option<Bytes>) -> SchemaResult<Response> {
        let url = self.request_url(path);
        let idempotent = is_idempotent(&method);
        let mut state = RetryState::Attempting { attempt: 1 };

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    let request = self.prepare(&method, &url, body.as_ref())?;
                    debug!(%method, %url, attempt, "sending registry request");

                    let outcome = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(SchemaError::Cancelled),
                        outcome = self.dispatch.dispatch(request) => outcome,
                    };
                    RetryState::after_attempt(attempt, idempotent, outcome)
                }
                RetryState::TransientFailure { attempt, message } => {
                    if attempt >= MAX_ATTEMPTS {
                        error!(%method, %url, attempts = attempt, "giving up: {}", message);
                        return Err(SchemaError::Transport {
                            attempts: attempt,
                            message,
                        });
                    }

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(SchemaError::Cancelled),
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                    RetryState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                RetryState::Terminal(result) => return result,
            };
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url.as_str())
            .field("retry_backoff", &self.retry_backoff)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
