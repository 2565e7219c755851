//! # Schema Registry Client
//!
//! An async client for Confluent-compatible schema registries with
//! schema reference resolution.
//!
//! ## Features
//!
//! - **Typed accessors**: schemas by ID or subject/version, subject and
//!   version listings, registry mode, schema registration
//! - **Reference resolution**: depth-first walk of a schema's reference
//!   closure with cycle termination and version conflict detection
//! - **Bounded retries**: connection failures retried up to three attempts;
//!   404 and other statuses are never retried
//! - **Request signing**: pluggable hook invoked before every attempt
//! - **TLS**: custom CA, client identity (mTLS), optional verification bypass
//! - **Cancellation**: every request honours a `CancellationToken`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ReferenceWalker                                             │
//! │  └── depth-first walk, seen-map (name → version), visitor    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SchemaRegistryClient (implements SchemaFetcher)             │
//! │  ├── GET  /schemas/ids/{id}                                 │
//! │  ├── GET  /subjects/{subject}/versions/{version|latest}     │
//! │  ├── GET  /subjects, /subjects/{subject}/versions, /mode    │
//! │  └── POST /subjects/{subject}/versions                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport                                                   │
//! │  ├── URL assembly (escaped separators preserved)            │
//! │  ├── Content negotiation + RequestSigner                    │
//! │  └── Retry state machine over HttpDispatch (reqwest)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sr_client::{BoxError, ClientConfig, SchemaInfo, SchemaRegistryClient, SchemaVersion};
//!
//! let client = SchemaRegistryClient::new(ClientConfig::new("http://localhost:8081"))?;
//!
//! // Fetch orders-value v2 and every schema it depends on
//! let mut deps = Vec::new();
//! let mut visitor = |name: &str, info: &SchemaInfo| -> Result<(), BoxError> {
//!     deps.push((name.to_string(), info.schema.clone()));
//!     Ok(())
//! };
//! let root = client
//!     .resolve("orders-value", SchemaVersion::new(2), &mut visitor)
//!     .await?;
//! ```
//!
//! ## Reference Semantics
//!
//! Reference names must be unambiguous within one resolution: if the same
//! name appears twice with different versions the walk fails with
//! [`SchemaError::VersionConflict`] before the second occurrence is visited.

pub mod config;
pub mod error;
pub mod registry;
pub mod signer;
pub mod transport;
pub mod types;
pub mod walker;

// Re-exports for convenience
pub use config::{ClientConfig, TlsConfig};
pub use error::{BoxError, SchemaError, SchemaResult};
pub use registry::SchemaRegistryClient;
pub use signer::{CredentialFs, NoopSigner, RequestSigner};
pub use transport::{
    DispatchError, HttpDispatch, RawResponse, ReqwestDispatch, Response, Transport, MAX_ATTEMPTS,
};
pub use types::{CreateSchemaRequest, SchemaInfo, SchemaReference, SchemaType, SchemaVersion};
pub use walker::{ReferenceVisitor, ReferenceWalker, SchemaFetcher};
