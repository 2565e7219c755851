//! Request signing hook
//!
//! The transport hands every outgoing request to a [`RequestSigner`] right
//! before dispatch, once per attempt. Signers add whatever the deployment
//! needs (bearer tokens, basic auth, HMAC headers) and may read credential
//! material through the [`CredentialFs`] handle.
//!
//! ```rust,ignore
//! use reqwest::header::{HeaderValue, AUTHORIZATION};
//! use sr_client::{CredentialFs, SchemaRegistryClient, ClientConfig};
//!
//! let signer = |fs: &CredentialFs, req: &mut reqwest::Request| {
//!     let token = fs.read_to_string("token")?;
//!     req.headers_mut()
//!         .insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token.trim()))?);
//!     Ok(())
//! };
//! let client = SchemaRegistryClient::with_signer(ClientConfig::default(), signer)?;
//! ```

use crate::error::BoxError;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Capability for signing outgoing registry requests
pub trait RequestSigner: Send + Sync {
    /// Mutate the request before it is sent. An error aborts the call.
    fn sign(&self, fs: &CredentialFs, request: &mut reqwest::Request) -> Result<(), BoxError>;
}

impl<F> RequestSigner for F
where
    F: Fn(&CredentialFs, &mut reqwest::Request) -> Result<(), BoxError> + Send + Sync,
{
    fn sign(&self, fs: &CredentialFs, request: &mut reqwest::Request) -> Result<(), BoxError> {
        self(fs, request)
    }
}

/// Signer that leaves requests untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl RequestSigner for NoopSigner {
    fn sign(&self, _fs: &CredentialFs, _request: &mut reqwest::Request) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Read-only filesystem handle for credential material
///
/// Paths are resolved relative to the root; absolute paths and `..`
/// components are rejected.
#[derive(Debug, Clone)]
pub struct CredentialFs {
    root: PathBuf,
}

impl CredentialFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Handle rooted at the process working directory
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path under the root
    pub fn resolve(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = path.as_ref();
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("path {:?} escapes credential root", path),
            ));
        }
        Ok(self.root.join(path))
    }

    pub fn read(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path)?)
    }
}

impl Default for CredentialFs {
    fn default() -> Self {
        Self::current_dir()
    }
}
