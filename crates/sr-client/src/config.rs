//! Schema Registry client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Schema Registry client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registry base URL, may include a path prefix
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Delay between retry attempts in milliseconds (default: 100)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Root directory the request signer may read credential material from
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,

    /// TLS configuration; system defaults are used when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_retry_backoff() -> u64 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            retry_backoff_ms: default_retry_backoff(),
            credentials_dir: None,
            tls: None,
        }
    }
}

impl ClientConfig {
    /// Create config for the given registry URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set delay between retry attempts
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Set credential root directory
    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = Some(dir.into());
        self
    }

    /// Enable TLS
    pub fn with_tls(mut self, config: TlsConfig) -> Self {
        self.tls = Some(config);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// TLS configuration for registry connections
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to CA certificate file (PEM)
    pub ca_cert: Option<PathBuf>,

    /// Path to client certificate file (for mTLS, PEM)
    pub client_cert: Option<PathBuf>,

    /// Path to client key file (for mTLS, PEM)
    pub client_key: Option<PathBuf>,

    /// Skip server certificate verification (NOT recommended for production)
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Trust the given CA certificate
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Present a client certificate (mTLS)
    pub fn with_client_identity(
        mut self,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Disable server certificate verification
    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert", &self.ca_cert)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key.as_ref().map(|_| "[REDACTED]"))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}
