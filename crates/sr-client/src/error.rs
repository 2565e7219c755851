//! Schema Registry client errors

use thiserror::Error;

/// Boxed error returned by caller-supplied hooks (signers, visitors)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Upper bound on the response body kept in [`SchemaError::UnexpectedStatus`]
pub const MAX_ERROR_BODY_LEN: usize = 512;

/// Schema Registry client error types
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{0} not found by registry")]
    NotFound(String),

    #[error("request for {0} returned an empty body")]
    EmptyResponse(String),

    #[error("failed to parse response for {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}", unexpected_status_message(.status, .body))]
    UnexpectedStatus { status: u16, body: String },

    #[error("request failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("request signing failed: {0}")]
    Signing(#[source] BoxError),

    #[error(
        "duplicate reference '{name}' version mismatch of {seen} and {found}, aborting in order to avoid invalid state"
    )]
    VersionConflict { name: String, seen: u32, found: u32 },

    #[error("visitor failed for reference '{name}': {source}")]
    Visitor {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn unexpected_status_message(status: &u16, body: &str) -> String {
    if body.is_empty() {
        format!("status code {}", status)
    } else {
        format!("status code {}: {}", status, body)
    }
}

impl SchemaError {
    /// Build an [`SchemaError::UnexpectedStatus`] from a raw response body.
    ///
    /// The body is trimmed and cut down to [`MAX_ERROR_BODY_LEN`] bytes on a
    /// character boundary.
    pub fn unexpected_status(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim();
        let snippet = if trimmed.len() > MAX_ERROR_BODY_LEN {
            let mut end = MAX_ERROR_BODY_LEN;
            while !trimmed.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &trimmed[..end])
        } else {
            trimmed.to_string()
        };
        SchemaError::UnexpectedStatus {
            status,
            body: snippet,
        }
    }

    /// Whether the error is a transient transport failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchemaError::Transport { .. })
    }

    /// Whether the registry reported the entity as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::NotFound(_))
    }

    /// HTTP status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SchemaError::NotFound(_) => Some(404),
            SchemaError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for schema registry client operations
pub type SchemaResult<T> = Result<T, SchemaError>;
