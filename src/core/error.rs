use thiserror::Error;

/// Errors surfaced by every layer of the SDK.
///
/// Each variant carries the HTTP status (when one was received) and a detail
/// payload (response body fragment) as plain optional fields, so callers can
/// distinguish "my credentials are wrong" from "the document was rejected"
/// from "the service is unreachable" without probing for attributes.
///
/// Only [`KsefError::Transport`] is safe to retry; the request pipeline
/// itself never retries — retry policy belongs to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KsefError {
    /// Bad or expired credentials, or a rejected bearer token.
    #[error("authentication failed{}", format_context(.status, .detail))]
    Authentication {
        /// HTTP status of the rejecting response, if one was received.
        status: Option<u16>,
        /// Response body fragment or validation message.
        detail: Option<String>,
    },

    /// Malformed request content (invalid NIP, malformed XML, bad URL,
    /// unsupported format value, or a malformed remote response).
    #[error("validation failed{}", format_context(.status, .detail))]
    Validation {
        /// HTTP status of the rejecting response, if one was received.
        status: Option<u16>,
        /// Response body fragment or validation message.
        detail: Option<String>,
    },

    /// Unknown resource identifier (e.g. an unregistered KSeF number).
    #[error("not found{}", format_context(.status, .detail))]
    NotFound {
        /// HTTP status of the rejecting response, if one was received.
        status: Option<u16>,
        /// Response body fragment.
        detail: Option<String>,
    },

    /// Network-level failure or an unclassified non-2xx response.
    /// `status` is `None` for connect/timeout failures.
    #[error("transport error{}", format_context(.status, .detail))]
    Transport {
        /// HTTP status, absent for connect/timeout failures.
        status: Option<u16>,
        /// Response body fragment or underlying cause description.
        detail: Option<String>,
        /// Underlying transport cause, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failure writing a downloaded invoice to disk.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KsefError {
    /// Authentication error without an HTTP status (local credential issue).
    pub fn authentication(detail: impl Into<String>) -> Self {
        Self::Authentication { status: None, detail: Some(detail.into()) }
    }

    /// Validation error without an HTTP status (construction-time failure).
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation { status: None, detail: Some(detail.into()) }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::Validation { status, .. }
            | Self::NotFound { status, .. }
            | Self::Transport { status, .. } => *status,
            Self::Io(_) | Self::Internal(_) => None,
        }
    }

    /// Detail payload carried by the error, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Authentication { detail, .. }
            | Self::Validation { detail, .. }
            | Self::NotFound { detail, .. }
            | Self::Transport { detail, .. } => detail.as_deref(),
            Self::Io(_) | Self::Internal(_) => None,
        }
    }
}

fn format_context(status: &Option<u16>, detail: &Option<String>) -> String {
    match (status, detail) {
        (Some(s), Some(d)) => format!(" (HTTP {s}): {d}"),
        (Some(s), None) => format!(" (HTTP {s})"),
        (None, Some(d)) => format!(": {d}"),
        (None, None) => String::new(),
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KsefError>;
