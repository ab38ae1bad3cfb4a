//! Client error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or connection failure reported by the HTTP transport
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Status code outside the set the operation accepts
    #[error("HTTP {operation} - invalid response: {status}")]
    Protocol {
        operation: &'static str,
        status: u16,
    },

    /// The store answered 300 Multiple Choices on a path that does not resolve siblings
    #[error("not implemented: multiple choices ({operation})")]
    MultipleChoices { operation: &'static str },

    /// Body shape disagreed with what the operation expects
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or request parameters
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn protocol(operation: &'static str, status: u16) -> Self {
        Self::Protocol { operation, status }
    }

    /// Status code carried by the error, if the store answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::MultipleChoices { .. } => Some(300),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is the unhandled sibling case
    pub fn is_multiple_choices(&self) -> bool {
        matches!(self, Self::MultipleChoices { .. })
    }

    /// Check if the failure happened below HTTP (connect, TLS, body read)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
