//! Bridge error types and handling.

use std::error::Error as StdError;

use rmcp::model::{CallToolResult, Content};
use thiserror::Error;

/// Startup configuration errors.
///
/// Every variant is fatal: the server must not start serving requests
/// when configuration cannot be assembled.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Database ID was not provided
    #[error("Database ID is not set (METABASE_DATABASE_ID)")]
    MissingDatabaseId,
    /// Database ID is not an integer
    #[error("Database ID must be an integer, got '{0}' (METABASE_DATABASE_ID)")]
    InvalidDatabaseId(String),
    /// Metabase base URL was not provided
    #[error("Metabase host is not set (METABASE_HOST)")]
    MissingBaseUrl,
    /// Authentication credential was not provided
    #[error("Metabase credential is not set (METABASE_COOKIES)")]
    MissingCredential,
    /// Base URL failed to parse or is not http(s)
    #[error("Invalid Metabase host '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
    /// Timeout value is outside the valid range
    #[error("Timeout must be between 1 and 300 seconds, got {0}")]
    InvalidTimeout(u64),
    /// Authentication header name is not a valid HTTP header name
    #[error("Invalid authentication header name '{0}'")]
    InvalidHeaderName(String),
    /// Credential contains bytes that cannot be sent in a header
    #[error("Metabase credential contains characters not allowed in an HTTP header")]
    InvalidCredential,
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Reasons a tool call's arguments are rejected before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Arguments were absent or not a JSON object
    #[error("invalid arguments format")]
    NotAnObject,
    /// The `query` key is missing
    #[error("query is required and must be a string")]
    MissingQuery,
    /// The `query` key holds a non-string value
    #[error("query must be a string, got {found}")]
    NotAString {
        /// JSON type that was found instead
        found: &'static str,
    },
    /// The `query` string is empty
    #[error("query must not be empty")]
    EmptyQuery,
}

/// Per-request failures.
///
/// None of these fail the protocol call itself; each is rendered into a
/// tool-level error result via [`BridgeError::into_tool_result`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Input validation failed
    #[error(transparent)]
    Validation(#[from] ArgumentError),

    /// A JSON payload could not be encoded
    #[error("failed to {context}: {source}")]
    Serialization {
        /// What was being encoded
        context: &'static str,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Connection, DNS, TLS or timeout failure
    #[error("request failed: {message}")]
    Transport {
        /// Error chain description
        message: String,
        /// Whether the configured timeout elapsed
        timed_out: bool,
    },

    /// The response body could not be drained
    #[error("failed to read response: {message}")]
    Read {
        /// Error chain description
        message: String,
    },

    /// The caller cancelled the request before it completed
    #[error("request cancelled before Metabase responded")]
    Cancelled,

    /// The handler panicked
    #[error("tool handler panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string
        message: String,
    },
}

impl BridgeError {
    /// Creates a serialization error.
    #[inline]
    pub fn serialization(context: &'static str, source: serde_json::Error) -> Self {
        Self::Serialization { context, source }
    }

    /// Classifies a reqwest error raised while sending the request.
    pub fn transport(err: &reqwest::Error) -> Self {
        Self::Transport {
            message: describe(err),
            timed_out: err.is_timeout(),
        }
    }

    /// Classifies a reqwest error raised while reading the body.
    ///
    /// A timeout while draining the body is still a transport failure.
    pub fn read(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::transport(err);
        }
        Self::Read {
            message: describe(err),
        }
    }

    /// Builds an error from a caught panic payload.
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Renders the error as a tool-level error result.
    pub fn into_tool_result(self) -> CallToolResult {
        CallToolResult::error(vec![Content::text(self.to_string())])
    }
}

/// Joins an error and its sources into one line.
///
/// reqwest's top-level messages are generic ("error sending request"), the
/// useful part (connection refused, timed out) lives further down the chain.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_error_messages() {
        assert_eq!(
            ArgumentError::NotAnObject.to_string(),
            "invalid arguments format"
        );
        assert_eq!(
            ArgumentError::MissingQuery.to_string(),
            "query is required and must be a string"
        );
        assert_eq!(
            ArgumentError::NotAString { found: "number" }.to_string(),
            "query must be a string, got number"
        );
    }

    #[test]
    fn test_validation_is_transparent() {
        let err = BridgeError::from(ArgumentError::EmptyQuery);
        assert_eq!(err.to_string(), "query must not be empty");
    }

    #[test]
    fn test_into_tool_result_marks_error() {
        let result = BridgeError::Cancelled.into_tool_result();
        assert_eq!(result.is_error, Some(true));
        let text = result.content[0].as_text().unwrap();
        assert!(text.text.contains("cancelled"));
    }

    #[test]
    fn test_panicked_payloads() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        match BridgeError::panicked(boxed.as_ref()) {
            BridgeError::Panicked { message } => assert_eq!(message, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        match BridgeError::panicked(boxed.as_ref()) {
            BridgeError::Panicked { message } => assert_eq!(message, "owned boom"),
            other => panic!("unexpected error: {other:?}"),
        }

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        match BridgeError::panicked(boxed.as_ref()) {
            BridgeError::Panicked { message } => assert_eq!(message, "unknown panic payload"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::InvalidTimeout(0).to_string(),
            "Timeout must be between 1 and 300 seconds, got 0"
        );
        let err = ConfigError::InvalidBaseUrl {
            url: "ftp://metabase".to_string(),
            reason: "scheme must be http or https".to_string(),
        };
        assert!(err.to_string().contains("ftp://metabase"));
    }
}
