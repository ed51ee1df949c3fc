//! Error types for id-token-generator
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for id-token-generator operations
///
/// Covers configuration loading, OIDC discovery, the local callback
/// listener, and delivery of the obtained token.
#[derive(Error, Debug)]
pub enum IdTokenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fetching or interpreting the OIDC discovery document failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The callback request could not be parsed (bad `Content-Length`, body)
    #[error("Malformed callback request: {0}")]
    MalformedRequest(String),

    /// The identity provider redirected back with an `error` parameter
    #[error("Identity provider returned an error: {0}")]
    Provider(String),

    /// A well-formed callback POST did not carry an `id_token`
    #[error("Callback request did not contain an id_token")]
    MissingToken,

    /// No callback arrived within the configured wait
    #[error("Timed out after {seconds}s waiting for the identity provider redirect")]
    Timeout {
        /// The configured wait in seconds
        seconds: u64,
    },

    /// Loading the certificate or private key failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// The callback listener could not be started or stopped cleanly
    #[error("Callback listener error: {0}")]
    Listener(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for id-token-generator operations
///
/// Uses `anyhow::Error` so callers can attach context while the typed
/// [`IdTokenError`] stays recoverable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
