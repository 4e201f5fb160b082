//! # Envelope Errors
//!
//! Every failure surfaced by the registry or the envelope engine. Each variant
//! carries a human-readable description of the specific problem.

use thiserror::Error;

/// Envelope error codes.
#[derive(Error, Debug)]
pub enum Error {
    /// The algorithm named by a key or header is not registered.
    #[error("{0}")]
    UnsupportedAlgorithm(String),

    /// The token does not have five well-formed base64url segments, or the
    /// header is not a JSON object.
    #[error("{0}")]
    MalformedToken(String),

    /// A header required by the protocol is absent.
    #[error("{0}")]
    MissingHeader(String),

    /// A header is present but has the wrong shape.
    #[error("{0}")]
    MalformedHeader(String),

    /// The `crit` header names an extension this engine does not understand.
    #[error("{0}")]
    UnsupportedCriticalExtension(String),

    /// The header `kid` does not identify the supplied private key.
    #[error("{0}")]
    KeyMismatch(String),

    /// The ciphertext and header could not be authenticated.
    #[error("{0}")]
    AuthenticationFailure(String),

    /// Two suites registered the same name with different capabilities.
    #[error("{0}")]
    DuplicateAlgorithm(String),

    /// No key constructor is registered for the DID key type.
    #[error("{0}")]
    UnsupportedKeyType(String),

    /// A capability failed for reasons other than authentication.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Stable code identifying the kind of failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            Self::MalformedToken(_) => "malformed_token",
            Self::MissingHeader(_) => "missing_header",
            Self::MalformedHeader(_) => "malformed_header",
            Self::UnsupportedCriticalExtension(_) => "unsupported_critical_extension",
            Self::KeyMismatch(_) => "key_mismatch",
            Self::AuthenticationFailure(_) => "authentication_failure",
            Self::DuplicateAlgorithm(_) => "duplicate_algorithm",
            Self::UnsupportedKeyType(_) => "unsupported_key_type",
            Self::Other(_) => "other",
        }
    }

    /// The error description.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::UnsupportedAlgorithm(msg)
            | Self::MalformedToken(msg)
            | Self::MissingHeader(msg)
            | Self::MalformedHeader(msg)
            | Self::UnsupportedCriticalExtension(msg)
            | Self::KeyMismatch(msg)
            | Self::AuthenticationFailure(msg)
            | Self::DuplicateAlgorithm(msg)
            | Self::UnsupportedKeyType(msg) => msg.clone(),
            Self::Other(err) => err.to_string(),
        }
    }
}
