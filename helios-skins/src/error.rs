//! Error types surfaced by the registry.

use crate::{verify::KeyError, Identity};

/// Why a refresh produced no record.
///
/// One outcome is shared by every caller waiting on the same refresh, hence `Clone`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The provider could not be reached after the retry policy was exhausted.
    #[error("upstream unavailable for {identity} after {attempts} attempts: {reason}")]
    UpstreamUnavailable {
        identity: Identity,
        attempts: usize,
        reason: String,
    },
    /// The provider affirmatively reported that the identity doesn't exist.
    #[error("identity {0} not found upstream")]
    IdentityNotFound(Identity),
    /// A payload was received but its signature didn't verify. It was not cached.
    #[error("textures for {0} failed signature verification")]
    VerificationFailed(Identity),
}

impl RefreshError {
    pub fn identity(&self) -> &Identity {
        match self {
            RefreshError::UpstreamUnavailable { identity, .. } => identity,
            RefreshError::IdentityNotFound(identity) => identity,
            RefreshError::VerificationFailed(identity) => identity,
        }
    }

    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, RefreshError::UpstreamUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RefreshError::IdentityNotFound(_))
    }

    pub fn is_verification_failed(&self) -> bool {
        matches!(self, RefreshError::VerificationFailed(_))
    }
}

/// Errors that can occur while building a [`Registry`](crate::Registry) from config.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// No verifier was configured; records could never be trusted.
    #[error("a texture verifier is required")]
    MissingVerifier,

    /// The configured verifier has no issuer key.
    #[error("verifier `{0}` needs a `public_key`")]
    MissingPublicKey(&'static str),

    #[error(transparent)]
    InvalidPublicKey(#[from] KeyError),

    /// An upstream endpoint is not an http(s) URL that paths can be appended to.
    #[error("invalid upstream endpoint `{0}`")]
    InvalidEndpoint(String),

    /// Failed to build the HTTP client (reqwest configuration).
    #[error("Failed to build the HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),
}
