use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) mod jwk;
pub(crate) mod jwks;


/// Error signing a message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SigningError {
    /// Failed to sign the message using the given key and parameters.
    #[error("Crypto error")]
    CryptoError,
    /// Unsupported signature algorithm.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlg(String),
    /// An unexpected error occurred.
    #[error("Other error: {0}")]
    Other(String),
}

new_type![
    /// Identifier of a claim source listed in a `_claim_sources` object.
    #[derive(Deserialize, Eq, Hash, Ord, PartialOrd, Serialize)]
    ClaimSourceId(String)
];
impl AsRef<str> for ClaimSourceId {
    fn as_ref(&self) -> &str {
        self
    }
}

new_url_type![
    /// URL of a distributed claims endpoint.
    DistributedClaimsUrl
];

new_url_type![
    /// URL for the OpenID Connect Provider (or claims provider) issuing tokens.
    IssuerUrl
];

new_secret_type![
    /// String value used to associate a client session with an ID token.
    #[derive(Deserialize, Serialize)]
    Nonce(String)
];

new_type![
    /// Unique identifier for an End-User at the issuer.
    ///
    /// Compared by exact string equality; no normalization is ever applied.
    #[derive(Deserialize, Eq, Hash, Ord, PartialOrd, Serialize)]
    SubjectIdentifier(String)
];

new_url_type![
    /// URL for a provider's user info endpoint.
    UserInfoUrl
];
