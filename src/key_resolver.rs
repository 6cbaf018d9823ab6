use crate::core::{
    CoreJsonWebKey, CoreJsonWebKeySet, CoreJweKeyManagementAlgorithm, CoreJwsSigningAlgorithm,
    CoreRsaPrivateDecryptionKey,
};
use crate::helpers::plain_name;
use crate::{IssuerUrl, JsonWebKey, JsonWebKeyId, PrivateDecryptionKey};

use thiserror::Error;

use std::collections::HashMap;

/// Error looking up a verification or decryption key.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyResolutionError {
    /// More than one key matches the supplied key constraints (e.g., key ID).
    #[error("Ambiguous key identification: {0}")]
    AmbiguousKeyId(String),
    /// No key matches the supplied key ID and algorithm.
    ///
    /// Clients should consider refreshing the issuer's JWK set to support
    /// [key rotation](https://openid.net/specs/openid-connect-core-1_0.html#RotateSigKeys).
    #[error("No matching key found: {0}")]
    NoMatchingKey(String),
    /// No keys are known for the issuer.
    #[error("Unknown issuer `{0}`")]
    UnknownIssuer(String),
}

/// Source of the keys used to verify signed responses and decrypt encrypted ones.
///
/// Implementations are shared read-only across concurrent resolutions. Caching and rotation of
/// the underlying key sets are up to the implementation.
pub trait KeyResolver: Send + Sync {
    /// Returns the key published by `issuer` for verifying `alg` signatures, selected by the JOSE
    /// header's key ID when one is present.
    fn signing_key(
        &self,
        issuer: &IssuerUrl,
        key_id: Option<&JsonWebKeyId>,
        alg: &CoreJwsSigningAlgorithm,
    ) -> Result<&CoreJsonWebKey, KeyResolutionError>;

    /// Returns the client's private key for unwrapping a content key with `alg`.
    fn decryption_key(
        &self,
        key_id: Option<&JsonWebKeyId>,
        alg: &CoreJweKeyManagementAlgorithm,
    ) -> Result<&CoreRsaPrivateDecryptionKey, KeyResolutionError>;
}

/// [`KeyResolver`] over fixed per-issuer JWK sets and a list of client decryption keys.
#[derive(Default)]
pub struct StaticKeyResolver {
    signing_keys: HashMap<IssuerUrl, CoreJsonWebKeySet>,
    decryption_keys: Vec<CoreRsaPrivateDecryptionKey>,
}
impl StaticKeyResolver {
    /// Creates a resolver with no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the JWK set used to verify tokens signed by `issuer`.
    pub fn set_issuer_keys(mut self, issuer: IssuerUrl, jwks: CoreJsonWebKeySet) -> Self {
        self.signing_keys.insert(issuer, jwks);
        self
    }

    /// Adds a private key for decrypting responses addressed to this client.
    pub fn add_decryption_key(mut self, key: CoreRsaPrivateDecryptionKey) -> Self {
        self.decryption_keys.push(key);
        self
    }
}
impl KeyResolver for StaticKeyResolver {
    fn signing_key(
        &self,
        issuer: &IssuerUrl,
        key_id: Option<&JsonWebKeyId>,
        alg: &CoreJwsSigningAlgorithm,
    ) -> Result<&CoreJsonWebKey, KeyResolutionError> {
        let jwks = self
            .signing_keys
            .get(issuer)
            .ok_or_else(|| KeyResolutionError::UnknownIssuer(issuer.to_string()))?;

        // Section 10.1 of OpenID Connect Core 1.0 requires a key ID whenever the JWK set holds
        // more than one eligible key.
        let keys = jwks.filter_keys(key_id, alg);
        match keys.as_slice() {
            [] => Err(KeyResolutionError::NoMatchingKey(format!(
                "no {} key{} published by `{}`",
                plain_name(alg),
                key_id
                    .map(|kid| format!(" with ID `{}`", **kid))
                    .unwrap_or_default(),
                issuer
            ))),
            [key] => Ok(*key),
            _ => Err(KeyResolutionError::AmbiguousKeyId(format!(
                "JWK set must only contain one eligible public key, but found {} eligible keys: {}",
                keys.len(),
                keys.iter()
                    .map(|key| key
                        .key_id()
                        .map(|kid| format!("`{}`", **kid))
                        .unwrap_or_else(|| "null ID".to_string()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    fn decryption_key(
        &self,
        key_id: Option<&JsonWebKeyId>,
        alg: &CoreJweKeyManagementAlgorithm,
    ) -> Result<&CoreRsaPrivateDecryptionKey, KeyResolutionError> {
        let keys = self
            .decryption_keys
            .iter()
            .filter(|key| key.allows_key_management_alg(alg))
            .filter(|key| key_id.is_none() || key_id == key.key_id())
            .collect::<Vec<_>>();
        match keys.as_slice() {
            [] => Err(KeyResolutionError::NoMatchingKey(format!(
                "no {} decryption key{}",
                plain_name(alg),
                key_id
                    .map(|kid| format!(" with ID `{}`", **kid))
                    .unwrap_or_default(),
            ))),
            [key] => Ok(*key),
            _ => Err(KeyResolutionError::AmbiguousKeyId(format!(
                "found {} eligible decryption keys",
                keys.len()
            ))),
        }
    }
}
