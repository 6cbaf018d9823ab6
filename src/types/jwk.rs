use crate::core::{CoreJweContentEncryptionAlgorithm, CoreJweKeyManagementAlgorithm};
use crate::jwe::DecryptionError;
use crate::{SignatureVerificationError, SigningError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use std::fmt::Debug;
use std::hash::Hash;

new_type![
    /// Key ID (`kid`) of a JSON Web Key, referenced by the `kid` header of JWS and JWE tokens.
    #[derive(Deserialize, Eq, Hash, Ord, PartialOrd, Serialize)]
    JsonWebKeyId(String)
];

/// Public key (or shared secret) able to verify JWS signatures.
pub trait JsonWebKey: Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Value of the `use` member.
    type KeyUse: JsonWebKeyUse;

    /// Signature algorithms this key type works with.
    type SigningAlgorithm: JwsSigningAlgorithm;

    /// The `kid` member, if any.
    fn key_id(&self) -> Option<&JsonWebKeyId>;

    /// The `kty` member.
    fn key_type(&self) -> &<Self::SigningAlgorithm as JwsSigningAlgorithm>::KeyType;

    /// The `use` member, if any.
    fn key_use(&self) -> Option<&Self::KeyUse>;

    /// The signature algorithm named by the `alg` member.
    ///
    /// A key whose `alg` names a JWE algorithm is [`Unsupported`](JsonWebKeyAlgorithm::Unsupported)
    /// for signatures. The `use` member must be checked separately.
    fn signing_alg(&self) -> JsonWebKeyAlgorithm<&Self::SigningAlgorithm>;

    /// Wraps raw bytes (such as the client secret) as a symmetric key.
    fn new_symmetric(key: Vec<u8>) -> Self;

    /// Checks `signature` over `message` with `signature_alg`, which must be compatible with this
    /// key's type, `use` and `alg`.
    fn verify_signature(
        &self,
        signature_alg: &Self::SigningAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError>;
}

/// What a key's `alg` member says about one kind of operation.
#[derive(Debug)]
pub enum JsonWebKeyAlgorithm<A: Debug> {
    /// The key may only be used with this algorithm.
    Algorithm(A),
    /// No `alg` member; any algorithm matching the key type is allowed.
    Unspecified,
    /// The `alg` member names an algorithm for a different kind of operation.
    Unsupported,
}

/// Private or symmetric key that produces JWS signatures.
pub trait PrivateSigningKey {
    /// Public key that verifies this key's signatures.
    type VerificationKey: JsonWebKey;

    /// Signs `message` with `signature_alg`.
    fn sign(
        &self,
        signature_alg: &<Self::VerificationKey as JsonWebKey>::SigningAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, SigningError>;

    /// Returns the public JWK for this key.
    fn as_verification_key(&self) -> Self::VerificationKey;
}

/// Private key held by the client for recovering the Content Encryption Key (CEK) of JSON Web
/// Encryption (JWE) responses addressed to it.
///
/// Symmetric (`dir`) decryption never goes through this trait; the shared key is derived from
/// the client secret instead.
pub trait PrivateDecryptionKey: Send + Sync {
    /// The key's `kid`, matched against the JWE header.
    fn key_id(&self) -> Option<&JsonWebKeyId>;

    /// Whether this key can unwrap content keys under `alg`.
    fn allows_key_management_alg(&self, alg: &CoreJweKeyManagementAlgorithm) -> bool;

    /// Decrypts the JWE Encrypted Key, returning the CEK for use with `enc`.
    fn unwrap_content_key(
        &self,
        alg: &CoreJweKeyManagementAlgorithm,
        enc: &CoreJweContentEncryptionAlgorithm,
        encrypted_key: &[u8],
    ) -> Result<Vec<u8>, DecryptionError>;
}

/// Value of the `kty` member.
pub trait JsonWebKeyType:
    Clone + Debug + DeserializeOwned + PartialEq + Serialize + Send + Sync + 'static
{
}

/// Value of the `use` member.
pub trait JsonWebKeyUse: Debug + DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Whether the key may verify signatures.
    fn allows_signature(&self) -> bool;

    /// Whether the key may be used for encryption.
    fn allows_encryption(&self) -> bool;
}

/// JSON Web Signature (JWS) algorithm.
pub trait JwsSigningAlgorithm:
    Clone + Debug + DeserializeOwned + Eq + Hash + PartialEq + Serialize + Send + Sync + 'static
{
    /// Key types the algorithms work with.
    type KeyType: JsonWebKeyType;

    /// The key type this algorithm requires, or `None` for `none`.
    fn key_type(&self) -> Option<Self::KeyType>;

    /// Whether this is an HMAC algorithm keyed by the client secret.
    fn uses_shared_secret(&self) -> bool;

    /// Whether this is the unsecured `none` algorithm.
    fn is_none(&self) -> bool;
}
