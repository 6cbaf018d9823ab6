use crate::core::crypto::{self, rsa_public_key_from_jwk};
use crate::core::{
    base64_url_safe_no_pad, CoreJsonWebKey, CoreJsonWebKeyType, CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm,
};
use crate::helpers::plain_name;
use crate::jwt::{JsonWebTokenContentType, JsonWebTokenType};
use crate::key_resolver::{KeyResolutionError, KeyResolver};
use crate::{ClientSecret, JsonWebKey, JsonWebKeyId, PrivateDecryptionKey};

use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;


/// Error decrypting a JSON Web Encryption (JWE) token.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecryptionError {
    /// The token's `alg` or `enc` differs from the algorithm registered by the client.
    #[error("Algorithm mismatch: {0}")]
    AlgorithmMismatch(String),
    /// Content key unwrapping or authenticated decryption failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),
    /// The token is not a well-formed compact JWE.
    #[error("Malformed JWE: {0}")]
    Malformed(String),
    /// No key is available for recovering the content encryption key.
    #[error("No matching key found")]
    NoMatchingKey(#[source] KeyResolutionError),
    /// Unsupported key management, content encryption or compression algorithm.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    /// An unexpected error occurred.
    #[error("Other error: {0}")]
    Other(String),
}

/// Error producing a JSON Web Encryption (JWE) token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncryptionError {
    /// Content encryption failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),
    /// The recipient key cannot be used with the requested algorithm.
    #[error("Invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// Failed to serialize the JOSE header.
    #[error("Failed to serialize JWE header")]
    SerializationError(#[source] serde_json::Error),
    /// Unsupported key management or content encryption algorithm.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlg(String),
}

/// JOSE header of a compact JWE.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct JsonWebEncryptionHeader {
    /// Key management algorithm.
    pub alg: CoreJweKeyManagementAlgorithm,
    /// Content encryption algorithm.
    pub enc: CoreJweContentEncryptionAlgorithm,
    /// Compression algorithm applied before encryption. Not supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    /// ID of the client key the content key was encrypted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<JsonWebKeyId>,
    /// `JWT` when the plaintext is a nested signed token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<JsonWebTokenContentType>,
    /// Media type of the whole token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<JsonWebTokenType>,
    /// Extensions the recipient must understand. None are supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
}
impl JsonWebEncryptionHeader {
    /// Creates a header for the given algorithms.
    pub fn new(alg: CoreJweKeyManagementAlgorithm, enc: CoreJweContentEncryptionAlgorithm) -> Self {
        Self {
            alg,
            enc,
            zip: None,
            kid: None,
            cty: None,
            typ: None,
            crit: None,
        }
    }

    /// Sets the `cty` member.
    pub fn set_cty(mut self, cty: Option<JsonWebTokenContentType>) -> Self {
        self.cty = cty;
        self
    }

    /// Sets the `kid` member.
    pub fn set_kid(mut self, kid: Option<JsonWebKeyId>) -> Self {
        self.kid = kid;
        self
    }

    /// Sets the `zip` member.
    pub fn set_zip(mut self, zip: Option<String>) -> Self {
        self.zip = zip;
        self
    }
}

/// Compact JSON Web Encryption (JWE) token: five base64url segments holding the protected
/// header, encrypted key, initialization vector, ciphertext and authentication tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonWebEncryption {
    header: JsonWebEncryptionHeader,
    // Encoded header as received; it's the additional authenticated data.
    protected_header: String,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}
impl JsonWebEncryption {
    /// Encrypts `plaintext` for the holder of `recipient_key`.
    ///
    /// RSA key management (`RSA1_5`, `RSA-OAEP-256`) takes the recipient's public RSA key and
    /// generates a random content key. `dir` takes a symmetric key of exactly the content key
    /// length (see [`direct_key`](Self::direct_key)).
    pub fn new(
        plaintext: &[u8],
        header: JsonWebEncryptionHeader,
        recipient_key: &CoreJsonWebKey,
    ) -> Result<Self, EncryptionError> {
        let enc = header.enc.clone();
        let mut rng = rand::thread_rng();

        let (cek, encrypted_key) = match header.alg {
            CoreJweKeyManagementAlgorithm::Direct => {
                let key = match (recipient_key.key_type(), recipient_key.k.as_ref()) {
                    (CoreJsonWebKeyType::Symmetric, Some(k)) => k.to_vec(),
                    _ => {
                        return Err(EncryptionError::InvalidKey(
                            "`dir` requires a symmetric key".to_string(),
                        ))
                    }
                };
                (key, Vec::new())
            }
            CoreJweKeyManagementAlgorithm::RsaPkcs1V15
            | CoreJweKeyManagementAlgorithm::RsaOaepSha256 => {
                let public_key =
                    rsa_public_key_from_jwk(recipient_key).map_err(EncryptionError::InvalidKey)?;
                let mut cek = vec![0; enc.key_len()];
                rng.fill_bytes(&mut cek);
                let wrapped = if header.alg == CoreJweKeyManagementAlgorithm::RsaPkcs1V15 {
                    public_key.encrypt(&mut rng, rsa::Pkcs1v15Encrypt, &cek)
                } else {
                    public_key.encrypt(&mut rng, rsa::Oaep::new::<sha2::Sha256>(), &cek)
                }
                .map_err(|err| EncryptionError::CryptoError(err.to_string()))?;
                (cek, wrapped)
            }
            ref other => return Err(EncryptionError::UnsupportedAlg(plain_name(other))),
        };

        let header_json =
            serde_json::to_string(&header).map_err(EncryptionError::SerializationError)?;
        let protected_header = base64_url_safe_no_pad().encode(header_json);

        let mut iv = vec![0; enc.iv_len()];
        rng.fill_bytes(&mut iv);

        let (ciphertext, tag) = crypto::encrypt_content(
            &enc,
            &cek,
            &iv,
            protected_header.as_bytes(),
            plaintext,
        )
        .map_err(EncryptionError::CryptoError)?;

        Ok(Self {
            header,
            protected_header,
            encrypted_key,
            iv,
            ciphertext,
            tag,
        })
    }

    /// Returns the symmetric key that `dir` key management uses with `enc`, derived from the
    /// client secret as described in
    /// [Section 10.2 of OpenID Connect Core 1.0](
    /// https://openid.net/specs/openid-connect-core-1_0.html#Encryption).
    pub fn direct_key(
        client_secret: &ClientSecret,
        enc: &CoreJweContentEncryptionAlgorithm,
    ) -> CoreJsonWebKey {
        CoreJsonWebKey::new_symmetric(crypto::derive_direct_key(
            client_secret.secret().as_bytes(),
            enc.key_len(),
        ))
    }

    /// Parses a compact JWE without decrypting it.
    pub fn from_compact(token: &str) -> Result<Self, DecryptionError> {
        let parts = token.split('.').collect::<Vec<_>>();
        // NB: We avoid including the encrypted segments in the error output.
        if parts.len() != 5 {
            return Err(DecryptionError::Malformed(format!(
                "found {} parts (expected 5)",
                parts.len()
            )));
        }

        let decode = |segment: &str, name: &str| {
            base64_url_safe_no_pad()
                .decode(segment)
                .map_err(|err| DecryptionError::Malformed(format!("invalid base64url {name}: {err}")))
        };

        let header_json = decode(parts[0], "header")?;
        let header = serde_json::from_slice::<JsonWebEncryptionHeader>(&header_json)
            .map_err(|err| DecryptionError::Malformed(format!("failed to parse header: {err}")))?;

        Ok(Self {
            header,
            protected_header: parts[0].to_string(),
            encrypted_key: decode(parts[1], "encrypted key")?,
            iv: decode(parts[2], "initialization vector")?,
            ciphertext: decode(parts[3], "ciphertext")?,
            tag: decode(parts[4], "authentication tag")?,
        })
    }

    /// Returns the compact serialization of this token.
    pub fn to_compact(&self) -> String {
        let engine = base64_url_safe_no_pad();
        format!(
            "{}.{}.{}.{}.{}",
            self.protected_header,
            engine.encode(&self.encrypted_key),
            engine.encode(&self.iv),
            engine.encode(&self.ciphertext),
            engine.encode(&self.tag),
        )
    }

    /// Returns the JOSE header. It's integrity-protected only once decryption succeeds.
    pub fn unverified_header(&self) -> &JsonWebEncryptionHeader {
        &self.header
    }

    /// Authenticates and decrypts the token with an already-recovered content encryption key.
    fn decrypt_with_cek(&self, cek: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        crypto::decrypt_content(
            &self.header.enc,
            cek,
            &self.iv,
            self.protected_header.as_bytes(),
            &self.ciphertext,
            &self.tag,
        )
    }
}

/// Decrypts JWE responses addressed to this client.
///
/// The token must use exactly the key management and content encryption algorithms the client
/// registered; there is no algorithm negotiation.
pub(crate) struct DecryptionEngine<'a> {
    client_secret: Option<&'a ClientSecret>,
    expected_alg: &'a CoreJweKeyManagementAlgorithm,
    expected_enc: &'a CoreJweContentEncryptionAlgorithm,
    key_resolver: &'a dyn KeyResolver,
}
impl<'a> DecryptionEngine<'a> {
    /// Creates an engine for the client's registered `alg` and `enc`.
    pub(crate) fn new(
        key_resolver: &'a dyn KeyResolver,
        expected_alg: &'a CoreJweKeyManagementAlgorithm,
        expected_enc: &'a CoreJweContentEncryptionAlgorithm,
    ) -> Self {
        Self {
            client_secret: None,
            expected_alg,
            expected_enc,
            key_resolver,
        }
    }

    /// Sets the client secret from which `dir` keys are derived.
    pub(crate) fn set_client_secret(
        mut self,
        client_secret: Option<&'a ClientSecret>,
    ) -> Self {
        self.client_secret = client_secret;
        self
    }

    /// Decrypts a compact JWE, returning the plaintext.
    pub(crate) fn decrypt(&self, token: &str) -> Result<Vec<u8>, DecryptionError> {
        let jwe = JsonWebEncryption::from_compact(token)?;
        let header = jwe.unverified_header();

        if header.alg != *self.expected_alg {
            return Err(DecryptionError::AlgorithmMismatch(format!(
                "expected key management algorithm `{}` (found `{}`)",
                plain_name(self.expected_alg),
                plain_name(&header.alg),
            )));
        }
        if header.enc != *self.expected_enc {
            return Err(DecryptionError::AlgorithmMismatch(format!(
                "expected content encryption algorithm `{}` (found `{}`)",
                plain_name(self.expected_enc),
                plain_name(&header.enc),
            )));
        }
        if let Some(ref zip) = header.zip {
            return Err(DecryptionError::UnsupportedAlg(format!("zip `{}`", zip)));
        }
        // See https://tools.ietf.org/html/rfc7516#section-4.1.13.
        if header.crit.is_some() {
            return Err(DecryptionError::Malformed(
                "critical JWE header fields are unsupported".to_string(),
            ));
        }

        let cek = match header.alg {
            CoreJweKeyManagementAlgorithm::Direct => {
                if !jwe.encrypted_key.is_empty() {
                    return Err(DecryptionError::Malformed(
                        "encrypted key must be empty when using `dir`".to_string(),
                    ));
                }
                let client_secret = self.client_secret.ok_or_else(|| {
                    DecryptionError::NoMatchingKey(KeyResolutionError::NoMatchingKey(
                        "`dir` requires a client secret".to_string(),
                    ))
                })?;
                crypto::derive_direct_key(
                    client_secret.secret().as_bytes(),
                    header.enc.key_len(),
                )
            }
            ref alg => {
                let key = self
                    .key_resolver
                    .decryption_key(header.kid.as_ref(), alg)
                    .map_err(DecryptionError::NoMatchingKey)?;
                log::debug!(
                    "Unwrapping {} content key with key {:?}",
                    plain_name(alg),
                    key.key_id()
                );
                key.unwrap_content_key(alg, &header.enc, &jwe.encrypted_key)?
            }
        };

        jwe.decrypt_with_cek(&cek)
    }
}
