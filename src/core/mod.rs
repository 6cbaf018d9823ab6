use crate::types::jwk::JwsSigningAlgorithm;
use crate::types::jwks::JsonWebKeySet;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use serde::{Deserialize, Serialize};

pub use crate::core::jwk::{
    CoreHmacKey, CoreJsonCurveType, CoreJsonWebKey, CoreJsonWebKeyType, CoreJsonWebKeyUse,
    CoreRsaPrivateDecryptionKey, CoreRsaPrivateSigningKey,
};

pub(crate) mod crypto;

mod jwk;


/// Base64url engine that omits padding when encoding and tolerates it when decoding.
///
/// Some providers pad their JOSE segments despite RFC 7515 Section 2 forbidding it.
pub(crate) fn base64_url_safe_no_pad() -> GeneralPurpose {
    GeneralPurpose::new(
        &alphabet::URL_SAFE,
        NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
}

/// JSON Web Key Set document of a provider or claims provider, with
/// [`CoreJsonWebKey`] keys.
pub type CoreJsonWebKeySet = JsonWebKeySet<CoreJsonWebKey>;

/// JWE content encryption algorithm (`enc` header), per
/// [Section 5.1 of RFC 7518](https://tools.ietf.org/html/rfc7518#section-5.1).
///
/// Registered by the client as `userinfo_encrypted_response_enc`.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[non_exhaustive]
pub enum CoreJweContentEncryptionAlgorithm {
    /// `A128CBC-HS256`, the registration default when only `userinfo_encrypted_response_alg` is
    /// given.
    #[default]
    #[serde(rename = "A128CBC-HS256")]
    Aes128CbcHmacSha256,
    /// `A192CBC-HS384`.
    #[serde(rename = "A192CBC-HS384")]
    Aes192CbcHmacSha384,
    /// `A256CBC-HS512`.
    #[serde(rename = "A256CBC-HS512")]
    Aes256CbcHmacSha512,
    /// `A128GCM`.
    #[serde(rename = "A128GCM")]
    Aes128Gcm,
    /// `A192GCM`. Recognized but not supported for decryption.
    #[serde(rename = "A192GCM")]
    Aes192Gcm,
    /// `A256GCM`.
    #[serde(rename = "A256GCM")]
    Aes256Gcm,
}
impl CoreJweContentEncryptionAlgorithm {
    /// Length in bytes of the Content Encryption Key (CEK). The CBC-HMAC algorithms split it
    /// into a MAC key followed by an encryption key of equal length.
    pub fn key_len(&self) -> usize {
        use CoreJweContentEncryptionAlgorithm::*;

        match *self {
            Aes128Gcm => 16,
            Aes192Gcm => 24,
            Aes128CbcHmacSha256 | Aes256Gcm => 32,
            Aes192CbcHmacSha384 => 48,
            Aes256CbcHmacSha512 => 64,
        }
    }

    /// Length in bytes of the Initialization Vector.
    pub fn iv_len(&self) -> usize {
        use CoreJweContentEncryptionAlgorithm::*;

        match *self {
            Aes128CbcHmacSha256 | Aes192CbcHmacSha384 | Aes256CbcHmacSha512 => 16,
            Aes128Gcm | Aes192Gcm | Aes256Gcm => 12,
        }
    }
}

/// JWE key management algorithm (`alg` header), per
/// [Section 4.1 of RFC 7518](https://tools.ietf.org/html/rfc7518#section-4.1).
///
/// Registered by the client as `userinfo_encrypted_response_alg`. Every registered name parses
/// so that a response using an unexpected one fails decryption with a clear error. Only
/// `RSA1_5`, `RSA-OAEP-256` and `dir` can actually be decrypted.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[non_exhaustive]
pub enum CoreJweKeyManagementAlgorithm {
    /// `RSA1_5`: RSAES-PKCS1-v1_5.
    #[serde(rename = "RSA1_5")]
    RsaPkcs1V15,
    /// `RSA-OAEP`: RSAES OAEP with SHA-1. Not supported.
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    /// `RSA-OAEP-256`: RSAES OAEP with SHA-256 and MGF1 with SHA-256.
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaepSha256,
    /// `A128KW`.
    #[serde(rename = "A128KW")]
    AesKeyWrap128,
    /// `A192KW`.
    #[serde(rename = "A192KW")]
    AesKeyWrap192,
    /// `A256KW`.
    #[serde(rename = "A256KW")]
    AesKeyWrap256,
    /// `dir`: the CEK is derived from the client secret.
    #[serde(rename = "dir")]
    Direct,
    /// `ECDH-ES`.
    #[serde(rename = "ECDH-ES")]
    EcdhEs,
    /// `ECDH-ES+A128KW`.
    #[serde(rename = "ECDH-ES+A128KW")]
    EcdhEsAesKeyWrap128,
    /// `ECDH-ES+A192KW`.
    #[serde(rename = "ECDH-ES+A192KW")]
    EcdhEsAesKeyWrap192,
    /// `ECDH-ES+A256KW`.
    #[serde(rename = "ECDH-ES+A256KW")]
    EcdhEsAesKeyWrap256,
    /// `A128GCMKW`.
    #[serde(rename = "A128GCMKW")]
    Aes128Gcm,
    /// `A192GCMKW`.
    #[serde(rename = "A192GCMKW")]
    Aes192Gcm,
    /// `A256GCMKW`.
    #[serde(rename = "A256GCMKW")]
    Aes256Gcm,
    /// `PBES2-HS256+A128KW`.
    #[serde(rename = "PBES2-HS256+A128KW")]
    PbEs2HmacSha256AesKeyWrap128,
    /// `PBES2-HS384+A192KW`.
    #[serde(rename = "PBES2-HS384+A192KW")]
    PbEs2HmacSha384AesKeyWrap192,
    /// `PBES2-HS512+A256KW`.
    #[serde(rename = "PBES2-HS512+A256KW")]
    PbEs2HmacSha512AesKeyWrap256,
}
impl CoreJweKeyManagementAlgorithm {
    /// Whether the CEK is encrypted to the recipient's RSA public key.
    pub fn uses_rsa_key(&self) -> bool {
        matches!(
            *self,
            Self::RsaPkcs1V15 | Self::RsaOaep | Self::RsaOaepSha256
        )
    }
}

/// JWS signature algorithm (`alg` header), per
/// [Section 3.1 of RFC 7518](https://tools.ietf.org/html/rfc7518#section-3.1).
///
/// Registered by the client as `userinfo_signed_response_alg`. A header `alg` outside this list
/// fails to parse, so the token is reported as
/// [`MalformedResponse`](crate::user_info::UserInfoError::MalformedResponse) rather than
/// [`AlgorithmMismatch`](crate::user_info::UserInfoError::AlgorithmMismatch).
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[non_exhaustive]
pub enum CoreJwsSigningAlgorithm {
    /// `HS256`, keyed by the client secret.
    #[serde(rename = "HS256")]
    HmacSha256,
    /// `HS384`, keyed by the client secret.
    #[serde(rename = "HS384")]
    HmacSha384,
    /// `HS512`, keyed by the client secret.
    #[serde(rename = "HS512")]
    HmacSha512,
    /// `RS256`: RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    RsaSsaPkcs1V15Sha256,
    /// `RS384`: RSASSA-PKCS1-v1_5 with SHA-384.
    #[serde(rename = "RS384")]
    RsaSsaPkcs1V15Sha384,
    /// `RS512`: RSASSA-PKCS1-v1_5 with SHA-512.
    #[serde(rename = "RS512")]
    RsaSsaPkcs1V15Sha512,
    /// `ES256`: ECDSA with P-256 and SHA-256.
    #[serde(rename = "ES256")]
    EcdsaP256Sha256,
    /// `ES384`: ECDSA with P-384 and SHA-384.
    #[serde(rename = "ES384")]
    EcdsaP384Sha384,
    /// `ES512`: ECDSA with P-521 and SHA-512. Recognized but not supported.
    #[serde(rename = "ES512")]
    EcdsaP521Sha512,
    /// `PS256`: RSASSA-PSS with SHA-256.
    #[serde(rename = "PS256")]
    RsaSsaPssSha256,
    /// `PS384`: RSASSA-PSS with SHA-384.
    #[serde(rename = "PS384")]
    RsaSsaPssSha384,
    /// `PS512`: RSASSA-PSS with SHA-512.
    #[serde(rename = "PS512")]
    RsaSsaPssSha512,
    /// `EdDSA` over Ed25519.
    #[serde(rename = "EdDSA")]
    EdDsaEd25519,
    /// `none`: an unsecured JWT.
    ///
    /// Only acceptable when the client registered `none` itself. A token claiming `none` under
    /// any other registration is rejected, whatever its payload.
    #[serde(rename = "none")]
    None,
}
impl JwsSigningAlgorithm for CoreJwsSigningAlgorithm {
    type KeyType = CoreJsonWebKeyType;

    fn key_type(&self) -> Option<CoreJsonWebKeyType> {
        use CoreJwsSigningAlgorithm as Alg;

        Some(match *self {
            Alg::HmacSha256 | Alg::HmacSha384 | Alg::HmacSha512 => CoreJsonWebKeyType::Symmetric,
            Alg::RsaSsaPkcs1V15Sha256
            | Alg::RsaSsaPkcs1V15Sha384
            | Alg::RsaSsaPkcs1V15Sha512
            | Alg::RsaSsaPssSha256
            | Alg::RsaSsaPssSha384
            | Alg::RsaSsaPssSha512 => CoreJsonWebKeyType::RSA,
            Alg::EcdsaP256Sha256 | Alg::EcdsaP384Sha384 | Alg::EcdsaP521Sha512 => {
                CoreJsonWebKeyType::EllipticCurve
            }
            Alg::EdDsaEd25519 => CoreJsonWebKeyType::OctetKeyPair,
            Alg::None => return None,
        })
    }

    fn uses_shared_secret(&self) -> bool {
        self.key_type() == Some(CoreJsonWebKeyType::Symmetric)
    }

    fn is_none(&self) -> bool {
        *self == CoreJwsSigningAlgorithm::None
    }
}
