use crate::core::{
    crypto, CoreJweContentEncryptionAlgorithm, CoreJweKeyManagementAlgorithm,
    CoreJwsSigningAlgorithm as Alg,
};
use crate::helpers::{deserialize_option_or_none, plain_name, Base64UrlEncodedBytes};
use crate::jwe::DecryptionError;
use crate::types::jwks::check_key_compatibility;
use crate::{
    JsonWebKey, JsonWebKeyAlgorithm, JsonWebKeyId, JsonWebKeyType, JsonWebKeyUse,
    JsonWebTokenAlgorithm, PrivateDecryptionKey, PrivateSigningKey, SignatureVerificationError,
    SigningError,
};

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::{PublicKeyParts, SignatureScheme};
use rsa::{Pkcs1v15Sign, Pss};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;


/// Public or symmetric key expressed as a JSON Web Key.
///
/// Section 4 of RFC 7517 lets key types reuse member names with different meanings, and requires
/// unknown members to be ignored. Key parameters that fail to deserialize are therefore treated as
/// absent rather than failing the whole JWK set.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct CoreJsonWebKey {
    pub(crate) kty: CoreJsonWebKeyType,
    #[serde(rename = "use")]
    pub(crate) use_: Option<CoreJsonWebKeyUse>,
    pub(crate) kid: Option<JsonWebKeyId>,
    /// Algorithm the key is restricted to, if any. May name a JWE algorithm, in which case the
    /// key can't verify signatures.
    pub(crate) alg: Option<JsonWebTokenAlgorithm>,

    // RSA
    #[serde(default, deserialize_with = "deserialize_option_or_none")]
    pub(crate) n: Option<Base64UrlEncodedBytes>,
    #[serde(default, deserialize_with = "deserialize_option_or_none")]
    pub(crate) e: Option<Base64UrlEncodedBytes>,

    // EC and OKP
    #[serde(default, deserialize_with = "deserialize_option_or_none")]
    pub(crate) crv: Option<CoreJsonCurveType>,
    #[serde(default, deserialize_with = "deserialize_option_or_none")]
    pub(crate) x: Option<Base64UrlEncodedBytes>,
    #[serde(default, deserialize_with = "deserialize_option_or_none")]
    pub(crate) y: Option<Base64UrlEncodedBytes>,

    // Symmetric keys only ever come from the client secret, never from a provider's JWK set.
    #[serde(default, deserialize_with = "deserialize_option_or_none")]
    pub(crate) k: Option<Base64UrlEncodedBytes>,
}
impl CoreJsonWebKey {
    fn empty(kty: CoreJsonWebKeyType, kid: Option<JsonWebKeyId>) -> Self {
        Self {
            kty,
            use_: None,
            kid,
            alg: None,
            n: None,
            e: None,
            crv: None,
            x: None,
            y: None,
            k: None,
        }
    }

    /// Creates an RSA signature verification key from its big-endian modulus (`n`) and public
    /// exponent (`e`).
    ///
    /// Providers that publish more than one key must give each a key ID, which signed tokens
    /// reference in their `kid` header.
    pub fn new_rsa(n: Vec<u8>, e: Vec<u8>, kid: Option<JsonWebKeyId>) -> Self {
        Self {
            use_: Some(CoreJsonWebKeyUse::Signature),
            n: Some(Base64UrlEncodedBytes::new(n)),
            e: Some(Base64UrlEncodedBytes::new(e)),
            ..Self::empty(CoreJsonWebKeyType::RSA, kid)
        }
    }

    /// Restricts this key to the given signature algorithm.
    pub fn set_signing_alg(mut self, alg: Alg) -> Self {
        self.alg = Some(JsonWebTokenAlgorithm::Signature(alg));
        self
    }

    fn require_curve(&self, crv: CoreJsonCurveType) -> Result<(), SignatureVerificationError> {
        if self.crv.as_ref() == Some(&crv) {
            Ok(())
        } else {
            Err(SignatureVerificationError::InvalidKey(
                "Key uses different CRV than JWT".to_string(),
            ))
        }
    }

    fn verify_rsa<D>(
        &self,
        scheme: impl SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError>
    where
        D: Digest,
    {
        crypto::verify_rsa_signature(self, scheme, &D::digest(message), signature)
    }

    fn verify_hmac(
        &self,
        alg: &Alg,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError> {
        let secret = self.k.as_ref().ok_or_else(|| {
            SignatureVerificationError::InvalidKey("Symmetric key `k` is missing".to_string())
        })?;
        let expected = CoreHmacKey::new(secret.as_slice())
            .sign(alg, message)
            .map_err(|err| SignatureVerificationError::Other(err.to_string()))?;
        if bool::from(expected.as_slice().ct_eq(signature)) {
            Ok(())
        } else {
            Err(SignatureVerificationError::CryptoError("bad HMAC".to_string()))
        }
    }
}

impl JsonWebKey for CoreJsonWebKey {
    type KeyUse = CoreJsonWebKeyUse;
    type SigningAlgorithm = Alg;

    fn key_id(&self) -> Option<&JsonWebKeyId> {
        self.kid.as_ref()
    }
    fn key_type(&self) -> &CoreJsonWebKeyType {
        &self.kty
    }
    fn key_use(&self) -> Option<&CoreJsonWebKeyUse> {
        self.use_.as_ref()
    }

    fn new_symmetric(key: Vec<u8>) -> Self {
        Self {
            k: Some(Base64UrlEncodedBytes::new(key)),
            ..Self::empty(CoreJsonWebKeyType::Symmetric, None)
        }
    }

    fn verify_signature(
        &self,
        signature_alg: &Alg,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureVerificationError> {
        check_key_compatibility(self, signature_alg)
            .map_err(|e| SignatureVerificationError::InvalidKey(e.to_owned()))?;

        match *signature_alg {
            Alg::RsaSsaPkcs1V15Sha256 => {
                self.verify_rsa::<Sha256>(Pkcs1v15Sign::new::<Sha256>(), message, signature)
            }
            Alg::RsaSsaPkcs1V15Sha384 => {
                self.verify_rsa::<Sha384>(Pkcs1v15Sign::new::<Sha384>(), message, signature)
            }
            Alg::RsaSsaPkcs1V15Sha512 => {
                self.verify_rsa::<Sha512>(Pkcs1v15Sign::new::<Sha512>(), message, signature)
            }
            Alg::RsaSsaPssSha256 => self.verify_rsa::<Sha256>(Pss::new::<Sha256>(), message, signature),
            Alg::RsaSsaPssSha384 => self.verify_rsa::<Sha384>(Pss::new::<Sha384>(), message, signature),
            Alg::RsaSsaPssSha512 => self.verify_rsa::<Sha512>(Pss::new::<Sha512>(), message, signature),
            Alg::HmacSha256 | Alg::HmacSha384 | Alg::HmacSha512 => {
                self.verify_hmac(signature_alg, message, signature)
            }
            Alg::EcdsaP256Sha256 => {
                self.require_curve(CoreJsonCurveType::P256)?;
                crypto::verify_ec_signature(self, message, signature)
            }
            Alg::EcdsaP384Sha384 => {
                self.require_curve(CoreJsonCurveType::P384)?;
                crypto::verify_ec_signature(self, message, signature)
            }
            Alg::EdDsaEd25519 => {
                self.require_curve(CoreJsonCurveType::Ed25519)?;
                crypto::verify_ed_signature(self, message, signature)
            }
            ref other => Err(SignatureVerificationError::UnsupportedAlg(plain_name(other))),
        }
    }

    fn signing_alg(&self) -> JsonWebKeyAlgorithm<&Alg> {
        match self.alg {
            None => JsonWebKeyAlgorithm::Unspecified,
            Some(JsonWebTokenAlgorithm::Signature(ref alg)) => JsonWebKeyAlgorithm::Algorithm(alg),
            Some(_) => JsonWebKeyAlgorithm::Unsupported,
        }
    }
}

/// HMAC key derived from the client secret.
///
/// Providers sign `HS*` UserInfo responses with the client secret. Tests use this key to produce
/// such responses.
#[derive(Clone)]
pub struct CoreHmacKey {
    secret: Vec<u8>,
}
impl CoreHmacKey {
    /// Creates a key from the raw secret bytes.
    pub fn new<T>(secret: T) -> Self
    where
        T: Into<Vec<u8>>,
    {
        Self {
            secret: secret.into(),
        }
    }
}
impl PrivateSigningKey for CoreHmacKey {
    type VerificationKey = CoreJsonWebKey;

    fn sign(&self, signature_alg: &Alg, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        use hmac::{Hmac, Mac};

        fn finalize(mut mac: impl Mac, message: &[u8]) -> Vec<u8> {
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }

        let tag = match *signature_alg {
            Alg::HmacSha256 => Hmac::<Sha256>::new_from_slice(&self.secret)
                .map(|mac| finalize(mac, message)),
            Alg::HmacSha384 => Hmac::<Sha384>::new_from_slice(&self.secret)
                .map(|mac| finalize(mac, message)),
            Alg::HmacSha512 => Hmac::<Sha512>::new_from_slice(&self.secret)
                .map(|mac| finalize(mac, message)),
            ref other => return Err(SigningError::UnsupportedAlg(plain_name(other))),
        };
        tag.map_err(|err| SigningError::Other(format!("invalid HMAC key: {}", err)))
    }

    fn as_verification_key(&self) -> CoreJsonWebKey {
        CoreJsonWebKey::new_symmetric(self.secret.clone())
    }
}

fn rsa_private_key_from_pem(pem: &str) -> Result<rsa::RsaPrivateKey, String> {
    rsa::RsaPrivateKey::from_pkcs1_pem(pem).map_err(|err| err.to_string())
}

fn rsa_public_jwk(key_pair: &rsa::RsaPrivateKey, kid: Option<JsonWebKeyId>) -> CoreJsonWebKey {
    CoreJsonWebKey::new_rsa(key_pair.n().to_bytes_be(), key_pair.e().to_bytes_be(), kid)
}

/// RSA private key for signing tokens, such as a provider or claims provider would.
pub struct CoreRsaPrivateSigningKey {
    key_pair: rsa::RsaPrivateKey,
    kid: Option<JsonWebKeyId>,
}
impl CoreRsaPrivateSigningKey {
    /// Loads an RSA private key in PKCS#1 PEM format.
    pub fn from_pem(pem: &str, kid: Option<JsonWebKeyId>) -> Result<Self, String> {
        Ok(Self {
            key_pair: rsa_private_key_from_pem(pem)?,
            kid,
        })
    }

    fn rsa_sign<D>(&self, scheme: impl SignatureScheme, message: &[u8]) -> Result<Vec<u8>, SigningError>
    where
        D: Digest,
    {
        self.key_pair
            .sign_with_rng(&mut OsRng, scheme, &D::digest(message))
            .map_err(|_| SigningError::CryptoError)
    }
}
impl PrivateSigningKey for CoreRsaPrivateSigningKey {
    type VerificationKey = CoreJsonWebKey;

    fn sign(&self, signature_alg: &Alg, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        match *signature_alg {
            Alg::RsaSsaPkcs1V15Sha256 => {
                self.rsa_sign::<Sha256>(Pkcs1v15Sign::new::<Sha256>(), message)
            }
            Alg::RsaSsaPkcs1V15Sha384 => {
                self.rsa_sign::<Sha384>(Pkcs1v15Sign::new::<Sha384>(), message)
            }
            Alg::RsaSsaPkcs1V15Sha512 => {
                self.rsa_sign::<Sha512>(Pkcs1v15Sign::new::<Sha512>(), message)
            }
            Alg::RsaSsaPssSha256 => self.rsa_sign::<Sha256>(Pss::new::<Sha256>(), message),
            Alg::RsaSsaPssSha384 => self.rsa_sign::<Sha384>(Pss::new::<Sha384>(), message),
            Alg::RsaSsaPssSha512 => self.rsa_sign::<Sha512>(Pss::new::<Sha512>(), message),
            ref other => Err(SigningError::UnsupportedAlg(plain_name(other))),
        }
    }

    fn as_verification_key(&self) -> CoreJsonWebKey {
        rsa_public_jwk(&self.key_pair, self.kid.clone())
    }
}

/// RSA private key held by the client for decrypting JWE responses (`RSA1_5` and
/// `RSA-OAEP-256` key management).
pub struct CoreRsaPrivateDecryptionKey {
    key_pair: rsa::RsaPrivateKey,
    kid: Option<JsonWebKeyId>,
}
impl CoreRsaPrivateDecryptionKey {
    /// Loads an RSA private key in PKCS#1 PEM format.
    pub fn from_pem(pem: &str, kid: Option<JsonWebKeyId>) -> Result<Self, String> {
        Ok(Self {
            key_pair: rsa_private_key_from_pem(pem)?,
            kid,
        })
    }

    /// Returns the public half of this key as an encryption JWK, for publishing in the client's
    /// JWK set.
    pub fn as_encryption_key(&self) -> CoreJsonWebKey {
        CoreJsonWebKey {
            use_: Some(CoreJsonWebKeyUse::Encryption),
            ..rsa_public_jwk(&self.key_pair, self.kid.clone())
        }
    }
}
impl PrivateDecryptionKey for CoreRsaPrivateDecryptionKey {
    fn key_id(&self) -> Option<&JsonWebKeyId> {
        self.kid.as_ref()
    }

    fn allows_key_management_alg(&self, alg: &CoreJweKeyManagementAlgorithm) -> bool {
        matches!(
            *alg,
            CoreJweKeyManagementAlgorithm::RsaPkcs1V15 | CoreJweKeyManagementAlgorithm::RsaOaepSha256
        )
    }

    fn unwrap_content_key(
        &self,
        alg: &CoreJweKeyManagementAlgorithm,
        enc: &CoreJweContentEncryptionAlgorithm,
        encrypted_key: &[u8],
    ) -> Result<Vec<u8>, DecryptionError> {
        match *alg {
            CoreJweKeyManagementAlgorithm::RsaPkcs1V15 => {
                // RFC 7516 Section 11.5: to mitigate Bleichenbacher-style attacks, a failed
                // unwrap continues with a random CEK so the failure only surfaces at the
                // authentication tag check.
                match self
                    .key_pair
                    .decrypt_blinded(&mut OsRng, rsa::Pkcs1v15Encrypt, encrypted_key)
                {
                    Ok(cek) if cek.len() == enc.key_len() => Ok(cek),
                    _ => {
                        let mut cek = vec![0; enc.key_len()];
                        rand::RngCore::fill_bytes(&mut OsRng, &mut cek);
                        Ok(cek)
                    }
                }
            }
            CoreJweKeyManagementAlgorithm::RsaOaepSha256 => self
                .key_pair
                .decrypt_blinded(&mut OsRng, rsa::Oaep::new::<Sha256>(), encrypted_key)
                .map_err(|_| DecryptionError::CryptoError("failed to unwrap CEK".to_string())),
            ref other => Err(DecryptionError::UnsupportedAlg(plain_name(other))),
        }
    }
}

/// JWK `kty` values.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum CoreJsonWebKeyType {
    /// `EC`: NIST curve key (ES256, ES384).
    #[serde(rename = "EC")]
    EllipticCurve,
    /// `RSA`: RS* and PS* signatures, RSA key management.
    #[serde(rename = "RSA")]
    RSA,
    /// `OKP`: Edwards curve key (EdDSA).
    #[serde(rename = "OKP")]
    OctetKeyPair,
    /// `oct`: shared secret for HS* signatures.
    #[serde(rename = "oct")]
    Symmetric,
}
impl JsonWebKeyType for CoreJsonWebKeyType {}

/// JWK `crv` values.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum CoreJsonCurveType {
    /// NIST P-256.
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384.
    #[serde(rename = "P-384")]
    P384,
    /// NIST P-521. Parsed but never verifies, since ES512 isn't supported.
    #[serde(rename = "P-521")]
    P521,
    /// Edwards 25519.
    #[serde(rename = "Ed25519")]
    Ed25519,
}

/// JWK `use` values.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum CoreJsonWebKeyUse {
    /// `sig`: the key verifies signatures.
    Signature,
    /// `enc`: the key encrypts content keys.
    Encryption,
    /// Any other `use` value, which allows neither.
    Other(String),
}
impl From<String> for CoreJsonWebKeyUse {
    fn from(key_use: String) -> Self {
        match key_use.as_str() {
            "sig" => Self::Signature,
            "enc" => Self::Encryption,
            _ => Self::Other(key_use),
        }
    }
}
impl From<CoreJsonWebKeyUse> for String {
    fn from(key_use: CoreJsonWebKeyUse) -> Self {
        match key_use {
            CoreJsonWebKeyUse::Signature => "sig".to_string(),
            CoreJsonWebKeyUse::Encryption => "enc".to_string(),
            CoreJsonWebKeyUse::Other(other) => other,
        }
    }
}
impl JsonWebKeyUse for CoreJsonWebKeyUse {
    fn allows_signature(&self) -> bool {
        *self == Self::Signature
    }
    fn allows_encryption(&self) -> bool {
        *self == Self::Encryption
    }
}
