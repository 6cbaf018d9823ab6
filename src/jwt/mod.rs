use crate::core::{
    base64_url_safe_no_pad, CoreJweContentEncryptionAlgorithm, CoreJweKeyManagementAlgorithm,
    CoreJwsSigningAlgorithm,
};
use crate::{
    ClaimSet, JsonWebKey, JsonWebKeyId, PrivateSigningKey, SignatureVerificationError,
    SigningError,
};

use base64::Engine;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;
use thiserror::Error;

use std::fmt::Debug;


new_type![
    /// JOSE `cty` (content type) header value.
    #[derive(Deserialize, Eq, Hash, Ord, PartialOrd, Serialize)]
    JsonWebTokenContentType(String)
];

new_type![
    /// JOSE `typ` (type) header value.
    #[derive(Deserialize, Eq, Hash, Ord, PartialOrd, Serialize)]
    JsonWebTokenType(String)
];
impl JsonWebTokenType {
    /// Returns true if this is `JWT` or `application/jwt`, compared case-insensitively as
    /// required for media types.
    pub fn is_jwt(&self) -> bool {
        self.eq_ignore_ascii_case("JWT") || self.eq_ignore_ascii_case("application/jwt")
    }
}

/// Algorithm named by the `alg` member of a JSON Web Key.
///
/// A JWK may be restricted to a signature algorithm, a JWE key management algorithm, or (for
/// symmetric keys) a JWE content encryption algorithm.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum JsonWebTokenAlgorithm {
    /// Content encryption algorithm (`enc`).
    Encryption(CoreJweContentEncryptionAlgorithm),
    /// Key management algorithm (JWE `alg`).
    KeyManagement(CoreJweKeyManagementAlgorithm),
    /// Signature or MAC algorithm (JWS `alg`), including `none`.
    Signature(CoreJwsSigningAlgorithm),
}
impl<'de> Deserialize<'de> for JsonWebTokenAlgorithm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        // Case-sensitive, per RFC 7515 Section 4.1.1. JWS names win over JWE names.
        serde_plain::from_str(&name)
            .map(Self::Signature)
            .or_else(|_| serde_plain::from_str(&name).map(Self::KeyManagement))
            .or_else(|_| serde_plain::from_str(&name).map(Self::Encryption))
            .map_err(|_: serde_plain::Error| {
                D::Error::custom(format!("unrecognized JSON Web Algorithm `{}`", name))
            })
    }
}
impl Serialize for JsonWebTokenAlgorithm {
    fn serialize<SE>(&self, serializer: SE) -> Result<SE::Ok, SE::Error>
    where
        SE: Serializer,
    {
        match self {
            Self::Encryption(enc) => enc.serialize(serializer),
            Self::KeyManagement(alg) => alg.serialize(serializer),
            Self::Signature(alg) => alg.serialize(serializer),
        }
    }
}

/// JOSE header of a compact JWS.
///
/// Only the members relevant to UserInfo and aggregated claims tokens are kept. OpenID Connect
/// discourages `x5u`, `x5c`, `jku` and `jwk`, so keys always come from the key resolver.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct JsonWebTokenHeader {
    /// Signature algorithm. Unrecognized algorithms fail to deserialize.
    pub alg: CoreJwsSigningAlgorithm,
    /// Extensions the recipient must understand (RFC 7515 Section 4.1.11). None are supported,
    /// so verification rejects any token that sets this.
    pub crit: Option<Vec<String>>,
    /// Content type; `JWT` marks a nested token.
    pub cty: Option<JsonWebTokenContentType>,
    /// ID of the signing key.
    pub kid: Option<JsonWebKeyId>,
    /// Media type of the whole token.
    pub typ: Option<JsonWebTokenType>,
}
impl JsonWebTokenHeader {
    /// Creates a header with only the `alg` member set.
    pub fn new(alg: CoreJwsSigningAlgorithm) -> Self {
        Self {
            alg,
            crit: None,
            cty: None,
            kid: None,
            typ: None,
        }
    }

    /// Sets the `crit` member.
    pub fn set_crit(mut self, crit: Option<Vec<String>>) -> Self {
        self.crit = crit;
        self
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

    /// Sets the `typ` member.
    pub fn set_typ(mut self, typ: Option<JsonWebTokenType>) -> Self {
        self.typ = typ;
        self
    }
}

/// Error signing a new token.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JsonWebTokenError {
    /// The header or payload couldn't be encoded as JSON.
    #[error("failed to encode JWT as JSON")]
    SerializationError(#[source] serde_json::Error),
    /// The key refused to sign.
    #[error("failed to sign JWT")]
    SigningError(#[source] SigningError),
}

/// Error parsing a compact JWS.
///
/// Messages never echo segment contents, which may hold personal data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JwsParseError {
    /// Not three dot-separated segments (a compact JWE has five).
    #[error("found {0} parts (expected 3)")]
    WrongPartCount(usize),
    /// A segment isn't unpadded base64url.
    #[error("invalid base64url {segment}: {cause}")]
    InvalidBase64 {
        /// `header`, `payload` or `signature`.
        segment: &'static str,
        /// Decoder error.
        #[source]
        cause: base64::DecodeError,
    },
    /// The header isn't a JOSE header with a recognized `alg`.
    #[error("failed to parse header: {0}")]
    InvalidHeader(#[source] serde_json::Error),
    /// The payload isn't the expected JSON document.
    #[error("failed to parse payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

/// Compact JSON Web Signature (JWS) whose payload is a JSON document.
///
/// Parsing a token does not verify it. The payload is only released through
/// [`payload`](JsonWebToken::payload) once the signature checks out (or, for callers that have
/// already authenticated the token some other way, through the `unverified_*` accessors).
#[derive(Clone, Debug, PartialEq)]
pub struct JsonWebToken<P>
where
    P: Debug + DeserializeOwned + Serialize,
{
    header: JsonWebTokenHeader,
    payload: P,
    signature: Vec<u8>,
    // First two segments exactly as received, since re-encoding may not reproduce them.
    signing_input: String,
}

/// JSON Web Token carrying a set of claims, such as a signed UserInfo response or an aggregated
/// claims bundle.
pub type ClaimsJsonWebToken = JsonWebToken<ClaimSet>;

impl<P> JsonWebToken<P>
where
    P: Debug + DeserializeOwned + Serialize,
{
    /// Signs `payload` with the given key and algorithm. The header's `kid` is taken from the
    /// key.
    pub fn new<SK>(
        payload: P,
        signing_key: &SK,
        alg: &CoreJwsSigningAlgorithm,
    ) -> Result<Self, JsonWebTokenError>
    where
        SK: PrivateSigningKey,
        <SK as PrivateSigningKey>::VerificationKey:
            JsonWebKey<SigningAlgorithm = CoreJwsSigningAlgorithm>,
    {
        let kid = signing_key.as_verification_key().key_id().cloned();
        Self::new_with_header(
            JsonWebTokenHeader::new(alg.clone()).set_kid(kid),
            payload,
            signing_key,
        )
    }

    /// Signs `payload` under a caller-supplied JOSE header, using the header's `alg`.
    pub fn new_with_header<SK>(
        header: JsonWebTokenHeader,
        payload: P,
        signing_key: &SK,
    ) -> Result<Self, JsonWebTokenError>
    where
        SK: PrivateSigningKey,
        <SK as PrivateSigningKey>::VerificationKey:
            JsonWebKey<SigningAlgorithm = CoreJwsSigningAlgorithm>,
    {
        let alg = header.alg.clone();
        Self::assemble(header, payload, |signing_input| {
            signing_key
                .sign(&alg, signing_input)
                .map_err(JsonWebTokenError::SigningError)
        })
    }

    /// Creates an unsecured JWT (`alg` of `none`, empty signature).
    pub fn new_unsecured(payload: P) -> Result<Self, JsonWebTokenError> {
        Self::assemble(
            JsonWebTokenHeader::new(CoreJwsSigningAlgorithm::None),
            payload,
            |_| Ok(Vec::new()),
        )
    }

    fn assemble<F>(
        header: JsonWebTokenHeader,
        payload: P,
        sign: F,
    ) -> Result<Self, JsonWebTokenError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, JsonWebTokenError>,
    {
        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&payload)?);
        let signature = sign(signing_input.as_bytes())?;

        Ok(Self {
            header,
            payload,
            signature,
            signing_input,
        })
    }

    /// Parses a compact JWS without verifying it.
    pub fn from_compact(token: &str) -> Result<Self, JwsParseError> {
        let parts = token.split('.').collect::<Vec<_>>();
        let (header_b64, payload_b64, signature_b64) = match parts[..] {
            [header, payload, signature] => (header, payload, signature),
            _ => return Err(JwsParseError::WrongPartCount(parts.len())),
        };

        let decode = |segment: &'static str, encoded: &str| {
            base64_url_safe_no_pad()
                .decode(encoded)
                .map_err(|cause| JwsParseError::InvalidBase64 { segment, cause })
        };

        let header: JsonWebTokenHeader = serde_json::from_slice(&decode("header", header_b64)?)
            .map_err(JwsParseError::InvalidHeader)?;
        let payload: P = serde_json::from_slice(&decode("payload", payload_b64)?)
            .map_err(JwsParseError::InvalidPayload)?;
        let signature = decode("signature", signature_b64)?;

        Ok(Self {
            header,
            payload,
            signature,
            signing_input: format!("{}.{}", header_b64, payload_b64),
        })
    }

    /// Returns the compact serialization of this token.
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}",
            self.signing_input,
            base64_url_safe_no_pad().encode(&self.signature)
        )
    }

    /// Returns the JOSE header, which is untrusted until the signature is verified.
    pub fn unverified_header(&self) -> &JsonWebTokenHeader {
        &self.header
    }

    /// Returns the payload without checking the signature.
    pub fn unverified_payload(self) -> P {
        self.payload
    }

    /// Borrows the payload without checking the signature.
    pub fn unverified_payload_ref(&self) -> &P {
        &self.payload
    }

    /// Raw signature bytes (empty for unsecured tokens).
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Verifies the signature with `key` and returns the payload.
    pub fn payload<K>(
        self,
        signature_alg: &CoreJwsSigningAlgorithm,
        key: &K,
    ) -> Result<P, SignatureVerificationError>
    where
        K: JsonWebKey<SigningAlgorithm = CoreJwsSigningAlgorithm>,
    {
        key.verify_signature(signature_alg, self.signing_input.as_bytes(), &self.signature)?;
        Ok(self.payload)
    }
}
impl<'de, P> Deserialize<'de> for JsonWebToken<P>
where
    P: Debug + DeserializeOwned + Serialize,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let compact = String::deserialize(deserializer)?;
        Self::from_compact(&compact).map_err(D::Error::custom)
    }
}
impl<P> Serialize for JsonWebToken<P>
where
    P: Debug + DeserializeOwned + Serialize,
{
    fn serialize<SE>(&self, serializer: SE) -> Result<SE::Ok, SE::Error>
    where
        SE: Serializer,
    {
        serializer.serialize_str(&self.to_compact())
    }
}

fn encode_segment<T>(value: &T) -> Result<String, JsonWebTokenError>
where
    T: Serialize,
{
    serde_json::to_vec(value)
        .map(|json| base64_url_safe_no_pad().encode(json))
        .map_err(JsonWebTokenError::SerializationError)
}
