use crate::claims::ClaimSet;
use crate::core::CoreJwsSigningAlgorithm;
use crate::helpers::plain_name;
use crate::http_utils::{MIME_TYPE_JSON, MIME_TYPE_JWT};
use crate::jwe::DecryptionEngine;
use crate::jwt::ClaimsJsonWebToken;
use crate::verification::ClaimsVerificationError;
use crate::{HttpResponse, JwsSigningAlgorithm};

use http::header::CONTENT_TYPE;


/// UserInfo (or distributed claims) response body as received over the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawUserInfoResponse {
    content_type: Option<String>,
    body: Vec<u8>,
}
impl RawUserInfoResponse {
    /// Wraps a response body and its `Content-Type` header, if any.
    pub fn new(content_type: Option<String>, body: Vec<u8>) -> Self {
        Self { content_type, body }
    }

    /// The `Content-Type` header, parameters included.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
impl From<HttpResponse> for RawUserInfoResponse {
    fn from(response: HttpResponse) -> Self {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Self::new(content_type, response.into_body())
    }
}

/// Wire representation of a UserInfo response, after any decryption.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    /// Plain JSON claims.
    Plain(ClaimSet),
    /// Signed JWT whose signature hasn't been checked yet.
    Signed(ClaimsJsonWebToken),
    /// Signed JWT recovered from an encrypted response (nested sign-then-encrypt).
    EncryptedSigned(ClaimsJsonWebToken),
    /// JSON claims recovered from an encrypted response.
    EncryptedPlain(ClaimSet),
}

// Syntactic shape of a body, before it's checked against the client's registration.
enum Shape {
    Json(ClaimSet),
    Signed(String),
    Encrypted(String),
}

/// Classifies response bodies as plain JSON, signed JWT or encrypted JWT, decrypting the latter.
///
/// The shape must agree with what the client registered: a plain JSON response is rejected when
/// signing or encryption is configured, and a JWT is rejected when neither is.
pub(crate) struct ResponseEnvelopeParser<'a> {
    accept_signed: bool,
    accept_unsigned: bool,
    decryption_engine: Option<DecryptionEngine<'a>>,
    signed_response_alg: Option<&'a CoreJwsSigningAlgorithm>,
}
impl<'a> ResponseEnvelopeParser<'a> {
    /// Creates a parser for the client's registered `userinfo_signed_response_alg` and, when
    /// `userinfo_encrypted_response_alg` is registered, the engine that decrypts its responses.
    pub(crate) fn new(
        signed_response_alg: Option<&'a CoreJwsSigningAlgorithm>,
        decryption_engine: Option<DecryptionEngine<'a>>,
    ) -> Self {
        Self {
            accept_signed: false,
            accept_unsigned: false,
            decryption_engine,
            signed_response_alg,
        }
    }

    /// Accepts signed JWTs even if the client didn't register a signing algorithm. Claims
    /// providers sign their responses regardless of the client's UserInfo registration.
    pub(crate) fn set_accept_signed(mut self, accept_signed: bool) -> Self {
        self.accept_signed = accept_signed;
        self
    }

    /// Accepts plain JSON even if the client registered a signing algorithm.
    pub(crate) fn set_accept_unsigned(mut self, accept_unsigned: bool) -> Self {
        self.accept_unsigned = accept_unsigned;
        self
    }

    /// Parses (and, if needed, decrypts) a response.
    pub(crate) fn parse(
        &self,
        response: RawUserInfoResponse,
    ) -> Result<Envelope, ClaimsVerificationError> {
        match Self::classify(response.content_type(), response.body())? {
            Shape::Json(claims) => {
                if self.decryption_engine.is_some() {
                    return Err(ClaimsVerificationError::MalformedResponse(
                        "expected an encrypted response but received plain JSON".to_string(),
                    ));
                }
                self.check_unsigned_allowed("response")?;
                log::debug!("Parsed plain JSON response");
                Ok(Envelope::Plain(claims))
            }
            Shape::Signed(token) => {
                if self.decryption_engine.is_some() {
                    return Err(ClaimsVerificationError::MalformedResponse(
                        "expected an encrypted response but received a signed JWT".to_string(),
                    ));
                }
                self.check_signed_allowed()?;
                log::debug!("Parsed signed JWT response");
                Ok(Envelope::Signed(Self::parse_jws(&token)?))
            }
            Shape::Encrypted(token) => {
                let decryption_engine = self.decryption_engine.as_ref().ok_or_else(|| {
                    ClaimsVerificationError::MalformedResponse(
                        "received an encrypted JWT but no encryption is configured".to_string(),
                    )
                })?;
                let plaintext = decryption_engine
                    .decrypt(&token)
                    .map_err(ClaimsVerificationError::DecryptionFailed)?;
                log::debug!("Decrypted JWE response");

                match Self::classify(None, &plaintext)? {
                    Shape::Json(claims) => {
                        self.check_unsigned_allowed("decrypted payload")?;
                        Ok(Envelope::EncryptedPlain(claims))
                    }
                    Shape::Signed(token) => {
                        self.check_signed_allowed()?;
                        Ok(Envelope::EncryptedSigned(Self::parse_jws(&token)?))
                    }
                    Shape::Encrypted(_) => Err(ClaimsVerificationError::MalformedResponse(
                        "nested JWE payloads are unsupported".to_string(),
                    )),
                }
            }
        }
    }

    fn check_unsigned_allowed(&self, what: &str) -> Result<(), ClaimsVerificationError> {
        match self.signed_response_alg {
            Some(alg) if !alg.is_none() && !self.accept_unsigned => {
                Err(ClaimsVerificationError::MalformedResponse(format!(
                    "expected a {} signed JWT but {} is plain JSON",
                    plain_name(alg),
                    what
                )))
            }
            _ => Ok(()),
        }
    }

    fn check_signed_allowed(&self) -> Result<(), ClaimsVerificationError> {
        if self.signed_response_alg.is_none() && !self.accept_signed {
            Err(ClaimsVerificationError::MalformedResponse(
                "received a signed JWT but no signing algorithm is configured".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn parse_jws(token: &str) -> Result<ClaimsJsonWebToken, ClaimsVerificationError> {
        ClaimsJsonWebToken::from_compact(token).map_err(|err| {
            ClaimsVerificationError::MalformedResponse(format!("failed to parse JWT: {}", err))
        })
    }

    fn classify(content_type: Option<&str>, body: &[u8]) -> Result<Shape, ClaimsVerificationError> {
        // Media types are case-insensitive and may carry parameters such as charset.
        // See https://tools.ietf.org/html/rfc7231#section-3.1.1.1.
        let media_type = content_type.map(|content_type| {
            content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        });

        match media_type.as_deref() {
            Some(MIME_TYPE_JSON) => Self::parse_json(body).map(Shape::Json),
            Some(MIME_TYPE_JWT) => Self::parse_compact(body),
            _ if body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') => {
                Self::parse_json(body).map(Shape::Json)
            }
            _ => Self::parse_compact(body).map_err(|_| {
                ClaimsVerificationError::MalformedResponse(format!(
                    "response is neither a JSON object nor a compact JWT{}",
                    content_type
                        .map(|content_type| format!(" (Content-Type `{}`)", content_type))
                        .unwrap_or_default()
                ))
            }),
        }
    }

    fn parse_json(body: &[u8]) -> Result<ClaimSet, ClaimsVerificationError> {
        serde_path_to_error::deserialize::<_, ClaimSet>(&mut serde_json::Deserializer::from_slice(
            body,
        ))
        .map_err(|err| {
            ClaimsVerificationError::MalformedResponse(format!(
                "failed to parse JSON claims: {}",
                err
            ))
        })
    }

    fn parse_compact(body: &[u8]) -> Result<Shape, ClaimsVerificationError> {
        let token = std::str::from_utf8(body)
            .map_err(|_| {
                ClaimsVerificationError::MalformedResponse(
                    "JWT has invalid UTF-8 encoding".to_string(),
                )
            })?
            .trim();

        if !token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(ClaimsVerificationError::MalformedResponse(
                "JWT contains characters outside the base64url alphabet".to_string(),
            ));
        }

        match token.split('.').count() {
            3 => Ok(Shape::Signed(token.to_string())),
            5 => Ok(Shape::Encrypted(token.to_string())),
            n => Err(ClaimsVerificationError::MalformedResponse(format!(
                "compact JWT has {} segments (expected 3 or 5)",
                n
            ))),
        }
    }
}
