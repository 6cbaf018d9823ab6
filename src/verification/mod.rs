use crate::claims::ClaimSet;
use crate::core::{CoreJsonWebKey, CoreJwsSigningAlgorithm};
use crate::helpers::{join_plain, plain_name};
use crate::jwe::DecryptionError;
use crate::jwt::{ClaimsJsonWebToken, JsonWebTokenHeader};
use crate::key_resolver::{KeyResolutionError, KeyResolver};
use crate::{
    ClaimSourceId, ClientId, ClientSecret, IssuerUrl, JsonWebKey, JwsSigningAlgorithm,
    SubjectIdentifier,
};

use thiserror::Error;

use std::borrow::Cow;


/// Error verifying a UserInfo response or one of its claim sources.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClaimsVerificationError {
    /// The response shape doesn't match what the client registered, or the response (or one of
    /// its JOSE headers or claim source descriptors) is structurally invalid.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The JWS `alg` header differs from the algorithm registered by the client.
    #[error("Algorithm mismatch: {0}")]
    AlgorithmMismatch(String),
    /// Failed to decrypt an encrypted response.
    #[error("Decryption failed")]
    DecryptionFailed(#[source] DecryptionError),
    /// The signature or MAC doesn't verify.
    #[error("Signature verification failed")]
    SignatureInvalid(#[source] SignatureVerificationError),
    /// No usable key was found for verifying the signature.
    #[error("Verification key not found")]
    KeyNotFound(#[source] KeyResolutionError),
    /// The response's `sub` claim is missing or differs from the established subject.
    #[error("userinfo sub mismatch: {0}")]
    SubMismatch(String),
    /// A claim can't be resolved from the claim sources it refers to.
    #[error("Unresolved claim source: {0}")]
    ClaimSourceUnresolved(String),
    /// The token embedded by an aggregated claim source failed verification.
    #[error("Failed to verify aggregated claims from source `{}`", source_id.as_str())]
    AggregatedVerificationFailed {
        /// Claim source whose token was rejected.
        source_id: ClaimSourceId,
        /// Why the token was rejected.
        #[source]
        cause: Box<ClaimsVerificationError>,
    },
    /// The `iss` claim doesn't identify the expected issuer.
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),
    /// The `aud` claim doesn't include this client.
    #[error("Invalid audiences: {0}")]
    InvalidAudience(String),
}

/// Error verifying a signature.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignatureVerificationError {
    /// Invalid signature for the supplied claims and signing key.
    #[error("Crypto error: {0}")]
    CryptoError(String),
    /// The supplied key cannot be used in this context. This may occur if the key type does not
    /// match the signature type (e.g., an RSA key used to validate an HMAC) or the JWK usage
    /// disallows signatures.
    #[error("Invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// No signature present but claims must be signed.
    #[error("No signature found")]
    NoSignature,
    /// Unsupported signature algorithm.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlg(String),
    /// An unexpected error occurred.
    #[error("Other error: {0}")]
    Other(String),
}

/// Signature algorithms a [`SignatureVerifier`] accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub(crate) enum SignatureAlgorithmPolicy {
    /// Only the given algorithm, which is typically the client's registered
    /// `userinfo_signed_response_alg`. This may be `none`.
    Exact(CoreJwsSigningAlgorithm),
    /// Any of the given algorithms except `none`, which is never accepted under this policy.
    AnyOf(Vec<CoreJwsSigningAlgorithm>),
}
impl SignatureAlgorithmPolicy {
    /// Accepts every supported signature algorithm other than `none`.
    pub(crate) fn any_signed() -> Self {
        SignatureAlgorithmPolicy::AnyOf(vec![
            CoreJwsSigningAlgorithm::HmacSha256,
            CoreJwsSigningAlgorithm::HmacSha384,
            CoreJwsSigningAlgorithm::HmacSha512,
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha384,
            CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha512,
            CoreJwsSigningAlgorithm::EcdsaP256Sha256,
            CoreJwsSigningAlgorithm::EcdsaP384Sha384,
            CoreJwsSigningAlgorithm::RsaSsaPssSha256,
            CoreJwsSigningAlgorithm::RsaSsaPssSha384,
            CoreJwsSigningAlgorithm::RsaSsaPssSha512,
            CoreJwsSigningAlgorithm::EdDsaEd25519,
        ])
    }

    fn check(&self, alg: &CoreJwsSigningAlgorithm) -> Result<(), ClaimsVerificationError> {
        match self {
            SignatureAlgorithmPolicy::Exact(expected) if expected == alg => Ok(()),
            SignatureAlgorithmPolicy::Exact(expected) => {
                Err(ClaimsVerificationError::AlgorithmMismatch(format!(
                    "expected `{}` (found `{}`)",
                    plain_name(expected),
                    plain_name(alg)
                )))
            }
            SignatureAlgorithmPolicy::AnyOf(allowed) if !alg.is_none() && allowed.contains(alg) => {
                Ok(())
            }
            SignatureAlgorithmPolicy::AnyOf(allowed) => {
                Err(ClaimsVerificationError::AlgorithmMismatch(format!(
                    "algorithm `{}` is not one of: {}",
                    plain_name(alg),
                    join_plain(allowed.iter().filter(|alg| !alg.is_none()))
                )))
            }
        }
    }
}

/// Verifies compact JWS tokens carrying claims: a signed UserInfo response, or a claims provider
/// token from an aggregated or distributed claim source.
///
/// The verifier never trusts the JOSE header's `alg` beyond comparing it against the
/// [`SignatureAlgorithmPolicy`]; the key is resolved from the verifier's own configuration.
pub(crate) struct SignatureVerifier<'a> {
    audience: Option<&'a ClientId>,
    check_issuer: bool,
    client_secret: Option<&'a ClientSecret>,
    issuer: &'a IssuerUrl,
    issuer_from_token: bool,
    key_resolver: &'a dyn KeyResolver,
    policy: SignatureAlgorithmPolicy,
}
impl<'a> SignatureVerifier<'a> {
    /// Creates a verifier that resolves asymmetric keys published by `issuer`.
    pub(crate) fn new(
        key_resolver: &'a dyn KeyResolver,
        issuer: &'a IssuerUrl,
        policy: SignatureAlgorithmPolicy,
    ) -> Self {
        Self {
            audience: None,
            check_issuer: false,
            client_secret: None,
            issuer,
            issuer_from_token: false,
            key_resolver,
            policy,
        }
    }

    /// Sets the client secret used as the key for HMAC algorithms.
    pub(crate) fn set_client_secret(
        mut self,
        client_secret: Option<&'a ClientSecret>,
    ) -> Self {
        self.client_secret = client_secret;
        self
    }

    /// Requires any `aud` claim to include the given client ID.
    pub(crate) fn set_audience(mut self, audience: Option<&'a ClientId>) -> Self {
        self.audience = audience;
        self
    }

    /// Requires any `iss` claim to equal the verifier's issuer.
    pub(crate) fn require_issuer_match(mut self, check_issuer: bool) -> Self {
        self.check_issuer = check_issuer;
        self
    }

    /// Resolves keys by the token's own `iss` claim, falling back to the verifier's issuer when
    /// the token has none. Claims providers sign with their own keys.
    pub(crate) fn set_issuer_from_token(mut self, issuer_from_token: bool) -> Self {
        self.issuer_from_token = issuer_from_token;
        self
    }

    pub(crate) fn validate_jose_header(
        jose_header: &JsonWebTokenHeader,
    ) -> Result<(), ClaimsVerificationError> {
        // The 'typ' header field must either be omitted or have the canonicalized value JWT.
        // See https://tools.ietf.org/html/rfc7519#section-5.1.
        if let Some(ref jwt_type) = jose_header.typ {
            if !jwt_type.is_jwt() {
                return Err(ClaimsVerificationError::MalformedResponse(format!(
                    "unexpected or unsupported JWT type `{}`",
                    **jwt_type
                )));
            }
        }

        // A nested token has already been unwrapped by the time its signature is checked, so
        // only `JWT` makes sense here.
        if let Some(ref content_type) = jose_header.cty {
            if !content_type.eq_ignore_ascii_case("JWT") {
                return Err(ClaimsVerificationError::MalformedResponse(format!(
                    "unexpected or unsupported JWT content type `{}`",
                    **content_type
                )));
            }
        }

        // No `crit` extensions are understood, so any token listing them is rejected
        // (RFC 7515 Section 4.1.11).
        if jose_header.crit.is_some() {
            return Err(ClaimsVerificationError::MalformedResponse(
                "critical JWT header fields are unsupported".to_string(),
            ));
        }
        Ok(())
    }

    /// Verifies the token and returns its claims.
    pub(crate) fn verified_claims(
        &self,
        jwt: ClaimsJsonWebToken,
    ) -> Result<ClaimSet, ClaimsVerificationError> {
        let signature_alg = {
            let jose_header = jwt.unverified_header();
            Self::validate_jose_header(jose_header)?;
            self.policy.check(&jose_header.alg)?;
            jose_header.alg.clone()
        };

        // NB: We must *not* trust the 'kid' (key ID) or 'alg' (algorithm) fields present in the
        // JOSE header, as an attacker could manipulate these while forging the JWT. The code
        // below must be secure regardless of how these fields are manipulated.

        let claims = if signature_alg.is_none() {
            // Only reachable when the client explicitly registered `none`.
            if !jwt.signature().is_empty() {
                return Err(ClaimsVerificationError::SignatureInvalid(
                    SignatureVerificationError::CryptoError(
                        "unsecured JWT must have an empty signature".to_string(),
                    ),
                ));
            }
            log::debug!("Accepting unsecured JWT");
            jwt.unverified_payload()
        } else if jwt.signature().is_empty() {
            return Err(ClaimsVerificationError::SignatureInvalid(
                SignatureVerificationError::NoSignature,
            ));
        } else if signature_alg.uses_shared_secret() {
            // The octets of the UTF-8 representation of the client_secret are the MAC key.
            // See https://openid.net/specs/openid-connect-core-1_0.html#Signing.
            let client_secret = self.client_secret.ok_or_else(|| {
                ClaimsVerificationError::KeyNotFound(KeyResolutionError::NoMatchingKey(format!(
                    "{} requires a client secret",
                    plain_name(&signature_alg)
                )))
            })?;
            let key = CoreJsonWebKey::new_symmetric(client_secret.secret().clone().into_bytes());
            jwt.payload(&signature_alg, &key)
                .map_err(ClaimsVerificationError::SignatureInvalid)?
        } else {
            let issuer = self.key_issuer(jwt.unverified_payload_ref())?;
            let public_key = self
                .key_resolver
                .signing_key(&issuer, jwt.unverified_header().kid.as_ref(), &signature_alg)
                .map_err(ClaimsVerificationError::KeyNotFound)?;
            log::debug!(
                "Verifying {} signature with key {:?} from `{}`",
                plain_name(&signature_alg),
                public_key.key_id(),
                issuer
            );
            jwt.payload(&signature_alg, public_key)
                .map_err(ClaimsVerificationError::SignatureInvalid)?
        };

        self.check_issuer_and_audience(&claims)?;
        Ok(claims)
    }

    fn key_issuer(&self, claims: &ClaimSet) -> Result<Cow<'a, IssuerUrl>, ClaimsVerificationError> {
        if !self.issuer_from_token {
            return Ok(Cow::Borrowed(self.issuer));
        }
        match claims.get("iss") {
            None => Ok(Cow::Borrowed(self.issuer)),
            Some(serde_json::Value::String(iss)) => IssuerUrl::new(iss.clone())
                .map(Cow::Owned)
                .map_err(|err| {
                    ClaimsVerificationError::MalformedResponse(format!(
                        "invalid `iss` claim `{}`: {}",
                        iss, err
                    ))
                }),
            Some(_) => Err(ClaimsVerificationError::MalformedResponse(
                "`iss` claim must be a string".to_string(),
            )),
        }
    }

    fn check_issuer_and_audience(&self, claims: &ClaimSet) -> Result<(), ClaimsVerificationError> {
        // Both claims are optional in UserInfo responses, but must be correct if present.
        // See https://openid.net/specs/openid-connect-core-1_0.html#UserInfoResponse.
        if self.check_issuer {
            if let Some(iss) = claims.get("iss") {
                if iss.as_str() != Some(self.issuer.as_str()) {
                    return Err(ClaimsVerificationError::InvalidIssuer(format!(
                        "expected `{}` (found {})",
                        **self.issuer, iss
                    )));
                }
            }
        }

        if let (Some(client_id), Some(aud)) = (self.audience, claims.get("aud")) {
            let audiences = match aud {
                serde_json::Value::String(aud) => vec![aud.as_str()],
                serde_json::Value::Array(auds) => auds
                    .iter()
                    .map(|aud| {
                        aud.as_str().ok_or_else(|| {
                            ClaimsVerificationError::InvalidAudience(format!(
                                "audience {} is not a string",
                                aud
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => {
                    return Err(ClaimsVerificationError::InvalidAudience(format!(
                        "`aud` claim must be a string or array (found {})",
                        other
                    )))
                }
            };

            log::debug!("Checking for `{}` in audiences {:?}", **client_id, audiences);
            if !audiences.iter().any(|aud| *aud == client_id.as_str()) {
                return Err(ClaimsVerificationError::InvalidAudience(format!(
                    "must contain `{}` (found audiences: {})",
                    **client_id,
                    audiences
                        .iter()
                        .map(|aud| format!("`{}`", aud))
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Checks that a UserInfo response describes the End-User the client already knows about.
///
/// Section 5.3.2 of OpenID Connect Core 1.0 requires the UserInfo `sub` to exactly match the
/// `sub` of the ID token, since the response may otherwise have been substituted.
#[derive(Clone, Debug)]
pub(crate) struct SubjectMatcher<'a> {
    expected_subject: Option<&'a SubjectIdentifier>,
}
impl<'a> SubjectMatcher<'a> {
    /// Creates a matcher for the established subject, if any. Without one, the response only
    /// needs to carry a `sub` claim.
    pub(crate) fn new(expected_subject: Option<&'a SubjectIdentifier>) -> Self {
        Self { expected_subject }
    }

    /// Returns the response's subject if it matches.
    pub(crate) fn verify(
        &self,
        claims: &ClaimSet,
    ) -> Result<SubjectIdentifier, ClaimsVerificationError> {
        let sub = match claims.get("sub") {
            Some(serde_json::Value::String(sub)) => SubjectIdentifier::new(sub.clone()),
            Some(other) => {
                return Err(ClaimsVerificationError::SubMismatch(format!(
                    "`sub` claim must be a string (found {})",
                    other
                )))
            }
            None => {
                return Err(ClaimsVerificationError::SubMismatch(
                    "missing `sub` claim".to_string(),
                ))
            }
        };

        match self.expected_subject {
            Some(expected) if *expected != sub => {
                Err(ClaimsVerificationError::SubMismatch(format!(
                    "expected `{}` (found `{}`)",
                    **expected, *sub
                )))
            }
            _ => Ok(sub),
        }
    }
}
