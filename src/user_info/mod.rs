use crate::claims::{ClaimSet, ClaimsUnpacker};
use crate::core::{
    CoreJweContentEncryptionAlgorithm, CoreJweKeyManagementAlgorithm, CoreJwsSigningAlgorithm,
};
use crate::envelope::{Envelope, RawUserInfoResponse, ResponseEnvelopeParser};
use crate::helpers::expires_at_from_now;
use crate::http_utils::{
    auth_bearer, form_encoded_access_token, MIME_TYPE_FORM_URLENCODED, MIME_TYPE_JSON,
    MIME_TYPE_JWT,
};
use crate::jwe::{DecryptionEngine, DecryptionError};
use crate::key_resolver::{KeyResolutionError, KeyResolver};
use crate::verification::{
    ClaimsVerificationError, SignatureAlgorithmPolicy, SignatureVerificationError,
    SignatureVerifier, SubjectMatcher,
};
use crate::{
    AccessToken, AsyncHttpClient, ClaimSourceId, ClientId, ClientSecret, DistributedClaimsUrl,
    HttpRequest, HttpResponse, IssuerUrl, JwsSigningAlgorithm, Nonce, RefreshToken,
    SubjectIdentifier, UserInfoUrl,
};

use chrono::{DateTime, Utc};
use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use http::method::Method;
use http::status::StatusCode;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::time::Duration;

#[cfg(test)]
mod tests;

// Section 2 of OpenID Connect Dynamic Client Registration 1.0.
const DEFAULT_ENCRYPTED_RESPONSE_ENC: CoreJweContentEncryptionAlgorithm =
    CoreJweContentEncryptionAlgorithm::Aes128CbcHmacSha256;

const ACCEPT_DISTRIBUTED_CLAIMS: &str = "application/jwt, application/json";

/// Algorithms and credentials a client registered for UserInfo responses.
///
/// Field names match the
/// [client registration metadata](https://openid.net/specs/openid-connect-registration-1_0.html#ClientMetadata),
/// so a profile can be deserialized from a registration response. The profile is fixed once the
/// client is configured.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClientSecurityProfile {
    client_id: ClientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<ClientSecret>,
    issuer: IssuerUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    userinfo_signed_response_alg: Option<CoreJwsSigningAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    userinfo_encrypted_response_alg: Option<CoreJweKeyManagementAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    userinfo_encrypted_response_enc: Option<CoreJweContentEncryptionAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claim_source_signing_algs: Option<Vec<CoreJwsSigningAlgorithm>>,
    #[serde(default)]
    accept_unsigned_distributed_claims: bool,
}
impl ClientSecurityProfile {
    /// Creates a profile that expects plain JSON UserInfo responses from `issuer`.
    pub fn new(client_id: ClientId, issuer: IssuerUrl) -> Self {
        Self {
            client_id,
            client_secret: None,
            issuer,
            userinfo_signed_response_alg: None,
            userinfo_encrypted_response_alg: None,
            userinfo_encrypted_response_enc: None,
            claim_source_signing_algs: None,
            accept_unsigned_distributed_claims: false,
        }
    }

    field_getters_setters![
        pub self [self] {
            set_client_id -> client_id[ClientId] ["client ID"],
            set_client_secret -> client_secret[Option<ClientSecret>]
                ["client secret (the HMAC key and the source of `dir` encryption keys)"],
            set_issuer -> issuer[IssuerUrl] ["issuer whose keys sign UserInfo responses"],
            set_userinfo_signed_response_alg ->
                userinfo_signed_response_alg[Option<CoreJwsSigningAlgorithm>]
                ["JWS algorithm UserInfo responses must be signed with"],
            set_userinfo_encrypted_response_alg ->
                userinfo_encrypted_response_alg[Option<CoreJweKeyManagementAlgorithm>]
                ["JWE key management algorithm UserInfo responses must be encrypted with"],
            set_userinfo_encrypted_response_enc ->
                userinfo_encrypted_response_enc[Option<CoreJweContentEncryptionAlgorithm>]
                ["JWE content encryption algorithm UserInfo responses must be encrypted with"],
            set_claim_source_signing_algs ->
                claim_source_signing_algs[Option<Vec<CoreJwsSigningAlgorithm>>]
                ["JWS algorithms accepted for aggregated and distributed claims"],
            set_accept_unsigned_distributed_claims -> accept_unsigned_distributed_claims[bool]
                ["unsigned distributed claims are accepted when UserInfo responses must be signed"],
        }
    ];

    /// Returns the key management and content encryption algorithms, if responses must be
    /// encrypted. The content encryption algorithm defaults to `A128CBC-HS256`.
    pub fn userinfo_encryption(
        &self,
    ) -> Option<(
        &CoreJweKeyManagementAlgorithm,
        &CoreJweContentEncryptionAlgorithm,
    )> {
        self.userinfo_encrypted_response_alg.as_ref().map(|alg| {
            (
                alg,
                self.userinfo_encrypted_response_enc
                    .as_ref()
                    .unwrap_or(&DEFAULT_ENCRYPTED_RESPONSE_ENC),
            )
        })
    }

    fn expects_jwt(&self) -> bool {
        self.userinfo_encrypted_response_alg.is_some()
            || matches!(self.userinfo_signed_response_alg, Some(ref alg) if !alg.is_none())
    }
}

/// How the access token is presented to the UserInfo endpoint
/// ([RFC 6750 Section 2](https://tools.ietf.org/html/rfc6750#section-2)).
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BearerDelivery {
    /// `Authorization: Bearer` request header.
    #[default]
    Header,
    /// `access_token` parameter in a form-encoded `POST` body.
    Body,
}

/// UserInfo endpoint and how to call it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserInfoEndpoint {
    url: UserInfoUrl,
    #[serde(default)]
    bearer_delivery: BearerDelivery,
    #[serde(default = "default_method", with = "serde_method")]
    method: Method,
}
impl UserInfoEndpoint {
    /// Creates an endpoint called with `GET` and the access token in the `Authorization` header.
    pub fn new(url: UserInfoUrl) -> Self {
        Self {
            url,
            bearer_delivery: BearerDelivery::Header,
            method: default_method(),
        }
    }

    field_getters_setters![
        pub self [self] {
            set_url -> url[UserInfoUrl] ["endpoint URL"],
            set_bearer_delivery -> bearer_delivery[BearerDelivery] ["access token delivery"],
            set_method -> method[Method] ["HTTP method (`GET` or `POST`)"],
        }
    ];
}

fn default_method() -> Method {
    Method::GET
}

mod serde_method {
    use http::method::Method;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let method = String::deserialize(deserializer)?;
        Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| D::Error::custom(format!("invalid HTTP method `{}`", method)))
    }

    pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(method.as_str())
    }
}

/// Claims of an already-verified ID token that UserInfo verification depends on.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IdTokenClaims {
    sub: SubjectIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<Nonce>,
}
impl IdTokenClaims {
    /// Creates the claims for an ID token issued for `sub`.
    pub fn new(sub: SubjectIdentifier) -> Self {
        Self { sub, nonce: None }
    }

    field_getters_setters![
        pub self [self] {
            set_sub -> sub[SubjectIdentifier] ["End-User identifier"],
            set_nonce -> nonce[Option<Nonce>] ["nonce bound to the authentication request"],
        }
    ];
}

/// Tokens obtained from the token endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenSet {
    access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<IdTokenClaims>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::helpers::serde_utc_seconds_opt"
    )]
    expires_at: Option<DateTime<Utc>>,
}
impl TokenSet {
    /// Creates a token set holding only an access token.
    pub fn new(access_token: AccessToken) -> Self {
        Self {
            access_token,
            id_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    field_getters_setters![
        pub self [self] {
            set_access_token -> access_token[AccessToken] ["access token"],
            set_id_token -> id_token[Option<IdTokenClaims>] ["verified ID token claims"],
            set_refresh_token -> refresh_token[Option<RefreshToken>] ["refresh token"],
            set_expires_at -> expires_at[Option<DateTime<Utc>>] ["access token expiry"],
        }
    ];

    /// Sets the access token expiry from a token response's relative `expires_in`.
    pub fn set_expires_in(mut self, expires_in: Option<&Duration>) -> Self {
        self.expires_at = expires_in.and_then(|expires_in| expires_at_from_now(*expires_in));
        self
    }
}

/// Error retrieving or verifying UserInfo claims.
#[derive(Debug)]
#[non_exhaustive]
pub enum UserInfoError<RE>
where
    RE: std::error::Error + 'static,
{
    /// The response shape doesn't match what the client registered, or the response is
    /// structurally invalid.
    MalformedResponse(String),
    /// The JWS `alg` header differs from the algorithm registered by the client.
    AlgorithmMismatch(String),
    /// Failed to decrypt an encrypted response.
    DecryptionFailed(DecryptionError),
    /// The signature or MAC doesn't verify.
    SignatureInvalid(SignatureVerificationError),
    /// No usable key was found for verifying the signature.
    KeyNotFound(KeyResolutionError),
    /// The response's `sub` claim is missing or differs from the established subject.
    SubMismatch(String),
    /// A claim can't be resolved from the claim sources it refers to.
    ClaimSourceUnresolved(String),
    /// The token embedded by an aggregated claim source failed verification.
    AggregatedVerificationFailed {
        /// Claim source whose token was rejected.
        source_id: ClaimSourceId,
        /// Why the token was rejected.
        cause: Box<ClaimsVerificationError>,
    },
    /// The `iss` claim doesn't identify the expected issuer.
    InvalidIssuer(String),
    /// The `aud` claim doesn't include this client.
    InvalidAudience(String),
    /// Fetching or verifying the claims of a distributed claim source failed.
    DistributedFetchFailed {
        /// Claim source that failed.
        source_id: ClaimSourceId,
        /// Why the source failed.
        cause: Box<UserInfoError<RE>>,
    },
    /// An error occurred while sending the request or receiving the response (e.g., network
    /// connectivity failed).
    Request(RE),
    /// Server returned an invalid response.
    Response(StatusCode, Vec<u8>, String),
    /// An unexpected error occurred.
    Other(String),
}

// Not derived with thiserror: the recursive `cause` would make the inferred
// `Box<UserInfoError<RE>>: Error` bound cyclic.
impl<RE> std::fmt::Display for UserInfoError<RE>
where
    RE: std::error::Error + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Self::AlgorithmMismatch(msg) => write!(f, "Algorithm mismatch: {}", msg),
            Self::DecryptionFailed(_) => f.write_str("Decryption failed"),
            Self::SignatureInvalid(_) => f.write_str("Signature verification failed"),
            Self::KeyNotFound(_) => f.write_str("Verification key not found"),
            Self::SubMismatch(msg) => write!(f, "userinfo sub mismatch: {}", msg),
            Self::ClaimSourceUnresolved(msg) => write!(f, "Unresolved claim source: {}", msg),
            Self::AggregatedVerificationFailed { source_id, .. } => write!(
                f,
                "Failed to verify aggregated claims from source `{}`",
                source_id.as_str()
            ),
            Self::InvalidIssuer(msg) => write!(f, "Invalid issuer: {}", msg),
            Self::InvalidAudience(msg) => write!(f, "Invalid audiences: {}", msg),
            Self::DistributedFetchFailed { source_id, .. } => write!(
                f,
                "Failed to fetch distributed claims from source `{}`",
                source_id.as_str()
            ),
            Self::Request(_) => f.write_str("Request failed"),
            Self::Response(_, _, msg) => write!(f, "Server returned invalid response: {}", msg),
            Self::Other(msg) => write!(f, "Other error: {}", msg),
        }
    }
}

impl<RE> std::error::Error for UserInfoError<RE>
where
    RE: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DecryptionFailed(err) => Some(err),
            Self::SignatureInvalid(err) => Some(err),
            Self::KeyNotFound(err) => Some(err),
            Self::AggregatedVerificationFailed { cause, .. } => Some(cause.as_ref()),
            Self::DistributedFetchFailed { cause, .. } => Some(cause.as_ref()),
            Self::Request(err) => Some(err),
            Self::MalformedResponse(_)
            | Self::AlgorithmMismatch(_)
            | Self::SubMismatch(_)
            | Self::ClaimSourceUnresolved(_)
            | Self::InvalidIssuer(_)
            | Self::InvalidAudience(_)
            | Self::Response(..)
            | Self::Other(_) => None,
        }
    }
}
impl<RE> From<ClaimsVerificationError> for UserInfoError<RE>
where
    RE: std::error::Error + 'static,
{
    fn from(err: ClaimsVerificationError) -> Self {
        match err {
            ClaimsVerificationError::MalformedResponse(msg) => UserInfoError::MalformedResponse(msg),
            ClaimsVerificationError::AlgorithmMismatch(msg) => UserInfoError::AlgorithmMismatch(msg),
            ClaimsVerificationError::DecryptionFailed(err) => UserInfoError::DecryptionFailed(err),
            ClaimsVerificationError::SignatureInvalid(err) => UserInfoError::SignatureInvalid(err),
            ClaimsVerificationError::KeyNotFound(err) => UserInfoError::KeyNotFound(err),
            ClaimsVerificationError::SubMismatch(msg) => UserInfoError::SubMismatch(msg),
            ClaimsVerificationError::ClaimSourceUnresolved(msg) => {
                UserInfoError::ClaimSourceUnresolved(msg)
            }
            ClaimsVerificationError::AggregatedVerificationFailed { source_id, cause } => {
                UserInfoError::AggregatedVerificationFailed { source_id, cause }
            }
            ClaimsVerificationError::InvalidIssuer(msg) => UserInfoError::InvalidIssuer(msg),
            ClaimsVerificationError::InvalidAudience(msg) => UserInfoError::InvalidAudience(msg),
        }
    }
}

/// Retrieves, verifies and resolves the claims about the End-User from the UserInfo endpoint.
///
/// A resolution runs through these states, and stops at the first failure:
///
/// 1. The request is sent with the access token from the [`TokenSet`].
/// 2. The response is parsed, and decrypted if the client registered an encryption algorithm.
/// 3. Signed responses are verified against the client's registered signing algorithm. Plain
///    responses are accepted only when no signature is required.
/// 4. The `sub` claim is compared with the ID token's subject (or the subject passed to
///    [`set_expected_subject`](Self::set_expected_subject)).
/// 5. Aggregated and distributed claims are resolved into the returned [`ClaimSet`].
///
/// The orchestrator holds no state between resolutions.
pub struct UserInfoOrchestrator<'a> {
    distributed_access_tokens: HashMap<ClaimSourceId, AccessToken>,
    endpoint: &'a UserInfoEndpoint,
    expected_subject: Option<SubjectIdentifier>,
    key_resolver: &'a dyn KeyResolver,
    profile: &'a ClientSecurityProfile,
}
impl<'a> UserInfoOrchestrator<'a> {
    /// Creates an orchestrator for a client's profile and UserInfo endpoint.
    pub fn new(
        profile: &'a ClientSecurityProfile,
        endpoint: &'a UserInfoEndpoint,
        key_resolver: &'a dyn KeyResolver,
    ) -> Self {
        Self {
            distributed_access_tokens: HashMap::new(),
            endpoint,
            expected_subject: None,
            key_resolver,
            profile,
        }
    }

    /// Sets the subject established by an earlier resolution, for flows without an ID token.
    pub fn set_expected_subject(mut self, expected_subject: Option<SubjectIdentifier>) -> Self {
        self.expected_subject = expected_subject;
        self
    }

    /// Sets bearer tokens for distributed claim sources whose descriptors carry none.
    pub fn set_distributed_access_tokens(
        mut self,
        access_tokens: HashMap<ClaimSourceId, AccessToken>,
    ) -> Self {
        self.distributed_access_tokens = access_tokens;
        self
    }

    /// Requests the UserInfo claims and returns them once every verification step has passed.
    pub async fn resolve_user_info_async<'c, C>(
        &self,
        token_set: &TokenSet,
        http_client: &'c C,
    ) -> Result<ClaimSet, UserInfoError<<C as AsyncHttpClient<'c>>::Error>>
    where
        C: AsyncHttpClient<'c>,
    {
        let request = self
            .user_info_request(token_set.access_token())
            .map_err(UserInfoError::Other)?;
        log::debug!("Requesting UserInfo from {}", self.endpoint.url());
        let response = http_client
            .call(request)
            .await
            .map_err(UserInfoError::Request)
            .and_then(|http_response| {
                Self::successful_response(http_response, self.endpoint.url().as_str())
            })?;

        let claims = self.verify_user_info(response)?;

        let expected_subject = token_set
            .id_token()
            .map(IdTokenClaims::sub)
            .or(self.expected_subject.as_ref());
        let subject = SubjectMatcher::new(expected_subject).verify(&claims)?;
        log::debug!("UserInfo subject `{}` checked", subject.as_str());

        let claims = ClaimsUnpacker::new(self.claim_source_verifier())
            .resolve(claims, |source_id, endpoint, access_token| {
                self.fetch_distributed_claims(http_client, source_id, endpoint, access_token)
            })
            .await?;
        log::debug!("UserInfo claims resolved for subject `{}`", subject.as_str());

        Ok(claims)
    }

    fn user_info_request(&self, access_token: &AccessToken) -> Result<HttpRequest, String> {
        let accept = if self.profile.expects_jwt() {
            MIME_TYPE_JWT
        } else {
            MIME_TYPE_JSON
        };
        let builder = http::Request::builder()
            .uri(self.endpoint.url().to_string())
            .method(self.endpoint.method().clone())
            .header(ACCEPT, HeaderValue::from_static(accept));

        match self.endpoint.bearer_delivery() {
            BearerDelivery::Header => {
                let (auth_header, auth_value) = auth_bearer(access_token)?;
                builder.header(auth_header, auth_value).body(Vec::new())
            }
            BearerDelivery::Body => {
                // See https://tools.ietf.org/html/rfc6750#section-2.2.
                if *self.endpoint.method() != Method::POST {
                    return Err(format!(
                        "sending the access token in the request body requires POST (found {})",
                        self.endpoint.method()
                    ));
                }
                builder
                    .header(
                        CONTENT_TYPE,
                        HeaderValue::from_static(MIME_TYPE_FORM_URLENCODED),
                    )
                    .body(form_encoded_access_token(access_token))
            }
        }
        .map_err(|err| format!("failed to prepare request: {}", err))
    }

    fn distributed_claims_request(
        endpoint: &DistributedClaimsUrl,
        access_token: Option<&AccessToken>,
    ) -> Result<HttpRequest, String> {
        let mut builder = http::Request::builder()
            .uri(endpoint.to_string())
            .method(Method::GET)
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_DISTRIBUTED_CLAIMS));
        if let Some(access_token) = access_token {
            let (auth_header, auth_value) = auth_bearer(access_token)?;
            builder = builder.header(auth_header, auth_value);
        }
        builder
            .body(Vec::new())
            .map_err(|err| format!("failed to prepare request: {}", err))
    }

    fn successful_response<RE>(
        http_response: HttpResponse,
        url: &str,
    ) -> Result<RawUserInfoResponse, UserInfoError<RE>>
    where
        RE: std::error::Error + 'static,
    {
        if http_response.status() != StatusCode::OK {
            return Err(UserInfoError::Response(
                http_response.status(),
                http_response.body().to_owned(),
                format!("HTTP status code {} at {}", http_response.status(), url),
            ));
        }
        Ok(RawUserInfoResponse::from(http_response))
    }

    fn envelope_parser(&self) -> ResponseEnvelopeParser<'_> {
        let decryption_engine = self.profile.userinfo_encryption().map(|(alg, enc)| {
            DecryptionEngine::new(self.key_resolver, alg, enc)
                .set_client_secret(self.profile.client_secret())
        });
        ResponseEnvelopeParser::new(
            self.profile.userinfo_signed_response_alg(),
            decryption_engine,
        )
    }

    fn verify_user_info(
        &self,
        response: RawUserInfoResponse,
    ) -> Result<ClaimSet, ClaimsVerificationError> {
        let envelope = self.envelope_parser().parse(response)?;
        log::debug!("UserInfo response parsed as {}", envelope_kind(&envelope));

        match envelope {
            Envelope::Plain(claims) | Envelope::EncryptedPlain(claims) => {
                log::debug!("Accepted unsigned UserInfo claims");
                Ok(claims)
            }
            Envelope::Signed(jwt) | Envelope::EncryptedSigned(jwt) => {
                let alg = self.profile.userinfo_signed_response_alg().ok_or_else(|| {
                    ClaimsVerificationError::MalformedResponse(
                        "received a signed JWT but no signing algorithm is configured"
                            .to_string(),
                    )
                })?;
                let claims = SignatureVerifier::new(
                    self.key_resolver,
                    self.profile.issuer(),
                    SignatureAlgorithmPolicy::Exact(alg.clone()),
                )
                .set_client_secret(self.profile.client_secret())
                .set_audience(Some(self.profile.client_id()))
                .require_issuer_match(true)
                .verified_claims(jwt)?;
                log::debug!("Verified UserInfo JWT");
                Ok(claims)
            }
        }
    }

    fn claim_source_verifier(&self) -> SignatureVerifier<'_> {
        let policy = match self.profile.claim_source_signing_algs() {
            Some(algs) => SignatureAlgorithmPolicy::AnyOf(algs.clone()),
            None => SignatureAlgorithmPolicy::any_signed(),
        };
        SignatureVerifier::new(self.key_resolver, self.profile.issuer(), policy)
            .set_client_secret(self.profile.client_secret())
            .set_issuer_from_token(true)
    }

    async fn fetch_distributed_claims<'c, C>(
        &self,
        http_client: &'c C,
        source_id: ClaimSourceId,
        endpoint: DistributedClaimsUrl,
        access_token: Option<AccessToken>,
    ) -> Result<ClaimSet, UserInfoError<<C as AsyncHttpClient<'c>>::Error>>
    where
        C: AsyncHttpClient<'c>,
    {
        let access_token =
            access_token.or_else(|| self.distributed_access_tokens.get(&source_id).cloned());
        if access_token.is_none() {
            log::debug!(
                "No access token for claim source `{}`; sending an unauthenticated request",
                source_id.as_str()
            );
        }
        let request = Self::distributed_claims_request(&endpoint, access_token.as_ref())
            .map_err(UserInfoError::Other)?;
        let response = http_client
            .call(request)
            .await
            .map_err(UserInfoError::Request)
            .and_then(|http_response| Self::successful_response(http_response, endpoint.as_str()))?;

        let parser = self
            .envelope_parser()
            .set_accept_signed(true)
            .set_accept_unsigned(self.profile.accept_unsigned_distributed_claims());
        let claims = match parser.parse(response)? {
            Envelope::Plain(claims) | Envelope::EncryptedPlain(claims) => claims,
            Envelope::Signed(jwt) | Envelope::EncryptedSigned(jwt) => {
                self.claim_source_verifier().verified_claims(jwt)?
            }
        };
        log::debug!("Fetched distributed claims for source `{}`", source_id.as_str());
        Ok(claims)
    }
}

fn envelope_kind(envelope: &Envelope) -> &'static str {
    match envelope {
        Envelope::Plain(_) => "plain JSON",
        Envelope::Signed(_) => "signed JWT",
        Envelope::EncryptedSigned(_) => "encrypted signed JWT",
        Envelope::EncryptedPlain(_) => "encrypted JSON",
    }
}
