#![warn(missing_docs)]
//!
//! [OpenID Connect](https://openid.net/specs/openid-connect-core-1_0.html) UserInfo response
//! verification and claims resolution for relying parties.
//!
//! This library fetches the claims about an authenticated End-User from an OpenID Connect
//! Provider's [UserInfo endpoint](https://openid.net/specs/openid-connect-core-1_0.html#UserInfo)
//! and only returns them once the response has passed every check the client registered for:
//!
//!  * The response shape (plain JSON, signed JWT, encrypted JWT, or signed-then-encrypted JWT)
//!    must match the client's `userinfo_signed_response_alg` and
//!    `userinfo_encrypted_response_alg`.
//!  * JWE responses are decrypted with the client's own keys, using exactly the registered
//!    algorithms (see [`jwe`]).
//!  * JWS responses are verified against the registered algorithm, with keys from a
//!    [`KeyResolver`](key_resolver::KeyResolver) or the client secret (see [`verification`]).
//!  * The `sub` claim must match the subject of the ID token.
//!  * [Aggregated and distributed claims](
//!    https://openid.net/specs/openid-connect-core-1_0.html#AggregatedDistributedClaims) are
//!    verified (or fetched and verified) and merged into the result (see [`claims`]).
//!
//! # HTTP Clients
//!
//! Requests are sent through any [`AsyncHttpClient`] from the
//! [`oauth2`](https://docs.rs/oauth2) crate. With the default `reqwest` feature enabled,
//! `reqwest::Client` implements it. Any function from [`HttpRequest`] to a future returning
//! [`HttpResponse`] implements it as well, which is convenient for custom transports and tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use oidc_userinfo::core::{CoreJsonWebKeySet, CoreJwsSigningAlgorithm};
//! use oidc_userinfo::key_resolver::StaticKeyResolver;
//! use oidc_userinfo::user_info::{
//!     ClientSecurityProfile, IdTokenClaims, TokenSet, UserInfoEndpoint, UserInfoOrchestrator,
//! };
//! use oidc_userinfo::{
//!     AccessToken, ClientId, ClientSecret, HttpRequest, HttpResponse, IssuerUrl,
//!     SubjectIdentifier, UserInfoUrl,
//! };
//!
//! # async fn run(
//! #     http_client: impl Fn(HttpRequest) -> std::future::Ready<Result<HttpResponse, std::io::Error>>,
//! #     jwks: CoreJsonWebKeySet,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let issuer = IssuerUrl::new("https://accounts.example.com".to_string())?;
//! let profile = ClientSecurityProfile::new(ClientId::new("client_id".to_string()), issuer.clone())
//!     .set_client_secret(Some(ClientSecret::new("client_secret".to_string())))
//!     .set_userinfo_signed_response_alg(Some(CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256));
//! let endpoint = UserInfoEndpoint::new(UserInfoUrl::new(
//!     "https://accounts.example.com/userinfo".to_string(),
//! )?);
//!
//! // The provider's JWK set, as fetched from its `jwks_uri`.
//! let key_resolver = StaticKeyResolver::new().set_issuer_keys(issuer, jwks);
//!
//! // Tokens from the token endpoint, after the ID token has been verified.
//! let token_set = TokenSet::new(AccessToken::new("access_token".to_string())).set_id_token(
//!     Some(IdTokenClaims::new(SubjectIdentifier::new("248289761001".to_string()))),
//! );
//!
//! let claims = UserInfoOrchestrator::new(&profile, &endpoint, &key_resolver)
//!     .resolve_user_info_async(&token_set, &http_client)
//!     .await?;
//! println!("email: {:?}", claims.get("email"));
//! # Ok(())
//! # }
//! ```
//!
//! The individual steps run only inside [`UserInfoOrchestrator`](user_info::UserInfoOrchestrator),
//! so claims can't be obtained with the subject check or the verification order skipped:
//!
//! ```rust,compile_fail
//! use oidc_userinfo::claims::ClaimsUnpacker;
//! ```
//!
//! ```rust,compile_fail
//! use oidc_userinfo::verification::SignatureVerifier;
//! ```
//!
//! # Logging
//!
//! Each step of a resolution is logged at `debug` level through the
//! [`log`](https://docs.rs/log) facade. No logger is installed by this crate.
//!

pub use oauth2::{
    AccessToken, AsyncHttpClient, ClientId, ClientSecret, HttpRequest, HttpResponse,
    RefreshToken,
};

pub use crate::claims::ClaimSet;
pub use crate::jwt::JsonWebTokenAlgorithm;
pub use crate::types::jwk::{
    JsonWebKey, JsonWebKeyAlgorithm, JsonWebKeyId, JsonWebKeyType, JsonWebKeyUse,
    JwsSigningAlgorithm, PrivateDecryptionKey, PrivateSigningKey,
};
pub use crate::types::jwks::JsonWebKeySet;
pub use crate::types::{
    ClaimSourceId, DistributedClaimsUrl, IssuerUrl, Nonce, SigningError, SubjectIdentifier,
    UserInfoUrl,
};
pub use crate::verification::SignatureVerificationError;

// Defined first since other modules need the macros, and definition order is significant for
// macros.
#[macro_use]
mod macros;

/// Aggregated and distributed claims.
pub mod claims;

/// Baseline implementations of the JOSE algorithms and keys.
pub mod core;

/// UserInfo response envelopes.
pub mod envelope;

/// JSON Web Encryption (JWE) for encrypted UserInfo responses.
pub mod jwe;

/// Compact JSON Web Signature (JWS) tokens.
pub mod jwt;

/// Sources of verification and decryption keys.
pub mod key_resolver;

/// Retrieving UserInfo claims.
pub mod user_info;

/// Signature and subject verification.
pub mod verification;

mod helpers;
mod http_utils;
mod types;
