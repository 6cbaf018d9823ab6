use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use oauth2::AccessToken;

pub const MIME_TYPE_JSON: &str = "application/json";
pub const MIME_TYPE_JWT: &str = "application/jwt";
pub const MIME_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub const BEARER: &str = "Bearer";

pub fn auth_bearer(access_token: &AccessToken) -> Result<(HeaderName, HeaderValue), String> {
    HeaderValue::from_str(&format!("{} {}", BEARER, access_token.secret()))
        .map(|value| (AUTHORIZATION, value))
        .map_err(|_| "access token contains characters not allowed in a header".to_string())
}

/// Encodes the `access_token` form parameter used for bearer delivery in the request body (see
/// [RFC 6750 Section 2.2](https://tools.ietf.org/html/rfc6750#section-2.2)).
pub fn form_encoded_access_token(access_token: &AccessToken) -> Vec<u8> {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("access_token", access_token.secret())
        .finish()
        .into_bytes()
}
