use crate::core::{
    CoreHmacKey, CoreJsonWebKey, CoreJsonWebKeySet, CoreJweContentEncryptionAlgorithm,
    CoreJweKeyManagementAlgorithm, CoreJwsSigningAlgorithm,
};
use crate::jwt::tests::{claims, test_rsa_signing_key, TEST_RSA_PUB_KEY};
use crate::jwt::ClaimsJsonWebToken;
use crate::key_resolver::StaticKeyResolver;
use crate::user_info::{
    BearerDelivery, ClientSecurityProfile, IdTokenClaims, TokenSet, UserInfoEndpoint,
    UserInfoError, UserInfoOrchestrator,
};
use crate::verification::ClaimsVerificationError;
use crate::{
    AccessToken, ClaimSourceId, ClientId, ClientSecret, HttpRequest, HttpResponse, IssuerUrl,
    SubjectIdentifier, UserInfoUrl,
};

use futures::future::{ready, Either, FutureExt};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::method::Method;
use http::status::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ISSUER: &str = "https://op.example.com";
const USER_INFO_URL: &str = "https://op.example.com/userinfo";
const CLIENT_SECRET: &str = "my_secret_key";

fn issuer() -> IssuerUrl {
    IssuerUrl::new(ISSUER.to_string()).unwrap()
}

fn resolver() -> StaticKeyResolver {
    let key: CoreJsonWebKey = serde_json::from_str(TEST_RSA_PUB_KEY).unwrap();
    StaticKeyResolver::new().set_issuer_keys(issuer(), CoreJsonWebKeySet::new(vec![key]))
}

fn profile() -> ClientSecurityProfile {
    ClientSecurityProfile::new(ClientId::new("my_client".to_string()), issuer())
        .set_client_secret(Some(ClientSecret::new(CLIENT_SECRET.to_string())))
}

fn endpoint() -> UserInfoEndpoint {
    UserInfoEndpoint::new(UserInfoUrl::new(USER_INFO_URL.to_string()).unwrap())
}

fn token_set(sub: &str) -> TokenSet {
    TokenSet::new(AccessToken::new("userinfo_token".to_string()))
        .set_id_token(Some(IdTokenClaims::new(SubjectIdentifier::new(sub.to_string()))))
}

fn response(status: StatusCode, content_type: &str, body: &str) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(body.as_bytes().to_vec())
        .unwrap()
}

fn json_response(body: serde_json::Value) -> HttpResponse {
    response(StatusCode::OK, "application/json", &body.to_string())
}

fn jwt_response(token: String) -> HttpResponse {
    response(StatusCode::OK, "application/jwt", &token)
}

fn hs256(payload: serde_json::Value) -> String {
    ClaimsJsonWebToken::new(
        claims(payload),
        &CoreHmacKey::new(CLIENT_SECRET),
        &CoreJwsSigningAlgorithm::HmacSha256,
    )
    .unwrap()
    .to_compact()
}

fn rs256(payload: serde_json::Value) -> String {
    ClaimsJsonWebToken::new(
        claims(payload),
        &test_rsa_signing_key(),
        &CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
    )
    .unwrap()
    .to_compact()
}

fn header<'r>(request: &'r HttpRequest, name: http::header::HeaderName) -> Option<&'r str> {
    request
        .headers()
        .get(name)
        .map(|value| value.to_str().unwrap())
}

type MockResult = Result<HttpResponse, std::io::Error>;

#[test]
fn test_profile_deserialization() {
    let profile: ClientSecurityProfile = serde_json::from_value(json!({
        "client_id": "my_client",
        "client_secret": "my_secret_key",
        "issuer": ISSUER,
        "userinfo_signed_response_alg": "RS256",
        "userinfo_encrypted_response_alg": "RSA1_5",
    }))
    .unwrap();

    assert_eq!(profile.client_id().as_str(), "my_client");
    assert_eq!(profile.client_secret().unwrap().secret(), CLIENT_SECRET);
    assert_eq!(
        profile.userinfo_signed_response_alg(),
        Some(&CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256)
    );
    assert_eq!(profile.userinfo_encrypted_response_enc(), None);
    assert_eq!(
        profile.userinfo_encryption(),
        Some((
            &CoreJweKeyManagementAlgorithm::RsaPkcs1V15,
            &CoreJweContentEncryptionAlgorithm::Aes128CbcHmacSha256
        ))
    );
    assert_eq!(profile.claim_source_signing_algs(), None);
    assert!(!profile.accept_unsigned_distributed_claims());

    let profile = profile
        .set_userinfo_encrypted_response_enc(Some(
            CoreJweContentEncryptionAlgorithm::Aes256Gcm,
        ))
        .set_accept_unsigned_distributed_claims(true);
    assert_eq!(
        profile.userinfo_encryption(),
        Some((
            &CoreJweKeyManagementAlgorithm::RsaPkcs1V15,
            &CoreJweContentEncryptionAlgorithm::Aes256Gcm
        ))
    );
    assert!(profile.accept_unsigned_distributed_claims());

    let serialized = serde_json::to_value(&profile).unwrap();
    assert_eq!(serialized["userinfo_encrypted_response_enc"], json!("A256GCM"));
    assert_eq!(serialized["accept_unsigned_distributed_claims"], json!(true));

    assert!(serde_json::from_value::<ClientSecurityProfile>(json!({
        "client_id": "my_client",
        "issuer": ISSUER,
        "userinfo_signed_response_alg": "XX999",
    }))
    .is_err());
}

#[test]
fn test_endpoint_deserialization() {
    let endpoint: UserInfoEndpoint =
        serde_json::from_value(json!({"url": USER_INFO_URL})).unwrap();
    assert_eq!(endpoint.url().as_str(), USER_INFO_URL);
    assert_eq!(*endpoint.bearer_delivery(), BearerDelivery::Header);
    assert_eq!(*endpoint.method(), Method::GET);

    let endpoint: UserInfoEndpoint = serde_json::from_value(json!({
        "url": USER_INFO_URL,
        "bearer_delivery": "body",
        "method": "post",
    }))
    .unwrap();
    assert_eq!(*endpoint.bearer_delivery(), BearerDelivery::Body);
    assert_eq!(*endpoint.method(), Method::POST);
    assert_eq!(
        serde_json::to_value(&endpoint).unwrap(),
        json!({"url": USER_INFO_URL, "bearer_delivery": "body", "method": "POST"})
    );
}

#[test]
fn test_token_set() {
    let token_set = TokenSet::new(AccessToken::new("token".to_string()))
        .set_expires_in(Some(&Duration::from_secs(3600)));
    let expires_at = token_set.expires_at().unwrap();
    assert!(*expires_at > chrono::Utc::now() + chrono::Duration::seconds(3500));
    assert!(token_set.id_token().is_none());

    let token_set: TokenSet = serde_json::from_value(json!({
        "access_token": "token",
        "id_token": {"sub": "248289761001", "nonce": "n-0S6_WzA2Mj"},
        "refresh_token": "refresh",
        "expires_at": 1700000000,
    }))
    .unwrap();
    assert_eq!(token_set.access_token().secret(), "token");
    assert_eq!(
        token_set.id_token().unwrap().sub().as_str(),
        "248289761001"
    );
    assert_eq!(
        token_set.id_token().unwrap().nonce().unwrap().secret(),
        "n-0S6_WzA2Mj"
    );
    assert_eq!(token_set.refresh_token().unwrap().secret(), "refresh");
    assert_eq!(token_set.expires_at().unwrap().timestamp(), 1700000000);
}

#[test]
fn test_user_info_request() {
    let resolver = resolver();
    let access_token = AccessToken::new("userinfo_token".to_string());

    let profile = profile();
    let endpoint = endpoint();
    let request = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .user_info_request(&access_token)
        .unwrap();
    assert_eq!(*request.method(), Method::GET);
    assert_eq!(request.uri().to_string(), USER_INFO_URL);
    assert_eq!(header(&request, AUTHORIZATION), Some("Bearer userinfo_token"));
    assert_eq!(header(&request, ACCEPT), Some("application/json"));
    assert!(request.body().is_empty());

    // `none` doesn't call for a JWT.
    let profile = profile.set_userinfo_signed_response_alg(Some(CoreJwsSigningAlgorithm::None));
    let request = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .user_info_request(&access_token)
        .unwrap();
    assert_eq!(header(&request, ACCEPT), Some("application/json"));

    let profile = profile.set_userinfo_signed_response_alg(Some(
        CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
    ));
    let request = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .user_info_request(&access_token)
        .unwrap();
    assert_eq!(header(&request, ACCEPT), Some("application/jwt"));

    let profile = self::profile()
        .set_userinfo_encrypted_response_alg(Some(CoreJweKeyManagementAlgorithm::RsaPkcs1V15));
    let request = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .user_info_request(&access_token)
        .unwrap();
    assert_eq!(header(&request, ACCEPT), Some("application/jwt"));
}

#[test]
fn test_user_info_request_body_delivery() {
    let resolver = resolver();
    let access_token = AccessToken::new("userinfo token".to_string());
    let profile = profile();

    let endpoint = endpoint()
        .set_bearer_delivery(BearerDelivery::Body)
        .set_method(Method::POST);
    let request = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .user_info_request(&access_token)
        .unwrap();
    assert_eq!(*request.method(), Method::POST);
    assert_eq!(header(&request, AUTHORIZATION), None);
    assert_eq!(
        header(&request, CONTENT_TYPE),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(request.body().as_slice(), b"access_token=userinfo+token");

    let endpoint = endpoint.set_method(Method::GET);
    assert_eq!(
        UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
            .user_info_request(&access_token)
            .unwrap_err(),
        "sending the access token in the request body requires POST (found GET)"
    );
}

#[tokio::test]
async fn test_plain_user_info() {
    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint();
    let requests = Mutex::new(Vec::new());

    let http_client = |request: HttpRequest| {
        requests.lock().unwrap().push(request);
        ready(Ok::<_, std::io::Error>(json_response(
            json!({"sub": "248289761001", "name": "Jane Doe"}),
        )))
    };

    let claims = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
        .unwrap();
    assert_eq!(
        claims,
        self::claims(json!({"sub": "248289761001", "name": "Jane Doe"}))
    );

    let requests = requests.into_inner().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        header(&requests[0], AUTHORIZATION),
        Some("Bearer userinfo_token")
    );
}

#[tokio::test]
async fn test_http_failures() {
    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint();
    let orchestrator = UserInfoOrchestrator::new(&profile, &endpoint, &resolver);

    let http_client = |_: HttpRequest| {
        ready(Ok::<_, std::io::Error>(response(
            StatusCode::UNAUTHORIZED,
            "application/json",
            r#"{"error": "invalid_token"}"#,
        )))
    };
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::Response(status, body, msg)) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, br#"{"error": "invalid_token"}"#.to_vec());
            assert_eq!(msg, format!("HTTP status code 401 Unauthorized at {}", USER_INFO_URL));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let http_client = |_: HttpRequest| {
        ready(Err::<HttpResponse, _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    };
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::Request(err)) => {
            assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused)
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_body_delivery_requires_post() {
    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint().set_bearer_delivery(BearerDelivery::Body);

    let http_client = |_: HttpRequest| -> futures::future::Ready<MockResult> {
        panic!("no request should be sent")
    };
    match UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::Other(msg)) => assert!(msg.contains("requires POST"), "{}", msg),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_signed_user_info() {
    let resolver = resolver();
    let profile = profile()
        .set_userinfo_signed_response_alg(Some(CoreJwsSigningAlgorithm::HmacSha256));
    let endpoint = endpoint();
    let orchestrator = UserInfoOrchestrator::new(&profile, &endpoint, &resolver);

    let token = hs256(json!({
        "iss": ISSUER,
        "aud": "my_client",
        "sub": "248289761001",
        "eye_color": "blue",
    }));
    let http_client = |_: HttpRequest| ready(Ok::<_, std::io::Error>(jwt_response(token.clone())));
    assert_eq!(
        orchestrator
            .resolve_user_info_async(&token_set("248289761001"), &http_client)
            .await
            .unwrap(),
        claims(json!({
            "iss": ISSUER,
            "aud": "my_client",
            "sub": "248289761001",
            "eye_color": "blue",
        }))
    );

    // Plain JSON can't stand in for a signed response.
    let http_client = |_: HttpRequest| {
        ready(Ok::<_, std::io::Error>(json_response(json!({"sub": "248289761001"}))))
    };
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::MalformedResponse(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    let token = hs256(json!({"aud": ["other_client"], "sub": "248289761001"}));
    let http_client = |_: HttpRequest| ready(Ok::<_, std::io::Error>(jwt_response(token.clone())));
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::InvalidAudience(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    let token = hs256(json!({"iss": "https://attacker.example.com", "sub": "248289761001"}));
    let http_client = |_: HttpRequest| ready(Ok::<_, std::io::Error>(jwt_response(token.clone())));
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::InvalidIssuer(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    let token = rs256(json!({"sub": "248289761001"}));
    let http_client = |_: HttpRequest| ready(Ok::<_, std::io::Error>(jwt_response(token.clone())));
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::AlgorithmMismatch(msg)) => {
            assert_eq!(msg, "expected `HS256` (found `RS256`)")
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // Unknown algorithm names are malformed, not mismatched.
    // {"alg":"XX256"}.{"sub":"248289761001"}
    let token = "eyJhbGciOiJYWDI1NiJ9.eyJzdWIiOiIyNDgyODk3NjEwMDEifQ.c2ln".to_string();
    let http_client = |_: HttpRequest| ready(Ok::<_, std::io::Error>(jwt_response(token.clone())));
    match orchestrator
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::MalformedResponse(msg)) => {
            assert!(msg.contains("unknown variant `XX256`"), "{}", msg)
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_subject_mismatch() {
    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint();
    let http_client = |_: HttpRequest| {
        ready(Ok::<_, std::io::Error>(json_response(
            json!({"sub": "mallory", "name": "Mallory"}),
        )))
    };

    match UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::SubMismatch(msg)) => {
            assert_eq!(msg, "expected `248289761001` (found `mallory`)")
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // Without an ID token, the subject of an earlier resolution applies.
    let token_set = TokenSet::new(AccessToken::new("userinfo_token".to_string()));
    match UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .set_expected_subject(Some(SubjectIdentifier::new("248289761001".to_string())))
        .resolve_user_info_async(&token_set, &http_client)
        .await
    {
        Err(UserInfoError::SubMismatch(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(
        UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
            .resolve_user_info_async(&token_set, &http_client)
            .await
            .unwrap(),
        claims(json!({"sub": "mallory", "name": "Mallory"}))
    );
}

#[tokio::test]
async fn test_distributed_claims() {
    let _ = env_logger::try_init();

    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint();
    let requests = Mutex::new(Vec::new());

    let http_client = |request: HttpRequest| {
        let response = match request.uri().to_string().as_str() {
            USER_INFO_URL => json_response(json!({
                "sub": "248289761001",
                "_claim_names": {
                    "payment_info": "src1",
                    "credit_score": "src2",
                    "shoe_size": "src3",
                },
                "_claim_sources": {
                    "src1": {
                        "endpoint": "https://bank.example.com/claims",
                        "access_token": "bank_token",
                    },
                    "src2": {"endpoint": "https://creditagency.example.com/claims"},
                    "src3": {"endpoint": "https://shoes.example.com/claims"},
                },
            })),
            "https://bank.example.com/claims" => {
                jwt_response(rs256(json!({"iss": ISSUER, "payment_info": "Some_Card"})))
            }
            "https://creditagency.example.com/claims" => {
                jwt_response(rs256(json!({"credit_score": 650})))
            }
            "https://shoes.example.com/claims" => {
                jwt_response(rs256(json!({"iss": ISSUER, "shoe_size": 9})))
            }
            other => panic!("unexpected request to {}", other),
        };
        requests.lock().unwrap().push(request);
        ready(Ok::<_, std::io::Error>(response))
    };

    let claims = UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .set_distributed_access_tokens(
            vec![(
                ClaimSourceId::new("src2".to_string()),
                AccessToken::new("agency_token".to_string()),
            )]
            .into_iter()
            .collect::<HashMap<_, _>>(),
        )
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
        .unwrap();
    assert_eq!(
        claims,
        self::claims(json!({
            "sub": "248289761001",
            "payment_info": "Some_Card",
            "credit_score": 650,
            "shoe_size": 9,
        }))
    );

    let requests = requests.into_inner().unwrap();
    let authorization = |uri: &str| {
        let request = requests
            .iter()
            .find(|request| request.uri().to_string() == uri)
            .unwrap();
        assert_eq!(
            header(request, ACCEPT),
            Some("application/jwt, application/json")
        );
        header(request, AUTHORIZATION).map(str::to_string)
    };
    assert_eq!(
        authorization("https://bank.example.com/claims"),
        Some("Bearer bank_token".to_string())
    );
    assert_eq!(
        authorization("https://creditagency.example.com/claims"),
        Some("Bearer agency_token".to_string())
    );
    assert_eq!(authorization("https://shoes.example.com/claims"), None);
}

#[tokio::test]
async fn test_unsigned_distributed_claims() {
    let resolver = resolver();
    let endpoint = endpoint();
    let token = rs256(json!({
        "sub": "248289761001",
        "_claim_names": {"credit_score": "src1"},
        "_claim_sources": {"src1": {"endpoint": "https://creditagency.example.com/claims"}},
    }));
    let http_client = |request: HttpRequest| {
        ready(Ok::<_, std::io::Error>(
            if request.uri().to_string() == USER_INFO_URL {
                jwt_response(token.clone())
            } else {
                json_response(json!({"credit_score": 650}))
            },
        ))
    };

    let profile = profile().set_userinfo_signed_response_alg(Some(
        CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
    ));
    match UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::DistributedFetchFailed { source_id, cause }) => {
            assert_eq!(source_id.as_str(), "src1");
            assert!(
                matches!(*cause, UserInfoError::MalformedResponse(_)),
                "{:?}",
                cause
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let profile = profile.set_accept_unsigned_distributed_claims(true);
    assert_eq!(
        UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
            .resolve_user_info_async(&token_set("248289761001"), &http_client)
            .await
            .unwrap(),
        claims(json!({"sub": "248289761001", "credit_score": 650}))
    );
}

#[test]
fn test_distributed_failure_source_chain() {
    let err = UserInfoError::<std::io::Error>::DistributedFetchFailed {
        source_id: ClaimSourceId::new("src1".to_string()),
        cause: Box::new(UserInfoError::Request(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))),
    };
    assert_eq!(
        err.to_string(),
        "Failed to fetch distributed claims from source `src1`"
    );

    let cause = std::error::Error::source(&err).unwrap();
    assert_eq!(cause.to_string(), "Request failed");
    match cause.downcast_ref::<UserInfoError<std::io::Error>>() {
        Some(UserInfoError::Request(_)) => {}
        other => panic!("unexpected cause: {:?}", other),
    }
    assert_eq!(
        std::error::Error::source(cause).unwrap().to_string(),
        "connection refused"
    );
}

#[tokio::test]
async fn test_aggregated_claims_checked_after_subject() {
    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint();
    let http_client = |_: HttpRequest| {
        ready(Ok::<_, std::io::Error>(json_response(json!({
            "sub": "mallory",
            "_claim_names": {"shoe_size": "src1"},
            "_claim_sources": {"src1": {"JWT": "not.a.jwt"}},
        }))))
    };

    match UserInfoOrchestrator::new(&profile, &endpoint, &resolver)
        .resolve_user_info_async(&token_set("248289761001"), &http_client)
        .await
    {
        Err(UserInfoError::SubMismatch(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_dropping_resolution_drops_distributed_fetches() {
    struct DropFlag(Arc<AtomicBool>);
    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let resolver = resolver();
    let profile = profile();
    let endpoint = endpoint();
    let fetch_started = Arc::new(AtomicBool::new(false));
    let fetch_dropped = Arc::new(AtomicBool::new(false));

    let http_client = |request: HttpRequest| {
        if request.uri().to_string() == USER_INFO_URL {
            return Either::Left(ready(Ok::<_, std::io::Error>(json_response(json!({
                "sub": "248289761001",
                "_claim_names": {"credit_score": "src1"},
                "_claim_sources": {"src1": {"endpoint": "https://slow.example.com/claims"}},
            })))));
        }
        fetch_started.store(true, Ordering::SeqCst);
        let flag = DropFlag(fetch_dropped.clone());
        Either::Right(async move {
            let _flag = flag;
            futures::future::pending::<MockResult>().await
        })
    };

    let token_set = token_set("248289761001");
    let orchestrator = UserInfoOrchestrator::new(&profile, &endpoint, &resolver);
    assert!(orchestrator
        .resolve_user_info_async(&token_set, &http_client)
        .now_or_never()
        .is_none());

    assert!(fetch_started.load(Ordering::SeqCst));
    assert!(fetch_dropped.load(Ordering::SeqCst));
}

#[test]
fn test_error_conversion() {
    let err: UserInfoError<std::io::Error> =
        ClaimsVerificationError::SubMismatch("missing `sub` claim".to_string()).into();
    match err {
        UserInfoError::SubMismatch(ref msg) => assert_eq!(msg, "missing `sub` claim"),
        ref other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "userinfo sub mismatch: missing `sub` claim");
}
