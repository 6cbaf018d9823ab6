use crate::claims::{ClaimSet, ClaimSourceDescriptor, ClaimsUnpacker};
use crate::core::{CoreJsonWebKey, CoreJsonWebKeySet, CoreJwsSigningAlgorithm};
use crate::jwt::tests::{claims, test_rsa_signing_key, TEST_RSA_PUB_KEY};
use crate::jwt::ClaimsJsonWebToken;
use crate::key_resolver::{KeyResolutionError, StaticKeyResolver};
use crate::user_info::UserInfoError;
use crate::verification::{ClaimsVerificationError, SignatureAlgorithmPolicy, SignatureVerifier};
use crate::{AccessToken, ClaimSourceId, DistributedClaimsUrl, IssuerUrl};

use futures::channel::oneshot;
use futures::future::{ready, Ready};
use pretty_assertions::assert_eq;
use serde_json::json;

use std::sync::Mutex;

type TestError = UserInfoError<std::io::Error>;

const ISSUER: &str = "https://op.example.com";
const CLAIMS_PROVIDER: &str = "https://claims.example.com";

fn resolver() -> StaticKeyResolver {
    let key: CoreJsonWebKey = serde_json::from_str(TEST_RSA_PUB_KEY).unwrap();
    StaticKeyResolver::new()
        .set_issuer_keys(
            IssuerUrl::new(ISSUER.to_string()).unwrap(),
            CoreJsonWebKeySet::new(vec![key.clone()]),
        )
        .set_issuer_keys(
            IssuerUrl::new(CLAIMS_PROVIDER.to_string()).unwrap(),
            CoreJsonWebKeySet::new(vec![key]),
        )
}

fn signed(payload: serde_json::Value) -> String {
    ClaimsJsonWebToken::new(
        claims(payload),
        &test_rsa_signing_key(),
        &CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256,
    )
    .unwrap()
    .to_compact()
}

fn no_fetch(
    source_id: ClaimSourceId,
    _: DistributedClaimsUrl,
    _: Option<AccessToken>,
) -> Ready<Result<ClaimSet, TestError>> {
    panic!("unexpected fetch for source `{}`", source_id.as_str())
}

async fn resolve_aggregated(response: serde_json::Value) -> Result<ClaimSet, TestError> {
    let resolver = resolver();
    let issuer = IssuerUrl::new(ISSUER.to_string()).unwrap();
    let unpacker = ClaimsUnpacker::new(
        SignatureVerifier::new(&resolver, &issuer, SignatureAlgorithmPolicy::any_signed())
            .set_issuer_from_token(true),
    );
    unpacker.resolve(claims(response), no_fetch).await
}

#[tokio::test]
async fn test_no_claim_names() {
    let response = json!({"sub": "A", "name": "Alice"});
    assert_eq!(
        resolve_aggregated(response.clone()).await.unwrap(),
        claims(response)
    );

    assert_eq!(
        resolve_aggregated(json!({
            "sub": "A",
            "_claim_sources": {"src1": {"JWT": "ignored"}},
        }))
        .await
        .unwrap(),
        claims(json!({"sub": "A"}))
    );
}

#[tokio::test]
async fn test_aggregated_claims() {
    let jwt = signed(json!({"iss": ISSUER, "shoe_size": 9, "eye_color": "blue"}));

    assert_eq!(
        resolve_aggregated(json!({
            "sub": "A",
            "_claim_names": {"shoe_size": "src1"},
            "_claim_sources": {"src1": {"JWT": jwt}},
        }))
        .await
        .unwrap(),
        claims(json!({"sub": "A", "shoe_size": 9}))
    );

    // Two claims from one source.
    assert_eq!(
        resolve_aggregated(json!({
            "sub": "A",
            "_claim_names": {"shoe_size": "src1", "eye_color": "src1"},
            "_claim_sources": {"src1": {"JWT": jwt}},
        }))
        .await
        .unwrap(),
        claims(json!({"sub": "A", "shoe_size": 9, "eye_color": "blue"}))
    );
}

#[tokio::test]
async fn test_aggregated_claims_from_other_issuer() {
    let jwt = signed(json!({"iss": CLAIMS_PROVIDER, "credit_score": 650}));
    assert_eq!(
        resolve_aggregated(json!({
            "sub": "A",
            "_claim_names": {"credit_score": "src1"},
            "_claim_sources": {"src1": {"JWT": jwt}},
        }))
        .await
        .unwrap(),
        claims(json!({"sub": "A", "credit_score": 650}))
    );

    let jwt = signed(json!({"iss": "https://unknown.example.com", "credit_score": 650}));
    match resolve_aggregated(json!({
        "sub": "A",
        "_claim_names": {"credit_score": "src1"},
        "_claim_sources": {"src1": {"JWT": jwt}},
    }))
    .await
    {
        Err(UserInfoError::AggregatedVerificationFailed { source_id, cause }) => {
            assert_eq!(source_id.as_str(), "src1");
            assert_eq!(
                *cause,
                ClaimsVerificationError::KeyNotFound(KeyResolutionError::UnknownIssuer(
                    "https://unknown.example.com".to_string()
                ))
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_aggregated_verification_failure() {
    let unsecured = ClaimsJsonWebToken::new_unsecured(claims(json!({"shoe_size": 9})))
        .unwrap()
        .to_compact();
    match resolve_aggregated(json!({
        "sub": "A",
        "_claim_names": {"shoe_size": "src1"},
        "_claim_sources": {"src1": {"JWT": unsecured}},
    }))
    .await
    {
        Err(UserInfoError::AggregatedVerificationFailed { source_id, cause }) => {
            assert_eq!(source_id.as_str(), "src1");
            assert!(
                matches!(*cause, ClaimsVerificationError::AlgorithmMismatch(_)),
                "{:?}",
                cause
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }

    match resolve_aggregated(json!({
        "sub": "A",
        "_claim_names": {"shoe_size": "src1"},
        "_claim_sources": {"src1": {"JWT": "garbage"}},
    }))
    .await
    {
        Err(UserInfoError::AggregatedVerificationFailed { cause, .. }) => assert!(
            matches!(*cause, ClaimsVerificationError::MalformedResponse(_)),
            "{:?}",
            cause
        ),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_unresolved_claims() {
    match resolve_aggregated(json!({
        "sub": "A",
        "_claim_names": {"shoe_size": "src2"},
        "_claim_sources": {"src1": {"JWT": "unused"}},
    }))
    .await
    {
        Err(UserInfoError::ClaimSourceUnresolved(msg)) => {
            assert_eq!(msg, "claim source `src2` is missing from `_claim_sources`")
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let jwt = signed(json!({"iss": ISSUER, "eye_color": "blue"}));
    match resolve_aggregated(json!({
        "sub": "A",
        "_claim_names": {"shoe_size": "src1"},
        "_claim_sources": {"src1": {"JWT": jwt}},
    }))
    .await
    {
        Err(UserInfoError::ClaimSourceUnresolved(msg)) => {
            assert_eq!(msg, "claim `shoe_size` is missing from claim source `src1`")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_claim_references() {
    for (response, expected) in [
        (
            json!({"sub": "A", "_claim_names": ["shoe_size"]}),
            "`_claim_names` must be an object (found [\"shoe_size\"])",
        ),
        (
            json!({"sub": "A", "_claim_names": {"shoe_size": 1}}),
            "source ID for claim `shoe_size` must be a string (found 1)",
        ),
        (
            json!({"sub": "A", "_claim_names": {"sub": "src1"}}),
            "`_claim_names` must not reference `sub`",
        ),
        (
            json!({"sub": "A", "_claim_names": {"shoe_size": "src1"}, "_claim_sources": "src1"}),
            "`_claim_sources` must be an object (found \"src1\")",
        ),
    ] {
        match resolve_aggregated(response).await {
            Err(UserInfoError::MalformedResponse(msg)) => assert_eq!(msg, expected),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    match resolve_aggregated(json!({
        "sub": "A",
        "_claim_names": {"shoe_size": "src1"},
        "_claim_sources": {"src1": {"url": "https://claims.example.com"}},
    }))
    .await
    {
        Err(UserInfoError::MalformedResponse(msg)) => assert!(
            msg.starts_with("invalid descriptor for claim source `src1`"),
            "{}",
            msg
        ),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_scaffolding_not_restored_from_sources() {
    let jwt = signed(json!({
        "iss": ISSUER,
        "_claim_names": {"injected": "evil"},
        "_claim_sources": {"evil": {"JWT": "x.y.z"}},
    }));

    for claim_name in ["_claim_names", "_claim_sources"] {
        let mut claim_names = serde_json::Map::new();
        claim_names.insert(claim_name.to_string(), json!("src1"));
        match resolve_aggregated(json!({
            "sub": "A",
            "_claim_names": claim_names,
            "_claim_sources": {"src1": {"JWT": jwt}},
        }))
        .await
        {
            Err(UserInfoError::MalformedResponse(msg)) => assert_eq!(
                msg,
                format!("`_claim_names` must not reference `{}`", claim_name)
            ),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_unreferenced_sources_ignored() {
    assert_eq!(
        resolve_aggregated(json!({
            "sub": "A",
            "_claim_names": {},
            "_claim_sources": {
                "src1": {"JWT": "not even a token"},
                "src2": {"endpoint": "https://claims.example.com/claims"},
            },
        }))
        .await
        .unwrap(),
        claims(json!({"sub": "A"}))
    );
}

#[tokio::test]
async fn test_existing_claims_kept() {
    let jwt = signed(json!({"iss": ISSUER, "name": "Mallory", "shoe_size": 9}));
    assert_eq!(
        resolve_aggregated(json!({
            "sub": "A",
            "name": "Alice",
            "_claim_names": {"name": "src1", "shoe_size": "src1"},
            "_claim_sources": {"src1": {"JWT": jwt}},
        }))
        .await
        .unwrap(),
        claims(json!({"sub": "A", "name": "Alice", "shoe_size": 9}))
    );
}

#[tokio::test]
async fn test_distributed_claims() {
    let resolver = resolver();
    let issuer = IssuerUrl::new(ISSUER.to_string()).unwrap();
    let unpacker = ClaimsUnpacker::new(SignatureVerifier::new(
        &resolver,
        &issuer,
        SignatureAlgorithmPolicy::any_signed(),
    ));
    let fetched = Mutex::new(Vec::new());

    let resolved = unpacker
        .resolve(
            claims(json!({
                "sub": "A",
                "_claim_names": {
                    "payment_info": "src1",
                    "shipping_address": "src1",
                    "credit_score": "src2",
                },
                "_claim_sources": {
                    "src1": {
                        "endpoint": "https://bank.example.com/claims",
                        "access_token": "ksj3n283dke",
                    },
                    "src2": {"endpoint": "https://creditagency.example.com/claims"},
                },
            })),
            |source_id: ClaimSourceId, endpoint: DistributedClaimsUrl, access_token| {
                fetched.lock().unwrap().push((
                    source_id.as_str().to_string(),
                    endpoint.to_string(),
                    access_token.map(|token: AccessToken| token.secret().clone()),
                ));
                let fragment = if source_id.as_str() == "src1" {
                    json!({"payment_info": "Some_Card", "shipping_address": "Some_Address"})
                } else {
                    json!({"credit_score": 650})
                };
                ready(Ok::<_, TestError>(claims(fragment)))
            },
        )
        .await
        .unwrap();

    assert_eq!(
        resolved,
        claims(json!({
            "sub": "A",
            "payment_info": "Some_Card",
            "shipping_address": "Some_Address",
            "credit_score": 650,
        }))
    );
    assert_eq!(
        fetched.into_inner().unwrap(),
        vec![
            (
                "src1".to_string(),
                "https://bank.example.com/claims".to_string(),
                Some("ksj3n283dke".to_string()),
            ),
            (
                "src2".to_string(),
                "https://creditagency.example.com/claims".to_string(),
                None,
            ),
        ]
    );
}

#[tokio::test]
async fn test_distributed_fetch_failure() {
    let resolver = resolver();
    let issuer = IssuerUrl::new(ISSUER.to_string()).unwrap();
    let unpacker = ClaimsUnpacker::new(SignatureVerifier::new(
        &resolver,
        &issuer,
        SignatureAlgorithmPolicy::any_signed(),
    ));
    let jwt = signed(json!({"iss": ISSUER, "shoe_size": 9}));

    let result = unpacker
        .resolve(
            claims(json!({
                "sub": "A",
                "_claim_names": {"shoe_size": "src1", "credit_score": "src2", "name": "src3"},
                "_claim_sources": {
                    "src1": {"JWT": jwt},
                    "src2": {"endpoint": "https://down.example.com/claims"},
                    "src3": {"endpoint": "https://up.example.com/claims"},
                },
            })),
            |source_id: ClaimSourceId, _, _| {
                ready(if source_id.as_str() == "src2" {
                    Err(UserInfoError::Request(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    )))
                } else {
                    Ok(claims(json!({"name": "Alice"})))
                })
            },
        )
        .await;

    match result {
        Err(UserInfoError::DistributedFetchFailed { source_id, cause }) => {
            assert_eq!(source_id.as_str(), "src2");
            assert!(matches!(*cause, UserInfoError::Request(_)), "{:?}", cause);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_distributed_sources_fetched_concurrently() {
    let resolver = resolver();
    let issuer = IssuerUrl::new(ISSUER.to_string()).unwrap();
    let unpacker = ClaimsUnpacker::new(SignatureVerifier::new(
        &resolver,
        &issuer,
        SignatureAlgorithmPolicy::any_signed(),
    ));

    // The first source can only complete once the second one has started.
    let (sender, receiver) = oneshot::channel::<()>();
    let sender = Mutex::new(Some(sender));
    let receiver = Mutex::new(Some(receiver));

    let resolved = unpacker
        .resolve(
            claims(json!({
                "sub": "A",
                "_claim_names": {"a": "src1", "b": "src2"},
                "_claim_sources": {
                    "src1": {"endpoint": "https://one.example.com/claims"},
                    "src2": {"endpoint": "https://two.example.com/claims"},
                },
            })),
            |source_id: ClaimSourceId, _, _| {
                let wait = if source_id.as_str() == "src1" {
                    receiver.lock().unwrap().take()
                } else {
                    None
                };
                let notify = if source_id.as_str() == "src2" {
                    sender.lock().unwrap().take()
                } else {
                    None
                };
                async move {
                    if let Some(receiver) = wait {
                        receiver.await.unwrap();
                    }
                    if let Some(sender) = notify {
                        sender.send(()).unwrap();
                    }
                    Ok::<_, TestError>(claims(json!({"a": 1, "b": 2})))
                }
            },
        )
        .await
        .unwrap();

    assert_eq!(resolved, claims(json!({"sub": "A", "a": 1, "b": 2})));
}

#[test]
fn test_descriptor_deserialization() {
    match serde_json::from_value::<ClaimSourceDescriptor>(json!({"JWT": "a.b.c"})).unwrap() {
        ClaimSourceDescriptor::Aggregated { jwt } => assert_eq!(jwt, "a.b.c"),
        other => panic!("unexpected descriptor: {:?}", other),
    }
    match serde_json::from_value::<ClaimSourceDescriptor>(
        json!({"endpoint": "https://bank.example.com/claims", "access_token": "ksj3n283dke"}),
    )
    .unwrap()
    {
        ClaimSourceDescriptor::Distributed {
            endpoint,
            access_token,
        } => {
            assert_eq!(endpoint.as_str(), "https://bank.example.com/claims");
            assert_eq!(access_token.unwrap().secret(), "ksj3n283dke");
        }
        other => panic!("unexpected descriptor: {:?}", other),
    }
    assert!(
        serde_json::from_value::<ClaimSourceDescriptor>(json!({"endpoint": "not a url"}))
            .is_err()
    );
}
