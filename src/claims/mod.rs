use crate::jwt::ClaimsJsonWebToken;
use crate::user_info::UserInfoError;
use crate::verification::{ClaimsVerificationError, SignatureVerifier};
use crate::{AccessToken, ClaimSourceId, DistributedClaimsUrl};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;

#[cfg(test)]
mod tests;

/// Claims keyed by claim name.
pub type ClaimSet = serde_json::Map<String, serde_json::Value>;

const CLAIM_NAMES: &str = "_claim_names";
const CLAIM_SOURCES: &str = "_claim_sources";

/// Where the value of an aggregated or distributed claim comes from, as described in
/// [Section 5.6.2 of OpenID Connect Core 1.0](
/// https://openid.net/specs/openid-connect-core-1_0.html#AggregatedDistributedClaims).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClaimSourceDescriptor {
    /// Claims embedded in the response as a JWT signed by the claims provider.
    Aggregated {
        /// Compact JWS issued by the claims provider.
        #[serde(rename = "JWT")]
        jwt: String,
    },
    /// Claims to be fetched from the claims provider.
    Distributed {
        /// Endpoint returning the claims.
        endpoint: DistributedClaimsUrl,
        /// Bearer token for the endpoint, if the provider supplied one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<AccessToken>,
    },
}
impl ClaimSourceDescriptor {
    fn from_json(
        source_id: &ClaimSourceId,
        value: serde_json::Value,
    ) -> Result<Self, ClaimsVerificationError> {
        serde_json::from_value(value).map_err(|err| {
            ClaimsVerificationError::MalformedResponse(format!(
                "invalid descriptor for claim source `{}`: {}",
                source_id.as_str(),
                err
            ))
        })
    }
}

/// Replaces aggregated and distributed claim references with the values they point to.
///
/// Aggregated sources are verified inline. Distributed sources are fetched concurrently
/// through a caller-supplied function and joined: the first failure fails the whole
/// resolution and drops the remaining fetches.
pub(crate) struct ClaimsUnpacker<'a> {
    verifier: SignatureVerifier<'a>,
}
impl<'a> ClaimsUnpacker<'a> {
    /// Creates an unpacker that checks aggregated claims tokens with `verifier`.
    pub(crate) fn new(verifier: SignatureVerifier<'a>) -> Self {
        Self { verifier }
    }

    /// Resolves every claim referenced by `_claim_names`, and removes `_claim_names` and
    /// `_claim_sources` from the result.
    ///
    /// `fetch_distributed` retrieves and verifies the claims of one distributed source, given
    /// its ID, endpoint and the access token from its descriptor.
    pub(crate) async fn resolve<RE, F, Fut>(
        &self,
        mut claims: ClaimSet,
        fetch_distributed: F,
    ) -> Result<ClaimSet, UserInfoError<RE>>
    where
        RE: std::error::Error + 'static,
        F: Fn(ClaimSourceId, DistributedClaimsUrl, Option<AccessToken>) -> Fut,
        Fut: Future<Output = Result<ClaimSet, UserInfoError<RE>>>,
    {
        let claim_names = match claims.remove(CLAIM_NAMES) {
            Some(claim_names) => claim_names,
            None => {
                if claims.remove(CLAIM_SOURCES).is_some() {
                    log::debug!("Ignoring `{}` without `{}`", CLAIM_SOURCES, CLAIM_NAMES);
                }
                return Ok(claims);
            }
        };
        let references = Self::claim_references(claim_names)?;
        let mut claim_sources = match claims.remove(CLAIM_SOURCES) {
            None => ClaimSet::new(),
            Some(serde_json::Value::Object(claim_sources)) => claim_sources,
            Some(other) => {
                return Err(ClaimsVerificationError::MalformedResponse(format!(
                    "`{}` must be an object (found {})",
                    CLAIM_SOURCES, other
                ))
                .into())
            }
        };

        let mut aggregated = Vec::new();
        let mut distributed = Vec::new();
        for source_id in references.values().collect::<BTreeSet<_>>() {
            let descriptor = claim_sources.remove(source_id.as_str()).ok_or_else(|| {
                ClaimsVerificationError::ClaimSourceUnresolved(format!(
                    "claim source `{}` is missing from `{}`",
                    source_id.as_str(),
                    CLAIM_SOURCES
                ))
            })?;
            match ClaimSourceDescriptor::from_json(source_id, descriptor)? {
                ClaimSourceDescriptor::Aggregated { jwt } => {
                    aggregated.push((source_id.clone(), jwt))
                }
                ClaimSourceDescriptor::Distributed {
                    endpoint,
                    access_token,
                } => distributed.push((source_id.clone(), endpoint, access_token)),
            }
        }

        let mut fragments = HashMap::new();
        for (source_id, jwt) in aggregated {
            log::debug!("Verifying aggregated claims from source `{}`", source_id.as_str());
            let fragment = self.verify_aggregated(&source_id, &jwt)?;
            fragments.insert(source_id, fragment);
        }

        let fetches = distributed
            .into_iter()
            .map(|(source_id, endpoint, access_token)| {
                log::debug!(
                    "Fetching distributed claims for source `{}` from {}",
                    source_id.as_str(),
                    endpoint
                );
                let fetch = fetch_distributed(source_id.clone(), endpoint, access_token);
                async move {
                    match fetch.await {
                        Ok(fragment) => Ok((source_id, fragment)),
                        Err(cause) => Err(UserInfoError::DistributedFetchFailed {
                            source_id,
                            cause: Box::new(cause),
                        }),
                    }
                }
            });
        fragments.extend(try_join_all(fetches).await?);

        for (claim_name, source_id) in references {
            let value = fragments
                .get(&source_id)
                .and_then(|fragment| fragment.get(&claim_name))
                .cloned()
                .ok_or_else(|| {
                    ClaimsVerificationError::ClaimSourceUnresolved(format!(
                        "claim `{}` is missing from claim source `{}`",
                        claim_name,
                        source_id.as_str()
                    ))
                })?;
            if claims.contains_key(&claim_name) {
                log::warn!(
                    "Keeping existing claim `{}` instead of the value from source `{}`",
                    claim_name,
                    source_id.as_str()
                );
                continue;
            }
            claims.insert(claim_name, value);
        }

        Ok(claims)
    }

    fn claim_references(
        claim_names: serde_json::Value,
    ) -> Result<BTreeMap<String, ClaimSourceId>, ClaimsVerificationError> {
        let claim_names = match claim_names {
            serde_json::Value::Object(claim_names) => claim_names,
            other => {
                return Err(ClaimsVerificationError::MalformedResponse(format!(
                    "`{}` must be an object (found {})",
                    CLAIM_NAMES, other
                )))
            }
        };

        claim_names
            .into_iter()
            .map(|(claim_name, source_id)| {
                // The subject must come from the verified response itself, and the scaffolding
                // never survives resolution.
                if matches!(claim_name.as_str(), "sub" | CLAIM_NAMES | CLAIM_SOURCES) {
                    return Err(ClaimsVerificationError::MalformedResponse(format!(
                        "`{}` must not reference `{}`",
                        CLAIM_NAMES, claim_name
                    )));
                }
                match source_id {
                    serde_json::Value::String(source_id) => {
                        Ok((claim_name, ClaimSourceId::new(source_id)))
                    }
                    other => Err(ClaimsVerificationError::MalformedResponse(format!(
                        "source ID for claim `{}` must be a string (found {})",
                        claim_name, other
                    ))),
                }
            })
            .collect()
    }

    fn verify_aggregated(
        &self,
        source_id: &ClaimSourceId,
        jwt: &str,
    ) -> Result<ClaimSet, ClaimsVerificationError> {
        ClaimsJsonWebToken::from_compact(jwt)
            .map_err(|err| {
                ClaimsVerificationError::MalformedResponse(format!("failed to parse JWT: {}", err))
            })
            .and_then(|jwt| self.verifier.verified_claims(jwt))
            .map_err(|cause| ClaimsVerificationError::AggregatedVerificationFailed {
                source_id: source_id.clone(),
                cause: Box::new(cause),
            })
    }
}
