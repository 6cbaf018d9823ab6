use crate::types::jwk::{
    JsonWebKey, JsonWebKeyAlgorithm, JsonWebKeyId, JsonWebKeyUse, JwsSigningAlgorithm,
};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, VecSkipError};

/// JSON Web Key Set, as published at a provider's `jwks_uri`.
///
/// Keys this library can't parse are skipped so that the remaining keys stay usable.
#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct JsonWebKeySet<K>
where
    K: JsonWebKey,
{
    #[serde(bound = "K: JsonWebKey")]
    #[serde_as(as = "VecSkipError<_>")]
    keys: Vec<K>,
}
impl<K> JsonWebKeySet<K>
where
    K: JsonWebKey,
{
    /// Creates a key set from the given keys.
    pub fn new(keys: Vec<K>) -> Self {
        Self { keys }
    }

    /// Returns the keys in this set.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Returns the keys able to verify a `signature_alg` signature. A token without a `kid`
    /// header matches keys with any ID.
    pub(crate) fn filter_keys(
        &self,
        key_id: Option<&JsonWebKeyId>,
        signature_alg: &K::SigningAlgorithm,
    ) -> Vec<&K> {
        self.keys
            .iter()
            .filter(|key| key_id.map_or(true, |key_id| key.key_id() == Some(key_id)))
            .filter(|key| check_key_compatibility(*key, signature_alg).is_ok())
            .collect()
    }
}
impl<K> Default for JsonWebKeySet<K>
where
    K: JsonWebKey,
{
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Checks the key's `use`, `kty` and `alg` members against a signature algorithm.
pub(crate) fn check_key_compatibility<K>(
    key: &K,
    signature_alg: &K::SigningAlgorithm,
) -> Result<(), &'static str>
where
    K: JsonWebKey,
{
    if key
        .key_use()
        .map_or(false, |key_use| !key_use.allows_signature())
    {
        return Err("key usage not permitted for digital signatures");
    }
    if signature_alg.key_type().as_ref() != Some(key.key_type()) {
        return Err("key type does not match signature algorithm");
    }
    match key.signing_alg() {
        JsonWebKeyAlgorithm::Unspecified => Ok(()),
        JsonWebKeyAlgorithm::Algorithm(key_alg) if key_alg == signature_alg => Ok(()),
        JsonWebKeyAlgorithm::Algorithm(_) => Err("incompatible key algorithm"),
        JsonWebKeyAlgorithm::Unsupported => Err("key algorithm is not a signing algorithm"),
    }
}
