use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

// JWK members are loosely specified and key types may reuse names with different types (RFC 7517
// Section 4). A member that doesn't parse as expected is treated as absent.
pub(crate) fn deserialize_option_or_none<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: DeserializeOwned,
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<Option<T>>(value).unwrap_or(None))
}

/// Joins algorithm names (or anything else that serializes as a plain string) for error messages.
pub(crate) fn join_plain<'a, T, I>(values: I) -> String
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    use itertools::Itertools;

    values
        .into_iter()
        .map(|value| format!("`{}`", plain_name(value)))
        .join(", ")
}

/// Returns the string form of a plain serde enum (e.g., `RS256` for
/// [`CoreJwsSigningAlgorithm::RsaSsaPkcs1V15Sha256`][crate::core::CoreJwsSigningAlgorithm]).
pub(crate) fn plain_name<T>(value: &T) -> String
where
    T: Serialize,
{
    serde_plain::to_string(value).unwrap_or_else(|_| "<unknown>".to_string())
}

/// Access token expiry as NumericDate seconds since the epoch.
pub(crate) mod serde_utc_seconds_opt {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            None => Ok(None),
            Some(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("timestamp `{}` is out of range", secs))),
        }
    }

    pub fn serialize<S>(v: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        v.map(|utc| utc.timestamp()).serialize(serializer)
    }
}

/// Converts a relative `expires_in` into an absolute expiry.
pub(crate) fn expires_at_from_now(expires_in: std::time::Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(expires_in)
        .ok()
        .and_then(|duration| Utc::now().checked_add_signed(duration))
}

new_type![
    /// Bytes carried as an unpadded base64url string (JWK members such as `n`, `e` and `k`).
    #[derive(Deserialize, Eq, Hash, Serialize)]
    Base64UrlEncodedBytes(
        #[serde(with = "serde_base64url")]
        Vec<u8>
    )
];

mod serde_base64url {
    use crate::core::base64_url_safe_no_pad;

    use base64::Engine;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        base64_url_safe_no_pad()
            .decode(&encoded)
            .map_err(|err| D::Error::custom(format!("invalid base64url `{}`: {}", encoded, err)))
    }

    pub fn serialize<S>(v: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64_url_safe_no_pad().encode(v))
    }
}
