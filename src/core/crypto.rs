use crate::core::jwk::CoreJsonCurveType;
use crate::core::{CoreJsonWebKey, CoreJsonWebKeyType, CoreJweContentEncryptionAlgorithm};
use crate::helpers::Base64UrlEncodedBytes;
use crate::jwe::DecryptionError;
use crate::types::jwk::JsonWebKey;
use crate::SignatureVerificationError;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::Mac;
use rsa::BigUint;
use sha2::Digest;
use subtle::ConstantTimeEq;

fn rsa_public_key(
    key: &CoreJsonWebKey,
) -> Result<(&Base64UrlEncodedBytes, &Base64UrlEncodedBytes), String> {
    if *key.key_type() != CoreJsonWebKeyType::RSA {
        Err("RSA key required".to_string())
    } else {
        let n = key
            .n
            .as_ref()
            .ok_or_else(|| "RSA modulus `n` is missing".to_string())?;
        let e = key
            .e
            .as_ref()
            .ok_or_else(|| "RSA exponent `e` is missing".to_string())?;
        Ok((n, e))
    }
}

pub(crate) fn rsa_public_key_from_jwk(key: &CoreJsonWebKey) -> Result<rsa::RsaPublicKey, String> {
    let (n, e) = rsa_public_key(key)?;
    rsa::RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
        .map_err(|err| err.to_string())
}

pub fn verify_rsa_signature(
    key: &CoreJsonWebKey,
    padding: impl rsa::traits::SignatureScheme,
    msg: &[u8],
    signature: &[u8],
) -> Result<(), SignatureVerificationError> {
    let public_key =
        rsa_public_key_from_jwk(key).map_err(SignatureVerificationError::InvalidKey)?;

    public_key
        .verify(padding, msg, signature)
        .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))
}

/// Encodes the public point in the uncompressed SEC1 form (0x04 || X || Y), which RFC 5480
/// Section 2.2 requires all implementations to support.
fn ec_public_key(key: &CoreJsonWebKey) -> Result<(Vec<u8>, &CoreJsonCurveType), String> {
    if *key.key_type() != CoreJsonWebKeyType::EllipticCurve {
        return Err("EC key required".to_string());
    }
    let x = key
        .x
        .as_ref()
        .ok_or_else(|| "EC `x` part is missing".to_string())?;
    let y = key
        .y
        .as_ref()
        .ok_or_else(|| "EC `y` part is missing".to_string())?;
    let crv = key
        .crv
        .as_ref()
        .ok_or_else(|| "EC `crv` part is missing".to_string())?;

    let mut point = Vec::with_capacity(1 + x.len() + y.len());
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    Ok((point, crv))
}

pub fn verify_ec_signature(
    key: &CoreJsonWebKey,
    msg: &[u8],
    signature: &[u8],
) -> Result<(), SignatureVerificationError> {
    use p256::ecdsa::signature::Verifier;

    let (point, crv) = ec_public_key(key).map_err(SignatureVerificationError::InvalidKey)?;
    match *crv {
        CoreJsonCurveType::P256 => {
            let public_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| SignatureVerificationError::InvalidKey(e.to_string()))?;
            let signature = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))?;
            public_key
                .verify(msg, &signature)
                .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))
        }
        CoreJsonCurveType::P384 => {
            let public_key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| SignatureVerificationError::InvalidKey(e.to_string()))?;
            let signature = p384::ecdsa::Signature::from_slice(signature)
                .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))?;
            public_key
                .verify(msg, &signature)
                .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))
        }
        CoreJsonCurveType::P521 => Err(SignatureVerificationError::UnsupportedAlg(
            "P521".to_string(),
        )),
        CoreJsonCurveType::Ed25519 => Err(SignatureVerificationError::InvalidKey(
            "Ed25519 is not an elliptic curve for ECDSA".to_string(),
        )),
    }
}

pub fn verify_ed_signature(
    key: &CoreJsonWebKey,
    msg: &[u8],
    signature: &[u8],
) -> Result<(), SignatureVerificationError> {
    use ed25519_dalek::Verifier;

    if *key.key_type() != CoreJsonWebKeyType::OctetKeyPair {
        return Err(SignatureVerificationError::InvalidKey(
            "OKP key required".to_string(),
        ));
    }
    let x = key.x.as_ref().ok_or_else(|| {
        SignatureVerificationError::InvalidKey("OKP `x` part is missing".to_string())
    })?;
    let public_key_bytes: &[u8; ed25519_dalek::PUBLIC_KEY_LENGTH] =
        x.as_slice().try_into().map_err(|_| {
            SignatureVerificationError::InvalidKey("invalid Ed25519 public key length".to_string())
        })?;
    let public_key = ed25519_dalek::VerifyingKey::from_bytes(public_key_bytes)
        .map_err(|e| SignatureVerificationError::InvalidKey(e.to_string()))?;
    let signature = ed25519_dalek::Signature::from_slice(signature)
        .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))?;

    public_key
        .verify(msg, &signature)
        .map_err(|_| SignatureVerificationError::CryptoError("bad signature".to_string()))
}

/// Derives the symmetric key used with the `dir` key management algorithm from the client secret.
///
/// See [Section 10.2 of OpenID Connect Core 1.0](
///     https://openid.net/specs/openid-connect-core-1_0.html#Encryption): the secret's UTF-8
/// octets are hashed with SHA-256, SHA-384 or SHA-512 (the shortest digest at least as long as
/// the required key), and the left-most bytes are kept.
pub(crate) fn derive_direct_key(client_secret: &[u8], key_len: usize) -> Vec<u8> {
    let digest = if key_len <= 32 {
        sha2::Sha256::digest(client_secret).to_vec()
    } else if key_len <= 48 {
        sha2::Sha384::digest(client_secret).to_vec()
    } else {
        sha2::Sha512::digest(client_secret).to_vec()
    };
    digest[..key_len.min(digest.len())].to_vec()
}

/// Computes the truncated HMAC authentication tag of the AES-CBC-HMAC-SHA2 composite algorithms
/// (see [Section 5.2.2.1 of RFC 7518](https://tools.ietf.org/html/rfc7518#section-5.2.2.1)).
fn cbc_hmac_tag(
    enc: &CoreJweContentEncryptionAlgorithm,
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, String> {
    // AL: number of bits in the AAD as a 64-bit big-endian integer.
    let al = ((aad.len() as u64) * 8).to_be_bytes();

    macro_rules! hmac_tag {
        ($digest:ty) => {{
            let mut mac = <hmac::Hmac<$digest> as Mac>::new_from_slice(mac_key)
                .map_err(|e| format!("Could not create key: {}", e))?;
            mac.update(aad);
            mac.update(iv);
            mac.update(ciphertext);
            mac.update(&al);
            mac.finalize().into_bytes().to_vec()
        }};
    }

    let full_tag = match *enc {
        CoreJweContentEncryptionAlgorithm::Aes128CbcHmacSha256 => hmac_tag!(sha2::Sha256),
        CoreJweContentEncryptionAlgorithm::Aes192CbcHmacSha384 => hmac_tag!(sha2::Sha384),
        CoreJweContentEncryptionAlgorithm::Aes256CbcHmacSha512 => hmac_tag!(sha2::Sha512),
        ref other => {
            return Err(format!(
                "{} is not a CBC-HMAC algorithm",
                crate::helpers::plain_name(other)
            ))
        }
    };
    Ok(full_tag[..mac_key.len()].to_vec())
}

fn check_lengths(
    enc: &CoreJweContentEncryptionAlgorithm,
    cek: &[u8],
    iv: &[u8],
) -> Result<(), DecryptionError> {
    if cek.len() != enc.key_len() {
        return Err(DecryptionError::CryptoError(format!(
            "content encryption key has length {} (expected {})",
            cek.len(),
            enc.key_len()
        )));
    }
    if iv.len() != enc.iv_len() {
        return Err(DecryptionError::CryptoError(format!(
            "initialization vector has length {} (expected {})",
            iv.len(),
            enc.iv_len()
        )));
    }
    Ok(())
}

/// Authenticates and decrypts JWE ciphertext using the Content Encryption Key.
pub(crate) fn decrypt_content(
    enc: &CoreJweContentEncryptionAlgorithm,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    check_lengths(enc, cek, iv)?;

    match *enc {
        CoreJweContentEncryptionAlgorithm::Aes128CbcHmacSha256
        | CoreJweContentEncryptionAlgorithm::Aes192CbcHmacSha384
        | CoreJweContentEncryptionAlgorithm::Aes256CbcHmacSha512 => {
            let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

            let expected_tag = cbc_hmac_tag(enc, mac_key, aad, iv, ciphertext)
                .map_err(DecryptionError::Other)?;
            if !bool::from(expected_tag.ct_eq(tag)) {
                return Err(DecryptionError::CryptoError(
                    "authentication tag mismatch".to_string(),
                ));
            }

            macro_rules! cbc_decrypt {
                ($cipher:ty) => {
                    cbc::Decryptor::<$cipher>::new_from_slices(enc_key, iv)
                        .map_err(|e| DecryptionError::CryptoError(e.to_string()))?
                        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                        .map_err(|_| DecryptionError::CryptoError("invalid padding".to_string()))
                };
            }

            match enc_key.len() {
                16 => cbc_decrypt!(aes::Aes128),
                24 => cbc_decrypt!(aes::Aes192),
                _ => cbc_decrypt!(aes::Aes256),
            }
        }
        CoreJweContentEncryptionAlgorithm::Aes128Gcm
        | CoreJweContentEncryptionAlgorithm::Aes256Gcm => {
            let mut msg = Vec::with_capacity(ciphertext.len() + tag.len());
            msg.extend_from_slice(ciphertext);
            msg.extend_from_slice(tag);
            let payload = Payload { msg: &msg, aad };
            let nonce = Nonce::from_slice(iv);

            let result = if *enc == CoreJweContentEncryptionAlgorithm::Aes128Gcm {
                Aes128Gcm::new_from_slice(cek)
                    .map_err(|e| DecryptionError::CryptoError(e.to_string()))?
                    .decrypt(nonce, payload)
            } else {
                Aes256Gcm::new_from_slice(cek)
                    .map_err(|e| DecryptionError::CryptoError(e.to_string()))?
                    .decrypt(nonce, payload)
            };
            result.map_err(|_| DecryptionError::CryptoError("AES-GCM decryption failed".to_string()))
        }
        ref other => Err(DecryptionError::UnsupportedAlg(crate::helpers::plain_name(
            other,
        ))),
    }
}

/// Encrypts a JWE plaintext, returning the ciphertext and authentication tag.
pub(crate) fn encrypt_content(
    enc: &CoreJweContentEncryptionAlgorithm,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), String> {
    check_lengths(enc, cek, iv).map_err(|e| e.to_string())?;

    match *enc {
        CoreJweContentEncryptionAlgorithm::Aes128CbcHmacSha256
        | CoreJweContentEncryptionAlgorithm::Aes192CbcHmacSha384
        | CoreJweContentEncryptionAlgorithm::Aes256CbcHmacSha512 => {
            let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

            macro_rules! cbc_encrypt {
                ($cipher:ty) => {
                    cbc::Encryptor::<$cipher>::new_from_slices(enc_key, iv)
                        .map_err(|e| e.to_string())?
                        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
                };
            }

            let ciphertext = match enc_key.len() {
                16 => cbc_encrypt!(aes::Aes128),
                24 => cbc_encrypt!(aes::Aes192),
                _ => cbc_encrypt!(aes::Aes256),
            };
            let tag = cbc_hmac_tag(enc, mac_key, aad, iv, &ciphertext)?;
            Ok((ciphertext, tag))
        }
        CoreJweContentEncryptionAlgorithm::Aes128Gcm
        | CoreJweContentEncryptionAlgorithm::Aes256Gcm => {
            let payload = Payload {
                msg: plaintext,
                aad,
            };
            let nonce = Nonce::from_slice(iv);

            let mut sealed = if *enc == CoreJweContentEncryptionAlgorithm::Aes128Gcm {
                Aes128Gcm::new_from_slice(cek)
                    .map_err(|e| e.to_string())?
                    .encrypt(nonce, payload)
            } else {
                Aes256Gcm::new_from_slice(cek)
                    .map_err(|e| e.to_string())?
                    .encrypt(nonce, payload)
            }
            .map_err(|_| "AES-GCM encryption failed".to_string())?;

            // The AEAD output is the ciphertext followed by a 128-bit tag.
            let tag = sealed.split_off(sealed.len() - 16);
            Ok((sealed, tag))
        }
        ref other => Err(format!(
            "unsupported content encryption algorithm {}",
            crate::helpers::plain_name(other)
        )),
    }
}
