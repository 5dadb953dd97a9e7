//! Stateless bearer secrets: a user id signed with the process-wide key.
//!
//! Layout of a signed secret: the canonical decimal id, a `.` separator and
//! the 32-byte HMAC-SHA256 of the decimal id. Transport encodings
//! (cookie, `Authorization` header) wrap it in unpadded base64url.
//!
//! There is no expiry and no per-secret revocation. Rotating `SECRET_KEY`
//! invalidates every secret ever issued.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MAC_LEN: usize = 32;
const SEPARATOR: u8 = b'.';

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid signature")]
pub struct InvalidSignature;

#[derive(Clone)]
pub struct SecretCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    pub fn new(key: &SecretString) -> Result<Self, anyhow::Error> {
        let mac = HmacSha256::new_from_slice(key.expose_secret().as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
        Ok(Self { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    /// Sign a user id. Deterministic for a given key.
    pub fn sign(&self, user_id: i64) -> Vec<u8> {
        let payload = user_id.to_string();
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let tag = mac.finalize().into_bytes();

        let mut out = Vec::with_capacity(payload.len() + 1 + MAC_LEN);
        out.extend_from_slice(payload.as_bytes());
        out.push(SEPARATOR);
        out.extend_from_slice(&tag);
        out
    }

    /// Verify a signed secret and return the id it carries.
    pub fn unsign(&self, secret: &[u8]) -> Result<i64, InvalidSignature> {
        if secret.len() <= MAC_LEN + 1 {
            return Err(InvalidSignature);
        }
        let split = secret.len() - MAC_LEN - 1;
        let (payload, rest) = secret.split_at(split);
        if rest[0] != SEPARATOR {
            return Err(InvalidSignature);
        }

        let mut mac = self.mac();
        mac.update(payload);
        let expected = mac.finalize().into_bytes();
        if !bool::from(expected.as_slice().ct_eq(&rest[1..])) {
            return Err(InvalidSignature);
        }

        parse_canonical_id(payload).ok_or(InvalidSignature)
    }

    /// Signed secret in its transport form.
    pub fn encode(&self, user_id: i64) -> String {
        URL_SAFE_NO_PAD.encode(self.sign(user_id))
    }

    /// Decode the transport form and verify it.
    pub fn decode(&self, encoded: &str) -> Result<i64, InvalidSignature> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| InvalidSignature)?;
        self.unsign(&raw)
    }
}

/// Only the exact form produced by `i64::to_string` is accepted.
fn parse_canonical_id(payload: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(payload).ok()?;
    let id: i64 = text.parse().ok()?;
    (id.to_string() == text).then_some(id)
}
