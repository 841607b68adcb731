//! Compact signed token codec.
//!
//! Wire format: `base64url(header_json) "." base64url(claims_json) "."
//! base64url(hmac_sha256_signature)`, no padding characters anywhere. The
//! signature covers the exact `header.claims` concatenation. Only HS256 is
//! produced or accepted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM_HS256: &str = "HS256";
pub const TOKEN_TYPE_JWT: &str = "JWT";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to serialize token segment: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoseHeader {
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(rename = "typ")]
    pub token_type: String,
}

impl JoseHeader {
    pub fn hs256() -> Self {
        Self {
            algorithm: ALGORITHM_HS256.to_string(),
            token_type: TOKEN_TYPE_JWT.to_string(),
        }
    }
}

/// The network origin a token was issued to. Re-checked at every validation
/// to prevent replay from a different origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpIdentity {
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    /// User id, as a string per RFC 7519 §4.1.2.
    #[serde(rename = "sub")]
    pub subject: String,
    /// Role id, as a string; claim name per RFC 9068.
    #[serde(rename = "roles")]
    pub role: String,
    #[serde(rename = "orig")]
    pub origin: IpIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(rename = "orig")]
    pub origin: IpIdentity,
}

/// HMAC-SHA256 over `encoded_header.encoded_claims`, base64url-encoded.
pub fn sign_header_and_payload(encoded_header: &str, encoded_claims: &str, key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(encoded_header.as_bytes());
    mac.update(b".");
    mac.update(encoded_claims.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Serialize and sign header + claims into the three-segment wire form.
pub fn encode<C: Serialize>(header: &JoseHeader, claims: &C, key: &str) -> Result<String, TokenError> {
    let header_json = serde_json::to_vec(header)?;
    let claims_json = serde_json::to_vec(claims)?;

    let encoded_header = URL_SAFE_NO_PAD.encode(header_json);
    let encoded_claims = URL_SAFE_NO_PAD.encode(claims_json);
    let signature = sign_header_and_payload(&encoded_header, &encoded_claims, key);

    Ok(format!("{encoded_header}.{encoded_claims}.{signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0f27dd2a55b1c0d8e161a32a94ba416f88e16122278500000000000000000001";

    fn access_claims() -> AccessClaims {
        AccessClaims {
            issuer: "reserva".to_string(),
            issued_at: 1_741_600_000,
            expires_at: 1_741_603_600,
            subject: "42".to_string(),
            role: "2".to_string(),
            origin: IpIdentity {
                ip: "127.0.0.1".to_string(),
            },
        }
    }

    #[test]
    fn token_has_three_nonempty_segments_without_padding() {
        let token = encode(&JoseHeader::hs256(), &access_claims(), KEY).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| !s.is_empty()));
        assert!(!token.contains('='));
    }

    #[test]
    fn header_segment_is_the_fixed_jose_header() {
        let token = encode(&JoseHeader::hs256(), &access_claims(), KEY).unwrap();
        let header_segment = token.split('.').next().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(header_segment).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            r#"{"alg":"HS256","typ":"JWT"}"#
        );
    }

    #[test]
    fn signature_matches_recomputation_over_first_two_segments() {
        let token = encode(&JoseHeader::hs256(), &access_claims(), KEY).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(
            sign_header_and_payload(segments[0], segments[1], KEY),
            segments[2]
        );
    }

    #[test]
    fn different_keys_produce_different_signatures() {
        let a = encode(&JoseHeader::hs256(), &access_claims(), KEY).unwrap();
        let b = encode(&JoseHeader::hs256(), &access_claims(), "another-key").unwrap();
        let sig = |t: &str| t.rsplit('.').next().unwrap().to_string();
        assert_ne!(sig(&a), sig(&b));
        // Header and claims segments are key-independent.
        assert_eq!(a.split('.').nth(1), b.split('.').nth(1));
    }

    #[test]
    fn claims_round_trip_through_the_wire_form() {
        let claims = access_claims();
        let token = encode(&JoseHeader::hs256(), &claims, KEY).unwrap();
        let claims_segment = token.split('.').nth(1).unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(claims_segment).unwrap();
        let recovered: AccessClaims = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(recovered, claims);
    }
}
