//! Token validation state machine.
//!
//! A raw token string is driven through the RFC 7519 §7.2 pipeline, adapted
//! to a single fixed algorithm (HS256) and the custom originating-identity
//! claim: structural checks, signature recomputation, header checks, claims
//! extraction, expiry, identity binding — short-circuiting on the first
//! failure. Integrity is verified before anything inside the token is
//! trusted enough to parse.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use super::token::{
    sign_header_and_payload, AccessClaims, JoseHeader, RefreshClaims, ALGORITHM_HS256,
    TOKEN_TYPE_JWT,
};

/// Terminal states of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    /// Structurally broken: wrong segment count, empty segments, undecodable
    /// or whitespace-polluted segments, unsupported header parameters.
    Malformed,
    /// The signature does not match the header and claims segments.
    IntegrityFailed,
    /// Claims parsed, signature intact, but `exp` is in the past. Claims are
    /// retained: the refresh flow accepts an expired access token.
    Expired,
    /// Claims parsed and current, but the originating IP does not match the
    /// caller's.
    IdentityMismatch,
    Valid,
}

impl ValidationState {
    pub fn describe(self) -> &'static str {
        match self {
            ValidationState::Malformed => "token is malformed",
            ValidationState::IntegrityFailed => "token was changed along the way",
            ValidationState::Expired => "token is expired",
            ValidationState::IdentityMismatch => {
                "token was sent from a different origin than it was issued to"
            }
            ValidationState::Valid => "token is valid",
        }
    }
}

/// Which claims shape the caller expects; implied by the key it validates
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl Claims {
    pub fn subject(&self) -> &str {
        match self {
            Claims::Access(c) => &c.subject,
            Claims::Refresh(c) => &c.subject,
        }
    }

    pub fn expires_at(&self) -> i64 {
        match self {
            Claims::Access(c) => c.expires_at,
            Claims::Refresh(c) => c.expires_at,
        }
    }

    pub fn origin_ip(&self) -> &str {
        match self {
            Claims::Access(c) => &c.origin.ip,
            Claims::Refresh(c) => &c.origin.ip,
        }
    }

    pub fn access(&self) -> Option<&AccessClaims> {
        match self {
            Claims::Access(c) => Some(c),
            Claims::Refresh(_) => None,
        }
    }
}

/// Outcome of a validation run. `header`/`claims` are populated as far as
/// the pipeline got; on [`ValidationState::Expired`] and
/// [`ValidationState::IdentityMismatch`] the claims are fully decoded.
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub state: ValidationState,
    pub header: Option<JoseHeader>,
    pub claims: Option<Claims>,
}

impl TokenValidation {
    pub fn is_valid(&self) -> bool {
        self.state == ValidationState::Valid
    }

    fn rejected(state: ValidationState) -> Self {
        Self {
            state,
            header: None,
            claims: None,
        }
    }
}

/// Run the validation pipeline against `token` with the caller's network
/// identity. `now` is injected so expiry behavior is deterministic in tests.
pub fn validate_token(
    token: &str,
    key: &str,
    kind: TokenKind,
    caller_ip: &str,
    now: DateTime<Utc>,
) -> TokenValidation {
    // 1. At least one period, then exactly three segments.
    let segments: Vec<&str> = token.split('.').collect();
    let dots = segments.len() - 1;
    if dots < 1 {
        tracing::warn!("token contains less than one period character");
        return TokenValidation::rejected(ValidationState::Malformed);
    }
    if segments.len() != 3 {
        tracing::warn!(segments = segments.len(), "token does not have 3 segments");
        return TokenValidation::rejected(ValidationState::Malformed);
    }

    // 2. No empty segments.
    let (encoded_header, encoded_claims, encoded_signature) =
        (segments[0], segments[1], segments[2]);
    if encoded_header.is_empty() || encoded_claims.is_empty() || encoded_signature.is_empty() {
        tracing::warn!("token has empty segment(s)");
        return TokenValidation::rejected(ValidationState::Malformed);
    }

    // 3. Recompute the signature before trusting anything inside.
    let expected_signature = sign_header_and_payload(encoded_header, encoded_claims, key);
    let signature_matches = expected_signature.len() == encoded_signature.len()
        && bool::from(
            expected_signature
                .as_bytes()
                .ct_eq(encoded_signature.as_bytes()),
        );
    if !signature_matches {
        tracing::warn!("token signature does not match header and claims");
        return TokenValidation::rejected(ValidationState::IntegrityFailed);
    }

    // 4. Header: decode, no embedded whitespace, only supported parameters.
    let header: JoseHeader = match decode_header_segment(encoded_header) {
        Ok(header) => header,
        Err(reason) => {
            tracing::warn!(reason, "token header rejected");
            return TokenValidation::rejected(ValidationState::Malformed);
        }
    };
    if header.algorithm != ALGORITHM_HS256 || header.token_type != TOKEN_TYPE_JWT {
        tracing::warn!(
            algorithm = %header.algorithm,
            token_type = %header.token_type,
            "token header has unsupported parameters"
        );
        return TokenValidation::rejected(ValidationState::Malformed);
    }

    // 5. Claims, shaped by the key the caller chose.
    let claims = match kind {
        TokenKind::Access => {
            decode_claims_segment::<AccessClaims>(encoded_claims).map(Claims::Access)
        }
        TokenKind::Refresh => {
            decode_claims_segment::<RefreshClaims>(encoded_claims).map(Claims::Refresh)
        }
    };
    let claims = match claims {
        Ok(claims) => claims,
        Err(reason) => {
            tracing::warn!(reason, "token claims rejected");
            return TokenValidation::rejected(ValidationState::Malformed);
        }
    };

    let decoded = |state| TokenValidation {
        state,
        header: Some(header.clone()),
        claims: Some(claims.clone()),
    };

    // 6. Expiry.
    if claims.expires_at() < now.timestamp() {
        tracing::warn!(subject = claims.subject(), "token is expired");
        return decoded(ValidationState::Expired);
    }

    // 7. Identity binding.
    if claims.origin_ip() != caller_ip {
        tracing::warn!(
            subject = claims.subject(),
            caller_ip,
            "token presented from a different origin than it was issued to"
        );
        return decoded(ValidationState::IdentityMismatch);
    }

    // 8. Done.
    decoded(ValidationState::Valid)
}

fn decode_base64_json(segment: &str) -> Result<String, &'static str> {
    let decoded = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| "segment is not valid base64url")?;
    String::from_utf8(decoded).map_err(|_| "segment is not valid UTF-8")
}

/// The header must be the compact serialization: no line breaks, spaces or
/// tabs anywhere, per RFC 7519's canonical-form restriction.
fn decode_header_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, &'static str> {
    let text = decode_base64_json(segment)?;
    if text.contains('\n') || text.contains(' ') || text.contains('\t') {
        return Err("header has line break, whitespace or tab character(s)");
    }
    serde_json::from_str(&text).map_err(|_| "segment is not a valid JSON object of this shape")
}

/// Claims reject surrounding whitespace; interior whitespace inside string
/// values is legitimate payload.
fn decode_claims_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, &'static str> {
    let text = decode_base64_json(segment)?;
    if text != text.trim() {
        return Err("claims have leading or trailing whitespace");
    }
    serde_json::from_str(&text).map_err(|_| "segment is not a valid JSON object of this shape")
}
