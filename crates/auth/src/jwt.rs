//! JWT decoding and signature verification.
//!
//! Decoding is behind the [`JwtValidator`] trait so the HTTP layer (and tests)
//! can swap implementations. The time-window check is delegated to
//! [`validate_claims`] so it stays deterministic (caller supplies `now`).

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use campushub_core::{TenantId, UserId};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::Role;

/// Validates a bearer token and produces verified claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Raw claim set as it appears on the wire.
#[derive(Debug, Deserialize)]
struct WireClaims {
    sub: UserId,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tenant_id: Option<TenantId>,
    #[serde(default)]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// HS256 (shared-secret) validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    decoding: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            decoding: DecodingKey::from_secret(&secret),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window validation is done against the caller-supplied `now`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        let decoded = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    TokenValidationError::InvalidSignature
                }
                _ => TokenValidationError::Malformed(e.to_string()),
            })?;

        let wire = decoded.claims;
        let issued_at = timestamp(wire.iat)?;
        let expires_at = timestamp(wire.exp)?;

        let claims = JwtClaims {
            sub: wire.sub,
            email: wire.email,
            name: wire.name,
            tenant_id: wire.tenant_id,
            roles: wire.roles.into_iter().map(Role::new).collect(),
            issued_at,
            expires_at,
        };

        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenValidationError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TokenValidationError::Malformed(format!("timestamp out of range: {secs}")))
}
