use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::UserId;

/// Session claims carried by a signed token.
///
/// Timestamps are JWT NumericDate values (seconds since the Unix epoch).
/// Claims are derived at login and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user the token was issued to.
    pub sub: UserId,

    pub email: String,

    /// Issuer string from the token configuration.
    pub iss: String,

    /// Issued-at.
    pub iat: i64,

    /// Not-before (equal to `iat` for tokens issued here).
    pub nbf: i64,

    /// Expiry.
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> UserId {
        self.sub
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of session claims.
///
/// Signature verification happens before this, in the token service. The
/// detailed error is for logs; callers outside the core only ever see
/// `AuthError::InvalidToken`.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat || now < claims.nbf {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
