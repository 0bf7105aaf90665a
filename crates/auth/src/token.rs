//! Session token issuance and verification (HMAC-signed JWT).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use warden_core::UserId;

use crate::claims::{SessionClaims, validate_claims};
use crate::AuthError;

/// The only accepted signing algorithm. Tokens declaring anything else are rejected.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

const RECOMMENDED_SECRET_LEN: usize = 32;

/// Immutable token configuration, injected into [`TokenService`] at construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::TokenIssue("signing secret is not configured".into()));
        }
        if self.secret.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                len = self.secret.len(),
                "token signing secret is shorter than recommended ({RECOMMENDED_SECRET_LEN} bytes)"
            );
        }
        Ok(())
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// Issues and verifies self-contained session tokens.
///
/// Pure CPU work over immutable keys: no storage, no revocation, safe to
/// share across threads. Validity is a function of signature and time window.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Time checks are done by `validate_claims` so they are deterministic
        // for a given `now`; the library only checks signature, algorithm and shape.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = vec![SIGNING_ALGORITHM];
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        Ok(Self {
            config: Arc::new(config),
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            validation: Arc::new(validation),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Issue a token for a user, valid from now for the configured ttl.
    pub fn issue(&self, user_id: UserId, email: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, email, Utc::now())
    }

    pub fn issue_at(&self, user_id: UserId, email: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        self.mint(user_id, email, now).map(|issued| issued.token)
    }

    /// Sign a new token and return it with its claims.
    pub fn mint(&self, user_id: UserId, email: &str, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: user_id,
            email: email.to_string(),
            iss: self.config.issuer.clone(),
            iat,
            nbf: iat,
            exp: iat.saturating_add(self.config.ttl.num_seconds()),
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenIssue(e.to_string()))?;

        tracing::debug!(user_id = %user_id, exp = claims.exp, "issued session token");
        Ok(IssuedToken { token, claims })
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, algorithm, structure and time window at `now`.
    ///
    /// Every failure is reported as [`AuthError::InvalidToken`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(reason = ?e.kind(), "token rejected");
            AuthError::InvalidToken
        })?;

        validate_claims(&data.claims, now).map_err(|e| {
            tracing::debug!(reason = %e, user_id = %data.claims.sub, "token rejected");
            AuthError::InvalidToken
        })?;

        Ok(data.claims)
    }
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
