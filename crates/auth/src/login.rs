//! Credential verification and session issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthError, IdentityStore, PasswordHash, PasswordHasher, StoreError, TokenService, UserProfile};

/// Secret used only to build the digest compared against when the username
/// does not exist.
const DUMMY_SECRET: &str = "warden-login-timing-equalizer";

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// Exchanges a username/password pair for a signed session token.
///
/// Unknown username and wrong password fail with the same
/// [`AuthError::InvalidCredentials`], and both paths run one bcrypt
/// verification. Storage faults are propagated, not collapsed.
#[derive(Clone)]
pub struct LoginService<S> {
    store: S,
    hasher: PasswordHasher,
    tokens: TokenService,
    dummy_digest: PasswordHash,
}

impl<S: IdentityStore> LoginService<S> {
    pub fn new(store: S, hasher: PasswordHasher, tokens: TokenService) -> Result<Self, AuthError> {
        let dummy_digest = hasher.hash(DUMMY_SECRET)?;
        Ok(Self {
            store,
            hasher,
            tokens,
            dummy_digest,
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let user = match self.store.get_identity_by_username(&request.username).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                let _ = self.hasher.verify(&self.dummy_digest, &request.password);
                tracing::debug!("login rejected: unknown username");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                tracing::warn!(error = %e, "login aborted: credential store failure");
                return Err(e.into());
            }
        };

        if !self.hasher.verify(&user.password_hash, &request.password) {
            tracing::debug!(user_id = %user.id, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.tokens.mint(user.id, &user.email, Utc::now())?;
        tracing::info!(user_id = %user.id, "login succeeded");

        Ok(LoginResponse {
            access_token: issued.token,
            token_type: "Bearer".to_string(),
            expires_at: issued.claims.expires_at(),
            user: user.profile(),
        })
    }
}

impl<S> core::fmt::Debug for LoginService<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
