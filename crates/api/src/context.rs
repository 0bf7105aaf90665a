use warden_auth::{SessionClaims, User, UserProfile};
use warden_core::UserId;

/// Principal context for a request: verified claims plus the identity loaded
/// for this request (roles and permissions expanded).
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    claims: SessionClaims,
    user: User,
}

impl PrincipalContext {
    pub fn new(claims: SessionClaims, user: User) -> Self {
        Self { claims, user }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn profile(&self) -> UserProfile {
        self.user.profile()
    }
}
