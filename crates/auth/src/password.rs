//! One-way salted password hashing (bcrypt).
//!
//! Digests are self-describing (`$2b$<cost>$<salt><hash>`), so verification
//! needs nothing but the stored string.

use crate::AuthError;

/// Length of a bcrypt digest in its modular-crypt string form.
const BCRYPT_DIGEST_LEN: usize = 60;

const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];

/// A stored password digest.
///
/// Deliberately not `Serialize`: digests stay inside the core and the store.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a digest loaded from the store.
    pub fn from_stored(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether `candidate` already has the shape of a bcrypt digest.
    ///
    /// Judged by format and length only. Used to avoid double-hashing on
    /// update paths.
    pub fn looks_hashed(candidate: &str) -> bool {
        candidate.len() == BCRYPT_DIGEST_LEN
            && BCRYPT_PREFIXES.iter().any(|p| candidate.starts_with(p))
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Salted, cost-parameterized password hasher.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with an explicit bcrypt cost (4..=31).
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        if !(4..=31).contains(&cost) {
            return Err(AuthError::Hashing(format!("bcrypt cost {cost} out of range 4..=31")));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext secret with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<PasswordHash, AuthError> {
        bcrypt::hash(plaintext, self.cost)
            .map(PasswordHash)
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Check `plaintext` against a stored digest.
    ///
    /// Never errors: a mismatch and a corrupt digest both yield `false`.
    pub fn verify(&self, digest: &PasswordHash, plaintext: &str) -> bool {
        match bcrypt::verify(plaintext, digest.as_str()) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(error = %e, "stored password digest could not be parsed");
                false
            }
        }
    }

    /// Hash-before-persist step for create/update pipelines.
    ///
    /// A secret that already looks like a digest is kept as-is.
    pub fn prepare(&self, secret: &str) -> Result<PasswordHash, AuthError> {
        if PasswordHash::looks_hashed(secret) {
            return Ok(PasswordHash(secret.to_string()));
        }
        self.hash(secret)
    }
}
