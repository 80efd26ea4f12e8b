//! Password hashing and strength policy.

use super::AuthError;
use crate::config::AuthPolicy;

/// Special characters a strong password must draw from.
pub const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// One-way password hashing.
///
/// Both calls are CPU-bound; the auth service runs them on the blocking pool.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// `false` for a mismatch and for a malformed `hash`.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// bcrypt with a fixed work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Fails for a cost outside bcrypt's 4..=31 range.
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        if !(4..=31).contains(&cost) { // bcrypt::{MIN_COST, MAX_COST} are private
            return Err(AuthError::ServerError(format!("bcrypt cost {cost} out of range")));
        }
        Ok(Self { cost })
    }

    /// Hasher using the policy's `hash_cost`.
    pub fn from_policy(policy: &AuthPolicy) -> Result<Self, AuthError> {
        Self::new(policy.hash_cost)
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost).map_err(|e| AuthError::ServerError(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

/// At least eight characters drawn from letters, digits and
/// [`PASSWORD_SPECIALS`], with one of each of: lowercase, uppercase, digit, special.
pub fn is_strong_password(password: &str) -> bool {
    let is_special = |c: char| PASSWORD_SPECIALS.contains(c);

    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().all(|c| c.is_ascii_alphanumeric() || is_special(c))
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(is_special)
}
