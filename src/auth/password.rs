//! Password Hashing
//! Mission: Salted one-way hashing with a tunable work factor

use crate::auth::error::AuthError;
use anyhow::Context;
use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Minimum cost accepted by bcrypt
pub const MIN_COST: u32 = 4;
/// Maximum cost accepted by bcrypt
pub const MAX_COST: u32 = 31;

/// bcrypt wrapper. Every hash embeds its own random salt.
#[derive(Debug)]
pub struct PasswordHasher {
    cost: u32,
    decoy: String,
    hashes: AtomicUsize,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher {
    /// Builds the decoy hash up front, so this costs one hash at the chosen work factor.
    pub fn new(cost: u32) -> Self {
        let cost = clamp_cost(cost);
        Self {
            cost,
            decoy: hash("decoy-password-never-matches", cost).unwrap_or_default(),
            hashes: AtomicUsize::new(0),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password
    pub fn hash(&self, password: &str) -> Result<String, BcryptError> {
        self.hashes.fetch_add(1, Ordering::Relaxed);
        hash(password, self.cost)
    }

    /// Number of password hashes computed so far (the decoy excluded)
    pub fn hashes_computed(&self) -> usize {
        self.hashes.load(Ordering::Relaxed)
    }

    /// Compare a candidate against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; `Err` only when the stored hash is not a valid bcrypt string.
    pub fn verify(&self, hashed: &str, candidate: &str) -> Result<bool, BcryptError> {
        verify(candidate, hashed)
    }

    /// Burn the same work as a real verification so unknown accounts cost as much as known ones.
    pub fn verify_decoy(&self, candidate: &str) {
        let _ = verify(candidate, &self.decoy);
    }
}

fn clamp_cost(cost: u32) -> u32 {
    cost.clamp(MIN_COST, MAX_COST)
}

/// Hash on the blocking pool so only the calling task waits on the work factor
pub async fn hash_blocking(
    hasher: &Arc<PasswordHasher>,
    password: &str,
) -> Result<String, AuthError> {
    let hasher = hasher.clone();
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("password hashing task failed")
        .map_err(AuthError::Internal)?
        .context("failed to hash password")
        .map_err(AuthError::Internal)
}

/// Verify on the blocking pool. A structurally invalid stored hash is `Internal`.
pub async fn verify_blocking(
    hasher: &Arc<PasswordHasher>,
    hashed: &str,
    candidate: &str,
) -> Result<bool, AuthError> {
    let hasher = hasher.clone();
    let hashed = hashed.to_string();
    let candidate = candidate.to_string();
    tokio::task::spawn_blocking(move || hasher.verify(&hashed, &candidate))
        .await
        .context("password verification task failed")
        .map_err(AuthError::Internal)?
        .context("stored password hash is invalid")
        .map_err(AuthError::Internal)
}

pub async fn verify_decoy_blocking(
    hasher: &Arc<PasswordHasher>,
    candidate: &str,
) -> Result<(), AuthError> {
    let hasher = hasher.clone();
    let candidate = candidate.to_string();
    tokio::task::spawn_blocking(move || hasher.verify_decoy(&candidate))
        .await
        .context("password verification task failed")
        .map_err(AuthError::Internal)
}
