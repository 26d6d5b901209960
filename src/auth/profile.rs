//! Profile & Credential Changes
//! Mission: Read an account's public profile and rotate its password

use crate::auth::deadline::bounded;
use crate::auth::error::AuthError;
use crate::auth::models::{Profile, User};
use crate::auth::password::{hash_blocking, verify_blocking, PasswordHasher};
use crate::auth::store::UserRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<PasswordHasher>,
    timeout: Duration,
}

impl ProfileService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<PasswordHasher>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            hasher,
            timeout,
        }
    }

    pub async fn get_profile(&self, subject_id: &str) -> Result<Profile, AuthError> {
        bounded(self.timeout, "get_profile", async move {
            let user = self.load(subject_id).await?;
            Ok::<_, AuthError>(Profile::from_user(&user))
        })
        .await
    }

    /// Replace the stored hash after checking the old password.
    ///
    /// Tokens issued before the change stay valid until they expire.
    /// Concurrent changes for one account are last-writer-wins.
    pub async fn change_password(
        &self,
        subject_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        bounded(
            self.timeout,
            "change_password",
            self.change_password_inner(subject_id, old_password, new_password),
        )
        .await
    }

    async fn change_password_inner(
        &self,
        subject_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.load(subject_id).await?;

        if !verify_blocking(&self.hasher, &user.password_hash, old_password).await? {
            warn!("Password change rejected for user {}: old password mismatch", user.id);
            return Err(AuthError::InvalidOldPassword);
        }

        user.password_hash = hash_blocking(&self.hasher, new_password).await?;
        self.users.save(&user).await?;

        info!("Password changed for user {}", user.id);
        Ok(())
    }

    async fn load(&self, subject_id: &str) -> Result<User, AuthError> {
        self.users
            .find_by_id(subject_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
