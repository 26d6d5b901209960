//! Credential Verification
//! Mission: Confirm an email/password pair without revealing which half was wrong

use crate::auth::error::AuthError;
use crate::auth::models::User;
use crate::auth::password::{verify_blocking, verify_decoy_blocking, PasswordHasher};
use crate::auth::store::UserRepository;
use std::sync::Arc;
use tracing::warn;

pub struct CredentialVerifier {
    users: Arc<dyn UserRepository>,
    hasher: Arc<PasswordHasher>,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<PasswordHasher>) -> Self {
        Self { users, hasher }
    }

    /// Resolve the account for `email` if `password` matches its stored hash.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`, and
    /// both pay for one bcrypt verification.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            verify_decoy_blocking(&self.hasher, password).await?;
            warn!("Failed login attempt: {}", email);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_blocking(&self.hasher, &user.password_hash, password).await? {
            warn!("Failed login attempt: {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::NewUser;
    use crate::auth::password::MIN_COST;
    use crate::auth::store::MemoryUserStore;

    async fn setup() -> CredentialVerifier {
        let hasher = Arc::new(PasswordHasher::new(MIN_COST));
        let store = Arc::new(MemoryUserStore::new());
        store
            .insert(NewUser {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: hasher.hash("password123").unwrap(),
            })
            .await
            .unwrap();
        CredentialVerifier::new(store, hasher)
    }

    #[tokio::test]
    async fn test_correct_credentials_resolve_user() {
        let verifier = setup().await;
        let user = verifier
            .verify_credentials("alice@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(user.name, "Alice");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
        let verifier = setup().await;

        let wrong_password = verifier
            .verify_credentials("alice@example.com", "nope")
            .await
            .unwrap_err();
        let unknown_email = verifier
            .verify_credentials("bob@example.com", "password123")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_corrupt_stored_hash_is_internal() {
        let hasher = Arc::new(PasswordHasher::new(MIN_COST));
        let store = Arc::new(MemoryUserStore::new());
        store
            .insert(NewUser {
                name: "Broken".to_string(),
                email: "broken@example.com".to_string(),
                password_hash: "not-a-hash".to_string(),
            })
            .await
            .unwrap();
        let verifier = CredentialVerifier::new(store, hasher);

        let err = verifier
            .verify_credentials("broken@example.com", "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
