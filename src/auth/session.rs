//! Session Issuance
//! Mission: Turn login, signup and refresh into fresh token pairs

use crate::auth::credentials::CredentialVerifier;
use crate::auth::deadline::bounded;
use crate::auth::error::AuthError;
use crate::auth::jwt::TokenCodec;
use crate::auth::models::{NewUser, TokenPair, User};
use crate::auth::password::{hash_blocking, PasswordHasher};
use crate::auth::store::UserRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SessionIssuer {
    users: Arc<dyn UserRepository>,
    verifier: CredentialVerifier,
    hasher: Arc<PasswordHasher>,
    codec: Arc<TokenCodec>,
    timeout: Duration,
}

impl SessionIssuer {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<PasswordHasher>,
        codec: Arc<TokenCodec>,
        timeout: Duration,
    ) -> Self {
        Self {
            verifier: CredentialVerifier::new(users.clone(), hasher.clone()),
            users,
            hasher,
            codec,
            timeout,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        bounded(self.timeout, "login", self.login_inner(email, password)).await
    }

    /// Register a new account. The existence check runs before any hashing;
    /// the store's unique email constraint settles concurrent signups.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        bounded(
            self.timeout,
            "signup",
            self.signup_inner(name, email, password),
        )
        .await
    }

    /// Exchange a refresh token for a new pair. The presented token stays
    /// valid until its own expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.verify_refresh(refresh_token).map_err(|e| {
            debug!("Refresh token rejected: {}", e);
            AuthError::InvalidToken
        })?;

        bounded(self.timeout, "refresh", self.refresh_inner(&claims.sub)).await
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self.verifier.verify_credentials(email, password).await?;
        let pair = self.issue_pair(&user)?;
        info!("Login successful: {} ({})", user.email, user.id);
        Ok(pair)
    }

    async fn signup_inner(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            warn!("Signup rejected, email already registered: {}", email);
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_blocking(&self.hasher, password).await?;
        let user = self
            .users
            .insert(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        let pair = self.issue_pair(&user)?;
        info!("Signup successful: {} ({})", user.email, user.id);
        Ok(pair)
    }

    async fn refresh_inner(&self, subject_id: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .find_by_id(subject_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.issue_pair(&user)
    }

    fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        self.codec.issue_pair(user).map_err(AuthError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::StoreError;
    use crate::auth::password::MIN_COST;
    use crate::auth::store::{MemoryUserStore, SqliteUserStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(
            TokenCodec::new(
                "access-secret".to_string(),
                Duration::from_secs(3600),
                "refresh-secret".to_string(),
                Duration::from_secs(86400),
            )
            .unwrap(),
        )
    }

    fn issuer_with(store: Arc<dyn UserRepository>) -> SessionIssuer {
        SessionIssuer::new(
            store,
            Arc::new(PasswordHasher::new(MIN_COST)),
            codec(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let store = Arc::new(MemoryUserStore::new());
        let issuer = issuer_with(store.clone());

        let pair = issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_eq!(store.len(), 1);

        let access = issuer.codec.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.name.as_deref(), Some("Alice"));

        let login = issuer
            .login("alice@example.com", "password123")
            .await
            .unwrap();
        assert!(!login.access_token.is_empty());
        assert!(!login.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_login_failures_share_one_kind() {
        let store = Arc::new(MemoryUserStore::new());
        let issuer = issuer_with(store);
        issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();

        assert!(matches!(
            issuer.login("alice@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            issuer.login("nobody@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_signup_rejected() {
        let store = Arc::new(MemoryUserStore::new());
        let issuer = issuer_with(store.clone());
        issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();

        let again = issuer
            .signup("Other Alice", "alice@example.com", "different")
            .await;
        assert!(matches!(again, Err(AuthError::UserAlreadyExists)));
        assert_eq!(store.len(), 1);
    }

    /// Store that already knows every email and counts insert attempts
    #[derive(Default)]
    struct KnownEmailStore {
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl UserRepository for KnownEmailStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            Ok(Some(User {
                id: 1,
                name: "Existing".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            }))
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::DuplicateEmail)
        }

        async fn save(&self, _user: &User) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_duplicate_signup_skips_hashing_and_insert() {
        let store = Arc::new(KnownEmailStore::default());
        let hasher = Arc::new(PasswordHasher::new(MIN_COST));
        let issuer = SessionIssuer::new(
            store.clone(),
            hasher.clone(),
            codec(),
            Duration::from_secs(2),
        );

        assert!(matches!(
            issuer.signup("Alice", "alice@example.com", "password123").await,
            Err(AuthError::UserAlreadyExists)
        ));
        assert_eq!(hasher.hashes_computed(), 0);
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_signup_hashes_exactly_once() {
        let store = Arc::new(MemoryUserStore::new());
        let hasher = Arc::new(PasswordHasher::new(MIN_COST));
        let issuer = SessionIssuer::new(store.clone(), hasher.clone(), codec(), Duration::from_secs(2));

        issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(hasher.hashes_computed(), 1);

        issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap_err();
        assert_eq!(hasher.hashes_computed(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_locked_database_times_out_within_bound() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let store = Arc::new(SqliteUserStore::open(&db_path, Duration::from_secs(2)).unwrap());

        let locker = rusqlite::Connection::open(&db_path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let issuer = SessionIssuer::new(
            store,
            Arc::new(PasswordHasher::new(MIN_COST)),
            codec(),
            Duration::from_millis(100),
        );

        let started = Instant::now();
        let result = issuer.login("alice@example.com", "password123").await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(AuthError::Internal(_))));
        assert!(elapsed < Duration::from_secs(1), "login took {elapsed:?}");

        locker.execute_batch("COMMIT").unwrap();
    }

    #[tokio::test]
    async fn test_refresh_issues_new_verifiable_pair() {
        let store = Arc::new(MemoryUserStore::new());
        let issuer = issuer_with(store);
        let pair = issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();

        let renewed = issuer.refresh(&pair.refresh_token).await.unwrap();
        let access = issuer.codec.verify_access(&renewed.access_token).unwrap();
        let refresh = issuer.codec.verify_refresh(&renewed.refresh_token).unwrap();
        assert_eq!(access.sub, refresh.sub);

        // The presented refresh token is not consumed
        assert!(issuer.refresh(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage_and_access_tokens() {
        let store = Arc::new(MemoryUserStore::new());
        let issuer = issuer_with(store);
        let pair = issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();

        assert!(matches!(
            issuer.refresh("garbage").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            issuer.refresh(&pair.access_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_deleted_user() {
        let store = Arc::new(MemoryUserStore::new());
        let issuer = issuer_with(store.clone());
        let pair = issuer
            .signup("Alice", "alice@example.com", "password123")
            .await
            .unwrap();

        let claims = issuer.codec.verify_refresh(&pair.refresh_token).unwrap();
        store.remove(claims.sub.parse().unwrap());

        assert!(matches!(
            issuer.refresh(&pair.refresh_token).await,
            Err(AuthError::UserNotFound)
        ));
    }

    /// Store whose lookups never return and whose inserts are counted
    #[derive(Default)]
    struct StallingStore {
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl UserRepository for StallingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            std::future::pending::<()>().await;
            Ok(None)
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<User>, StoreError> {
            std::future::pending::<()>().await;
            Ok(None)
        }

        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend(anyhow::anyhow!("unreachable")))
        }

        async fn save(&self, _user: &User) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_storage_times_out_as_internal() {
        let store = Arc::new(StallingStore::default());
        let issuer = SessionIssuer::new(
            store.clone(),
            Arc::new(PasswordHasher::new(MIN_COST)),
            codec(),
            Duration::from_millis(50),
        );

        assert!(matches!(
            issuer.login("alice@example.com", "pw").await,
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(
            issuer.signup("Alice", "alice@example.com", "pw").await,
            Err(AuthError::Internal(_))
        ));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
    }

    /// Store that reports a race lost to the unique constraint
    struct RacingStore;

    #[async_trait]
    impl UserRepository for RacingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::DuplicateEmail)
        }

        async fn save(&self, _user: &User) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unique_constraint_is_final_arbiter() {
        let issuer = issuer_with(Arc::new(RacingStore));
        assert!(matches!(
            issuer.signup("Alice", "alice@example.com", "pw").await,
            Err(AuthError::UserAlreadyExists)
        ));
    }
}
