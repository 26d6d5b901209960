//! JWT Token Codec
//! Mission: Sign and verify self-contained access and refresh tokens

use crate::auth::error::TokenError;
use crate::auth::models::{TokenPair, User};
use anyhow::{bail, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Only algorithm accepted when signing or verifying
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Which half of a [`TokenPair`] a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>, // access tokens only
    pub iat: i64,
    pub exp: i64,
}

/// Sign a token of the given kind. Refresh tokens never carry the display name.
pub fn sign(
    kind: TokenKind,
    subject_id: &str,
    name: Option<&str>,
    secret: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    let now = Utc::now().timestamp();
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

    let claims = Claims {
        sub: subject_id.to_string(),
        name: match kind {
            TokenKind::Access => name.map(str::to_string),
            TokenKind::Refresh => None,
        },
        iat: now,
        exp: now.saturating_add(ttl_secs),
    };

    encode(
        &Header::new(SIGNING_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Encoding)
}

/// Verify signature, algorithm and expiry, returning the embedded claims
pub fn verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })
}

/// JWT Handler for one token kind
pub struct JwtHandler {
    kind: TokenKind,
    secret: String,
    ttl: Duration,
}

impl JwtHandler {
    pub fn new(kind: TokenKind, secret: String, ttl: Duration) -> Self {
        Self { kind, secret, ttl }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a token for a user
    pub fn generate_token(&self, user: &User) -> Result<String, TokenError> {
        debug!(
            "Generating {} token for user {}, expires in {}s",
            self.kind.as_str(),
            user.id,
            self.ttl.as_secs()
        );
        sign(
            self.kind,
            &user.subject_id(),
            Some(&user.name),
            &self.secret,
            self.ttl,
        )
    }

    /// Validate a token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = verify(token, &self.secret)?;
        debug!("Validated {} token for user {}", self.kind.as_str(), claims.sub);
        Ok(claims)
    }
}

/// Access and refresh handlers, each with its own secret and lifetime
pub struct TokenCodec {
    access: JwtHandler,
    refresh: JwtHandler,
}

impl TokenCodec {
    pub fn new(
        access_secret: String,
        access_ttl: Duration,
        refresh_secret: String,
        refresh_ttl: Duration,
    ) -> Result<Self> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            bail!("token secrets must not be empty");
        }
        if access_secret == refresh_secret {
            bail!("access and refresh token secrets must differ");
        }

        Ok(Self {
            access: JwtHandler::new(TokenKind::Access, access_secret, access_ttl),
            refresh: JwtHandler::new(TokenKind::Refresh, refresh_secret, refresh_ttl),
        })
    }

    /// Sign both halves of a pair for the same user
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.access.generate_token(user)?,
            refresh_token: self.refresh.generate_token(user)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.access.validate_token(token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.refresh.validate_token(token)
    }
}
