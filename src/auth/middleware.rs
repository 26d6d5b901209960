//! Authentication Middleware
//! Mission: Protect API endpoints with bearer access-token validation

use crate::auth::{error::AuthError, jwt::TokenCodec};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Subject id resolved from a valid access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    pub fn subject_id(&self) -> &str {
        &self.0
    }
}

/// Request-time guard in front of protected routes
pub struct AccessGate {
    codec: Arc<TokenCodec>,
}

impl AccessGate {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// The prefix must be exactly `Bearer `. Expired, tampered and malformed
    /// tokens all yield `InvalidToken`.
    pub fn authenticate(&self, header_value: &str) -> Result<AuthenticatedUser, AuthError> {
        let token = header_value
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::MissingAuthHeader)?;

        let claims = self.codec.verify_access(token).map_err(|e| {
            debug!("Access token rejected: {}", e);
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser(claims.sub))
    }
}

/// Auth middleware that validates the bearer token before the handler runs
pub async fn auth_middleware(
    State(gate): State<Arc<AccessGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(AUTHORIZATION)
        .map(|h| h.to_str().map_err(|_| AuthError::MissingAuthHeader))
        .transpose()?
        .unwrap_or_default();

    let user = gate.authenticate(header_value)?;

    // Downstream handlers read the caller from request extensions
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}
