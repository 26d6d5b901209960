//! Authentication API Endpoints
//! Mission: Bind signup, login, refresh and profile routes to the auth core

use crate::auth::{
    error::AuthError,
    middleware::AuthenticatedUser,
    models::{
        ChangePasswordRequest, LoginRequest, MessageResponse, Profile, RefreshTokenRequest,
        SignupRequest, TokenPair,
    },
    profile::ProfileService,
    session::SessionIssuer,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

/// Minimum length for a new password
pub const MIN_PASSWORD_LEN: usize = 6;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionIssuer>,
    pub profiles: Arc<ProfileService>,
}

impl AuthState {
    pub fn new(sessions: Arc<SessionIssuer>, profiles: Arc<ProfileService>) -> Self {
        Self { sessions, profiles }
    }
}

/// Signup endpoint - POST /signup
pub async fn signup(
    State(state): State<AuthState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    require("name", &payload.name)?;
    require("email", &payload.email)?;
    require("password", &payload.password)?;

    let pair = state
        .sessions
        .signup(&payload.name, &payload.email, &payload.password)
        .await?;
    Ok(Json(pair))
}

/// Login endpoint - POST /login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    require("email", &payload.email)?;
    require("password", &payload.password)?;

    let pair = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(pair))
}

/// Refresh endpoint - POST /refresh
pub async fn refresh(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    require("refreshToken", &payload.refresh_token)?;

    let pair = state.sessions.refresh(&payload.refresh_token).await?;
    Ok(Json(pair))
}

/// Current profile - GET /profile
pub async fn get_profile(
    State(state): State<AuthState>,
    user: AuthenticatedUser,
) -> Result<Json<Profile>, ApiError> {
    let profile = state.profiles.get_profile(user.subject_id()).await?;
    Ok(Json(profile))
}

/// Change password - POST /profile/change-password
pub async fn change_password(
    State(state): State<AuthState>,
    user: AuthenticatedUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require("oldPassword", &payload.old_password)?;
    if payload.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "newPassword must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    state
        .profiles
        .change_password(
            user.subject_id(),
            &payload.old_password,
            &payload.new_password,
        )
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// Errors a handler can return: request validation or an auth-core kind
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(MessageResponse::new(message))).into_response()
            }
            ApiError::Auth(err) => err.into_response(),
        }
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::MissingAuthHeader
            | AuthError::InvalidOldPassword
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(source) = &self {
            error!("Internal auth failure: {:#}", source);
        }

        let status = self.status_code();
        (status, Json(MessageResponse::new(self.to_string()))).into_response()
    }
}
