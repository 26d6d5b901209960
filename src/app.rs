//! Application Assembly
//! Mission: Wire stores, codecs and services into one axum router

use crate::auth::{
    api as auth_api, auth_middleware, AccessGate, AuthState, PasswordHasher, ProfileService,
    SessionIssuer, SqliteUserStore, TokenCodec, UserRepository,
};
use crate::config::Config;
use crate::middleware::request_logging;
use crate::tasks::{api as task_api, SqliteTaskStore, TaskRepository, TaskService};
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Fully constructed services, ready to be routed
#[derive(Clone)]
pub struct AppComponents {
    pub auth: AuthState,
    pub gate: Arc<AccessGate>,
    pub tasks: Arc<TaskService>,
}

impl AppComponents {
    pub fn new(
        users: Arc<dyn UserRepository>,
        task_repo: Arc<dyn TaskRepository>,
        hasher: Arc<PasswordHasher>,
        codec: Arc<TokenCodec>,
        timeout: Duration,
    ) -> Self {
        let sessions = Arc::new(SessionIssuer::new(
            users.clone(),
            hasher.clone(),
            codec.clone(),
            timeout,
        ));
        let profiles = Arc::new(ProfileService::new(users, hasher, timeout));

        Self {
            auth: AuthState::new(sessions, profiles),
            gate: Arc::new(AccessGate::new(codec)),
            tasks: Arc::new(TaskService::new(task_repo, timeout)),
        }
    }

    /// SQLite-backed components; users and tasks share one database file.
    pub async fn from_config(config: &Config, db_path: &str) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let user_store = SqliteUserStore::open(db_path, config.operation_timeout())?;
        let task_store = SqliteTaskStore::new(user_store.connection()).await?;
        info!("🔐 Auth database ready at: {}", db_path);

        let codec = TokenCodec::new(
            config.access_token_secret.clone(),
            config.access_token_ttl(),
            config.refresh_token_secret.clone(),
            config.refresh_token_ttl(),
        )?;

        Ok(Self::new(
            Arc::new(user_store),
            Arc::new(task_store),
            Arc::new(PasswordHasher::new(config.bcrypt_cost)),
            Arc::new(codec),
            config.operation_timeout(),
        ))
    }

    pub fn router(self) -> Router {
        build_router(self.auth, self.gate, self.tasks)
    }
}

pub fn build_router(auth_state: AuthState, gate: Arc<AccessGate>, tasks: Arc<TaskService>) -> Router {
    let auth_router = Router::new()
        .route("/signup", post(auth_api::signup))
        .route("/login", post(auth_api::login))
        .route("/refresh", post(auth_api::refresh))
        .with_state(auth_state.clone());

    let profile_routes = Router::new()
        .route("/profile", get(auth_api::get_profile))
        .route("/profile/change-password", post(auth_api::change_password))
        .with_state(auth_state);

    let task_routes = Router::new()
        .route("/task", get(task_api::fetch_tasks).post(task_api::create_task))
        .with_state(tasks);

    let protected_routes = Router::new()
        .merge(profile_routes)
        .merge(task_routes)
        .route_layer(middleware::from_fn_with_state(gate, auth_middleware));

    let public_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(auth_router)
        .merge(protected_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "Taskgate Operational"
}
