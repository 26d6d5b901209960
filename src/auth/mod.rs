//! Authentication Module
//! Mission: Verify credentials, issue token pairs and guard protected routes

pub mod api;
pub mod credentials;
pub mod deadline;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod profile;
pub mod session;
pub mod store;

pub use api::AuthState;
pub use error::AuthError;
pub use jwt::TokenCodec;
pub use middleware::{auth_middleware, AccessGate, AuthenticatedUser};
pub use password::PasswordHasher;
pub use profile::ProfileService;
pub use session::SessionIssuer;
pub use store::{MemoryUserStore, SqliteUserStore, UserRepository};
