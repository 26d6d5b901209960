//! Task Module
//! Mission: Per-user task list behind the access gate

pub mod api;
pub mod models;
pub mod service;
pub mod store;

pub use service::TaskService;
pub use store::{MemoryTaskStore, SqliteTaskStore, TaskRepository};
