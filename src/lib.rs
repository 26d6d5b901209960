//! Taskgate Backend Library
//!
//! Exposes the auth core, task service and router assembly for the binary and tests.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod middleware;
pub mod tasks;
