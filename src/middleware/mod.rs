//! HTTP middleware shared by every route group.

pub mod logging;

pub use logging::request_logging;
