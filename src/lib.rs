pub mod acl;
pub mod app;
pub mod config;
pub mod errors;
pub mod jwt;
pub mod routes;

// Re-export commonly used items for tests
pub use app::{create_app, AppState};
