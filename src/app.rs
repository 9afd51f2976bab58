use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::acl::PolicyHandle;
use crate::config::GatewayConfig;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{authorize, health, policy};

#[derive(Clone)]
pub struct AppState {
    pub policy: PolicyHandle,
    pub jwt: Arc<JwtConfig>,
    pub acl_file: Arc<PathBuf>,
    pub admin_role: Arc<str>,
}

impl AppState {
    pub fn new(policy: PolicyHandle, config: &GatewayConfig) -> Self {
        Self {
            policy,
            jwt: Arc::new(config.jwt.clone()),
            acl_file: Arc::new(config.acl_file.clone()),
            admin_role: Arc::from(config.admin_role.as_str()),
        }
    }

    /// Load the configured ACL file and build the state around it. A policy
    /// that fails to load stops startup.
    pub fn bootstrap(config: &GatewayConfig) -> Result<Self, AppError> {
        let policy = PolicyHandle::from_file(&config.acl_file)?;
        Ok(Self::new(policy, config))
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/policy", get(policy::current_policy))
        .route("/policy/reload", post(policy::reload_policy));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/authorize", get(authorize::authorize_metric))
        .nest("/admin", admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
