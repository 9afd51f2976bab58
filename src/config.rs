use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;
use crate::jwt::JwtConfig;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
pub const DEFAULT_ACL_FILE: &str = "prometheus-oidc.yml";
pub const DEFAULT_ADMIN_ROLE: &str = "policy-admin";

/// Process configuration, read from the environment (after `.env` loading).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    pub acl_file: PathBuf,
    /// Role required to trigger a policy reload over HTTP.
    pub admin_role: String,
    pub jwt: JwtConfig,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen = parse_listen(&lookup("LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string()))?;
        let acl_file = lookup("ACL_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ACL_FILE));
        let admin_role = lookup("POLICY_ADMIN_ROLE").unwrap_or_else(|| DEFAULT_ADMIN_ROLE.to_string());
        let jwt = JwtConfig::from_lookup(&lookup)?;

        Ok(Self {
            listen,
            acl_file,
            admin_role,
            jwt,
        })
    }
}

/// Accepts `host:port` or the bare `:port` form, which binds all interfaces.
fn parse_listen(value: &str) -> Result<SocketAddr, AppError> {
    let value = value.trim();
    let addr = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => value.to_string(),
    };

    addr.parse::<SocketAddr>()
        .map_err(|err| AppError::configuration(format!("LISTEN must be a socket address: {err}")))
}
