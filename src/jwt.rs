use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use crate::acl::RoleSet;
use crate::app::AppState;
use crate::errors::AppError;

pub const DEFAULT_ROLES_CLAIM: &str = "roles";
pub const DEFAULT_EXP_HOURS: i64 = 24;

/// HS256 token settings and the claim that carries the caller's roles.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
    /// Claim name, or a dotted path into nested claims (`realm_access.roles`).
    pub roles_claim: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, roles_claim: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours: DEFAULT_EXP_HOURS,
            roles_claim: roles_claim.into(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET").ok_or_else(|| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = lookup("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_EXP_HOURS))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;
        let roles_claim = lookup("ROLES_CLAIM")
            .or_else(|| lookup("OIDC_ROLES_CLAIM"))
            .unwrap_or_else(|| DEFAULT_ROLES_CLAIM.to_string());
        if roles_claim.is_empty() {
            return Err(AppError::configuration("ROLES_CLAIM must not be empty"));
        }

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
            roles_claim,
        })
    }

    /// Mint a token carrying `roles` under the configured claim.
    pub fn encode(&self, subject: &str, roles: &[String]) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let mut extra = Map::new();
        let mut segments: Vec<&str> = self.roles_claim.split('.').collect();
        let top = segments.remove(0);
        let mut value = Value::Array(roles.iter().cloned().map(Value::String).collect());
        for segment in segments.into_iter().rev() {
            let mut nested = Map::new();
            nested.insert(segment.to_string(), value);
            value = Value::Object(nested);
        }
        extra.insert(top.to_string(), value);

        let claims = Claims {
            sub: subject.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            extra,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Roles named by the configured claim. A string is a single role, an
    /// array contributes every string element; anything else yields no roles.
    pub fn roles_from(&self, claims: &Claims) -> RoleSet {
        match claim_value(&claims.extra, &self.roles_claim) {
            Some(Value::String(role)) => RoleSet::new().with_role(role.as_str()),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => RoleSet::new(),
        }
    }
}

fn claim_value<'a>(claims: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    // Literal claim names may themselves contain dots.
    if let Some(value) = claims.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let first = claims.get(segments.next()?)?;
    segments.try_fold(first, |value, segment| value.get(segment))
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The authenticated caller and the roles carried by its token.
#[derive(Debug, Clone)]
pub struct Caller {
    pub subject: String,
    pub roles: RoleSet,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;
        let roles = state.jwt.roles_from(&claims);
        if roles.is_empty() {
            tracing::debug!(subject = %claims.sub, claim = %state.jwt.roles_claim, "token carries no roles");
        }

        Ok(Caller {
            subject: claims.sub,
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_round_trips_roles_claim() {
        let jwt = JwtConfig::new("test-secret", "roles");
        let token = jwt.encode("alice", &roles(&["viewer", "admin"])).unwrap();
        let claims = jwt.decode(&token).unwrap();

        assert_eq!(claims.sub, "alice");
        let set = jwt.roles_from(&claims);
        assert!(set.contains("viewer"));
        assert!(set.contains("admin"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_nested_roles_claim() {
        let jwt = JwtConfig::new("test-secret", "realm_access.roles");
        let token = jwt.encode("bob", &roles(&["ops"])).unwrap();
        let claims = jwt.decode(&token).unwrap();

        assert!(claims.extra["realm_access"]["roles"].is_array());
        assert!(jwt.roles_from(&claims).contains("ops"));
    }

    #[test]
    fn test_string_claim_is_single_role() {
        let jwt = JwtConfig::new("s", "group");
        let mut extra = Map::new();
        extra.insert("group".to_string(), Value::String("viewer".to_string()));
        let claims = Claims { sub: "c".into(), exp: 0, iat: 0, extra };

        let set = jwt.roles_from(&claims);
        assert_eq!(set.len(), 1);
        assert!(set.contains("viewer"));
    }

    #[test]
    fn test_missing_or_odd_claim_yields_no_roles() {
        let jwt = JwtConfig::new("s", "roles");
        let mut extra = Map::new();
        extra.insert("roles".to_string(), serde_json::json!({"viewer": true}));
        let claims = Claims { sub: "c".into(), exp: 0, iat: 0, extra };
        assert!(jwt.roles_from(&claims).is_empty());

        let claims = Claims { sub: "c".into(), exp: 0, iat: 0, extra: Map::new() };
        assert!(jwt.roles_from(&claims).is_empty());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtConfig::new("one", "roles").encode("eve", &roles(&["admin"])).unwrap();
        let err = JwtConfig::new("two", "roles").decode(&token).unwrap_err();
        assert!(matches!(err, AppError::Token(_)));
    }

    #[test]
    fn test_from_lookup_defaults_and_validation() {
        let env: HashMap<&str, &str> = HashMap::from([("JWT_SECRET", "s")]);
        let jwt = JwtConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(jwt.roles_claim, DEFAULT_ROLES_CLAIM);
        assert_eq!(jwt.exp_hours, DEFAULT_EXP_HOURS);

        let env: HashMap<&str, &str> =
            HashMap::from([("JWT_SECRET", "s"), ("ROLES_CLAIM", "roles"), ("OIDC_ROLES_CLAIM", "groups")]);
        let jwt = JwtConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(jwt.roles_claim, "roles", "ROLES_CLAIM takes precedence");

        let env: HashMap<&str, &str> = HashMap::from([("JWT_SECRET", "s"), ("OIDC_ROLES_CLAIM", "groups")]);
        let jwt = JwtConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(jwt.roles_claim, "groups");

        let missing = JwtConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(missing, AppError::Configuration(_)));

        let env: HashMap<&str, &str> = HashMap::from([("JWT_SECRET", "s"), ("JWT_EXP_HOURS", "soon")]);
        let bad = JwtConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(bad, AppError::Configuration(_)));
    }
}
