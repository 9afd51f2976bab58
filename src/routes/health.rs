use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub policy_digest: String,
    pub roles: usize,
    pub exact_rules: usize,
    pub pattern_rules: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let summary = state.policy.snapshot().summary();
    Json(HealthResponse {
        status: "ok",
        policy_digest: summary.digest,
        roles: summary.roles,
        exact_rules: summary.exact_rules,
        pattern_rules: summary.pattern_rules,
    })
}
