//! Policy administration endpoints.
//!
//! Both require the configured admin role. A reload with an empty body
//! re-reads the ACL file; a non-empty body is taken as the new document.
//! Compilation runs on the blocking pool and a failed load leaves the
//! running policy untouched.

use axum::extract::State;
use axum::Json;

use crate::acl::PolicySummary;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;

fn require_admin(state: &AppState, caller: &Caller) -> AppResult<()> {
    if caller.roles.contains(&state.admin_role) {
        return Ok(());
    }

    tracing::warn!(subject = %caller.subject, "policy administration refused");
    Err(AppError::forbidden(format!("role {} required", state.admin_role)))
}

pub async fn current_policy(State(state): State<AppState>, caller: Caller) -> AppResult<Json<PolicySummary>> {
    require_admin(&state, &caller)?;
    Ok(Json(state.policy.snapshot().summary()))
}

pub async fn reload_policy(
    State(state): State<AppState>,
    caller: Caller,
    body: String,
) -> AppResult<Json<PolicySummary>> {
    require_admin(&state, &caller)?;

    let policy = state.policy.clone();
    let acl_file = state.acl_file.clone();
    let store = tokio::task::spawn_blocking(move || {
        if body.trim().is_empty() {
            policy.reload_from_path(acl_file.as_path())
        } else {
            policy.reload_from_str(&body)
        }
    })
    .await
    .map_err(|err| AppError::internal(format!("policy reload task failed: {err}")))??;

    tracing::info!(subject = %caller.subject, digest = %store.digest(), "policy reloaded via api");
    Ok(Json(store.summary()))
}
