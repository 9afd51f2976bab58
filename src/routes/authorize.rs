use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::acl::{AuthorizationDecision, MetricAuthorizer};
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub metric: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub metric: String,
    #[serde(flatten)]
    pub decision: AuthorizationDecision,
}

/// Check whether the caller may query `metric`. Allowed requests get 200 with
/// the constraint to inject; denied ones get 403 with the same body shape.
pub async fn authorize_metric(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<AuthorizeParams>,
) -> AppResult<(StatusCode, Json<AuthorizeResponse>)> {
    if params.metric.is_empty() {
        return Err(AppError::bad_request("metric must not be empty"));
    }

    let decision = state.policy.authorize(&caller.roles, &params.metric);
    let status = if decision.allowed {
        StatusCode::OK
    } else {
        tracing::info!(
            subject = %caller.subject,
            roles = caller.roles.len(),
            metric = %params.metric,
            "metric access denied"
        );
        StatusCode::FORBIDDEN
    };

    Ok((
        status,
        Json(AuthorizeResponse {
            metric: params.metric,
            decision,
        }),
    ))
}
