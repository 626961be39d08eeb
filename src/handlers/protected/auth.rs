use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Principal;
use crate::state::AppState;

/// GET /api/auth/whoami - The resolved principal and its workspace
pub async fn whoami(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<serde_json::Value> {
    let tenant = state.gate.active_tenant(&principal.tenant_id).await?;
    let plan = state.config.plans.resolve(&tenant.plan);

    Ok(ApiResponse::success(json!({
        "user_id": principal.user_id,
        "role": principal.role,
        "method": principal.method,
        "tenant": {
            "id": tenant.id,
            "name": tenant.name,
            "slug": tenant.slug,
            "plan": plan.name,
        }
    })))
}

/// DELETE /api/auth/session - Expire the session cookie
pub async fn logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        state.sessions.cookie_name()
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal_server_error("Invalid session cookie name"))?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        ApiResponse::success(json!({ "logged_out": true })),
    )
        .into_response())
}
