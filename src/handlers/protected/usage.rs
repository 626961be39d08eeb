use axum::{extract::State, Extension};

use crate::access::UsageReport;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Principal;
use crate::state::AppState;

/// GET /api/usage - Plan, features and live usage for the caller's workspace
pub async fn get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<UsageReport> {
    let report = state.gate.usage(&principal.tenant_id).await?;
    Ok(ApiResponse::success(report))
}
