use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the caller once and stores the `Principal` in the request
/// extensions. Handlers receive it through `Extension<Principal>`.
pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = state.sessions.resolve_headers(request.headers()).await?;

    tracing::debug!(
        "Resolved {} in tenant {} as {} via {:?}",
        principal.user_id,
        principal.tenant_id,
        principal.role,
        principal.method
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
