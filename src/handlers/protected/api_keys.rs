use axum::{extract::State, Extension};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::generate_api_key;
use crate::database::models::{api_key::expires_in_future, ApiKey, Entity, NewApiKey, NewRecord, Record};
use crate::error::{ApiError, ValidatedJson};
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Principal;
use crate::state::AppState;
use crate::types::{Operation, Role};

use super::records::repository;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateApiKeyRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    /// Defaults to `member`
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    #[validate(custom(function = "expires_in_future"))]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Returned once, at creation. The plaintext key is not recoverable afterwards.
#[derive(Debug, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub record: Record<ApiKey>,
    pub key: String,
}

/// POST /api/api-keys - Mint a key bound to the caller's workspace
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(request): ValidatedJson<CreateApiKeyRequest>,
) -> ApiResult<CreatedApiKey> {
    let policy = ApiKey::POLICY;
    let requirement = policy.for_operation(Operation::Create);
    let role = request.role.unwrap_or(Role::Member);

    // Delegation is part of the role stage; the plan is only consulted once it passes
    state.gate.check_role(&principal, requirement)?;
    if !principal.role.can_delegate(role) {
        let allowed = Role::ALL.iter().copied().filter(|r| r.can_delegate(role)).collect();
        return Err(ApiError::Forbidden {
            role: principal.role,
            allowed,
        });
    }
    state.gate.check_plan(&principal, requirement).await?;

    let generated = generate_api_key(&state.config.security.api_key_prefix);
    let new_key = NewApiKey {
        name: request.name,
        role,
        key_prefix: generated.display_prefix,
        key_hash: generated.hash,
        expires_at: request.expires_at,
    };

    let record = repository::<ApiKey>(&state)
        .create(NewRecord::new(principal.tenant_id, Some(principal.user_id), new_key))
        .await?;

    tracing::info!(
        "API key {} ({}) created in tenant {} by {}",
        record.id,
        record.attributes.role,
        principal.tenant_id,
        principal.user_id
    );

    Ok(ApiResponse::created(CreatedApiKey {
        record,
        key: generated.plaintext,
    }))
}
