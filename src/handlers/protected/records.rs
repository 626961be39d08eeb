use axum::{
    extract::{Path, RawQuery, State},
    Extension,
};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{webhook, Entity, NewRecord, Record};
use crate::database::Repository;
use crate::error::{ApiError, ValidatedJson};
use crate::filter::ListQuery;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Principal;
use crate::state::AppState;
use crate::types::Operation;

// Record handlers shared by every entity. The entity type supplies the
// table, whitelists and policy; the principal supplies the tenant.

/// GET /api/<entity> - One page of the caller's workspace records
pub async fn list<E: Entity>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Vec<Record<E>>> {
    let params = query_pairs(raw.as_deref());
    let query = ListQuery::from_params(&params, &state.page_limits(), principal.user_id)?;

    authorize::<E>(&state, &principal, Operation::List).await?;

    let page = repository::<E>(&state)
        .find_by_workspace(&principal.tenant_id, &query)
        .await?;
    Ok(ApiResponse::page(page))
}

/// GET /api/<entity>/:id
pub async fn get<E: Entity>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Record<E>> {
    authorize::<E>(&state, &principal, Operation::Read).await?;

    let id = parse_id(&id)?;
    let record = repository::<E>(&state)
        .find_by_id(id, &principal.tenant_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(record))
}

/// POST /api/<entity>
pub async fn create<E: Entity>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(payload): ValidatedJson<E::Create>,
) -> ApiResult<Record<E>> {
    authorize::<E>(&state, &principal, Operation::Create).await?;

    let record = repository::<E>(&state)
        .create(NewRecord::new(principal.tenant_id, Some(principal.user_id), payload))
        .await?;

    emit::<E>(&state, &principal, Operation::Create, to_event_data(&record));
    Ok(ApiResponse::created(record))
}

/// PATCH /api/<entity>/:id - Apply the supplied fields only
pub async fn update<E: Entity>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    ValidatedJson(patch): ValidatedJson<E::Patch>,
) -> ApiResult<Record<E>> {
    authorize::<E>(&state, &principal, Operation::Update).await?;

    let id = parse_id(&id)?;
    let record = repository::<E>(&state)
        .update(id, &principal.tenant_id, &patch)
        .await?
        .ok_or(ApiError::NotFound)?;

    emit::<E>(&state, &principal, Operation::Update, to_event_data(&record));
    Ok(ApiResponse::success(record))
}

/// DELETE /api/<entity>/:id
pub async fn delete<E: Entity>(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    authorize::<E>(&state, &principal, Operation::Delete).await?;

    let id = parse_id(&id)?;
    if !repository::<E>(&state).delete(id, &principal.tenant_id).await? {
        return Err(ApiError::NotFound);
    }

    let data = json!({ "id": id, "deleted": true });
    emit::<E>(&state, &principal, Operation::Delete, data.clone());
    Ok(ApiResponse::success(data))
}

pub(crate) fn repository<E: Entity>(state: &AppState) -> Repository<E> {
    Repository::new(state.store.clone())
}

pub(crate) async fn authorize<E: Entity>(
    state: &AppState,
    principal: &Principal,
    operation: Operation,
) -> Result<(), ApiError> {
    state
        .gate
        .authorize(principal, E::POLICY.for_operation(operation))
        .await
        .map_err(ApiError::from)
}

/// Malformed ids get the same answer as ids that do not exist
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn to_event_data<T: serde::Serialize>(record: &T) -> serde_json::Value {
    serde_json::to_value(record).unwrap_or_default()
}

/// Best-effort notification. Delivery runs detached from the request.
fn emit<E: Entity>(state: &AppState, principal: &Principal, operation: Operation, data: serde_json::Value) {
    let Some(verb) = operation.event_verb() else {
        return;
    };
    if !webhook::is_event_source(E::TABLE.name) {
        return;
    }
    let event = format!("{}.{}", E::TABLE.name, verb);
    let notifier = state.notifier.clone();
    let tenant_id = principal.tenant_id;
    tokio::spawn(async move {
        notifier.notify(&tenant_id, &event, data).await;
    });
}
