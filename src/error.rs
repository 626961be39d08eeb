// HTTP API Error Types
use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::access::AccessError;
use crate::database::{RepositoryError, StoreError};
use crate::filter::FilterError;
use crate::session::SessionError;
use crate::types::{Feature, Resource, Role};

pub type FieldErrors = BTreeMap<String, Vec<String>>;

const NOT_FOUND_MESSAGE: &str = "Record not found";
const INTERNAL_MESSAGE: &str = "An error occurred while processing your request";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError {
        message: String,
        field_errors: Option<FieldErrors>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    WorkspaceRequired(String),
    Forbidden {
        role: Role,
        allowed: Vec<Role>,
    },
    FeatureUnavailable {
        plan: String,
        feature: Feature,
    },
    LimitExceeded {
        plan: String,
        resource: Resource,
        used: i64,
        limit: i64,
    },

    // 404 Not Found
    NotFound,

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::WorkspaceRequired(_)
            | ApiError::Forbidden { .. }
            | ApiError::FeatureUnavailable { .. }
            | ApiError::LimitExceeded { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHENTICATED",
            ApiError::WorkspaceRequired(_) => "WORKSPACE_REQUIRED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::FeatureUnavailable { .. } => "FEATURE_UNAVAILABLE",
            ApiError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidJson(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::WorkspaceRequired(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::InternalServerError(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::Forbidden { role, .. } => format!("Role '{}' is not allowed to perform this action", role),
            ApiError::FeatureUnavailable { plan, feature } => {
                format!("The {} plan does not include {}. Upgrade to continue.", plan, feature)
            }
            ApiError::LimitExceeded { resource, used, limit, .. } => {
                format!("Plan limit reached for {}: {} of {} used", resource, used, limit)
            }
            ApiError::NotFound => NOT_FOUND_MESSAGE.to_string(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": true,
            "code": self.error_code(),
            "message": self.message(),
        });

        match self {
            ApiError::ValidationError {
                field_errors: Some(field_errors),
                ..
            } => {
                body["field_errors"] = json!(field_errors);
            }
            ApiError::WorkspaceRequired(_) => {
                body["setup_required"] = json!(true);
            }
            ApiError::Forbidden { role, allowed } => {
                body["role"] = json!(role);
                body["allowed_roles"] = json!(allowed);
            }
            ApiError::FeatureUnavailable { plan, feature } => {
                body["upgrade"] = json!({ "plan": plan, "feature": feature });
            }
            ApiError::LimitExceeded {
                plan,
                resource,
                used,
                limit,
            } => {
                body["limit"] = json!({ "plan": plan, "resource": resource, "used": used, "limit": limit });
            }
            _ => {}
        }

        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation_error(message: impl Into<String>, field_errors: Option<FieldErrors>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// A validation failure on a single field
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field.into(), vec![message.clone()]);
        ApiError::validation_error(message, Some(field_errors))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

// Convert other error types to ApiError
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthenticated(reason) => {
                tracing::debug!("Unauthenticated request: {}", reason);
                ApiError::unauthorized("Authentication required")
            }
            SessionError::NoWorkspace { user_id } => {
                tracing::debug!("User {} has no workspace", user_id);
                ApiError::WorkspaceRequired("Create or join a workspace to continue".to_string())
            }
            SessionError::Storage(e) => e.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Forbidden { role, allowed } => ApiError::Forbidden {
                role,
                allowed: allowed.to_vec(),
            },
            AccessError::FeatureUnavailable { plan, feature } => ApiError::FeatureUnavailable { plan, feature },
            AccessError::LimitExceeded {
                plan,
                resource,
                used,
                limit,
            } => ApiError::LimitExceeded {
                plan,
                resource,
                used,
                limit,
            },
            AccessError::NoWorkspace(tenant_id) => {
                tracing::debug!("Workspace {} missing or inactive", tenant_id);
                ApiError::WorkspaceRequired("Create or join a workspace to continue".to_string())
            }
            AccessError::Storage(e) => e.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::EmptyPatch => ApiError::validation_error("No fields to update", None),
            RepositoryError::InvalidQuery(e) => e.into(),
            RepositoryError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            StoreError::Query(e) => e.into(),
            StoreError::Unavailable(msg) => {
                tracing::error!("Storage unavailable: {}", msg);
                ApiError::internal_server_error(INTERNAL_MESSAGE)
            }
            StoreError::MalformedRow(msg) => {
                tracing::error!("Malformed row: {}", msg);
                ApiError::internal_server_error(INTERNAL_MESSAGE)
            }
            StoreError::Database(e) => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", e);
                ApiError::internal_server_error(INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::field_error(err.field(), err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errs: ValidationErrors) -> Self {
        let mut field_errors = FieldErrors::new();
        flatten_validation_errors(&mut field_errors, "", &errs);
        ApiError::validation_error("Validation failed", Some(field_errors))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON that does not fit the payload type
            JsonRejection::JsonDataError(e) => ApiError::validation_error(e.body_text(), None),
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::PayloadTooLarge("Request body is too large".to_string())
            }
            other => ApiError::InvalidJson(other.body_text()),
        }
    }
}

fn flatten_validation_errors(out: &mut FieldErrors, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        let key = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errors) => {
                let messages = out.entry(key).or_default();
                for e in errors {
                    messages.push(
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("invalid ({})", e.code)),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_validation_errors(out, &key, nested),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    flatten_validation_errors(out, &format!("{}[{}]", key, idx), nested);
                }
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

/// JSON body extractor that also runs `validator` rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
