use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{hash_api_key, verify_session_token, TokenError};
use crate::database::store::{Directory, StoreError};
use crate::types::{Role, TenantId};

/// The authenticated caller. Built once per request and passed explicitly
/// to every gate and repository call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub tenant_id: TenantId,
    pub role: Role,
    pub method: AuthMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    ApiKey,
}

/// Raw request credentials, before any lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    SessionToken(String),
    ApiKey(String),
}

impl Credentials {
    /// `Authorization: Bearer` wins over the session cookie. Bearer values
    /// carrying the key prefix are API keys; anything else is a session token.
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str, api_key_prefix: &str) -> Option<Self> {
        if let Some(token) = bearer_token(headers) {
            return Some(if token.starts_with(api_key_prefix) {
                Credentials::ApiKey(token)
            } else {
                Credentials::SessionToken(token)
            });
        }
        cookie_value(headers, cookie_name).map(Credentials::SessionToken)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("User {user_id} has no workspace")]
    NoWorkspace { user_id: Uuid },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Turns request credentials into a `Principal`. Performs lookups only.
pub struct SessionResolver {
    directory: Arc<dyn Directory>,
    jwt_secret: String,
    cookie_name: String,
    api_key_prefix: String,
}

impl SessionResolver {
    pub fn new(
        directory: Arc<dyn Directory>,
        jwt_secret: impl Into<String>,
        cookie_name: impl Into<String>,
        api_key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            jwt_secret: jwt_secret.into(),
            cookie_name: cookie_name.into(),
            api_key_prefix: api_key_prefix.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub async fn resolve_headers(&self, headers: &HeaderMap) -> Result<Principal, SessionError> {
        let credentials = Credentials::from_headers(headers, &self.cookie_name, &self.api_key_prefix)
            .ok_or_else(|| SessionError::Unauthenticated("missing credentials".to_string()))?;
        self.resolve(&credentials).await
    }

    pub async fn resolve(&self, credentials: &Credentials) -> Result<Principal, SessionError> {
        match credentials {
            Credentials::SessionToken(token) => self.resolve_session(token).await,
            Credentials::ApiKey(key) => self.resolve_api_key(key).await,
        }
    }

    async fn resolve_session(&self, token: &str) -> Result<Principal, SessionError> {
        let claims = verify_session_token(&self.jwt_secret, token).map_err(|e| {
            if matches!(e, TokenError::InvalidSecret) {
                tracing::error!("Session token presented but no JWT secret is configured");
            }
            SessionError::Unauthenticated(e.to_string())
        })?;

        let workspace = claims.workspace.map(TenantId);
        let membership = self
            .directory
            .membership(claims.sub, workspace.as_ref())
            .await?
            .ok_or(SessionError::NoWorkspace { user_id: claims.sub })?;

        self.ensure_active(&membership.tenant_id, claims.sub).await?;

        Ok(Principal {
            user_id: claims.sub,
            tenant_id: membership.tenant_id,
            role: membership.role,
            method: AuthMethod::Session,
        })
    }

    async fn resolve_api_key(&self, key: &str) -> Result<Principal, SessionError> {
        let grant = self
            .directory
            .api_key_by_hash(&hash_api_key(key))
            .await?
            .ok_or_else(|| SessionError::Unauthenticated("invalid API key".to_string()))?;

        if grant.is_expired(Utc::now()) {
            return Err(SessionError::Unauthenticated("API key expired".to_string()));
        }

        let user_id = grant.owner_id.unwrap_or(grant.key_id);
        self.ensure_active(&grant.tenant_id, user_id).await?;

        Ok(Principal {
            user_id,
            tenant_id: grant.tenant_id,
            role: grant.role,
            method: AuthMethod::ApiKey,
        })
    }

    async fn ensure_active(&self, tenant_id: &TenantId, user_id: Uuid) -> Result<(), SessionError> {
        match self.directory.tenant(tenant_id).await? {
            Some(tenant) if tenant.is_active => Ok(()),
            _ => Err(SessionError::NoWorkspace { user_id }),
        }
    }
}
