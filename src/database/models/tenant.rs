use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Role, TenantId};

/// A workspace: the isolation boundary for every business record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, plan: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            slug: slug.into(),
            plan: plan.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A user's role inside one workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub tenant_id: TenantId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: Uuid, tenant_id: TenantId, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
            created_at: Utc::now(),
        }
    }
}

/// What a stored API key resolves to. Never carries the hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyGrant {
    pub key_id: Uuid,
    pub tenant_id: TenantId,
    pub owner_id: Option<Uuid>,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}
