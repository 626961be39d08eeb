/// Shared types used across the codebase

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workspace identifier. Every business record carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Membership role inside a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Partner,
}

impl Role {
    pub const ALL: &'static [Role] = &[Role::Owner, Role::Admin, Role::Member, Role::Partner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Partner => "partner",
        }
    }

    /// Higher rank grants more. Only consulted when delegating a role (API keys).
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 3,
            Role::Admin => 2,
            Role::Member => 1,
            Role::Partner => 0,
        }
    }

    pub fn can_delegate(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "partner" => Ok(Role::Partner),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Plan-gated capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Crm,
    Campaigns,
    Marketplace,
    Enrichment,
    Webhooks,
    ApiAccess,
    Partners,
}

impl Feature {
    pub const ALL: &'static [Feature] = &[
        Feature::Crm,
        Feature::Campaigns,
        Feature::Marketplace,
        Feature::Enrichment,
        Feature::Webhooks,
        Feature::ApiAccess,
        Feature::Partners,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Crm => "crm",
            Feature::Campaigns => "campaigns",
            Feature::Marketplace => "marketplace",
            Feature::Enrichment => "enrichment",
            Feature::Webhooks => "webhooks",
            Feature::ApiAccess => "api_access",
            Feature::Partners => "partners",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Countable resources with per-plan quotas. Each maps to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Leads,
    Companies,
    Deals,
    Campaigns,
    Webhooks,
    ApiKeys,
}

impl Resource {
    pub const ALL: &'static [Resource] = &[
        Resource::Leads,
        Resource::Companies,
        Resource::Deals,
        Resource::Campaigns,
        Resource::Webhooks,
        Resource::ApiKeys,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Leads => "leads",
            Resource::Companies => "companies",
            Resource::Deals => "deals",
            Resource::Campaigns => "campaigns",
            Resource::Webhooks => "webhooks",
            Resource::ApiKeys => "api_keys",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations a route can perform against an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Webhook event verb, if the operation mutates data
    pub fn event_verb(&self) -> Option<&'static str> {
        match self {
            Operation::Create => Some("created"),
            Operation::Update => Some("updated"),
            Operation::Delete => Some("deleted"),
            Operation::List | Operation::Read => None,
        }
    }
}
