pub mod api_key;
pub mod campaign;
pub mod company;
pub mod deal;
pub mod lead;
pub mod tenant;
pub mod webhook;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::access::Policy;
use crate::database::store::TableSpec;
use crate::types::{Resource, TenantId};

pub use api_key::{ApiKey, ApiKeyPatch, NewApiKey};
pub use campaign::{Campaign, CampaignPatch, CampaignStatus, NewCampaign};
pub use company::{Company, CompanyPatch, NewCompany};
pub use deal::{Deal, DealPatch, DealStage, NewDeal};
pub use lead::{Lead, LeadPatch, LeadStatus, NewLead};
pub use tenant::{ApiKeyGrant, Membership, Tenant};
pub use webhook::{NewWebhook, Webhook, WebhookPatch};

/// A tenant-owned business entity. The associated constants are the only
/// source of table names, whitelists and access rules for that entity.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Validated payload accepted by `create`
    type Create: Serialize + DeserializeOwned + Validate + Send + Sync + 'static;
    /// Validated partial update; unset fields must serialize as absent
    type Patch: Serialize + DeserializeOwned + Validate + Send + Sync + 'static;

    /// Singular noun used in messages and webhook events
    const NAME: &'static str;
    const TABLE: TableSpec;
    const RESOURCE: Resource;
    const FILTERABLE: &'static [&'static str];
    const SORTABLE: &'static [&'static str];
    const POLICY: Policy;
}

/// A stored entity together with its ownership and bookkeeping columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<E> {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub owner_id: Option<Uuid>,
    #[serde(flatten)]
    pub attributes: E,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to `Repository::create`. The tenant is part of the request, never inferred.
#[derive(Debug, Clone)]
pub struct NewRecord<T> {
    pub tenant_id: TenantId,
    pub owner_id: Option<Uuid>,
    pub attrs: T,
}

impl<T> NewRecord<T> {
    pub fn new(tenant_id: TenantId, owner_id: Option<Uuid>, attrs: T) -> Self {
        Self { tenant_id, owner_id, attrs }
    }
}

/// Table backing a quota-counted resource
pub fn table_for(resource: Resource) -> &'static TableSpec {
    match resource {
        Resource::Leads => &Lead::TABLE,
        Resource::Companies => &Company::TABLE,
        Resource::Deals => &Deal::TABLE,
        Resource::Campaigns => &Campaign::TABLE,
        Resource::Webhooks => &Webhook::TABLE,
        Resource::ApiKeys => &ApiKey::TABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn every_resource_maps_to_its_own_table() {
        for resource in Resource::ALL {
            assert_eq!(table_for(*resource).name, resource.as_str());
        }
    }

    #[test]
    fn whitelists_never_expose_tenant_column() {
        fn check<E: Entity>() {
            assert!(!E::FILTERABLE.contains(&"tenant_id"), "{} filters tenant_id", E::NAME);
            assert!(!E::SORTABLE.contains(&"tenant_id"), "{} sorts tenant_id", E::NAME);
            assert!(!E::TABLE.searchable.contains(&"tenant_id"), "{} searches tenant_id", E::NAME);
        }
        check::<Lead>();
        check::<Company>();
        check::<Deal>();
        check::<Campaign>();
        check::<Webhook>();
        check::<ApiKey>();
    }

    #[test]
    fn deletes_are_admin_only() {
        fn check<E: Entity>() {
            assert!(!E::POLICY.delete.allows_role(Role::Member), "{} delete allows member", E::NAME);
            assert!(!E::POLICY.delete.allows_role(Role::Partner), "{} delete allows partner", E::NAME);
        }
        check::<Lead>();
        check::<Company>();
        check::<Deal>();
        check::<Campaign>();
        check::<Webhook>();
        check::<ApiKey>();
    }
}
