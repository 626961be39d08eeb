use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::policy::Requirement;
use crate::config::PlanCatalog;
use crate::database::models::{table_for, Tenant};
use crate::database::store::{Directory, Store, StoreError};
use crate::session::Principal;
use crate::types::{Feature, Resource, Role, TenantId};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Role '{role}' is not allowed to perform this action")]
    Forbidden { role: Role, allowed: &'static [Role] },

    #[error("The {plan} plan does not include {feature}")]
    FeatureUnavailable { plan: String, feature: Feature },

    #[error("The {plan} plan allows {limit} {resource}; {used} in use")]
    LimitExceeded {
        plan: String,
        resource: Resource,
        used: i64,
        limit: i64,
    },

    #[error("Workspace {0} is missing or inactive")]
    NoWorkspace(TenantId),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageLine {
    pub used: i64,
    /// `None` when the plan does not cap the resource
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub plan: String,
    pub features: BTreeMap<Feature, bool>,
    pub usage: BTreeMap<Resource, UsageLine>,
}

/// Decides whether a principal may perform an operation. Checks run in a
/// fixed order (role, feature, limit) and stop at the first rejection.
pub struct AccessGate {
    directory: Arc<dyn Directory>,
    store: Arc<dyn Store>,
    plans: Arc<PlanCatalog>,
}

impl AccessGate {
    pub fn new(directory: Arc<dyn Directory>, store: Arc<dyn Store>, plans: Arc<PlanCatalog>) -> Self {
        Self { directory, store, plans }
    }

    pub async fn authorize(&self, principal: &Principal, requirement: &Requirement) -> Result<(), AccessError> {
        self.check_role(principal, requirement)?;
        self.check_plan(principal, requirement).await
    }

    /// Role stage only. Callers with extra role rules run them between
    /// this and [`AccessGate::check_plan`].
    pub fn check_role(&self, principal: &Principal, requirement: &Requirement) -> Result<(), AccessError> {
        if !requirement.allows_role(principal.role) {
            tracing::debug!(
                "Denied {} {}: role {} not in {:?}",
                principal.user_id,
                principal.tenant_id,
                principal.role,
                requirement.roles
            );
            return Err(AccessError::Forbidden {
                role: principal.role,
                allowed: requirement.roles,
            });
        }
        Ok(())
    }

    /// Feature and limit stages against the workspace's plan
    pub async fn check_plan(&self, principal: &Principal, requirement: &Requirement) -> Result<(), AccessError> {
        if requirement.feature.is_none() && requirement.limit.is_none() {
            return Ok(());
        }

        let tenant = self.active_tenant(&principal.tenant_id).await?;
        let plan = self.plans.resolve(&tenant.plan);

        if let Some(feature) = requirement.feature {
            if !plan.definition.has_feature(feature) {
                tracing::debug!("Denied tenant {}: plan {} lacks {}", tenant.id, plan.name, feature);
                return Err(AccessError::FeatureUnavailable {
                    plan: plan.name.to_string(),
                    feature,
                });
            }
        }

        if let Some(resource) = requirement.limit {
            if let Some(limit) = plan.definition.limit(resource) {
                // Read through on every check; counts are never cached
                let used = self.store.count(table_for(resource), &tenant.id).await?;
                if used >= limit {
                    tracing::debug!(
                        "Denied tenant {}: {} at {}/{} on plan {}",
                        tenant.id,
                        resource,
                        used,
                        limit,
                        plan.name
                    );
                    return Err(AccessError::LimitExceeded {
                        plan: plan.name.to_string(),
                        resource,
                        used,
                        limit,
                    });
                }
            }
        }

        Ok(())
    }

    /// Current plan, feature map and usage for the principal's workspace
    pub async fn usage(&self, tenant_id: &TenantId) -> Result<UsageReport, AccessError> {
        let tenant = self.active_tenant(tenant_id).await?;
        let plan = self.plans.resolve(&tenant.plan);

        let features = Feature::ALL
            .iter()
            .map(|feature| (*feature, plan.definition.has_feature(*feature)))
            .collect();

        let mut usage = BTreeMap::new();
        for resource in Resource::ALL {
            let used = self.store.count(table_for(*resource), &tenant.id).await?;
            usage.insert(
                *resource,
                UsageLine {
                    used,
                    limit: plan.definition.limit(*resource),
                },
            );
        }

        Ok(UsageReport {
            plan: plan.name.to_string(),
            features,
            usage,
        })
    }

    pub async fn active_tenant(&self, tenant_id: &TenantId) -> Result<Tenant, AccessError> {
        match self.directory.tenant(tenant_id).await? {
            Some(tenant) if tenant.is_active => Ok(tenant),
            _ => Err(AccessError::NoWorkspace(*tenant_id)),
        }
    }
}
