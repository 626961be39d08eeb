use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::types::{Feature, Resource};

const EMBEDDED_PLANS: &str = include_str!("../../config/plans.yaml");

/// Features and quotas granted by one plan tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDefinition {
    #[serde(default)]
    pub features: BTreeMap<Feature, bool>,
    #[serde(default)]
    pub limits: BTreeMap<Resource, i64>,
}

impl PlanDefinition {
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    /// `None` means the resource is not capped on this plan
    pub fn limit(&self, resource: Resource) -> Option<i64> {
        self.limits.get(&resource).copied()
    }
}

/// All plan tiers, keyed by the plan name stored on each tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanCatalog {
    pub default_plan: String,
    pub plans: BTreeMap<String, PlanDefinition>,
}

/// A plan lookup result: the name actually applied and its definition
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPlan<'a> {
    pub name: &'a str,
    pub definition: &'a PlanDefinition,
}

impl PlanCatalog {
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml(EMBEDDED_PLANS)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PlansFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let catalog: PlanCatalog = serde_yaml::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.plans.contains_key(&self.default_plan) {
            return Err(ConfigError::Invalid(format!(
                "default plan '{}' is not defined",
                self.default_plan
            )));
        }
        for (name, plan) in &self.plans {
            if let Some((resource, limit)) = plan.limits.iter().find(|(_, limit)| **limit < 0) {
                return Err(ConfigError::Invalid(format!(
                    "plan '{}' has negative limit {} for {}",
                    name, limit, resource
                )));
            }
        }
        Ok(())
    }

    /// Resolve a tenant's plan name. Unknown names fall back to the default plan.
    pub fn resolve(&self, plan: &str) -> ResolvedPlan<'_> {
        if let Some((name, definition)) = self.plans.get_key_value(plan) {
            return ResolvedPlan { name, definition };
        }

        tracing::warn!(
            "Unknown plan '{}', applying default plan '{}'",
            plan,
            self.default_plan
        );
        let (name, definition) = self
            .plans
            .get_key_value(&self.default_plan)
            .map(|(name, def)| (name.as_str(), def))
            .unwrap_or((self.default_plan.as_str(), &EMPTY_PLAN));
        ResolvedPlan { name, definition }
    }
}

// Only reachable if a catalogue bypassed `validate`
static EMPTY_PLAN: PlanDefinition = PlanDefinition {
    features: BTreeMap::new(),
    limits: BTreeMap::new(),
};
