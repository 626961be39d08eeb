use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::Entity;
use crate::access::policy::{Policy, Requirement, ADMINS};
use crate::database::store::{DeleteMode, TableSpec};
use crate::types::{Feature, Resource, Role};

/// Keys may only be given an expiry that has not passed yet
pub fn expires_in_future(expires_at: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *expires_at <= Utc::now() {
        let mut err = ValidationError::new("expired");
        err.message = Some("expires_at must be in the future".into());
        return Err(err);
    }
    Ok(())
}

/// A stored API key. Only the hash is persisted; it is never serialized outward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub role: Role,
    pub key_prefix: String,
    #[serde(default, skip_serializing)]
    pub key_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Row written when a key is minted. Built server side, never parsed from a request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewApiKey {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub role: Role,
    pub key_prefix: String,
    pub key_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "expires_in_future"))]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entity for ApiKey {
    type Create = NewApiKey;
    type Patch = ApiKeyPatch;

    const NAME: &'static str = "api key";
    const TABLE: TableSpec = TableSpec {
        name: "api_keys",
        searchable: &["name"],
        unique: &["key_hash"],
        references: &[],
        delete_mode: DeleteMode::Hard,
    };
    const RESOURCE: Resource = Resource::ApiKeys;
    const FILTERABLE: &'static [&'static str] = &["role"];
    const SORTABLE: &'static [&'static str] = &["created_at", "updated_at", "name", "expires_at"];
    const POLICY: Policy = Policy {
        list: Requirement::roles(ADMINS).feature(Feature::ApiAccess),
        read: Requirement::roles(ADMINS).feature(Feature::ApiAccess),
        create: Requirement::roles(ADMINS).feature(Feature::ApiAccess).limit(Resource::ApiKeys),
        update: Requirement::roles(ADMINS).feature(Feature::ApiAccess),
        delete: Requirement::roles(ADMINS).feature(Feature::ApiAccess),
    };
}
