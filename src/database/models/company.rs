use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;
use crate::access::policy::{Policy, Requirement, ADMINS, ANY_ROLE, STAFF};
use crate::database::store::{DeleteMode, TableSpec};
use crate::types::{Feature, Resource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i32>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewCompany {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 3, max = 253, message = "domain must be 3-253 characters"))]
    pub domain: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "industry must be at most 100 characters"))]
    pub industry: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "employee_count cannot be negative"))]
    pub employee_count: Option<i32>,
    #[serde(default)]
    #[validate(url(message = "website must be a valid URL"))]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CompanyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 253, message = "domain must be 3-253 characters"))]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "industry must be at most 100 characters"))]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "employee_count cannot be negative"))]
    pub employee_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "website must be a valid URL"))]
    pub website: Option<String>,
}

impl Entity for Company {
    type Create = NewCompany;
    type Patch = CompanyPatch;

    const NAME: &'static str = "company";
    const TABLE: TableSpec = TableSpec {
        name: "companies",
        searchable: &["name", "domain", "industry"],
        unique: &["domain"],
        references: &[],
        delete_mode: DeleteMode::Soft,
    };
    const RESOURCE: Resource = Resource::Companies;
    const FILTERABLE: &'static [&'static str] = &["industry", "domain"];
    const SORTABLE: &'static [&'static str] = &["created_at", "updated_at", "name", "domain", "employee_count"];
    const POLICY: Policy = Policy {
        list: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        read: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        create: Requirement::roles(STAFF).feature(Feature::Crm).limit(Resource::Companies),
        update: Requirement::roles(STAFF).feature(Feature::Crm),
        delete: Requirement::roles(ADMINS).feature(Feature::Crm),
    };
}
