use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Entity;
use crate::access::policy::{Policy, Requirement, ADMINS, ANY_ROLE};
use crate::database::store::{DeleteMode, TableSpec};
use crate::types::{Feature, Resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub title: Option<String>,
    pub company_id: Option<Uuid>,
    pub status: LeadStatus,
    pub source: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewLead {
    #[validate(length(min = 1, max = 100, message = "first_name must be 1-100 characters"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "title must be at most 200 characters"))]
    pub title: Option<String>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default)]
    #[validate(length(max = 100, message = "source must be at most 100 characters"))]
    pub source: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "score must be between 0 and 100"))]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LeadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "first_name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200, message = "title must be at most 200 characters"))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "source must be at most 100 characters"))]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 100, message = "score must be between 0 and 100"))]
    pub score: Option<i32>,
}

impl Entity for Lead {
    type Create = NewLead;
    type Patch = LeadPatch;

    const NAME: &'static str = "lead";
    const TABLE: TableSpec = TableSpec {
        name: "leads",
        searchable: &["first_name", "last_name", "email", "title"],
        unique: &["email"],
        references: &[("company_id", "companies")],
        delete_mode: DeleteMode::Soft,
    };
    const RESOURCE: Resource = Resource::Leads;
    const FILTERABLE: &'static [&'static str] = &["status", "source", "company_id", "email"];
    const SORTABLE: &'static [&'static str] =
        &["created_at", "updated_at", "first_name", "last_name", "email", "status", "score"];
    // Partners submit referred leads and keep them current
    const POLICY: Policy = Policy {
        list: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        read: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        create: Requirement::roles(ANY_ROLE).feature(Feature::Crm).limit(Resource::Leads),
        update: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        delete: Requirement::roles(ADMINS).feature(Feature::Crm),
    };
}
