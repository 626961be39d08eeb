use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;
use crate::access::policy::{Policy, Requirement, ADMINS, STAFF};
use crate::database::store::{DeleteMode, TableSpec};
use crate::types::{Feature, Resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub name: String,
    pub status: CampaignStatus,
    pub subject: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub daily_send_limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewCampaign {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    #[validate(length(max = 300, message = "subject must be at most 300 characters"))]
    pub subject: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(range(min = 1, max = 100000, message = "daily_send_limit must be between 1 and 100000"))]
    pub daily_send_limit: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CampaignPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300, message = "subject must be at most 300 characters"))]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 100000, message = "daily_send_limit must be between 1 and 100000"))]
    pub daily_send_limit: Option<i32>,
}

impl Entity for Campaign {
    type Create = NewCampaign;
    type Patch = CampaignPatch;

    const NAME: &'static str = "campaign";
    const TABLE: TableSpec = TableSpec {
        name: "campaigns",
        searchable: &["name", "subject"],
        unique: &[],
        references: &[],
        delete_mode: DeleteMode::Soft,
    };
    const RESOURCE: Resource = Resource::Campaigns;
    const FILTERABLE: &'static [&'static str] = &["status"];
    const SORTABLE: &'static [&'static str] = &["created_at", "updated_at", "name", "status", "scheduled_at"];
    const POLICY: Policy = Policy {
        list: Requirement::roles(STAFF).feature(Feature::Campaigns),
        read: Requirement::roles(STAFF).feature(Feature::Campaigns),
        create: Requirement::roles(ADMINS).feature(Feature::Campaigns).limit(Resource::Campaigns),
        update: Requirement::roles(ADMINS).feature(Feature::Campaigns),
        delete: Requirement::roles(ADMINS).feature(Feature::Campaigns),
    };
}
