use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::Entity;
use crate::access::policy::{Policy, Requirement, ADMINS, ANY_ROLE, STAFF};
use crate::database::store::{DeleteMode, TableSpec};
use crate::types::{Feature, Resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    #[default]
    Prospecting,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub name: String,
    pub company_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub stage: DealStage,
    pub amount: Option<Decimal>,
    pub close_date: Option<NaiveDate>,
}

fn non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("amount cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewDeal {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    #[serde(default)]
    pub stage: DealStage,
    #[serde(default)]
    #[validate(custom(function = "non_negative_amount"))]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub close_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DealPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<DealStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "non_negative_amount"))]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_date: Option<NaiveDate>,
}

impl Entity for Deal {
    type Create = NewDeal;
    type Patch = DealPatch;

    const NAME: &'static str = "deal";
    const TABLE: TableSpec = TableSpec {
        name: "deals",
        searchable: &["name"],
        unique: &[],
        references: &[("company_id", "companies"), ("lead_id", "leads")],
        delete_mode: DeleteMode::Soft,
    };
    const RESOURCE: Resource = Resource::Deals;
    const FILTERABLE: &'static [&'static str] = &["stage", "company_id", "lead_id"];
    const SORTABLE: &'static [&'static str] = &["created_at", "updated_at", "name", "stage", "amount", "close_date"];
    const POLICY: Policy = Policy {
        list: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        read: Requirement::roles(ANY_ROLE).feature(Feature::Crm),
        create: Requirement::roles(STAFF).feature(Feature::Crm).limit(Resource::Deals),
        update: Requirement::roles(STAFF).feature(Feature::Crm),
        delete: Requirement::roles(ADMINS).feature(Feature::Crm),
    };
}
