use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::Entity;
use crate::access::policy::{Policy, Requirement, ADMINS};
use crate::database::store::{DeleteMode, TableSpec};
use crate::types::{Feature, Resource};

/// Tables whose writes emit `<table>.<verb>` events
const EVENT_SOURCES: &[&str] = &["leads", "companies", "deals", "campaigns"];
const EVENT_VERBS: &[&str] = &["created", "updated", "deleted"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    pub events: Vec<String>,
    pub description: Option<String>,
    pub active: bool,
}

impl Webhook {
    /// `*` subscribes to everything
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == "*" || e == event)
    }
}

/// Whether writes to `table` emit webhook events
pub fn is_event_source(table: &str) -> bool {
    EVENT_SOURCES.contains(&table)
}

pub fn is_known_event(event: &str) -> bool {
    if event == "*" {
        return true;
    }
    match event.split_once('.') {
        Some((source, verb)) => EVENT_SOURCES.contains(&source) && EVENT_VERBS.contains(&verb),
        None => false,
    }
}

fn known_events(events: &Vec<String>) -> Result<(), ValidationError> {
    if let Some(unknown) = events.iter().find(|e| !is_known_event(e)) {
        let mut err = ValidationError::new("unknown_event");
        err.message = Some(format!("unknown event '{}'", unknown).into());
        return Err(err);
    }
    Ok(())
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewWebhook {
    #[validate(url(message = "url must be a valid URL"))]
    pub url: String,
    #[validate(
        length(min = 1, message = "at least one event is required"),
        custom(function = "known_events")
    )]
    pub events: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WebhookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "url must be a valid URL"))]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, message = "at least one event is required"),
        custom(function = "known_events")
    )]
    pub events: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl Entity for Webhook {
    type Create = NewWebhook;
    type Patch = WebhookPatch;

    const NAME: &'static str = "webhook";
    const TABLE: TableSpec = TableSpec {
        name: "webhooks",
        searchable: &["url", "description"],
        unique: &["url"],
        references: &[],
        delete_mode: DeleteMode::Soft,
    };
    const RESOURCE: Resource = Resource::Webhooks;
    const FILTERABLE: &'static [&'static str] = &["active"];
    const SORTABLE: &'static [&'static str] = &["created_at", "updated_at", "url"];
    const POLICY: Policy = Policy {
        list: Requirement::roles(ADMINS).feature(Feature::Webhooks),
        read: Requirement::roles(ADMINS).feature(Feature::Webhooks),
        create: Requirement::roles(ADMINS).feature(Feature::Webhooks).limit(Resource::Webhooks),
        update: Requirement::roles(ADMINS).feature(Feature::Webhooks),
        delete: Requirement::roles(ADMINS).feature(Feature::Webhooks),
    };
}
