use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::database::models::Webhook;
use crate::database::{Repository, Store};
use crate::filter::ListQuery;
use crate::types::TenantId;

/// Upper bound on endpoints notified for a single event
const MAX_ENDPOINTS: u32 = 100;

/// Best-effort side channel for record events. Implementations swallow
/// their own failures; callers never see an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, tenant_id: &TenantId, event: &str, data: Value);
}

/// Drops every event
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _tenant_id: &TenantId, _event: &str, _data: Value) {}
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'a str,
    tenant_id: &'a TenantId,
    data: &'a Value,
}

/// Posts events to the tenant's active, subscribed webhooks
pub struct WebhookNotifier {
    webhooks: Repository<Webhook>,
    http_client: Client,
}

impl WebhookNotifier {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for webhooks")?;

        Ok(Self {
            webhooks: Repository::new(store),
            http_client,
        })
    }

    async fn targets(&self, tenant_id: &TenantId, event: &str) -> Result<Vec<String>> {
        let page = self
            .webhooks
            .find_by_workspace(tenant_id, &ListQuery::default().page(1, MAX_ENDPOINTS))
            .await
            .context("Failed to load webhooks")?;

        Ok(page
            .data
            .into_iter()
            .filter(|hook| hook.attributes.active && hook.attributes.subscribes_to(event))
            .map(|hook| hook.attributes.url)
            .collect())
    }

    async fn deliver(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Failed to send webhook")?;

        if !response.status().is_success() {
            return Err(anyhow!("endpoint answered {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, tenant_id: &TenantId, event: &str, data: Value) {
        let urls = match self.targets(tenant_id, event).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("Skipping {} notifications for tenant {}: {:#}", event, tenant_id, e);
                return;
            }
        };

        if urls.is_empty() {
            tracing::debug!("No webhooks subscribed to {} in tenant {}", event, tenant_id);
            return;
        }

        let payload = WebhookPayload {
            event,
            tenant_id,
            data: &data,
        };
        let results = join_all(urls.iter().map(|url| self.deliver(url, &payload))).await;

        for (url, result) in urls.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("Webhook {} for {} failed: {:#}", url, event, e);
            }
        }
    }
}
