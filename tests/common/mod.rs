#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use leadgen_api::auth::{issue_session_token, Claims};
use leadgen_api::config::{AppConfig, PlanCatalog};
use leadgen_api::database::models::{Membership, Tenant};
use leadgen_api::database::MemoryStore;
use leadgen_api::services::Notifier;
use leadgen_api::state::AppState;
use leadgen_api::types::{Role, TenantId};

pub const JWT_SECRET: &str = "integration-test-secret";

/// Captures every emitted event instead of delivering it
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(TenantId, String, Value)>>,
}

impl RecordingNotifier {
    /// Waits for detached deliveries to land, up to one second
    pub async fn settle(&self, expected: usize) -> Vec<String> {
        for _ in 0..100 {
            if self.names().len() >= expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.names()
    }

    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(_, name, _)| name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, tenant_id: &TenantId, event: &str, data: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push((*tenant_id, event.to_string(), data));
        }
    }
}

/// Two workspaces on the embedded plan catalogue: `acme` on growth, `beta` on free
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub acme: Tenant,
    pub beta: Tenant,
    router: Router,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl Response {
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }

    pub fn id(&self) -> Uuid {
        self.body["data"]["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("response has no data.id")
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::build(None).await
    }

    /// Same workspaces, but events go to the notifier built by `make`
    pub async fn spawn_with_notifier(make: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Notifier> + 'static) -> Self {
        Self::build(Some(Box::new(make))).await
    }

    async fn build(make: Option<Box<dyn FnOnce(Arc<MemoryStore>) -> Arc<dyn Notifier>>>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("leadgen_api=debug")
            .with_test_writer()
            .try_init();

        let mut config = AppConfig::development(PlanCatalog::embedded().expect("embedded plans"));
        config.security.jwt_secret = JWT_SECRET.to_string();

        let store = Arc::new(MemoryStore::new());
        let acme = Tenant::new("Acme Corp", "acme", "growth");
        let beta = Tenant::new("Beta LLC", "beta", "free");
        store.add_tenant(acme.clone()).await;
        store.add_tenant(beta.clone()).await;

        let notifier = Arc::new(RecordingNotifier::default());
        let delivery: Arc<dyn Notifier> = match make {
            Some(make) => make(store.clone()),
            None => notifier.clone(),
        };
        let state = AppState::new(config, store.clone(), delivery);

        Self {
            store,
            notifier,
            acme,
            beta,
            router: leadgen_api::app(state),
        }
    }

    /// A new user holding `role` in `tenant`; returns a session token
    pub async fn login(&self, tenant: &Tenant, role: Role) -> String {
        let user = Uuid::new_v4();
        self.store.add_membership(Membership::new(user, tenant.id, role)).await;
        token_for(user, None)
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.call(request).await
    }

    pub async fn call(&self, request: Request<Body>) -> Result<Response> {
        let response = self.router.clone().oneshot(request).await.context("router call failed")?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok(Response { status, headers, body })
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<Response> {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<Response> {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Result<Response> {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<Response> {
        self.send(Method::DELETE, uri, Some(token), None).await
    }
}

pub fn token_for(user: Uuid, workspace: Option<Uuid>) -> String {
    issue_session_token(JWT_SECRET, &Claims::new(user, workspace, Duration::hours(1))).expect("token")
}
