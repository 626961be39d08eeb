mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::http::StatusCode;
use common::TestApp;
use leadgen_api::services::{Notifier, WebhookNotifier};
use leadgen_api::types::Role;
use serde_json::json;
use tokio::net::TcpListener;

#[tokio::test]
async fn record_writes_emit_events() -> Result<()> {
    let app = TestApp::spawn().await;
    let admin = app.login(&app.acme, Role::Admin).await;

    let id = app
        .post("/api/leads", &admin, json!({ "first_name": "Ada", "email": "ada@acme.io" }))
        .await?
        .id();
    app.patch(&format!("/api/leads/{}", id), &admin, json!({ "score": 5 })).await?;
    app.delete(&format!("/api/leads/{}", id), &admin).await?;

    assert_eq!(
        app.notifier.settle(3).await,
        vec!["leads.created", "leads.updated", "leads.deleted"]
    );

    let events = app.notifier.events.lock().map(|e| e.clone()).unwrap_or_default();
    assert!(events.iter().all(|(tenant, _, _)| *tenant == app.acme.id));
    assert_eq!(events[0].2["email"], "ada@acme.io");
    assert_eq!(events[2].2["deleted"], true);
    Ok(())
}

#[tokio::test]
async fn rejected_and_read_requests_emit_nothing() -> Result<()> {
    let app = TestApp::spawn().await;
    let member = app.login(&app.acme, Role::Member).await;
    let owner = app.login(&app.acme, Role::Owner).await;

    let res = app.post("/api/campaigns", &member, json!({ "name": "x" })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    app.get("/api/leads", &member).await?;

    // Configuration records are not event sources
    app.post("/api/webhooks", &owner, json!({ "url": "https://hooks.example.com/a", "events": ["*"] }))
        .await?;
    app.post("/api/api-keys", &owner, json!({ "name": "CI" })).await?;

    assert!(app.notifier.settle(1).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn unresponsive_endpoints_do_not_hold_up_writes() -> Result<()> {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let sink = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let app = TestApp::spawn_with_notifier(|store| {
        let notifier = WebhookNotifier::new(store, Duration::from_secs(5)).expect("http client");
        Arc::new(notifier) as Arc<dyn Notifier>
    })
    .await;
    let owner = app.login(&app.acme, Role::Owner).await;
    let res = app
        .post(
            "/api/webhooks",
            &owner,
            json!({ "url": format!("http://{}/hook", addr), "events": ["*"] }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);

    let started = Instant::now();
    let res = app
        .post("/api/leads", &owner, json!({ "first_name": "Ada", "email": "ada@acme.io" }))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert!(started.elapsed() < Duration::from_secs(1), "write waited {:?}", started.elapsed());

    sink.abort();
    Ok(())
}
