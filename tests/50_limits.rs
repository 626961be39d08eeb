mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use common::TestApp;
use leadgen_api::database::models::{Campaign, NewCampaign, NewRecord};
use leadgen_api::database::{Repository, Store};
use leadgen_api::types::Role;
use serde_json::json;

async fn seed_campaigns(app: &TestApp, count: usize) -> Result<()> {
    let store: Arc<dyn Store> = app.store.clone();
    let campaigns: Repository<Campaign> = Repository::new(store);
    for i in 0..count {
        let new: NewCampaign = serde_json::from_value(json!({ "name": format!("Seed {}", i) }))?;
        campaigns.create(NewRecord::new(app.acme.id, None, new)).await?;
    }
    Ok(())
}

async fn campaign_usage(app: &TestApp, token: &str) -> Result<serde_json::Value> {
    let res = app.get("/api/usage", token).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(res.body["data"]["usage"]["campaigns"].clone())
}

#[tokio::test]
async fn last_slot_is_usable_and_the_next_is_rejected() -> Result<()> {
    // growth allows 100 campaigns
    let app = TestApp::spawn().await;
    let admin = app.login(&app.acme, Role::Admin).await;
    seed_campaigns(&app, 99).await?;
    assert_eq!(campaign_usage(&app, &admin).await?, json!({ "used": 99, "limit": 100 }));

    let res = app.post("/api/campaigns", &admin, json!({ "name": "Number 100" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(campaign_usage(&app, &admin).await?["used"], 100);

    let res = app.post("/api/campaigns", &admin, json!({ "name": "Number 101" })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "LIMIT_EXCEEDED");
    assert_eq!(res.body["limit"]["resource"], "campaigns");
    assert_eq!(res.body["limit"]["used"], 100);
    assert_eq!(res.body["limit"]["limit"], 100);
    assert_eq!(campaign_usage(&app, &admin).await?["used"], 100);
    Ok(())
}

#[tokio::test]
async fn deleting_frees_a_slot() -> Result<()> {
    let app = TestApp::spawn().await;
    let admin = app.login(&app.acme, Role::Admin).await;
    seed_campaigns(&app, 100).await?;

    let res = app.post("/api/campaigns", &admin, json!({ "name": "Overflow" })).await?;
    assert_eq!(res.code(), "LIMIT_EXCEEDED");

    let first = app.get("/api/campaigns?page_size=1", &admin).await?;
    let id = first.body["data"][0]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(app.delete(&format!("/api/campaigns/{}", id), &admin).await?.status, StatusCode::OK);

    let res = app.post("/api/campaigns", &admin, json!({ "name": "Overflow" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn usage_reports_plan_features_and_unlimited_resources() -> Result<()> {
    let app = TestApp::spawn().await;
    let member = app.login(&app.beta, Role::Member).await;
    app.post("/api/leads", &member, json!({ "first_name": "A", "email": "a@beta.io" })).await?;

    let res = app.get("/api/usage", &member).await?;
    let data = &res.body["data"];
    assert_eq!(data["plan"], "free");
    assert_eq!(data["features"]["crm"], true);
    assert_eq!(data["features"]["campaigns"], false);
    assert_eq!(data["usage"]["leads"], json!({ "used": 1, "limit": 250 }));
    Ok(())
}

#[tokio::test]
async fn webhook_limit_is_enforced() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;

    // growth allows 5 webhooks
    for i in 0..5 {
        let res = app
            .post(
                "/api/webhooks",
                &owner,
                json!({ "url": format!("https://hooks.example.com/{}", i), "events": ["*"] }),
            )
            .await?;
        assert_eq!(res.status, StatusCode::CREATED);
    }
    let res = app
        .post("/api/webhooks", &owner, json!({ "url": "https://hooks.example.com/6", "events": ["*"] }))
        .await?;
    assert_eq!(res.code(), "LIMIT_EXCEEDED");
    assert_eq!(res.body["limit"]["limit"], 5);
    Ok(())
}
