mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use leadgen_api::types::Role;
use serde_json::json;

#[tokio::test]
async fn plaintext_key_is_returned_once() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;

    let res = app.post("/api/api-keys", &owner, json!({ "name": "CI", "role": "member" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let key = res.body["data"]["key"].as_str().unwrap_or_default().to_string();
    let prefix = res.body["data"]["key_prefix"].as_str().unwrap_or_default();
    assert!(key.starts_with("lg_"));
    assert!(key.starts_with(prefix));
    assert!(res.body["data"].get("key_hash").is_none());

    let id = res.id();
    let fetched = app.get(&format!("/api/api-keys/{}", id), &owner).await?;
    assert_eq!(fetched.status, StatusCode::OK);
    assert!(fetched.body["data"].get("key").is_none());
    assert!(fetched.body["data"].get("key_hash").is_none());

    let listed = app.get("/api/api-keys", &owner).await?;
    assert!(!listed.body.to_string().contains(&key));
    Ok(())
}

#[tokio::test]
async fn key_resolves_to_its_role_and_workspace() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;
    let owner_id = app.get("/api/auth/whoami", &owner).await?.body["data"]["user_id"].clone();

    let res = app.post("/api/api-keys", &owner, json!({ "name": "Zapier" })).await?;
    let key = res.body["data"]["key"].as_str().unwrap_or_default().to_string();

    let me = app.get("/api/auth/whoami", &key).await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["method"], "api_key");
    assert_eq!(me.body["data"]["role"], "member");
    assert_eq!(me.body["data"]["user_id"], owner_id);
    assert_eq!(me.body["data"]["tenant"]["slug"], "acme");

    // The key carries the member role, not its creator's
    let res = app.post("/api/campaigns", &key, json!({ "name": "via key" })).await?;
    assert_eq!(res.code(), "FORBIDDEN");
    let res = app.post("/api/leads", &key, json!({ "first_name": "K", "email": "k@acme.io" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn keys_cannot_outrank_their_creator() -> Result<()> {
    let app = TestApp::spawn().await;
    let admin = app.login(&app.acme, Role::Admin).await;

    let res = app.post("/api/api-keys", &admin, json!({ "name": "root", "role": "owner" })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "FORBIDDEN");
    assert_eq!(res.body["allowed_roles"], json!(["owner"]));

    let res = app.post("/api/api-keys", &admin, json!({ "name": "ops", "role": "admin" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn key_management_is_admin_only_and_plan_gated() -> Result<()> {
    let app = TestApp::spawn().await;
    let member = app.login(&app.acme, Role::Member).await;
    let beta_owner = app.login(&app.beta, Role::Owner).await;

    assert_eq!(app.get("/api/api-keys", &member).await?.code(), "FORBIDDEN");

    let res = app.post("/api/api-keys", &beta_owner, json!({ "name": "CI" })).await?;
    assert_eq!(res.code(), "FEATURE_UNAVAILABLE");
    assert_eq!(res.body["upgrade"]["feature"], "api_access");
    Ok(())
}

#[tokio::test]
async fn deleted_keys_stop_working() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;

    let res = app.post("/api/api-keys", &owner, json!({ "name": "temp" })).await?;
    let id = res.id();
    let key = res.body["data"]["key"].as_str().unwrap_or_default().to_string();
    assert_eq!(app.get("/api/leads", &key).await?.status, StatusCode::OK);

    assert_eq!(app.delete(&format!("/api/api-keys/{}", id), &owner).await?.status, StatusCode::OK);

    let res = app.get("/api/leads", &key).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.code(), "UNAUTHENTICATED");
    Ok(())
}

#[tokio::test]
async fn keys_can_be_renamed_but_not_promoted() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;
    let id = app.post("/api/api-keys", &owner, json!({ "name": "old" })).await?.id();

    let res = app.patch(&format!("/api/api-keys/{}", id), &owner, json!({ "name": "new" })).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["name"], "new");

    let res = app.patch(&format!("/api/api-keys/{}", id), &owner, json!({ "role": "owner" })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn expiry_must_be_in_the_future() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;

    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let res = app.post("/api/api-keys", &owner, json!({ "name": "stale", "expires_at": past })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"]["expires_at"].is_array());

    let future = (Utc::now() + Duration::days(30)).to_rfc3339();
    let res = app.post("/api/api-keys", &owner, json!({ "name": "fresh", "expires_at": future })).await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let key = res.body["data"]["key"].as_str().unwrap_or_default().to_string();
    assert_eq!(app.get("/api/leads", &key).await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn delegation_is_checked_before_the_plan() -> Result<()> {
    let app = TestApp::spawn().await;

    // beta's plan has no API access, yet the role failure is reported
    let beta_admin = app.login(&app.beta, Role::Admin).await;
    let res = app.post("/api/api-keys", &beta_admin, json!({ "name": "root", "role": "owner" })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "FORBIDDEN");

    // Same at the key cap
    let owner = app.login(&app.acme, Role::Owner).await;
    let admin = app.login(&app.acme, Role::Admin).await;
    for i in 0..5 {
        let res = app.post("/api/api-keys", &owner, json!({ "name": format!("key {}", i) })).await?;
        assert_eq!(res.status, StatusCode::CREATED);
    }
    let res = app.post("/api/api-keys", &admin, json!({ "name": "root", "role": "owner" })).await?;
    assert_eq!(res.code(), "FORBIDDEN");
    let res = app.post("/api/api-keys", &admin, json!({ "name": "extra" })).await?;
    assert_eq!(res.code(), "LIMIT_EXCEEDED");
    Ok(())
}

#[tokio::test]
async fn patched_expiry_must_be_in_the_future() -> Result<()> {
    let app = TestApp::spawn().await;
    let owner = app.login(&app.acme, Role::Owner).await;
    let id = app.post("/api/api-keys", &owner, json!({ "name": "ci" })).await?.id();

    let past = (Utc::now() - Duration::minutes(5)).to_rfc3339();
    let res = app
        .patch(&format!("/api/api-keys/{}", id), &owner, json!({ "expires_at": past }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["field_errors"]["expires_at"].is_array());

    let future = (Utc::now() + Duration::days(7)).to_rfc3339();
    let res = app
        .patch(&format!("/api/api-keys/{}", id), &owner, json!({ "expires_at": future }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}
