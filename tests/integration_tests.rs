//! End-to-end tests against a real server on an ephemeral port.
//!
//! Each test starts its own server in the background, so tests are isolated
//! from each other and need no external setup.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use blog_service::error::codes;
use blog_service::limiter::parse_rules;
use blog_service::{AppState, Config, build_router};

const APP_KEY: &str = "blog-service";
const APP_SECRET: &str = "integration-secret";

/// Test fixture running the app server in the background
struct TestFixture {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestFixture {
    /// Server with token authentication enabled
    async fn new() -> Self {
        Self::with_config(Config {
            app_key: APP_KEY.to_string(),
            app_secret: Some(APP_SECRET.to_string()),
            ..Self::base_config()
        })
        .await
    }

    fn base_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "warn".to_string(),
            metrics_port: 0,
            ..Config::default()
        }
    }

    async fn with_config(config: Config) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");

        let state = AppState::new(config);
        let app = build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in with the configured credentials and return the token
    async fn login(&self) -> String {
        let response = self
            .client
            .post(self.url("/auth"))
            .json(&json!({"app_key": APP_KEY, "app_secret": APP_SECRET}))
            .send()
            .await
            .expect("Auth request failed");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_tag(&self, token: &str, name: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/v1/tags"))
            .header("token", token)
            .json(&json!({"name": name, "created_by": "editor"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn create_article(&self, token: &str, tag_id: u64, title: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/v1/articles"))
            .header("token", token)
            .json(&json!({
                "tag_id": tag_id,
                "title": title,
                "desc": "A short description",
                "content": "Body of the article",
                "cover_image_url": "https://cdn.example.com/cover.png",
                "created_by": "editor"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .expect("Health request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["run_mode"], "release");
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_api_requires_token() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/api/v1/tags"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], codes::UNAUTHORIZED_TOKEN_ERROR);
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .get(fixture.url("/api/v1/tags"))
        .header("token", "made-up")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_credentials_are_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .client
        .post(fixture.url("/auth"))
        .form(&[("app_key", APP_KEY), ("app_secret", "wrong")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], codes::UNAUTHORIZED_AUTH_NOT_EXIST);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_token_in_query_parameter() {
    let fixture = TestFixture::new().await;
    let token = fixture.login().await;

    let response = fixture
        .client
        .get(fixture.url(&format!("/api/v1/tags?token={token}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Content
// ============================================================================

#[tokio::test]
async fn test_tag_lifecycle() {
    let fixture = TestFixture::new().await;
    let token = fixture.login().await;

    let tag = fixture.create_tag(&token, "rust").await;
    let id = tag["id"].as_u64().unwrap();
    assert_eq!(tag["name"], "rust");
    assert_eq!(tag["state"], 1);

    // Rename
    let response = fixture
        .client
        .put(fixture.url(&format!("/api/v1/tags/{id}")))
        .header("token", &token)
        .json(&json!({"name": "rustlang", "modified_by": "editor"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["name"], "rustlang");

    // Listed under the open state
    let response = fixture
        .client
        .get(fixture.url("/api/v1/tags?name=rustlang"))
        .header("token", &token)
        .send()
        .await
        .unwrap();
    let list: Value = response.json().await.unwrap();
    assert_eq!(list["pager"]["total_rows"], 1);
    assert_eq!(list["list"][0]["id"], id);

    // Delete, then it is gone
    let response = fixture
        .client
        .delete(fixture.url(&format!("/api/v1/tags/{id}")))
        .header("token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = fixture
        .client
        .delete(fixture.url(&format!("/api/v1/tags/{id}")))
        .header("token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_is_returned_with_its_tag() {
    let fixture = TestFixture::new().await;
    let token = fixture.login().await;

    let tag = fixture.create_tag(&token, "systems").await;
    let tag_id = tag["id"].as_u64().unwrap();
    let article = fixture
        .create_article(&token, tag_id, "Token buckets")
        .await;
    let id = article["id"].as_u64().unwrap();

    let response = fixture
        .client
        .get(fixture.url(&format!("/api/v1/articles/{id}")))
        .header("token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["title"], "Token buckets");
    assert_eq!(body["tag"]["id"], tag_id);
    assert_eq!(body["tag"]["name"], "systems");

    // Closing the tag hides the article
    let response = fixture
        .client
        .patch(fixture.url(&format!("/api/v1/tags/{tag_id}/state")))
        .header("token", &token)
        .json(&json!({"state": 0, "modified_by": "editor"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = fixture
        .client
        .get(fixture.url(&format!("/api/v1/articles/{id}")))
        .header("token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_list_is_paginated() {
    let fixture = TestFixture::new().await;
    let token = fixture.login().await;

    let tag = fixture.create_tag(&token, "paging").await;
    let tag_id = tag["id"].as_u64().unwrap();
    for n in 0..5 {
        fixture
            .create_article(&token, tag_id, &format!("Article {n}"))
            .await;
    }

    let response = fixture
        .client
        .get(fixture.url(&format!(
            "/api/v1/articles?tag_id={tag_id}&page=2&page_size=2"
        )))
        .header("token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pager"]["page"], 2);
    assert_eq!(body["pager"]["page_size"], 2);
    assert_eq!(body["pager"]["total_rows"], 5);
    assert_eq!(body["list"].as_array().unwrap().len(), 2);
    assert_eq!(body["list"][0]["title"], "Article 2");
}

#[tokio::test]
async fn test_article_under_missing_tag_is_not_found() {
    let fixture = TestFixture::new().await;
    let token = fixture.login().await;

    let response = fixture
        .client
        .post(fixture.url("/api/v1/articles"))
        .header("token", &token)
        .json(&json!({
            "tag_id": 999,
            "title": "Orphan",
            "desc": "No tag here",
            "content": "Nothing",
            "cover_image_url": "https://cdn.example.com/x.png",
            "created_by": "editor"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let fixture = TestFixture::with_config(Config {
        rate_limit_rules: parse_rules("/auth:60000:5:5").unwrap(),
        app_secret: Some(APP_SECRET.to_string()),
        ..TestFixture::base_config()
    })
    .await;

    let mut statuses = Vec::new();
    for _ in 0..8 {
        let response = fixture
            .client
            .post(fixture.url("/auth"))
            .json(&json!({"app_key": APP_KEY, "app_secret": APP_SECRET}))
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }

    let admitted = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let limited = statuses
        .iter()
        .filter(|s| **s == StatusCode::TOO_MANY_REQUESTS)
        .count();
    assert_eq!(admitted, 5);
    assert_eq!(limited, 3);
    assert_eq!(fixture.state.limiter.bucket_count(), 1);

    // Other routes are unaffected
    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_recovery() {
    let fixture = TestFixture::with_config(Config {
        rate_limit_rules: parse_rules("/auth:500:1:1").unwrap(),
        ..TestFixture::base_config()
    })
    .await;

    let post = || {
        fixture
            .client
            .post(fixture.url("/auth"))
            .form(&[("app_key", "x"), ("app_secret", "y")])
    };

    let first = post().send().await.unwrap();
    assert_ne!(first.status(), StatusCode::TOO_MANY_REQUESTS);

    let second = post().send().await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));

    tokio::time::sleep(Duration::from_millis(600)).await;

    let third = post().send().await.unwrap();
    assert_ne!(third.status(), StatusCode::TOO_MANY_REQUESTS);
}
