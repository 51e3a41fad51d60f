#![allow(dead_code)]

use base64::{prelude::BASE64_STANDARD, Engine};
use digest_deployer::config::DeployerConfig;
use digest_deployer::services::MockDirectory;
use digest_deployer::startup::Application;
use serde_json::json;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;

pub const TAG: &str = "gcr.io/proj1/api:latest";
pub const DIGEST: &str = "gcr.io/proj1/api@sha256:abc123";

pub fn test_config() -> DeployerConfig {
    DeployerConfig {
        common: CoreConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        region: "us-central1".to_string(),
        project: "proj1".to_string(),
        service: "api".to_string(),
        run_api_endpoint: None,
        access_token: None,
        metadata_token_url: None,
        request_timeout_secs: 5,
        max_body_bytes: 64 * 1024,
        log_level: "debug".to_string(),
        otlp_endpoint: None,
    }
}

/// Outer push body carrying `event` as base64 data.
pub fn push_body(event: &serde_json::Value) -> String {
    json!({
        "message": {
            "data": BASE64_STANDARD.encode(event.to_string()),
            "messageId": "2070443601311540",
            "publishTime": "2021-02-26T19:13:55.749Z"
        },
        "subscription": "projects/proj1/subscriptions/gcr"
    })
    .to_string()
}

pub fn insert_event(tag: &str, digest: &str) -> serde_json::Value {
    json!({"action": "INSERT", "tag": tag, "digest": digest})
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub directory: Arc<MockDirectory>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the deployer on a random port against a mock directory whose
    /// service currently runs `image`.
    pub async fn spawn(image: &str) -> Self {
        let directory = Arc::new(MockDirectory::with_image(image));

        let app = Application::build_with_directory(test_config(), directory.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address,
            port,
            directory,
            client: reqwest::Client::new(),
        }
    }

    pub async fn post_raw(&self, path: &str, body: impl Into<reqwest::Body>) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn push(&self, event: &serde_json::Value) -> reqwest::Response {
        self.post_raw("/", push_body(event)).await
    }
}
