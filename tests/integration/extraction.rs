//! End-to-end extraction against a mock Asana API and a temporary output directory

use asana_extractor::cancel::Cancellation;
use asana_extractor::client::{ClientConfig, RateBudget, ResilientClient, RetryPolicy};
use asana_extractor::extractor::{Extractor, ExtractorError, ResourceClass};
use asana_extractor::fetcher::AsanaClient;
use asana_extractor::storage::JsonStorage;
use asana_extractor::User;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn extractor(server: &MockServer, output: &TempDir) -> Extractor {
    let http = ResilientClient::new(ClientConfig {
        token: "tok".to_string(),
        rate_budget: RateBudget::new(6_000, 4, 2),
        retry_policy: RetryPolicy::new(1, Duration::from_millis(5), Duration::from_millis(10)),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let source = AsanaClient::new(Arc::new(http), "ws1", server.uri());
    let storage = JsonStorage::new(output.path()).unwrap();
    Extractor::new(Arc::new(source), Arc::new(storage))
}

async fn mount_users(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"gid": "u1", "resource_type": "user", "name": "Ada"},
                {"gid": "u2", "resource_type": "user", "name": "Grace"}
            ],
            "next_page": null
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_extraction_writes_every_item() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"gid": "p1", "resource_type": "project", "name": "Roadmap"}],
            "next_page": null
        })))
        .mount(&server)
        .await;
    let output = TempDir::new().unwrap();

    let stats = extractor(&server, &output)
        .run(&Cancellation::shared())
        .await
        .unwrap();

    assert_eq!(stats.users_extracted, 2);
    assert_eq!(stats.projects_extracted, 1);
    assert_eq!(stats.errors, 0);
    assert!(stats.duration > Duration::ZERO);

    let stored: User = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("users").join("u2.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(stored.name, "Grace");
    assert!(output.path().join("projects").join("p1.json").is_file());
}

#[tokio::test]
async fn test_project_listing_failure_fails_run() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/projects"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such workspace"))
        .mount(&server)
        .await;
    let output = TempDir::new().unwrap();

    let failure = extractor(&server, &output)
        .run(&Cancellation::shared())
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ExtractorError::Fetch { class: ResourceClass::Projects, .. }
    ));
    assert!(failure.to_string().starts_with("project API failure"));
    assert_eq!(failure.partial.projects_extracted, 0);
    assert!(failure.partial.duration > Duration::ZERO);
}

#[tokio::test]
async fn test_invalid_gids_counted_as_errors() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"gid": "../escape", "name": "Bad"}, {"gid": "p2", "name": "Good"}]
        })))
        .mount(&server)
        .await;
    let output = TempDir::new().unwrap();

    let stats = extractor(&server, &output)
        .run(&Cancellation::shared())
        .await
        .unwrap();

    assert_eq!(stats.users_extracted, 2);
    assert_eq!(stats.projects_extracted, 1);
    assert_eq!(stats.errors, 1);
}
