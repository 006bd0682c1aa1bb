//! Integration tests for the Asana listing endpoints

use asana_extractor::cancel::Cancellation;
use asana_extractor::client::{ClientConfig, RateBudget, ResilientClient, RetryPolicy};
use asana_extractor::fetcher::{AsanaClient, FetcherError, ResourceSource};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn asana(server: &MockServer) -> AsanaClient {
    let http = ResilientClient::new(ClientConfig {
        token: "tok".to_string(),
        rate_budget: RateBudget::new(6_000, 4, 2),
        retry_policy: RetryPolicy::new(1, Duration::from_millis(5), Duration::from_millis(10)),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    AsanaClient::new(Arc::new(http), "ws1", server.uri())
}

#[tokio::test]
async fn test_fetch_all_users_follows_offsets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/users"))
        .and(query_param("limit", "2"))
        .and(query_param("opt_fields", "gid,name,email,workspaces"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"gid": "1", "resource_type": "user", "name": "Ada", "email": "ada@example.com"},
                {"gid": "2", "resource_type": "user", "name": "Grace"}
            ],
            "next_page": {"offset": "page2", "path": "/workspaces/ws1/users?offset=page2", "uri": "x"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/users"))
        .and(query_param("offset", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"gid": "3", "resource_type": "user", "name": "Linus"}],
            "next_page": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let users = asana(&server)
        .with_user_page_size(2)
        .fetch_all_users(&Cancellation::new())
        .await
        .unwrap();

    let gids: Vec<_> = users.iter().map(|u| u.gid.as_str()).collect();
    assert_eq!(gids, vec!["1", "2", "3"]);
    assert_eq!(users[0].email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_fetch_projects_through_resource_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/projects"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "gid": "p1",
                "resource_type": "project",
                "name": "Roadmap",
                "archived": false,
                "created_at": "2024-01-02T03:04:05.000Z",
                "modified_at": "2024-01-03T03:04:05.000Z",
                "public": true,
                "owner": {"gid": "1", "resource_type": "user", "name": "Ada"},
                "team": {"gid": "t1", "resource_type": "team", "name": "Core"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source: Arc<dyn ResourceSource> = Arc::new(asana(&server));
    let projects = source.fetch_projects(&Cancellation::new()).await.unwrap();

    assert_eq!(projects.len(), 1);
    assert!(projects[0].public);
    assert_eq!(projects[0].team.as_ref().map(|t| t.gid.as_str()), Some("t1"));
}

#[tokio::test]
async fn test_request_failure_names_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/users"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let err = asana(&server)
        .fetch_all_users(&Cancellation::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::Request { resource: "users", .. }));
    let message = err.to_string();
    assert!(message.starts_with("failed to get users"), "{message}");
    assert!(message.contains("403"));
    assert!(message.contains("forbidden"));
}

#[tokio::test]
async fn test_malformed_payload_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = asana(&server)
        .list_projects(10, None, &Cancellation::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::MalformedResponse { resource: "projects", .. }));
    assert!(err.to_string().starts_with("failed to parse projects response"));
}

#[tokio::test]
async fn test_single_page_reports_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws1/users"))
        .and(query_param("offset", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"gid": "9", "name": "Ken"}],
            "next_page": {"offset": "def"}
        })))
        .mount(&server)
        .await;

    let page = asana(&server)
        .list_users(5, Some("abc"), &Cancellation::new())
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.next_cursor.as_deref(), Some("def"));
}
