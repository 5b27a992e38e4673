//! Review API client tests against a mock HTTP server.

use pgmon::collectors::system::SystemCollector;
use pgmon::models::{
    BatchReviewRequest, MigrationReviewRequest, QueryReviewRequest, ServerData, ServerInfo,
};
use pgmon::review::{ReviewClient, ReviewError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReviewClient {
    ReviewClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

fn server_data() -> ServerData {
    ServerData {
        environment: "staging".to_string(),
        server_info: ServerInfo {
            version: "PostgreSQL 16.2".to_string(),
            host: "db1".to_string(),
            database: "app".to_string(),
        },
        ..ServerData::default()
    }
}

fn recommendation() -> serde_json::Value {
    json!({
        "content": "config looks fine",
        "criticality": "low",
        "recommendation": "none",
    })
}

#[tokio::test]
async fn test_analyze_config_posts_server_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config/analyze"))
        .and(body_partial_json(json!({
            "environment": "staging",
            "server_info": { "Host": "db1" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(recommendation()))
        .expect(1)
        .mount(&server)
        .await;

    let rec = client(&server)
        .analyze_config(&server_data(), false)
        .await
        .unwrap();
    assert_eq!(rec.criticality, "low");
    assert_eq!(rec.content, "config looks fine");
}

#[tokio::test]
async fn test_scheduled_requests_use_scheduler_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scheduler/config/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recommendation()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/config/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(recommendation()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.analyze_config(&server_data(), true).await.unwrap();
    // The prefix applies to a single call only.
    client.analyze_config(&server_data(), false).await.unwrap();
}

#[tokio::test]
async fn test_analyze_system_metrics_body_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config/analyze"))
        .and(body_partial_json(json!({
            "environment": "prod",
            "server_info": { "Database": "app" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(recommendation()))
        .expect(1)
        .mount(&server)
        .await;

    let metrics = SystemCollector::new().collect();
    let info = server_data().server_info;
    client(&server)
        .analyze_system_metrics(&metrics, &info, "prod", false)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["config"]["cpu_cores"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_non_ok_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config/analyze"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze_config(&server_data(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Status { status: 404, .. }));
    assert_eq!(err.to_string(), "request failed with status 404: not found");
}

#[tokio::test]
async fn test_undecodable_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .analyze_config(&server_data(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Decode(_)));
}

#[tokio::test]
async fn test_review_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/review/batch"))
        .and(body_partial_json(json!({
            "queries": [{ "sql": "SELECT 1;", "thread_id": "init.sql" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "overall_score": 9, "recommendations": [], "issues": ["no limit"] }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = BatchReviewRequest {
        queries: vec![QueryReviewRequest {
            sql: "SELECT 1;".to_string(),
            thread_id: "init.sql".to_string(),
            ..QueryReviewRequest::default()
        }],
        environment: "staging".to_string(),
    };
    let response = client(&server).review_batch(&request).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].score, 9);
    assert_eq!(response.results[0].issues, vec!["no limit".to_string()]);
}

#[tokio::test]
async fn test_review_migration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/review/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "overall_score": 4,
            "warnings": ["locks the table"],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = MigrationReviewRequest {
        sql: "ALTER TABLE users ADD COLUMN age int NOT NULL DEFAULT 0;".to_string(),
        environment: "prod".to_string(),
    };
    let response = client(&server).review_migration(&request).await.unwrap();
    assert_eq!(response.score, 4);
    assert_eq!(response.warnings, vec!["locks the table".to_string()]);
    assert!(response.issues.is_empty());
}

#[tokio::test]
async fn test_review_query_sends_optional_fields_only_when_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/review/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "overall_score": 8,
            "recommendations": ["use an index on users.email"],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = QueryReviewRequest {
        sql: "SELECT * FROM users WHERE email = $1;".to_string(),
        ..QueryReviewRequest::default()
    };
    let response = client(&server).review_query(&request).await.unwrap();
    assert_eq!(response.score, 8);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body, json!({ "sql": "SELECT * FROM users WHERE email = $1;" }));
}
