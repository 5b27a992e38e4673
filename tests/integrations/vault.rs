//! Secret store client tests against a mock Vault server.

use pgmon::config::VaultConfig;
use pgmon::secrets::{SecretError, SecretStore, VaultClient};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> VaultClient {
    VaultClient::new(&VaultConfig {
        address: server.uri(),
        token: "test-token".to_string(),
        mount: "secret".to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_reads_connection_config_from_kv_v2() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/app1"))
        .and(header("X-Vault-Token", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "data": {
                    "Host": "db.internal",
                    "Port": "5433",
                    "Username": "monitor",
                    "Password": "s3cret",
                    "Database": "app",
                    "SSLMode": "require",
                },
                "metadata": { "version": 3 },
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = client(&server).connection_config("db/app1").await.unwrap();
    assert_eq!(config.host, "db.internal");
    assert_eq!(config.port, "5433");
    assert_eq!(config.database, "app");
    assert_eq!(config.ssl_mode, "require");
}

#[tokio::test]
async fn test_missing_field_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/app1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "Host": "db.internal", "Port": "5432" } }
        })))
        .mount(&server)
        .await;

    let err = client(&server).connection_config("db/app1").await.unwrap_err();
    assert!(matches!(err, SecretError::MissingField("Username")));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/db/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"errors\":[]}"))
        .mount(&server)
        .await;

    let err = client(&server)
        .connection_config("db/missing")
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Status { status: 404, .. }));
    assert!(err.to_string().contains("db/missing"));
}
