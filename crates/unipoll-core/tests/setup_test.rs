#![allow(clippy::unwrap_used)]
// Setup probe against a wiremock controller.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unipoll_api::TransportConfig;
use unipoll_core::setup::{self, SetupError};
use unipoll_core::IntegrationClient;

async fn setup_client() -> (MockServer, IntegrationClient) {
    let server = MockServer::start().await;
    let client = IntegrationClient::new(
        &server.uri(),
        &SecretString::from("test-api-key".to_owned()),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

async fn mount_info(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/proxy/network/integration/v1/info"))
        .respond_with(
            ResponseTemplate::new(status).set_body_json(json!({ "applicationVersion": "9.1.120" })),
        )
        .mount(server)
        .await;
}

async fn mount_sites(server: &MockServer, sites: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/proxy/network/integration/v1/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": sites.as_array().map_or(0, Vec::len),
            "data": sites,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_probe_single_site() {
    let (server, client) = setup_client().await;
    mount_info(&server, 200).await;
    mount_sites(
        &server,
        json!([{ "id": "88f7af54", "name": "Default", "internalReference": "default" }]),
    )
    .await;

    let probe = setup::probe(&client).await.unwrap();

    assert_eq!(probe.info.application_version.as_deref(), Some("9.1.120"));
    assert_eq!(probe.default_site().unwrap().id, "88f7af54");
}

#[tokio::test]
async fn test_probe_multiple_sites_has_no_default() {
    let (server, client) = setup_client().await;
    mount_info(&server, 200).await;
    mount_sites(
        &server,
        json!([{ "id": "a1", "name": "Home" }, { "id": "b2", "name": "Office" }]),
    )
    .await;

    let probe = setup::probe(&client).await.unwrap();

    assert_eq!(probe.sites.len(), 2);
    assert!(probe.default_site().is_none());
    assert_eq!(probe.select_site(Some("Office")).unwrap().id, "b2");
}

#[tokio::test]
async fn test_probe_without_sites() {
    let (server, client) = setup_client().await;
    mount_info(&server, 200).await;
    mount_sites(&server, json!([])).await;

    assert_eq!(setup::probe(&client).await.unwrap_err(), SetupError::NoSites);
}

#[tokio::test]
async fn test_probe_rejected_key() {
    let (server, client) = setup_client().await;
    mount_info(&server, 401).await;

    assert_eq!(
        setup::probe(&client).await.unwrap_err(),
        SetupError::InvalidCredentials
    );
}

#[tokio::test]
async fn test_probe_unreachable_controller() {
    let (server, client) = setup_client().await;
    drop(server);

    assert!(matches!(
        setup::probe(&client).await.unwrap_err(),
        SetupError::CannotConnect(_)
    ));
}

#[tokio::test]
async fn test_probe_server_error_is_unknown() {
    let (server, client) = setup_client().await;
    mount_info(&server, 500).await;

    assert!(matches!(
        setup::probe(&client).await.unwrap_err(),
        SetupError::Unknown(_)
    ));
}
