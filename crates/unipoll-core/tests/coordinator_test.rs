#![allow(clippy::unwrap_used)]
// Integration tests for `Coordinator` against a wiremock controller.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unipoll_core::{
    ControllerConfig, Coordinator, CoordinatorEvent, CoordinatorState, RefreshErrorKind,
    RefreshOutcome, Snapshot,
};

// ── Helpers ─────────────────────────────────────────────────────────

const SITE: &str = "site-1";

fn site_path(suffix: &str) -> String {
    format!("/proxy/network/integration/v1/sites/{SITE}{suffix}")
}

fn envelope(items: &[Value]) -> Value {
    json!({
        "offset": 0,
        "limit": 200,
        "count": items.len(),
        "totalCount": items.len(),
        "data": items,
    })
}

fn config(server: &MockServer) -> ControllerConfig {
    ControllerConfig::new(
        server.uri(),
        SecretString::from("test-api-key".to_owned()),
        SITE,
    )
}

fn coordinator(server: &MockServer) -> Coordinator {
    Coordinator::connect(config(server)).unwrap()
}

async fn mount_json(server: &MockServer, p: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(site_path(p)))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, p: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(site_path(p)))
        .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
        .mount(server)
        .await;
}

/// Listings plus healthy details/statistics for every device id.
async fn mount_site(server: &MockServer, device_ids: &[&str], clients: &[Value]) {
    let devices: Vec<Value> = device_ids
        .iter()
        .map(|id| json!({ "id": id, "name": format!("dev {id}"), "state": "ONLINE" }))
        .collect();

    mount_json(server, "/devices", 200, envelope(&devices)).await;
    mount_json(server, "/clients", 200, envelope(clients)).await;
    mount_json(server, "/wans", 200, json!([{ "id": "wan-1", "name": "Internet 1" }])).await;

    for id in device_ids {
        mount_device(server, id).await;
    }
}

async fn mount_device(server: &MockServer, id: &str) {
    mount_json(
        server,
        &format!("/devices/{id}"),
        200,
        json!({ "id": id, "firmwareVersion": "4.0.6" }),
    )
    .await;
    mount_json(
        server,
        &format!("/devices/{id}/statistics/latest"),
        200,
        json!({ "uptimeSec": 3600, "cpuUtilizationPct": 4.2 }),
    )
    .await;
}

fn clients_of(types: &[&str]) -> Vec<Value> {
    types
        .iter()
        .enumerate()
        .map(|(i, t)| json!({ "id": format!("c-{i}"), "type": t }))
        .collect()
}

async fn completed(coordinator: &Coordinator) -> Arc<Snapshot> {
    match coordinator.refresh().await.unwrap() {
        RefreshOutcome::Completed(snapshot) => snapshot,
        other => panic!("expected a completed cycle, got: {other:?}"),
    }
}

// ── Cycle ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_builds_full_snapshot() {
    let server = MockServer::start().await;
    mount_site(&server, &["d1", "d2"], &clients_of(&["WIRED"])).await;
    let coordinator = coordinator(&server);

    let snapshot = completed(&coordinator).await;

    assert_eq!(snapshot.devices.len(), 2);
    let d1 = snapshot.device("d1").unwrap();
    assert_eq!(d1.info["name"], "dev d1");
    assert_eq!(d1.details["firmwareVersion"], "4.0.6");
    assert_eq!(d1.statistics["uptimeSec"], 3600);
    assert_eq!(snapshot.wans.len(), 1);
    assert_eq!(snapshot.wans[0]["name"], "Internet 1");
    assert!(snapshot.device_errors.is_empty());

    let current = coordinator.snapshot().unwrap();
    assert!(Arc::ptr_eq(&current, &snapshot));
    assert!(coordinator.last_error().is_none());
    assert_eq!(*coordinator.state().borrow(), CoordinatorState::Idle);
}

#[tokio::test]
async fn test_failed_device_becomes_placeholder() {
    let server = MockServer::start().await;
    let devices: Vec<Value> = ["d1", "d2", "d3"]
        .iter()
        .map(|id| json!({ "id": id, "name": format!("dev {id}") }))
        .collect();
    mount_json(&server, "/devices", 200, envelope(&devices)).await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!({ "data": [] })).await;
    mount_device(&server, "d1").await;
    mount_device(&server, "d3").await;
    mount_json(&server, "/devices/d2", 200, json!({ "id": "d2" })).await;
    mount_status(&server, "/devices/d2/statistics/latest", 500).await;

    let coordinator = coordinator(&server);
    let snapshot = completed(&coordinator).await;

    let keys: Vec<&str> = snapshot.devices.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["d1", "d2", "d3"]);

    let d2 = snapshot.device("d2").unwrap();
    assert!(d2.statistics.is_empty());
    assert!(d2.details.is_empty());
    assert_eq!(d2.info["name"], "dev d2");

    for id in ["d1", "d3"] {
        let dev = snapshot.device(id).unwrap();
        assert!(!dev.statistics.is_empty(), "{id} should have statistics");
        assert!(!dev.details.is_empty(), "{id} should have details");
    }

    assert_eq!(snapshot.device_errors.len(), 1);
    assert_eq!(snapshot.device_errors[0].device_id, "d2");
    assert!(coordinator.last_error().is_none());
}

#[tokio::test]
async fn test_client_counts() {
    let server = MockServer::start().await;
    let clients = clients_of(&["WIRED", "WIRELESS", "WIRELESS", "VPN", "GUEST"]);
    mount_site(&server, &[], &clients).await;

    let snapshot = completed(&coordinator(&server)).await;

    assert_eq!(snapshot.client_count, 5);
    assert_eq!(snapshot.client_count_wired, 1);
    assert_eq!(snapshot.client_count_wireless, 2);
    assert_eq!(snapshot.client_count_vpn, 1);
    assert_eq!(snapshot.clients.len(), 5);
}

#[tokio::test]
async fn test_device_without_id_is_skipped() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/devices",
        200,
        envelope(&[json!({ "id": "d1" }), json!({ "name": "orphan" })]),
    )
    .await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!([])).await;
    mount_device(&server, "d1").await;

    let snapshot = completed(&coordinator(&server)).await;

    assert_eq!(snapshot.devices.len(), 1);
    assert!(snapshot.device("d1").is_some());
}

#[tokio::test]
async fn test_capped_fan_out_keeps_listing_order() {
    let server = MockServer::start().await;
    mount_site(&server, &["z", "m", "a"], &[]).await;

    let mut cfg = config(&server);
    cfg.max_device_fetches = Some(1);
    let coordinator = Coordinator::connect(cfg).unwrap();

    let snapshot = completed(&coordinator).await;

    let keys: Vec<&str> = snapshot.devices.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["z", "m", "a"]);
    assert!(snapshot.devices.values().all(|d| !d.is_placeholder()));
}

// ── Cycle failures ──────────────────────────────────────────────────

#[tokio::test]
async fn test_auth_failure_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_site(&server, &["d1"], &clients_of(&["WIRED"])).await;
    let coordinator = coordinator(&server);

    let before = completed(&coordinator).await;

    server.reset().await;
    mount_status(&server, "/devices", 401).await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!([])).await;

    let mut events = coordinator.subscribe();
    let err = coordinator.refresh().await.unwrap_err();

    assert_eq!(err.kind, RefreshErrorKind::AuthenticationFailed);
    assert!(err.message.starts_with("Authentication failed"));

    let after = coordinator.snapshot().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(
        coordinator.last_error().unwrap().kind,
        RefreshErrorKind::AuthenticationFailed
    );
    assert_eq!(
        *coordinator.state().borrow(),
        CoordinatorState::ReauthRequired
    );

    match events.recv().await.unwrap() {
        CoordinatorEvent::Failed(e) => assert_eq!(e.kind, RefreshErrorKind::AuthenticationFailed),
        other @ CoordinatorEvent::Updated(_) => panic!("expected Failed, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_other_failure_is_update_failed_and_clears_on_success() {
    let server = MockServer::start().await;
    mount_json(&server, "/devices", 200, envelope(&[])).await;
    mount_status(&server, "/clients", 500).await;
    mount_json(&server, "/wans", 200, json!([])).await;
    let coordinator = coordinator(&server);

    let err = coordinator.refresh().await.unwrap_err();
    assert_eq!(err.kind, RefreshErrorKind::UpdateFailed);
    assert!(err.message.starts_with("Error communicating with UniFi API"));
    assert!(coordinator.snapshot().is_none());
    assert_eq!(*coordinator.state().borrow(), CoordinatorState::Idle);

    server.reset().await;
    mount_site(&server, &[], &[]).await;

    completed(&coordinator).await;
    assert!(coordinator.last_error().is_none());
}

#[tokio::test]
async fn test_second_trigger_while_refreshing_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(site_path("/devices")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(&[]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!([])).await;

    let coordinator = coordinator(&server);
    let (first, second) = tokio::join!(coordinator.refresh(), coordinator.refresh());

    assert!(matches!(first.unwrap(), RefreshOutcome::Completed(_)));
    assert!(matches!(second.unwrap(), RefreshOutcome::AlreadyRunning));

    let listing_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == site_path("/devices"))
        .count();
    assert_eq!(listing_calls, 1);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_polls_until_shutdown() {
    let server = MockServer::start().await;
    mount_site(&server, &["d1"], &[]).await;

    let mut cfg = config(&server);
    cfg.poll_interval = Duration::from_millis(50);
    let coordinator = Coordinator::connect(cfg).unwrap();

    let first = coordinator.start().await.unwrap();
    let mut events = coordinator.subscribe();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        CoordinatorEvent::Updated(next) => assert!(!Arc::ptr_eq(&first, &next)),
        other @ CoordinatorEvent::Failed(_) => panic!("expected Updated, got: {other:?}"),
    }

    coordinator.shutdown().await;
    assert_eq!(*coordinator.state().borrow(), CoordinatorState::Stopped);
    assert!(matches!(
        coordinator.refresh().await.unwrap(),
        RefreshOutcome::Stopped
    ));
}

#[tokio::test]
async fn test_start_fails_when_first_load_is_rejected() {
    let server = MockServer::start().await;
    mount_status(&server, "/devices", 403).await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!([])).await;

    let coordinator = coordinator(&server);
    let err = coordinator.start().await.unwrap_err();

    assert!(err.requires_reauth());
    assert!(coordinator.snapshot().is_none());
    assert_eq!(
        *coordinator.state().borrow(),
        CoordinatorState::ReauthRequired
    );
}

#[tokio::test]
async fn test_scheduler_stops_after_auth_failure() {
    let server = MockServer::start().await;
    mount_site(&server, &[], &[]).await;

    let mut cfg = config(&server);
    cfg.poll_interval = Duration::from_millis(50);
    let coordinator = Coordinator::connect(cfg).unwrap();
    coordinator.start().await.unwrap();

    server.reset().await;
    mount_status(&server, "/devices", 401).await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!([])).await;

    let mut state = coordinator.state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == CoordinatorState::ReauthRequired),
    )
    .await
    .unwrap()
    .unwrap();

    // Let aborted sibling requests land before counting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let seen = server.received_requests().await.unwrap().len();
    // Several intervals pass with no new cycle.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_reauth_required_survives_manual_success() {
    let server = MockServer::start().await;
    mount_site(&server, &["d1"], &[]).await;

    let mut cfg = config(&server);
    cfg.poll_interval = Duration::from_millis(50);
    let coordinator = Coordinator::connect(cfg).unwrap();
    coordinator.start().await.unwrap();

    server.reset().await;
    mount_status(&server, "/devices", 401).await;
    mount_json(&server, "/clients", 200, envelope(&[])).await;
    mount_json(&server, "/wans", 200, json!([])).await;

    let mut state = coordinator.state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == CoordinatorState::ReauthRequired),
    )
    .await
    .unwrap()
    .unwrap();

    // The controller accepts the key again; a manual cycle succeeds.
    server.reset().await;
    mount_site(&server, &["d1"], &[]).await;
    let snapshot = completed(&coordinator).await;
    assert!(snapshot.device("d1").is_some());
    assert!(coordinator.last_error().is_none());

    // Polling stays stopped, and the state keeps saying so.
    assert_eq!(
        *coordinator.state().borrow(),
        CoordinatorState::ReauthRequired
    );
    let err = coordinator.start().await.unwrap_err();
    assert!(err.requires_reauth());

    let seen = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);

    coordinator.shutdown().await;
    assert_eq!(*coordinator.state().borrow(), CoordinatorState::Stopped);
}
