//! Integration tests for the call API
//!
//! Drives the real router with a mock-mode telephony provider, so dial
//! requests succeed without touching the network.

use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tower::ServiceExt; // For `oneshot`

use switchboard::domain::auth::TokenVerifier;
use switchboard::domain::registry::CallRegistry;
use switchboard::domain::session::CallDirection;
use switchboard::domain::shared::TenantId;
use switchboard::domain::tenant::{InMemoryTenantDirectory, TenantVoiceProfile};
use switchboard::infrastructure::bridge::{RealtimeConnector, RelayBridge, RelaySettings};
use switchboard::infrastructure::provider::{CarrierClient, ProviderSettings};
use switchboard::infrastructure::tools::ToolExecutor;
use switchboard::interface::api::{
    build_router, init_metrics, AppState, HubEvent, Notification, NotificationHub, Severity,
    WsState,
};

// The prometheus recorder is process-global, so every test shares one.
static METRICS: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    METRICS.get_or_init(init_metrics).clone()
}

fn test_state(tenants: InMemoryTenantDirectory) -> (AppState, Arc<NotificationHub>) {
    let provider = Arc::new(CarrierClient::new(ProviderSettings::default()).unwrap());
    let registry = Arc::new(CallRegistry::new(provider.clone()));
    let tenants = Arc::new(tenants);
    let hub = Arc::new(NotificationHub::new());
    let connector = Arc::new(RealtimeConnector::new(
        "wss://speech.invalid/v1/realtime",
        "test-key",
    ));
    let bridge = Arc::new(RelayBridge::new(
        registry.clone(),
        tenants.clone(),
        Arc::new(ToolExecutor::new(Vec::new()).unwrap()),
        hub.clone(),
        connector,
        RelaySettings::default(),
    ));

    let state = AppState {
        registry,
        tenants,
        provider,
        hub: hub.clone(),
        bridge,
        started_at: SystemTime::now(),
    };
    (state, hub)
}

fn test_app(state: AppState) -> Router {
    let ws_state = WsState {
        hub: state.hub.clone(),
        verifier: Arc::new(TokenVerifier::new("")),
    };
    build_router(state, metrics_handle(), ws_state)
}

async fn get_json(app: Router, uri: &str) -> Value {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn post_json(app: Router, uri: &str, body: Value) -> Value {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_dial_records_an_outbound_call() {
    let (state, _hub) = test_state(InMemoryTenantDirectory::empty());
    let registry = state.registry.clone();
    let app = test_app(state);

    let json = post_json(
        app,
        "/calls",
        json!({"to": "+15557770000", "tenant_id": "acme"}),
    )
    .await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "initiated");
    let provider_sid = json["data"]["provider_sid"].as_str().unwrap();
    assert!(provider_sid.starts_with("mock-CA-"));

    let records = registry.get_logs(None);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].direction, CallDirection::Outbound);
    assert_eq!(records[0].callee.as_deref(), Some("+15557770000"));
    assert_eq!(records[0].provider_sid.as_deref(), Some(provider_sid));
}

#[tokio::test]
async fn test_dial_rejects_an_empty_destination() {
    let (state, _hub) = test_state(InMemoryTenantDirectory::empty());
    let registry = state.registry.clone();
    let app = test_app(state);

    let json = post_json(app, "/calls", json!({"to": "   "})).await;

    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("destination"));
    assert_eq!(registry.total_count(), 0);
}

#[tokio::test]
async fn test_list_calls_filters_by_tenant() {
    let (state, _hub) = test_state(InMemoryTenantDirectory::empty());
    state.registry.record_call(
        Some(TenantId::new("acme")),
        Some("+15550000001".to_string()),
        None,
        CallDirection::Inbound,
    );
    state.registry.record_call(
        Some(TenantId::new("globex")),
        Some("+15550000002".to_string()),
        None,
        CallDirection::Inbound,
    );
    state.registry.record_call(
        None,
        Some("+15550000003".to_string()),
        None,
        CallDirection::Inbound,
    );
    let app = test_app(state);

    let json = get_json(app, "/calls?tenant_id=acme").await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["calls"][0]["tenant_id"], "acme");
    assert_eq!(json["data"]["calls"][0]["caller"], "+15550000001");
}

#[tokio::test]
async fn test_list_calls_filters_by_status() {
    let (state, _hub) = test_state(InMemoryTenantDirectory::empty());
    let sid = state
        .registry
        .record_call(None, None, None, CallDirection::Inbound);
    state.registry.mark_in_progress(&sid).unwrap();
    state.registry.mark_completed(&sid).unwrap();
    state
        .registry
        .record_call(None, None, None, CallDirection::Inbound);
    let app = test_app(state);

    let json = get_json(app, "/calls?status=completed").await;

    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["calls"][0]["status"], "completed");
}

#[tokio::test]
async fn test_call_status_comes_from_the_registry() {
    let (state, _hub) = test_state(InMemoryTenantDirectory::empty());
    let sid = state.registry.record_call(
        None,
        Some("+15550001111".to_string()),
        None,
        CallDirection::Inbound,
    );
    let app = test_app(state);

    let json = get_json(app, &format!("/calls/{}", sid)).await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["call_sid"], sid.to_string());
    assert_eq!(json["data"]["status"], "initiated");
    assert_eq!(json["data"]["source"], "registry");
}

#[tokio::test]
async fn test_call_status_for_an_unknown_sid_is_an_error_envelope() {
    let (state, _hub) = test_state(InMemoryTenantDirectory::empty());
    let app = test_app(state);

    let json = get_json(app, "/calls/CA-does-not-exist").await;

    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_health_flags_the_mock_provider() {
    let profile = TenantVoiceProfile {
        tenant_id: TenantId::new("acme"),
        name: "Acme Dental".to_string(),
        instructions: "You answer for Acme Dental.".to_string(),
        voice: None,
        greeting: None,
    };
    let (state, _hub) = test_state(InMemoryTenantDirectory::from_profiles(vec![profile]));
    let app = test_app(state);

    let json = get_json(app, "/health").await;

    assert_eq!(json["status"], "degraded");
    assert_eq!(json["provider"]["mock_mode"], true);
    assert_eq!(json["tenants"]["configured"], 1);
    let warnings = json["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.as_str().unwrap().contains("mock")));
}

#[tokio::test]
async fn test_metrics_exposes_hub_counters() {
    let (state, hub) = test_state(InMemoryTenantDirectory::empty());
    let app = test_app(state);

    // Publishing bumps the counter even with nobody listening.
    hub.publish_to_tenant(
        &TenantId::new("acme"),
        HubEvent::notification(&Notification::new("Hi", "hello", Severity::Info)),
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("hub_notifications_published_total"));
}
