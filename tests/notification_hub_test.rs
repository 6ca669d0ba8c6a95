//! Integration tests for the notification publish path
//!
//! Publishes through the HTTP API and reads the result off joined hub
//! rooms, the same way a connected dashboard socket would.

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
use switchboard::domain::shared::{TenantId, UserId};
use switchboard::domain::tenant::InMemoryTenantDirectory;
use switchboard::infrastructure::bridge::{RealtimeConnector, RelayBridge, RelaySettings};
use switchboard::infrastructure::provider::{CarrierClient, ProviderSettings};
use switchboard::infrastructure::tools::ToolExecutor;
use switchboard::interface::api::{build_router, init_metrics, AppState, NotificationHub, WsState};

static METRICS: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_app() -> (Router, Arc<NotificationHub>) {
    let provider = Arc::new(CarrierClient::new(ProviderSettings::default()).unwrap());
    let registry = Arc::new(CallRegistry::new(provider.clone()));
    let tenants = Arc::new(InMemoryTenantDirectory::empty());
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
    let ws_state = WsState {
        hub: hub.clone(),
        verifier: Arc::new(TokenVerifier::new("")),
    };
    let app = build_router(
        state,
        METRICS.get_or_init(init_metrics).clone(),
        ws_state,
    );
    (app, hub)
}

async fn publish(app: Router, body: Value) -> Value {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/notifications")
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
async fn test_published_notification_reaches_a_joined_tenant_room() {
    let (app, hub) = test_app();
    let mut rx = hub.join_tenant(&TenantId::new("acme"));

    let json = publish(
        app,
        json!({
            "tenant_id": "acme",
            "title": "Booking confirmed",
            "message": "Cleaning on Friday at 10am",
            "severity": "success",
            "link": "/bookings/BK-42"
        }),
    )
    .await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["delivered"], 1);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event, "notification:new");
    assert_eq!(event.data["title"], "Booking confirmed");
    assert_eq!(event.data["severity"], "success");
    assert_eq!(event.data["link"], "/bookings/BK-42");
}

#[tokio::test]
async fn test_published_notification_reaches_a_user_room() {
    let (app, hub) = test_app();
    let mut rx = hub.join_user(&UserId::new("u1"));

    let json = publish(
        app,
        json!({"user_id": "u1", "title": "Hi", "message": "hello"}),
    )
    .await;

    assert_eq!(json["data"]["delivered"], 1);
    let event = rx.try_recv().unwrap();
    assert_eq!(event.data["severity"], "info");
}

#[tokio::test]
async fn test_publish_with_nobody_listening_delivers_zero() {
    let (app, _hub) = test_app();

    let json = publish(
        app,
        json!({"tenant_id": "ghost", "title": "Hi", "message": "hello"}),
    )
    .await;

    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["delivered"], 0);
}

#[tokio::test]
async fn test_publish_requires_exactly_one_recipient() {
    let (app, _hub) = test_app();
    let json = publish(
        app,
        json!({
            "user_id": "u1",
            "tenant_id": "acme",
            "title": "Hi",
            "message": "hello"
        }),
    )
    .await;
    assert_eq!(json["success"], false);

    let (app, _hub) = test_app();
    let json = publish(app, json!({"title": "Hi", "message": "hello"})).await;
    assert_eq!(json["success"], false);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("user_id or tenant_id"));
}
