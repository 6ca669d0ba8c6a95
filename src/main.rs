use std::sync::Arc;
use std::time::{Duration, SystemTime};

use switchboard::config::Config;
use switchboard::domain::auth::TokenVerifier;
use switchboard::domain::registry::CallRegistry;
use switchboard::domain::tenant::InMemoryTenantDirectory;
use switchboard::infrastructure::bridge::{RealtimeConnector, RelayBridge, RelaySettings};
use switchboard::infrastructure::provider::{CarrierClient, ProviderSettings};
use switchboard::infrastructure::tools::ToolExecutor;
use switchboard::interface::api::{build_router, init_metrics, AppState, NotificationHub, WsState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Switchboard voice relay");

    // Load configuration
    let config_path =
        std::env::var("SWITCHBOARD_CONFIG").unwrap_or_else(|_| "switchboard.toml".to_string());
    let config = Config::load(&config_path)?;
    config.validate()?;
    info!("Configuration loaded from {}", config_path);

    // Initialize metrics exporter
    info!("Initializing Prometheus metrics exporter");
    let prometheus_handle = init_metrics();

    // Telephony provider client
    let provider = Arc::new(CarrierClient::new(ProviderSettings {
        account_sid: config.provider.account_sid.clone(),
        auth_token: config.provider.auth_token.clone(),
        base_url: config.provider.base_url.clone(),
        from_number: config.provider.from_number.clone(),
        voice_url: config.provider.voice_url.clone(),
    })?);

    // Call registry, with the provider as status fallback
    let registry = Arc::new(CallRegistry::new(provider.clone()));

    // Tenant voice profiles
    let tenants = Arc::new(InMemoryTenantDirectory::from_profiles(
        config.tenants.clone(),
    ));
    info!("Loaded {} tenant voice profiles", config.tenants.len());

    // Assistant tools
    let tools = Arc::new(ToolExecutor::new(config.tools.clone())?);
    info!("Registered {} assistant tools", config.tools.len());

    // Notification hub and dashboard token verifier
    let hub = Arc::new(NotificationHub::new());
    let verifier = Arc::new(TokenVerifier::new(&config.auth.token_secret));
    if !verifier.is_enabled() {
        info!("No token secret configured; dashboard sockets stay anonymous");
    }

    // Relay bridge wiring
    let connector = Arc::new(RealtimeConnector::new(
        config.speech.url.clone(),
        config.speech.api_key.clone(),
    ));
    let bridge = Arc::new(RelayBridge::new(
        registry.clone(),
        tenants.clone(),
        tools,
        hub.clone(),
        connector,
        RelaySettings {
            idle_timeout: Duration::from_secs(config.relay.idle_timeout_secs),
            default_instructions: config.relay.default_instructions.clone(),
            default_voice: config.relay.default_voice.clone(),
            temperature: config.relay.temperature,
        },
    ));

    let state = AppState {
        registry,
        tenants,
        provider,
        hub: hub.clone(),
        bridge,
        started_at: SystemTime::now(),
    };
    let ws_state = WsState { hub, verifier };

    // Start HTTP server
    let app = build_router(state, prometheus_handle, ws_state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Switchboard listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Switchboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
