use dorm_admin::config::get_configuration;
use dorm_admin::meter::AnnexRule;
use dorm_admin::services::ApiClient;
use dorm_admin::startup::{build_router, RouterOptions};
use dorm_admin::AppState;
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use service_core::observability::{init_metrics, init_tracing};
use service_core::polling::PeriodicRefresh;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "dorm-admin",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    )?;

    let metrics_handle = init_metrics()?;

    let api = ApiClient::new(
        &configuration.api,
        configuration.server.public_host.as_deref(),
    )?;

    let chats_api = api.scoped(
        configuration
            .api
            .service_token
            .as_ref()
            .map(|t| t.expose_secret().as_str()),
        None,
    );
    let recent_chats = PeriodicRefresh::spawn(
        "recent_chats",
        Duration::from_secs(configuration.polling.recent_chats_secs.max(1)),
        move || {
            let api = chats_api.clone();
            async move { api.recent_chats().await }
        },
    );

    let state = AppState::new(api, AnnexRule::new(&configuration.meter.annex_patterns))
        .with_service_token(configuration.api.service_token.clone())
        .with_recent_chats(recent_chats)
        .with_metrics(metrics_handle);

    let app = build_router(
        state,
        RouterOptions {
            secure_cookies: configuration.server.secure_cookies,
            static_dir: configuration.server.static_dir.clone(),
        },
    );

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting dorm-admin on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
