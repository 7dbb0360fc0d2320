use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::handlers::{
    app::{health_check, index},
    auth::{login_handler, login_page, logout_handler},
    chats::recent_chats_fragment,
    dashboard::dashboard_handler,
    invoices::invoices_handler,
    maintenance::{create_maintenance, maintenance_page},
    meter::{batch_preview, batch_progress, meter_page, meter_rows, start_batch},
    metrics::metrics,
    rooms::rooms_handler,
};
use crate::middleware::require_login;
use crate::AppState;

pub struct RouterOptions {
    pub secure_cookies: bool,
    pub static_dir: String,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            secure_cookies: false,
            static_dir: "dorm-admin/static".to_string(),
        }
    }
}

pub fn build_router(state: AppState, options: RouterOptions) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(options.secure_cookies)
        .with_expiry(Expiry::OnInactivity(Duration::hours(12)));

    // Staff-only pages; the meter routes do their own gating because LINE
    // staff reach them without a session login.
    let protected = Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/chats/recent", get(recent_chats_fragment))
        .route("/rooms", get(rooms_handler))
        .route("/invoices", get(invoices_handler))
        .route(
            "/maintenance",
            get(maintenance_page).post(create_maintenance),
        )
        .route_layer(from_fn(require_login));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/meter", get(meter_page))
        .route("/meter/rows", post(meter_rows))
        .route("/meter/batches/preview", post(batch_preview))
        .route("/meter/batches", post(start_batch))
        .route("/meter/batches/:id", get(batch_progress))
        .merge(protected)
        .nest_service("/static", ServeDir::new(options.static_dir))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
