pub mod config;
pub mod handlers;
pub mod meter;
pub mod middleware;
pub mod models;
pub mod services;
pub mod session;
pub mod startup;

use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::{ExposeSecret, Secret};
use service_core::middleware::RequestId;
use service_core::polling::PeriodicRefresh;
use std::sync::Arc;

use meter::AnnexRule;
use models::RecentChat;
use services::{ApiClient, BatchRegistry};
use session::SessionContext;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    /// Token for calls made on behalf of LINE staff, who have no session token.
    pub service_token: Option<Arc<Secret<String>>>,
    pub annex: Arc<AnnexRule>,
    pub batches: BatchRegistry,
    pub recent_chats: Option<Arc<PeriodicRefresh<Vec<RecentChat>>>>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(api: ApiClient, annex: AnnexRule) -> Self {
        Self {
            api,
            service_token: None,
            annex: Arc::new(annex),
            batches: BatchRegistry::new(),
            recent_chats: None,
            metrics: None,
        }
    }

    pub fn with_service_token(mut self, token: Option<Secret<String>>) -> Self {
        self.service_token = token.map(Arc::new);
        self
    }

    pub fn with_recent_chats(mut self, refresh: PeriodicRefresh<Vec<RecentChat>>) -> Self {
        self.recent_chats = Some(Arc::new(refresh));
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Backend client acting for the caller: the session token when signed
    /// in, otherwise the service token.
    pub fn api_for(&self, ctx: &SessionContext, request_id: Option<&RequestId>) -> ApiClient {
        let token = ctx
            .token()
            .or_else(|| self.service_token.as_ref().map(|t| t.expose_secret().as_str()));
        self.api.scoped(token, request_id.map(RequestId::as_str))
    }
}
