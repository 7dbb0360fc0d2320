use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub meter: MeterSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Hostname the dashboard is served under; selects a backend override.
    #[serde(default)]
    pub public_host: Option<String>,
    /// Set to true in production with HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_static_dir() -> String {
    "dorm-admin/static".to_string()
}

#[derive(Deserialize, Clone)]
pub struct ApiSettings {
    /// Backend REST base URL, e.g. http://localhost:3001/api
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Token used by background pollers that run outside a staff session.
    #[serde(default)]
    pub service_token: Option<Secret<String>>,
    #[serde(default)]
    pub host_overrides: Vec<HostOverride>,
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Production deployments served under a specific hostname talk to their own backend.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct HostOverride {
    pub public_host: String,
    pub base_url: String,
}

impl ApiSettings {
    pub fn effective_base_url(&self, public_host: Option<&str>) -> &str {
        public_host
            .and_then(|host| {
                self.host_overrides
                    .iter()
                    .find(|o| o.public_host.eq_ignore_ascii_case(host.trim()))
            })
            .map(|o| o.base_url.as_str())
            .unwrap_or(&self.base_url)
    }
}

#[derive(Deserialize, Clone)]
pub struct MeterSettings {
    /// Buildings whose name contains one of these (case-insensitive) are
    /// listed after all other buildings.
    #[serde(default = "default_annex_patterns")]
    pub annex_patterns: Vec<String>,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            annex_patterns: default_annex_patterns(),
        }
    }
}

fn default_annex_patterns() -> Vec<String> {
    vec!["annex".to_string()]
}

#[derive(Deserialize, Clone)]
pub struct PollingSettings {
    #[serde(default = "default_recent_chats_secs")]
    pub recent_chats_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            recent_chats_secs: default_recent_chats_secs(),
        }
    }
}

fn default_recent_chats_secs() -> u64 {
    10
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Spans are exported only when this is set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    service_core::config::load_layered("dorm-admin")
}
