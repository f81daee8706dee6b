use crate::error::{GateError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides `identity_provider.url`
pub const PROVIDER_URL_ENV: &str = "IDENTITY_PROVIDER_URL";
/// Environment variable that overrides `identity_provider.anon_key`
pub const PROVIDER_ANON_KEY_ENV: &str = "IDENTITY_PROVIDER_ANON_KEY";

/// Main gate configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Page renderer that receives pass-through requests
    pub upstream: UpstreamConfig,
    /// Hosted identity provider
    #[serde(default)]
    pub identity_provider: IdentityProviderConfig,
    /// Path lists used by the route guard
    #[serde(default)]
    pub routes: RouteTableConfig,
    /// Route guard behavior
    #[serde(default)]
    pub guard: GuardConfig,
    /// Prometheus metrics
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Upstream page renderer
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the renderer (e.g., "http://localhost:3000")
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    /// Base URL of the provider (overridden by `IDENTITY_PROVIDER_URL`)
    #[serde(default)]
    pub url: Option<String>,
    /// Public anon key sent as `apikey` (overridden by `IDENTITY_PROVIDER_ANON_KEY`)
    #[serde(default)]
    pub anon_key: Option<SecretString>,
    /// Session cookie name; derived from the provider host when absent
    #[serde(default)]
    pub cookie_name: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// Mark session cookies `Secure`
    #[serde(default)]
    pub secure_cookies: bool,
}

/// Path lists for classification and exclusion
#[derive(Debug, Clone, Deserialize)]
pub struct RouteTableConfig {
    /// Paths starting with any of these require an identity
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
    /// Paths equal to any of these are public
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    /// Public paths that signed-in callers are redirected away from
    #[serde(default = "default_auth_entry_paths")]
    pub auth_entry_paths: Vec<String>,
    /// Redirect target for anonymous callers on protected paths
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Redirect target for signed-in callers on auth-entry paths
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
    /// Paths starting with any of these skip the guard entirely
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
    /// Paths equal to any of these skip the guard entirely
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,
}

/// What the guard does when the identity provider cannot be reached
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFailurePolicy {
    /// Surface the failure as an error response
    #[default]
    Error,
    /// Treat the caller as anonymous
    Anonymous,
}

/// Route guard configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GuardConfig {
    #[serde(default)]
    pub on_provider_error: ProviderFailurePolicy,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Expose the Prometheus endpoint
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path of the Prometheus endpoint
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_protected_prefixes() -> Vec<String> {
    ["/dashboard", "/analytics", "/settings", "/admin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_public_paths() -> Vec<String> {
    ["/", "/login", "/register", "/auth/callback"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_auth_entry_paths() -> Vec<String> {
    vec!["/login".to_string(), "/register".to_string()]
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}

fn default_excluded_prefixes() -> Vec<String> {
    vec!["/_next/static".to_string(), "/_next/image".to_string()]
}

fn default_excluded_paths() -> Vec<String> {
    vec!["/favicon.ico".to_string()]
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            cookie_name: None,
            timeout_secs: default_provider_timeout(),
            secure_cookies: false,
        }
    }
}

impl Default for RouteTableConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: default_protected_prefixes(),
            public_paths: default_public_paths(),
            auth_entry_paths: default_auth_entry_paths(),
            login_path: default_login_path(),
            dashboard_path: default_dashboard_path(),
            excluded_prefixes: default_excluded_prefixes(),
            excluded_paths: default_excluded_paths(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(Self::from_yaml(&content)?.with_env_overrides())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `IDENTITY_PROVIDER_URL` / `IDENTITY_PROVIDER_ANON_KEY` from the environment
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(
            std::env::var(PROVIDER_URL_ENV).ok(),
            std::env::var(PROVIDER_ANON_KEY_ENV).ok(),
        );
        self
    }

    fn apply_overrides(&mut self, url: Option<String>, anon_key: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.identity_provider.url = Some(url.trim().to_string());
        }
        if let Some(key) = anon_key.filter(|k| !k.trim().is_empty()) {
            self.identity_provider.anon_key = Some(SecretString::new(key.trim().to_string()));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.upstream.url) {
            return Err(GateError::Config(format!(
                "Upstream URL must start with http:// or https://: {}",
                self.upstream.url
            )));
        }

        if let Some(url) = &self.identity_provider.url {
            if !is_http_url(url) {
                return Err(GateError::Config(format!(
                    "Identity provider URL must start with http:// or https://: {}",
                    url
                )));
            }
        }

        let routes = &self.routes;
        let all_paths = routes
            .protected_prefixes
            .iter()
            .chain(&routes.public_paths)
            .chain(&routes.auth_entry_paths)
            .chain(&routes.excluded_prefixes)
            .chain(&routes.excluded_paths)
            .chain([&routes.login_path, &routes.dashboard_path, &self.metrics.path]);

        for path in all_paths {
            if !path.starts_with('/') {
                return Err(GateError::Config(format!(
                    "Path must start with '/': {:?}",
                    path
                )));
            }
        }

        for entry in &routes.auth_entry_paths {
            if !routes.public_paths.contains(entry) {
                return Err(GateError::Config(format!(
                    "Auth entry path {} must also be a public path",
                    entry
                )));
            }
        }

        if routes
            .protected_prefixes
            .iter()
            .any(|prefix| routes.login_path.starts_with(prefix.as_str()))
            && !routes.public_paths.contains(&routes.login_path)
        {
            return Err(GateError::Config(format!(
                "Login path {} is protected and would redirect to itself",
                routes.login_path
            )));
        }

        if routes.auth_entry_paths.contains(&routes.dashboard_path) {
            return Err(GateError::Config(format!(
                "Dashboard path {} cannot be an auth entry path",
                routes.dashboard_path
            )));
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                url: "http://localhost:3000".to_string(),
                timeout_secs: default_upstream_timeout(),
            },
            identity_provider: IdentityProviderConfig::default(),
            routes: RouteTableConfig::default(),
            guard: GuardConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
