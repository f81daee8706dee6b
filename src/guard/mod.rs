//! Route guard / session refresher.
//!
//! Per request: refresh the session once, classify the path, then pick the first
//! matching decision:
//!
//! 1. protected path without identity → redirect to login
//! 2. public auth-entry path with identity → redirect to dashboard
//! 3. anything else → pass through
//!
//! Nothing is carried between requests.

pub mod middleware;

use crate::auth::{Identity, IdentityProvider, SessionRefresh};
use crate::config::{GuardConfig, ProviderFailurePolicy, RouteTableConfig};
use crate::cookies::{CookieMutation, RequestCookie};
use crate::error::Result;
use crate::metrics;
use crate::router::{ExclusionFilter, RouteClassification, RouteTable};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub use middleware::{redirect_with_cookies, route_guard_middleware};

/// What the guard does with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardDecision {
    PassThrough,
    RedirectToLogin,
    RedirectToDashboard,
}

impl GuardDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardDecision::PassThrough => "pass_through",
            GuardDecision::RedirectToLogin => "redirect_login",
            GuardDecision::RedirectToDashboard => "redirect_dashboard",
        }
    }

    pub fn is_redirect(&self) -> bool {
        !matches!(self, GuardDecision::PassThrough)
    }
}

impl fmt::Display for GuardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the guard worked out for one request
#[derive(Debug, Clone, PartialEq)]
pub struct GuardOutcome {
    pub classification: RouteClassification,
    pub decision: GuardDecision,
    pub identity: Option<Identity>,
    /// Cookies set by the refresh; must reach the client whatever the decision
    pub cookie_mutations: Vec<CookieMutation>,
}

impl GuardOutcome {
    /// Redirect location for redirect decisions
    pub fn redirect_target<'a>(&self, routes: &'a RouteTable) -> Option<&'a str> {
        match self.decision {
            GuardDecision::PassThrough => None,
            GuardDecision::RedirectToLogin => Some(routes.login_path()),
            GuardDecision::RedirectToDashboard => Some(routes.dashboard_path()),
        }
    }
}

/// Pure decision step
pub fn decide(
    routes: &RouteTable,
    path: &str,
    classification: RouteClassification,
    authenticated: bool,
) -> GuardDecision {
    match classification {
        RouteClassification::Protected if !authenticated => GuardDecision::RedirectToLogin,
        RouteClassification::Public if authenticated && routes.is_auth_entry(path) => {
            GuardDecision::RedirectToDashboard
        }
        _ => GuardDecision::PassThrough,
    }
}

/// Request-level route guard
pub struct RouteGuard {
    routes: RouteTable,
    exclusions: ExclusionFilter,
    provider: Arc<dyn IdentityProvider>,
    failure_policy: ProviderFailurePolicy,
}

impl RouteGuard {
    /// Create a guard over fixed route lists and an identity provider
    pub fn new(
        routes: &RouteTableConfig,
        guard: &GuardConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            routes: RouteTable::new(routes),
            exclusions: ExclusionFilter::new(routes),
            provider,
            failure_policy: guard.on_provider_error,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn provider(&self) -> Arc<dyn IdentityProvider> {
        self.provider.clone()
    }

    /// Static assets bypass the guard and the provider entirely
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclusions.is_excluded(path)
    }

    /// Refresh the session, classify `path` and decide
    pub async fn evaluate(&self, path: &str, cookies: &[RequestCookie]) -> Result<GuardOutcome> {
        let refresh = self.refresh(cookies).await?;

        let classification = self.routes.classify(path);
        let decision = decide(
            &self.routes,
            path,
            classification,
            refresh.is_authenticated(),
        );

        metrics::record_guard_decision(decision.as_str(), classification.as_str());
        debug!(
            path = %path,
            classification = %classification,
            decision = %decision,
            authenticated = refresh.is_authenticated(),
            refreshed_cookies = refresh.cookie_mutations.len(),
            "Route guard decided"
        );

        Ok(GuardOutcome {
            classification,
            decision,
            identity: refresh.identity,
            cookie_mutations: refresh.cookie_mutations,
        })
    }

    async fn refresh(&self, cookies: &[RequestCookie]) -> Result<SessionRefresh> {
        let start = Instant::now();
        let result = self.provider.refresh_session(cookies).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(refresh) => {
                let outcome = if refresh.is_authenticated() {
                    "authenticated"
                } else {
                    "anonymous"
                };
                metrics::record_session_refresh(outcome, elapsed);
                Ok(refresh)
            }
            Err(e) => {
                metrics::record_session_refresh("error", elapsed);
                match self.failure_policy {
                    ProviderFailurePolicy::Error => {
                        warn!(error = %e, "Session refresh failed");
                        Err(e)
                    }
                    ProviderFailurePolicy::Anonymous => {
                        warn!(error = %e, "Session refresh failed, continuing as anonymous");
                        Ok(SessionRefresh::anonymous())
                    }
                }
            }
        }
    }
}
