pub mod middleware;
pub mod provider;
pub mod session;

use crate::cookies::{CookieMutation, RequestCookie};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use provider::HostedIdentityProvider;

/// The signed-in user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// User identifier
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            role: None,
            app_metadata: serde_json::Value::Null,
            user_metadata: serde_json::Value::Null,
        }
    }
}

/// Result of a session refresh or code exchange
///
/// The caller applies `cookie_mutations` to both the request and the response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRefresh {
    pub identity: Option<Identity>,
    pub cookie_mutations: Vec<CookieMutation>,
}

impl SessionRefresh {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Identity provider collaborator
///
/// An `Ok` with no identity means "no valid session". `Err` is reserved for failures to
/// reach the provider or to understand its answer.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate or renew the session carried by `cookies` and resolve the current user
    async fn refresh_session(&self, cookies: &[RequestCookie]) -> Result<SessionRefresh>;

    /// Exchange an OAuth/PKCE authorization code for a new session
    async fn exchange_code_for_session(
        &self,
        code: &str,
        cookies: &[RequestCookie],
    ) -> Result<SessionRefresh>;
}
