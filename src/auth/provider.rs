use crate::config::IdentityProviderConfig;
use crate::cookies::{self, CookieMutation, CookieOptions, RequestCookie};
use crate::error::{GateError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::session::Session;
use super::{Identity, IdentityProvider, SessionRefresh};

/// Session cookies live for 400 days; the provider decides actual token validity
pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Identity provider reached over its GoTrue-style REST API
pub struct HostedIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    cookie_name: String,
    cookie_options: CookieOptions,
}

/// Answer of the token endpoint
enum GrantOutcome {
    Issued(Session),
    Rejected(String),
}

impl HostedIdentityProvider {
    /// Create a provider client; fails when the URL or anon key is missing
    pub fn new(config: &IdentityProviderConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                GateError::Config(
                    "Missing identity provider URL (identity_provider.url or IDENTITY_PROVIDER_URL)"
                        .to_string(),
                )
            })?;

        let anon_key = config
            .anon_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                GateError::Config(
                    "Missing identity provider anon key (identity_provider.anon_key or IDENTITY_PROVIDER_ANON_KEY)"
                        .to_string(),
                )
            })?;

        let parsed = Url::parse(url)
            .map_err(|e| GateError::Config(format!("Invalid identity provider URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GateError::Config(format!(
                "Identity provider URL must use http or https: {}",
                url
            )));
        }

        let cookie_name = config
            .cookie_name
            .clone()
            .unwrap_or_else(|| default_cookie_name(&parsed));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            anon_key,
            cookie_name,
            cookie_options: CookieOptions {
                max_age: Some(SESSION_COOKIE_MAX_AGE_SECS),
                secure: config.secure_cookies,
                ..CookieOptions::default()
            },
        })
    }

    /// Name of the cookie holding the encoded session
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Name of the cookie holding the PKCE code verifier
    pub fn code_verifier_cookie_name(&self) -> String {
        format!("{}-code-verifier", self.cookie_name)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn session_cookie(&self, session: &Session) -> CookieMutation {
        // The user record is fetched per request, keep it out of the cookie
        let stored = Session {
            user: None,
            ..session.clone()
        };
        CookieMutation::set(&self.cookie_name, stored.encode(), self.cookie_options.clone())
    }

    fn session_removal(&self) -> CookieMutation {
        CookieMutation::remove(&self.cookie_name, self.cookie_options.clone())
    }

    /// Resolve the user for an access token; `None` when the token is rejected
    async fn fetch_user(&self, access_token: &str) -> Result<Option<Identity>> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(GateError::from_provider)?;

        match response.status() {
            status if status.is_success() => {
                let identity = response.json::<Identity>().await.map_err(|e| {
                    GateError::IdentityProvider(format!("Malformed user response: {}", e))
                })?;
                Ok(Some(identity))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!(status = %response.status(), "Access token rejected");
                Ok(None)
            }
            status => Err(GateError::IdentityProvider(format!(
                "Unexpected status {} from user endpoint",
                status
            ))),
        }
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<GrantOutcome> {
        let response = self
            .client
            .post(self.endpoint(&format!("token?grant_type={}", grant_type)))
            .header("apikey", self.anon_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(GateError::from_provider)?;

        let status = response.status();
        if status.is_success() {
            let session = response.json::<Session>().await.map_err(|e| {
                GateError::IdentityProvider(format!("Malformed token response: {}", e))
            })?;
            return Ok(GrantOutcome::Issued(
                session.with_expiry_from(chrono::Utc::now().timestamp()),
            ));
        }

        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            let body = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);
            return Ok(GrantOutcome::Rejected(error_message(&body, status)));
        }

        Err(GateError::IdentityProvider(format!(
            "Unexpected status {} from token endpoint",
            status
        )))
    }

    async fn identity_for(&self, session: &Session) -> Result<Option<Identity>> {
        match &session.user {
            Some(user) => Ok(Some(user.clone())),
            None => self.fetch_user(&session.access_token).await,
        }
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn refresh_session(&self, cookies: &[RequestCookie]) -> Result<SessionRefresh> {
        let Some(raw) = cookies::find(cookies, &self.cookie_name) else {
            return Ok(SessionRefresh::anonymous());
        };

        let Some(session) = Session::decode(raw) else {
            warn!(cookie = %self.cookie_name, "Discarding undecodable session cookie");
            return Ok(SessionRefresh {
                identity: None,
                cookie_mutations: vec![self.session_removal()],
            });
        };

        let now = chrono::Utc::now().timestamp();
        if !session.needs_refresh(now) {
            let identity = self.fetch_user(&session.access_token).await?;
            return Ok(SessionRefresh {
                identity,
                cookie_mutations: vec![],
            });
        }

        debug!("Access token expired, renewing session");
        let grant = self
            .grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await?;

        match grant {
            GrantOutcome::Issued(renewed) => {
                let identity = self.identity_for(&renewed).await?;
                Ok(SessionRefresh {
                    identity,
                    cookie_mutations: vec![self.session_cookie(&renewed)],
                })
            }
            GrantOutcome::Rejected(reason) => {
                debug!(reason = %reason, "Refresh token rejected, clearing session");
                Ok(SessionRefresh {
                    identity: None,
                    cookie_mutations: vec![self.session_removal()],
                })
            }
        }
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        cookies: &[RequestCookie],
    ) -> Result<SessionRefresh> {
        let verifier_cookie = self.code_verifier_cookie_name();
        let verifier = cookies::find(cookies, &verifier_cookie).map(unquote);

        let grant = self
            .grant(
                "pkce",
                json!({
                    "auth_code": code,
                    "code_verifier": verifier.clone().unwrap_or_default(),
                }),
            )
            .await?;

        match grant {
            GrantOutcome::Issued(session) => {
                let identity = self.identity_for(&session).await?;
                let mut cookie_mutations = vec![self.session_cookie(&session)];
                if verifier.is_some() {
                    cookie_mutations.push(CookieMutation::remove(
                        verifier_cookie,
                        self.cookie_options.clone(),
                    ));
                }
                Ok(SessionRefresh {
                    identity,
                    cookie_mutations,
                })
            }
            GrantOutcome::Rejected(reason) => Err(GateError::CodeExchange(reason)),
        }
    }
}

/// `sb-<first host label>-auth-token`, the browser client's naming scheme
fn default_cookie_name(url: &Url) -> String {
    let label = url
        .host_str()
        .and_then(|host| host.split('.').next())
        .unwrap_or("local");
    format!("sb-{}-auth-token", label)
}

/// Verifier cookies may hold a JSON string literal
fn unquote(value: &str) -> String {
    serde_json::from_str::<String>(value).unwrap_or_else(|_| value.to_string())
}

fn error_message(body: &serde_json::Value, status: StatusCode) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("identity provider returned {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>, key: Option<&str>) -> IdentityProviderConfig {
        IdentityProviderConfig {
            url: url.map(|u| u.to_string()),
            anon_key: key.map(|k| SecretString::new(k.to_string())),
            cookie_name: None,
            timeout_secs: 5,
            secure_cookies: false,
        }
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let result = HostedIdentityProvider::new(&config(None, Some("anon")));
        assert!(matches!(result, Err(GateError::Config(_))));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = HostedIdentityProvider::new(&config(Some("https://abcd.supabase.co"), None));
        assert!(matches!(result, Err(GateError::Config(_))));

        let blank = HostedIdentityProvider::new(&config(Some("https://abcd.supabase.co"), Some(" ")));
        assert!(matches!(blank, Err(GateError::Config(_))));
    }

    #[test]
    fn test_non_http_url_is_config_error() {
        let result = HostedIdentityProvider::new(&config(Some("ftp://abcd"), Some("anon")));
        assert!(matches!(result, Err(GateError::Config(_))));
    }

    #[test]
    fn test_default_cookie_name() {
        let provider =
            HostedIdentityProvider::new(&config(Some("https://abcd.supabase.co/"), Some("anon")))
                .unwrap();
        assert_eq!(provider.cookie_name(), "sb-abcd-auth-token");
        assert_eq!(
            provider.code_verifier_cookie_name(),
            "sb-abcd-auth-token-code-verifier"
        );
        assert_eq!(provider.endpoint("user"), "https://abcd.supabase.co/auth/v1/user");
    }

    #[test]
    fn test_configured_cookie_name() {
        let mut cfg = config(Some("https://abcd.supabase.co"), Some("anon"));
        cfg.cookie_name = Some("session".to_string());
        let provider = HostedIdentityProvider::new(&cfg).unwrap();
        assert_eq!(provider.cookie_name(), "session");
    }

    #[test]
    fn test_session_cookie_omits_user() {
        let provider =
            HostedIdentityProvider::new(&config(Some("https://abcd.supabase.co"), Some("anon")))
                .unwrap();
        let session = Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(3600),
            expires_at: Some(10),
            user: Some(Identity::new("user-1")),
        };

        let mutation = provider.session_cookie(&session);
        let stored = Session::decode(&mutation.value).unwrap();
        assert!(stored.user.is_none());
        assert_eq!(stored.access_token, "a");
        assert_eq!(mutation.options.max_age, Some(SESSION_COOKIE_MAX_AGE_SECS));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"verifier\""), "verifier");
        assert_eq!(unquote("verifier"), "verifier");
    }

    #[test]
    fn test_error_message_precedence() {
        let body = json!({"error": "invalid_grant", "error_description": "Code expired"});
        assert_eq!(error_message(&body, StatusCode::BAD_REQUEST), "Code expired");

        let body = json!({"msg": "Invalid code"});
        assert_eq!(error_message(&body, StatusCode::BAD_REQUEST), "Invalid code");

        assert_eq!(
            error_message(&serde_json::Value::Null, StatusCode::BAD_REQUEST),
            "identity provider returned 400 Bad Request"
        );
    }
}
