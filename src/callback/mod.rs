use crate::cookies;
use crate::error::{GateError, Result};
use crate::guard::{redirect_with_cookies, RouteGuard};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Error code used when the provider redirects back without a code
pub const MISSING_CODE_ERROR: &str = "missing_oauth_code";

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
}

/// `GET /auth/callback`: exchange the OAuth/PKCE code for a session
pub async fn auth_callback_handler(
    State(guard): State<Arc<RouteGuard>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let routes = guard.routes();

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("Auth callback without code");
        return redirect_with_cookies(&login_error(routes.login_path(), MISSING_CODE_ERROR), &[]);
    };

    let request_cookies = cookies::from_headers(&headers);
    match guard
        .provider()
        .exchange_code_for_session(&code, &request_cookies)
        .await
    {
        Ok(refresh) => {
            info!(
                user_id = refresh.identity.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
                "Auth code exchanged for session"
            );
            redirect_with_cookies(routes.dashboard_path(), &refresh.cookie_mutations)
        }
        Err(e) => {
            let message = match e {
                GateError::CodeExchange(message) => message,
                other => other.to_string(),
            };
            warn!(error = %message, "Auth code exchange failed");
            redirect_with_cookies(&login_error(routes.login_path(), &message), &[])
        }
    }
}

fn login_error(login_path: &str, message: &str) -> String {
    format!("{}?error={}", login_path, urlencoding::encode(message))
}
