use super::RouteGuard;
use crate::auth::middleware::SessionExtension;
use crate::cookies::{self, CookieMutation};
use crate::error::{GateError, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Axum middleware running the route guard in front of every handler
pub async fn route_guard_middleware(
    State(guard): State<Arc<RouteGuard>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let path = req.uri().path().to_string();

    if guard.is_excluded(&path) {
        debug!(path = %path, "Excluded path, skipping route guard");
        return Ok(next.run(req).await);
    }

    let mut request_cookies = cookies::from_headers(req.headers());
    let outcome = guard.evaluate(&path, &request_cookies).await?;

    // Handlers later in this request must see the refreshed session
    if !outcome.cookie_mutations.is_empty() {
        cookies::apply_to_cookies(&mut request_cookies, &outcome.cookie_mutations);
        cookies::write_request_header(req.headers_mut(), &request_cookies)?;
    }

    if let Some(target) = outcome.redirect_target(guard.routes()) {
        info!(
            path = %path,
            target = %target,
            decision = %outcome.decision,
            "Redirecting request"
        );
        let location = with_query(target, req.uri().query());
        return redirect_with_cookies(&location, &outcome.cookie_mutations);
    }

    req.extensions_mut().insert(SessionExtension {
        identity: outcome.identity,
    });

    let mut response = next.run(req).await;

    // Cookies the handler set itself take precedence over refresh mutations
    let already_set = cookies::set_cookie_names(response.headers());
    let pending: Vec<CookieMutation> = outcome
        .cookie_mutations
        .into_iter()
        .filter(|m| !already_set.contains(&m.name))
        .collect();
    cookies::append_set_cookies(response.headers_mut(), &pending)?;
    Ok(response)
}

/// Build a `307` redirect carrying every cookie mutation as `Set-Cookie`
pub fn redirect_with_cookies(location: &str, mutations: &[CookieMutation]) -> Result<Response> {
    let mut response = Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .map_err(|e| GateError::Internal(format!("Failed to build redirect: {}", e)))?;

    cookies::append_set_cookies(response.headers_mut(), mutations)?;
    Ok(response)
}

/// Keep the original query string on the redirect target
fn with_query(target: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", target, q),
        _ => target.to_string(),
    }
}
