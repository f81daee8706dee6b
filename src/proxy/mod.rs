use crate::config::UpstreamConfig;
use crate::error::{GateError, Result};
use crate::metrics;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, Response},
    response::IntoResponse,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upstream proxy state
#[derive(Clone)]
pub struct ProxyState {
    pub upstream: Arc<str>,
    pub client: reqwest::Client,
}

impl ProxyState {
    /// Create proxy state for the configured page renderer
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            upstream: Arc::from(config.url.trim_end_matches('/')),
            client,
        })
    }
}

/// Fallback handler forwarding guarded requests to the page renderer
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    req: Request<Body>,
) -> Result<impl IntoResponse> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let mut upstream_url = format!("{}{}", state.upstream, path);
    if let Some(query) = req.uri().query() {
        upstream_url.push('?');
        upstream_url.push_str(query);
    }

    let timer = metrics::Timer::new(method.to_string(), path.clone());
    debug!(upstream_url = %upstream_url, "Forwarding to upstream");

    let headers = req.headers().clone();
    let body_bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| GateError::Upstream(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    let response = send_request(
        &state.client,
        method.clone(),
        headers,
        body_bytes,
        &upstream_url,
    )
    .await;

    match &response {
        Ok(resp) => {
            info!(
                method = %method,
                path = %path,
                status = %resp.status(),
                latency_ms = timer.elapsed() * 1000.0,
                "Request completed"
            );
            timer.record(resp.status().as_u16());
        }
        Err(e) => {
            warn!(
                method = %method,
                path = %path,
                error = %e,
                latency_ms = timer.elapsed() * 1000.0,
                "Request failed"
            );
            timer.record(e.status_code().as_u16());
        }
    }

    response
}

/// Send request to the upstream renderer
async fn send_request(
    client: &reqwest::Client,
    method: Method,
    headers: HeaderMap,
    body_bytes: Bytes,
    upstream_url: &str,
) -> Result<Response<Body>> {
    let mut upstream_req = client.request(method, upstream_url).body(body_bytes);

    // Forward headers (excluding hop-by-hop headers); reqwest sets Host itself
    for (name, value) in headers.iter() {
        let name_str = name.as_str();
        if !is_hop_by_hop_header(name_str) && name_str != "host" {
            upstream_req = upstream_req.header(name, value);
        }
    }

    let upstream_response = upstream_req.send().await.map_err(|e| {
        if e.is_timeout() {
            GateError::Timeout(format!("Upstream request timed out: {}", e))
        } else if e.is_connect() {
            GateError::Upstream(format!("Failed to connect to upstream: {}", e))
        } else {
            GateError::Upstream(format!("Upstream request failed: {}", e))
        }
    })?;

    let status = upstream_response.status();
    let mut response_builder = Response::builder().status(status);

    for (name, value) in upstream_response.headers().iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            response_builder = response_builder.header(name, value);
        }
    }

    let body_bytes = upstream_response
        .bytes()
        .await
        .map_err(|e| GateError::Upstream(format!("Failed to read upstream response: {}", e)))?;

    response_builder
        .body(Body::from(body_bytes))
        .map_err(|e| GateError::Internal(format!("Failed to build response: {}", e)))
}

/// Check if a header is a hop-by-hop header that should not be forwarded
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
