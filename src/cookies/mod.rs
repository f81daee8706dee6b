//! Request cookie view and cookie mutations.
//!
//! A session refresh produces a list of [`CookieMutation`]s. The route guard applies the
//! same list twice: to the request `Cookie` header so handlers later in the same request
//! observe the refreshed session, and to the response as `Set-Cookie` headers so the client
//! persists it.

use crate::error::{GateError, Result};
use axum::http::{header, HeaderMap, HeaderValue};
use cookie::Cookie;
use tracing::debug;

pub use cookie::SameSite;

/// A single `name=value` pair sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCookie {
    pub name: String,
    pub value: String,
}

impl RequestCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Attributes attached to a `Set-Cookie` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    /// Lifetime in seconds; `Some(0)` expires the cookie immediately
    pub max_age: Option<i64>,
    pub same_site: Option<SameSite>,
    pub http_only: bool,
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            max_age: None,
            same_site: Some(SameSite::Lax),
            http_only: false,
            secure: false,
        }
    }
}

/// A set or remove instruction for one cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieMutation {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

impl CookieMutation {
    /// Set `name` to `value`
    pub fn set(name: impl Into<String>, value: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// Expire `name` on the client
    pub fn remove(name: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            options: CookieOptions {
                max_age: Some(0),
                ..options
            },
        }
    }

    pub fn is_removal(&self) -> bool {
        self.options.max_age == Some(0)
    }

    /// Render as a `Set-Cookie` header value
    pub fn to_set_cookie(&self) -> String {
        let mut cookie = Cookie::new(self.name.clone(), self.value.clone());
        if let Some(path) = &self.options.path {
            cookie.set_path(path.clone());
        }
        if let Some(max_age) = self.options.max_age {
            cookie.set_max_age(cookie::time::Duration::seconds(max_age));
        }
        if let Some(same_site) = self.options.same_site {
            cookie.set_same_site(same_site);
        }
        if self.options.http_only {
            cookie.set_http_only(true);
        }
        if self.options.secure {
            cookie.set_secure(true);
        }
        cookie.to_string()
    }
}

/// Parse every `Cookie` header into an ordered list, skipping malformed pairs
pub fn from_headers(headers: &HeaderMap) -> Vec<RequestCookie> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| {
            Cookie::split_parse(value)
                .filter_map(|parsed| parsed.ok())
                .map(|c| RequestCookie::new(c.name(), c.value()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Look up a cookie value by name
pub fn find<'a>(cookies: &'a [RequestCookie], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.value.as_str())
}

/// Apply mutations to the request's cookie view in order
pub fn apply_to_cookies(cookies: &mut Vec<RequestCookie>, mutations: &[CookieMutation]) {
    for mutation in mutations {
        if mutation.is_removal() {
            cookies.retain(|c| c.name != mutation.name);
        } else if let Some(existing) = cookies.iter_mut().find(|c| c.name == mutation.name) {
            existing.value = mutation.value.clone();
        } else {
            cookies.push(RequestCookie::new(&mutation.name, &mutation.value));
        }
    }
}

/// Rewrite the request `Cookie` header so downstream handlers see `cookies`
pub fn write_request_header(headers: &mut HeaderMap, cookies: &[RequestCookie]) -> Result<()> {
    headers.remove(header::COOKIE);
    if cookies.is_empty() {
        return Ok(());
    }

    let joined = cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    let value = HeaderValue::from_str(&joined)
        .map_err(|e| GateError::Http(format!("Invalid cookie header: {}", e)))?;
    headers.insert(header::COOKIE, value);
    Ok(())
}

/// Names of the cookies a response already sets
pub fn set_cookie_names(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .map(|c| c.name().to_string())
        .collect()
}

/// Append one `Set-Cookie` header per mutation
pub fn append_set_cookies(headers: &mut HeaderMap, mutations: &[CookieMutation]) -> Result<()> {
    for mutation in mutations {
        let value = HeaderValue::from_str(&mutation.to_set_cookie()).map_err(|e| {
            GateError::Internal(format!("Invalid Set-Cookie for {}: {}", mutation.name, e))
        })?;
        headers.append(header::SET_COOKIE, value);
    }

    if !mutations.is_empty() {
        debug!(count = mutations.len(), "Attached refreshed session cookies");
    }
    Ok(())
}
