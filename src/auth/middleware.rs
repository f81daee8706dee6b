use crate::auth::Identity;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Request extension carrying the identity resolved by the route guard
#[derive(Clone, Debug, Default)]
pub struct SessionExtension {
    pub identity: Option<Identity>,
}

impl SessionExtension {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Handlers behind the guard can take `SessionExtension` as an extractor.
/// Requests that skipped the guard yield an anonymous session.
#[async_trait]
impl<S> FromRequestParts<S> for SessionExtension
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SessionExtension>()
            .cloned()
            .unwrap_or_default())
    }
}
