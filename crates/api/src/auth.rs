//! Request authentication.
//!
//! An [`Authenticator`] turns request headers into an [`AuthUser`]. The
//! [`require_user`] middleware runs it in front of every protected route and
//! stores the result in the request extensions, where handlers pick it up
//! through the [`AuthUser`] extractor.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use store::UserId;

use crate::error::ApiError;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Resolves the caller of a request.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, ApiError>;
}

/// Trusts identity headers set by an authenticating reverse proxy.
///
/// Only deploy behind a proxy that strips these headers from client traffic.
#[derive(Debug, Clone, Default)]
pub struct TrustedHeaderAuthenticator;

impl TrustedHeaderAuthenticator {
    pub const USER_ID: &'static str = "x-user-id";
    pub const USER_NAME: &'static str = "x-user-name";
    pub const USER_EMAIL: &'static str = "x-user-email";
    pub const USER_PHONE: &'static str = "x-user-phone";
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl Authenticator for TrustedHeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
        let raw = header(headers, Self::USER_ID)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;
        let id: UserId = raw
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid user identity".to_string()))?;

        Ok(AuthUser {
            id,
            name: header(headers, Self::USER_NAME),
            email: header(headers, Self::USER_EMAIL),
            phone: header(headers, Self::USER_PHONE),
        })
    }
}

/// Middleware rejecting requests without an authenticated user.
pub async fn require_user(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticator.authenticate(request.headers()).inspect_err(|_| {
        metrics::counter!("auth_rejections_total").increment(1);
    })?;
    tracing::debug!(user_id = %user.id, "request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}
