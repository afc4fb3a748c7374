use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::openid::OpenIdError;

pub const SESSION_COOKIE: &str = "greetshell_session";

/// The capability the rest of the application consumes from the identity
/// provider. Token issuance and renewal stay with the provider.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;

    /// Where to send a browser that has to log in first.
    fn login_url(&self, _state: &str) -> Option<String> {
        None
    }

    fn logout_url(&self) -> Option<String> {
        None
    }

    /// Trades an authorization code for an access token.
    async fn exchange_code(&self, _code: &str) -> Result<String, OpenIdError> {
        Err(OpenIdError::LoginNotConfigured)
    }
}

pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Used when no provider is configured. Nobody is ever authenticated.
pub struct Unauthenticated;

#[async_trait]
impl Authenticator for Unauthenticated {
    async fn authenticate(&self, _token: &str) -> Result<Identity, AuthError> {
        Err(AuthError::InvalidToken)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Identity {
    pub fn name(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or(&self.sub)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }

    pub fn require_scope(&self, scope: &str) -> Result<(), AuthError> {
        if self.scopes().any(|s| s == scope) {
            Ok(())
        } else {
            tracing::debug!("{} lacks scope {}", self.sub, scope);
            Err(AuthError::InsufficientScope)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    SharedAuthenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthError::InvalidToken)?;
        SharedAuthenticator::from_ref(state)
            .authenticate(bearer.token())
            .await
    }
}

/// The authentication context of a browser request: a bearer header or the
/// session cookie, when either carries a valid token.
#[derive(Debug, Clone, Default)]
pub struct Session(pub Option<Identity>);

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    SharedAuthenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await {
            Ok(TypedHeader(Authorization(bearer))) => Some(bearer.token().to_owned()),
            Err(_) => CookieJar::from_headers(&parts.headers)
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_owned()),
        };
        let Some(token) = token else {
            return Ok(Session(None));
        };
        let identity = SharedAuthenticator::from_ref(state)
            .authenticate(&token)
            .await
            .ok();
        Ok(Session(identity))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::InsufficientScope => (StatusCode::FORBIDDEN, "Insufficient scope"),
            AuthError::InternalServer => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        tracing::debug!("{}, {}", status, error_message);

        let body = Json(json!({
            "error": error_message,
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("insufficient scope")]
    InsufficientScope,
    #[error("internal server error")]
    InternalServer,
}
