use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::auth::{Session, SESSION_COOKIE};
use crate::AppState;

pub mod nav;
pub mod pages;
pub mod routes;

pub use routes::{Page, RouteTable};

const LOGIN_COOKIE: &str = "greetshell_login";
const LOGIN_PATH: &str = "/authentication";

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("unable to render page: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for ShellError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

/// Resolves the request path against the route table and renders the page,
/// sending unauthenticated visitors of gated routes to the provider's login.
pub async fn page(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    uri: Uri,
) -> Result<Response, ShellError> {
    let path = uri.path();
    let target = state.routes.resolve(path);
    tracing::debug!("{} resolved to {:?}", path, target);

    if target.gated && !session.is_authenticated() {
        let return_to = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(path);
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let login_state = format!("{}.{}", nonce, return_to);
        return match state.auth.login_url(&login_state) {
            Some(url) => {
                let jar = jar.add(login_cookie(nonce, state.secure_cookies));
                Ok((jar, Redirect::to(&url)).into_response())
            }
            None => {
                tracing::warn!("{} is gated but no login flow is configured", path);
                let html = pages::render_error(path, "Login is not available")?;
                Ok((StatusCode::UNAUTHORIZED, Html(html)).into_response())
            }
        };
    }

    let html = pages::render(target.page, path, session.0.as_ref())?;
    let status = match target.page {
        Page::Error => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    Ok((status, Html(html)).into_response())
}

/// Drops the session and hands over to the provider's sign-out when it has one.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let target = state.auth.logout_url().unwrap_or_else(|| "/".to_owned());
    let jar = jar.add(removal(SESSION_COOKIE, "/"));
    (jar, Redirect::to(&target)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Landing point of the authorization-code flow. The login cookie is spent
/// whatever the outcome.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<Callback>,
) -> Result<Response, ShellError> {
    let expected = jar.get(LOGIN_COOKIE).map(|c| c.value().to_owned());
    let jar = jar.add(removal(LOGIN_COOKIE, LOGIN_PATH));
    match complete_login(&state, expected.as_deref(), params).await? {
        Ok((token, return_to)) => {
            let jar = jar.add(session_cookie(token, state.secure_cookies));
            Ok((jar, Redirect::to(&return_to)).into_response())
        }
        Err(failure) => Ok((jar, failure).into_response()),
    }
}

/// The session token and return path of a completed login, or the error page
/// to show instead.
async fn complete_login(
    state: &AppState,
    expected_nonce: Option<&str>,
    params: Callback,
) -> Result<Result<(String, String), Response>, ShellError> {
    if let Some(error) = params.error {
        tracing::info!("provider reported login error {}", error);
        return failed(StatusCode::UNAUTHORIZED, "Login was not completed");
    }
    let (Some(code), Some(login_state)) = (params.code, params.state) else {
        return failed(StatusCode::BAD_REQUEST, "Missing code or state");
    };
    let Some((nonce, return_to)) = login_state.split_once('.') else {
        return failed(StatusCode::BAD_REQUEST, "Malformed state");
    };
    if expected_nonce != Some(nonce) {
        tracing::warn!("login state does not match this browser");
        return failed(StatusCode::BAD_REQUEST, "Login state mismatch");
    }

    let token = match state.auth.exchange_code(&code).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!("{}", e);
            return failed(StatusCode::BAD_GATEWAY, "Login could not be completed");
        }
    };
    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("provider issued an unusable token: {}", e);
            return failed(StatusCode::UNAUTHORIZED, "Login could not be completed");
        }
    };
    tracing::info!("{} ({}) logged in", identity.name(), identity.sub);
    Ok(Ok((token, safe_return_path(return_to).to_owned())))
}

fn failed<T>(status: StatusCode, message: &str) -> Result<Result<T, Response>, ShellError> {
    let html = pages::render_error("/authentication/callback", message)?;
    Ok(Err((status, Html(html)).into_response()))
}

/// Only same-origin paths are followed after login.
fn safe_return_path(path: &str) -> &str {
    if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') {
        path
    } else {
        "/"
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .finish()
}

fn login_cookie(nonce: String, secure: bool) -> Cookie<'static> {
    Cookie::build(LOGIN_COOKIE, nonce)
        .path(LOGIN_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::minutes(10))
        .finish()
}

/// Added to the jar rather than removed from it, so the expiry is sent even
/// when the request did not carry the cookie.
fn removal(name: &'static str, path: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "")
        .path(path)
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_path_stays_on_site() {
        assert_eq!(safe_return_path("/secure?tab=1"), "/secure?tab=1");
        assert_eq!(safe_return_path("//evil.example"), "/");
        assert_eq!(safe_return_path("https://evil.example"), "/");
        assert_eq!(safe_return_path("/\\evil"), "/");
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("t".into(), false);
        assert_eq!(cookie.value(), "t");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(session_cookie("t".into(), true).secure(), Some(true));
    }

    #[test]
    fn login_cookie_is_short_lived() {
        let cookie = login_cookie("n0nce".into(), false);
        assert_eq!(cookie.path(), Some(LOGIN_PATH));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(10)));
    }

    #[test]
    fn removal_expires_immediately() {
        let cookie = removal(LOGIN_COOKIE, LOGIN_PATH);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.path(), Some(LOGIN_PATH));
    }
}
