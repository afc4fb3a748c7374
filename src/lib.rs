use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod config;
pub mod openid;
pub mod shell;
pub mod store;
pub mod viewer;

use auth::{SharedAuthenticator, Unauthenticated};
use config::{Config, ConfigError};
use openid::{OidcProvider, OpenIdError};
use shell::{routes::RouteTableError, RouteTable};
use store::{Store, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub auth: SharedAuthenticator,
    pub store: Arc<Store>,
    pub routes: Arc<RouteTable>,
    /// Mark session and login cookies `Secure`.
    pub secure_cookies: bool,
}

impl FromRef<AppState> for SharedAuthenticator {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("OpenID provider: {0}")]
    OpenId(#[from] OpenIdError),
    #[error("database: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Routes(#[from] RouteTableError),
}

pub async fn app(config: &Config) -> Result<Router, StartupError> {
    let auth: SharedAuthenticator = match config.oidc()? {
        Some(oidc) => OidcProvider::init(oidc, config.oidc_log_level).await?,
        None => {
            tracing::warn!("Running without any authentication/authorisation");
            Arc::new(Unauthenticated)
        }
    };

    let state = AppState {
        auth,
        store: Arc::new(Store::open(&config.db)?),
        routes: Arc::new(RouteTable::standard()?),
        secure_cookies: config.secure_cookies,
    };
    Ok(router(state))
}

/// JSON endpoints first; every other path goes through the shell's route table.
pub fn router(state: AppState) -> Router {
    api::router()
        .route("/logout", get(shell::logout))
        .route("/authentication/callback", get(shell::callback))
        .fallback(shell::page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
