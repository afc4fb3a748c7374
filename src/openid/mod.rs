use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use axum::async_trait;
use jsonwebtoken::{decode, decode_header, Validation};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{AuthError, Authenticator, Identity};
use crate::config::ProviderLogLevel;

mod jwks;

pub use jwks::Keys;

/// Everything the provider needs to know about the identity platform.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub discovery_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: String,
    pub audience: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub refresh_secs: u64,
}

/// The subset of the discovery document we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct Discovery {
    pub issuer: String,
    pub jwks_uri: String,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub end_session_endpoint: Option<String>,
}

#[derive(Debug, Error)]
pub enum OpenIdError {
    #[error("unable to reach discovery endpoint {0}")]
    InvalidWellKnownUri(String),
    #[error("no openid configuration at {0}")]
    MissingOpenIdConfiguration(String),
    #[error("unable to reach jwks endpoint {0}")]
    InvalidJwksUri(String),
    #[error("no key set at {0}")]
    MissingJwksSet(String),
    #[error("provider does not advertise a token endpoint")]
    NoTokenEndpoint,
    #[error("login flow is not configured")]
    LoginNotConfigured,
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("key cache poisoned")]
    InternalServerError,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Resource-server side of an OIDC provider: verifies RS256 tokens against the
/// provider's published keys and knows the URLs of its login and logout flows.
pub struct OidcProvider {
    config: OidcConfig,
    discovery: Discovery,
    keys: RwLock<Keys>,
    log_level: ProviderLogLevel,
    client: reqwest::Client,
}

impl OidcProvider {
    /// Fetches the discovery document and the key set. When a refresh
    /// interval is configured, keys are re-fetched in the background for as
    /// long as the provider is alive.
    pub async fn init(
        config: OidcConfig,
        log_level: ProviderLogLevel,
    ) -> Result<Arc<Self>, OpenIdError> {
        let client = reqwest::Client::new();
        let discovery = discover(&client, &config.discovery_url).await?;
        let keys = jwks::decoding_keys(&client, &discovery.jwks_uri).await?;
        let provider = Arc::new(Self {
            config,
            discovery,
            keys: RwLock::new(keys),
            log_level,
            client,
        });
        provider.log(
            ProviderLogLevel::Info,
            format_args!(
                "discovered issuer {} with {} signing keys",
                provider.discovery.issuer,
                provider.key_count()
            ),
        );

        if provider.config.refresh_secs > 0 {
            spawn_refresh(
                Arc::downgrade(&provider),
                Duration::from_secs(provider.config.refresh_secs),
            );
        }
        Ok(provider)
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn key_count(&self) -> usize {
        self.keys.read().map(|k| k.len()).unwrap_or(0)
    }

    pub async fn update_jwks(&self) -> Result<(), OpenIdError> {
        let new_keys = jwks::decoding_keys(&self.client, &self.discovery.jwks_uri).await?;
        let mut keys = self
            .keys
            .write()
            .map_err(|_| OpenIdError::InternalServerError)?;
        *keys = new_keys;
        Ok(())
    }

    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let kid = decode_header(token)
            .map_err(|_| AuthError::InvalidToken)?
            .kid
            .ok_or(AuthError::InvalidToken)?;
        let keys = self.keys.read().map_err(|_| AuthError::InternalServer)?;
        let key = keys.get(&kid).ok_or_else(|| {
            self.log(ProviderLogLevel::Debug, format_args!("unknown key id {}", kid));
            AuthError::InvalidToken
        })?;

        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.set_issuer(&[&self.discovery.issuer]);
        if let Some(ref aud) = self.config.audience {
            validation.set_audience(&[aud]);
            validation.set_required_spec_claims(&["exp", "aud"]);
        }

        let token_data = decode::<Identity>(token, key, &validation).map_err(|e| {
            self.log(ProviderLogLevel::Debug, format_args!("token rejected: {:?}", e));
            AuthError::InvalidToken
        })?;
        Ok(token_data.claims)
    }

    fn log(&self, level: ProviderLogLevel, message: fmt::Arguments<'_>) {
        if level < self.log_level || level == ProviderLogLevel::Off {
            return;
        }
        match level {
            ProviderLogLevel::Debug => tracing::debug!(target: "greetshell::oidc", "{}", message),
            ProviderLogLevel::Info => tracing::info!(target: "greetshell::oidc", "{}", message),
            ProviderLogLevel::Warn => tracing::warn!(target: "greetshell::oidc", "{}", message),
            ProviderLogLevel::Error => tracing::error!(target: "greetshell::oidc", "{}", message),
            ProviderLogLevel::Off => {}
        }
    }
}

#[async_trait]
impl Authenticator for OidcProvider {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify(token)
    }

    fn login_url(&self, state: &str) -> Option<String> {
        let endpoint = self.discovery.authorization_endpoint.as_deref()?;
        let client_id = self.config.client_id.as_deref()?;
        let redirect_uri = self.config.redirect_uri.as_deref()?;
        Url::parse_with_params(
            endpoint,
            &[
                ("response_type", "code"),
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("scope", self.config.scope.as_str()),
                ("state", state),
            ],
        )
        .map(String::from)
        .ok()
    }

    fn logout_url(&self) -> Option<String> {
        let endpoint = self.discovery.end_session_endpoint.as_deref()?;
        let mut url = Url::parse(endpoint).ok()?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(ref client_id) = self.config.client_id {
                query.append_pair("client_id", client_id);
            }
            if let Some(ref uri) = self.config.post_logout_redirect_uri {
                query.append_pair("post_logout_redirect_uri", uri);
            }
        }
        Some(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OpenIdError> {
        let endpoint = self
            .discovery
            .token_endpoint
            .as_deref()
            .ok_or(OpenIdError::NoTokenEndpoint)?;
        let (Some(client_id), Some(redirect_uri)) =
            (self.config.client_id.as_deref(), self.config.redirect_uri.as_deref())
        else {
            return Err(OpenIdError::LoginNotConfigured);
        };

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
        ];
        if let Some(ref secret) = self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let res = self
            .client
            .post(endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| OpenIdError::TokenExchange(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            self.log(
                ProviderLogLevel::Warn,
                format_args!("token endpoint answered {}", status),
            );
            return Err(OpenIdError::TokenExchange(status.to_string()));
        }
        let token = res
            .json::<TokenResponse>()
            .await
            .map_err(|e| OpenIdError::TokenExchange(e.to_string()))?;
        Ok(token.access_token)
    }
}

async fn discover(client: &reqwest::Client, uri: &str) -> Result<Discovery, OpenIdError> {
    client
        .get(uri)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|_| OpenIdError::InvalidWellKnownUri(uri.to_owned()))?
        .json::<Discovery>()
        .await
        .map_err(|_| OpenIdError::MissingOpenIdConfiguration(uri.to_owned()))
}

fn spawn_refresh(provider: Weak<OidcProvider>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let Some(provider) = provider.upgrade() else {
                break;
            };
            match provider.update_jwks().await {
                Ok(_) => provider.log(ProviderLogLevel::Debug, format_args!("jwks updated")),
                Err(e) => provider.log(
                    ProviderLogLevel::Error,
                    format_args!("jwks not updated: {}", e),
                ),
            };
        }
    });
}
