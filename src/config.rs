use std::net::{IpAddr, SocketAddr};

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::openid::OidcConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} requires --oidc-discovery")]
    MissingDiscovery(&'static str),
    #[error("--oidc-redirect-uri requires --oidc-client-id")]
    RedirectWithoutClient,
}

/// Verbosity of the messages the OIDC provider emits about discovery, key
/// refreshes and rejected tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum ProviderLogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "greetshell", version, about = "Greeting API and OIDC-gated web shell")]
pub struct Config {
    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Host interface to bind to
    #[arg(long, env = "GREETSHELL_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, env = "GREETSHELL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the SQLite database, or :memory:
    #[arg(long, env = "GREETSHELL_DB", default_value = "greetshell.sqlite")]
    pub db: String,

    /// Discovery URI of the OIDC provider
    #[arg(long, env = "OIDC_DISCOVERY")]
    pub oidc_discovery: Option<String>,

    #[arg(long, env = "OIDC_CLIENT_ID")]
    pub oidc_client_id: Option<String>,

    #[arg(long, env = "OIDC_CLIENT_SECRET", hide_env_values = true)]
    pub oidc_client_secret: Option<String>,

    /// Where the provider sends the browser back after login
    #[arg(long, env = "OIDC_REDIRECT_URI")]
    pub oidc_redirect_uri: Option<String>,

    /// Expected `aud` claim; not checked when absent
    #[arg(long, env = "OIDC_AUDIENCE")]
    pub oidc_audience: Option<String>,

    #[arg(long, env = "OIDC_SCOPE", default_value = "openid profile")]
    pub oidc_scope: String,

    #[arg(long, env = "OIDC_POST_LOGOUT_URI")]
    pub oidc_post_logout_uri: Option<String>,

    /// Seconds between JWKS refreshes, 0 disables
    #[arg(long, env = "JWKS_REFRESH_SECS", default_value_t = 0)]
    pub jwks_refresh_secs: u64,

    #[arg(long, env = "OIDC_LOG_LEVEL", value_enum, default_value_t = ProviderLogLevel::Debug)]
    pub oidc_log_level: ProviderLogLevel,

    /// Send session and login cookies with the Secure attribute
    #[arg(long, env = "GREETSHELL_SECURE_COOKIES")]
    pub secure_cookies: bool,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn default_filter(&self) -> &'static str {
        if self.debug {
            "greetshell=debug,tower_http=debug"
        } else {
            "greetshell=info,tower_http=info"
        }
    }

    /// The provider configuration, or `None` when running without authentication.
    pub fn oidc(&self) -> Result<Option<OidcConfig>, ConfigError> {
        let Some(discovery_url) = self.oidc_discovery.clone() else {
            let provider_only = [
                ("--oidc-client-id", self.oidc_client_id.is_some()),
                ("--oidc-client-secret", self.oidc_client_secret.is_some()),
                ("--oidc-redirect-uri", self.oidc_redirect_uri.is_some()),
                ("--oidc-audience", self.oidc_audience.is_some()),
                ("--oidc-post-logout-uri", self.oidc_post_logout_uri.is_some()),
            ];
            return match provider_only.into_iter().find(|(_, given)| *given) {
                Some((flag, _)) => Err(ConfigError::MissingDiscovery(flag)),
                None => Ok(None),
            };
        };
        if self.oidc_redirect_uri.is_some() && self.oidc_client_id.is_none() {
            return Err(ConfigError::RedirectWithoutClient);
        }
        Ok(Some(OidcConfig {
            discovery_url,
            client_id: self.oidc_client_id.clone(),
            client_secret: self.oidc_client_secret.clone(),
            redirect_uri: self.oidc_redirect_uri.clone(),
            scope: self.oidc_scope.clone(),
            audience: self.oidc_audience.clone(),
            post_logout_redirect_uri: self.oidc_post_logout_uri.clone(),
            refresh_secs: self.jwks_refresh_secs,
        }))
    }
}
