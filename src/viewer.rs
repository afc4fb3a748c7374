//! A view that shows one greeting fetched from the server.
//!
//! Mounting starts exactly one fetch; the state flips from the placeholder to
//! the fetched message once and never again. Dropping the viewer unmounts it
//! and abandons a request that is still in flight.

use axum::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const GREETING_PATH: &str = "/api/greeting/v1/";
const PLACEHOLDER: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("greeting request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    BaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingState {
    pub message: String,
}

impl Default for GreetingState {
    fn default() -> Self {
        GreetingState {
            message: PLACEHOLDER.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GreetingBody {
    message: String,
}

#[async_trait]
pub trait GreetingSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<String, ViewerError>;
}

/// Fetches the greeting over HTTP. Non-2xx answers count as failures.
pub struct HttpGreetingSource {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpGreetingSource {
    pub fn new(base_url: &str) -> Result<Self, ViewerError> {
        let url = reqwest::Url::parse(base_url)
            .and_then(|base| base.join(GREETING_PATH))
            .map_err(|e| ViewerError::BaseUrl(format!("{}: {}", base_url, e)))?;
        Ok(HttpGreetingSource {
            client: reqwest::Client::new(),
            url,
        })
    }
}

#[async_trait]
impl GreetingSource for HttpGreetingSource {
    async fn fetch(&self) -> Result<String, ViewerError> {
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<GreetingBody>()
            .await?;
        Ok(body.message)
    }
}

pub struct GreetingViewer {
    state: watch::Receiver<GreetingState>,
    fetch: Option<JoinHandle<()>>,
}

impl GreetingViewer {
    /// Mounts the viewer and issues its single fetch. Must be called inside a
    /// Tokio runtime.
    pub fn mount<S: GreetingSource>(source: S) -> Self {
        let (tx, rx) = watch::channel(GreetingState::default());
        let fetch = tokio::spawn(async move {
            match source.fetch().await {
                Ok(message) => {
                    tracing::debug!("greeting received");
                    tx.send_replace(GreetingState { message });
                }
                Err(e) => tracing::warn!("keeping current greeting: {}", e),
            }
        });
        GreetingViewer {
            state: rx,
            fetch: Some(fetch),
        }
    }

    pub fn state(&self) -> GreetingState {
        self.state.borrow().clone()
    }

    pub fn render(&self) -> String {
        format!("The current greeting is {}", self.state.borrow().message)
    }

    /// Resolves when the state changed, i.e. the view needs re-rendering.
    /// Returns `false` once no change can happen anymore.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Waits for the fetch to finish, successfully or not.
    pub async fn settled(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            if let Err(e) = fetch.await {
                tracing::warn!("greeting fetch did not complete: {}", e);
            }
        }
    }
}

impl Drop for GreetingViewer {
    fn drop(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
    }
}
