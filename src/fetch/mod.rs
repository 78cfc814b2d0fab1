//! Fetching provider results
//!
//! This module provides:
//! 1. [`FetchContext`], the cancellation/timeout scope every network call runs under
//! 2. [`Credentials`], API key lookup from configuration or a fixed override
//! 3. [`FetchClient`], paginated result fetching for one provider
//! 4. [`ImageEnricher`], best-effort attribution lookup
//!
//! Nothing here retries. A rate-limited or failed call is reported with its status so the
//! caller's scheduler can apply its own backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

pub mod client;
pub mod enricher;
pub mod transport;

pub use client::FetchClient;
pub use enricher::ImageEnricher;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

use crate::config::{api_key_key, ConfigStore};
use crate::error::{FetchError, FetchResult};
use crate::provider::{AuthScheme, ProviderDefinition, ProviderId};

/// Cancellation and timeout scope for network calls.
///
/// Cloning shares the same cancellation signal.
#[derive(Debug, Clone)]
pub struct FetchContext {
    cancel: watch::Receiver<bool>,
    timeout: Option<Duration>,
}

/// Cancels every [`FetchContext`] cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace never fails, even with no receivers left.
        self.sender.send_replace(true);
    }
}

impl FetchContext {
    /// A cancelable context and the handle that cancels it.
    pub fn new() -> (Self, CancelHandle) {
        let (sender, cancel) = watch::channel(false);
        (
            Self {
                cancel,
                timeout: None,
            },
            CancelHandle { sender },
        )
    }

    /// A context that is never canceled.
    pub fn background() -> Self {
        let (_sender, cancel) = watch::channel(false);
        Self {
            cancel,
            timeout: None,
        }
    }

    /// Bounds every call made under this context by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_canceled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Runs `fut`, aborting it with [`FetchError::Canceled`] on cancellation or timeout.
    pub async fn run<F, T>(&self, fut: F) -> FetchResult<T>
    where
        F: Future<Output = FetchResult<T>>,
    {
        if self.is_canceled() {
            return Err(FetchError::Canceled);
        }

        let mut cancel = self.cancel.clone();
        let guarded = async {
            tokio::select! {
                result = fut => result,
                _ = wait_for_cancel(&mut cancel) => Err(FetchError::Canceled),
            }
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, guarded)
                .await
                .unwrap_or(Err(FetchError::Canceled)),
            None => guarded.await,
        }
    }
}

impl Default for FetchContext {
    fn default() -> Self {
        Self::background()
    }
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone: cancellation can no longer happen.
            std::future::pending::<()>().await;
        }
    }
}

/// Where API keys come from.
#[derive(Clone, Default)]
pub struct Credentials {
    config: Option<Arc<dyn ConfigStore>>,
    override_key: Option<String>,
}

impl Credentials {
    /// Look keys up as `<provider>_api_key` in the preferences store.
    pub fn from_config(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            config: Some(config),
            override_key: None,
        }
    }

    /// Use one fixed key regardless of configuration.
    pub fn fixed(key: impl Into<String>) -> Self {
        Self {
            config: None,
            override_key: Some(key.into()),
        }
    }

    /// Send no key at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn api_key(&self, provider: ProviderId) -> Option<String> {
        let key = match (&self.override_key, &self.config) {
            (Some(key), _) => key.clone(),
            (None, Some(config)) => config.get_string(&api_key_key(provider.name()), ""),
            (None, None) => String::new(),
        };
        let key = key.trim().to_string();
        (!key.is_empty()).then_some(key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("from_config", &self.config.is_some())
            .field(
                "override_key",
                &self.override_key.as_ref().map(|k| "*".repeat(k.len())),
            )
            .finish()
    }
}

/// Attaches the provider's authentication to a request URL.
///
/// Returns the headers to send; query-parameter auth is written into `url` directly.
pub(crate) fn authorize(
    provider: &ProviderDefinition,
    url: &mut Url,
    key: Option<&str>,
) -> Vec<(String, String)> {
    let Some(key) = key else {
        return Vec::new();
    };

    match provider.auth() {
        AuthScheme::QueryParam(param) => {
            url.query_pairs_mut().append_pair(param, key);
            Vec::new()
        }
        AuthScheme::Header { name, prefix } => vec![(name.to_string(), format!("{prefix}{key}"))],
    }
}

/// Sends `request` through `transport` under `ctx`.
pub(crate) async fn send(
    ctx: &FetchContext,
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> FetchResult<HttpResponse> {
    ctx.run(async { transport.execute(request).await.map_err(FetchError::from) })
        .await
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
