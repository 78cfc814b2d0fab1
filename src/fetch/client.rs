//! Paginated result fetching for one provider.

use std::sync::Arc;

use url::Url;

use super::transport::{HttpRequest, HttpTransport};
use super::{authorize, retry_after, send, Credentials, FetchContext};
use crate::display::{apply_resolution_hint, DimensionProvider};
use crate::error::{FetchError, FetchResult};
use crate::image::{ImagePage, NormalizedImage};
use crate::provider::schema::decode_page;
use crate::provider::ProviderDefinition;
use crate::query::NormalizedQuery;

/// Fetches pages of results for normalized queries of a single provider.
#[derive(Clone)]
pub struct FetchClient {
    provider: Arc<ProviderDefinition>,
    transport: Arc<dyn HttpTransport>,
    credentials: Credentials,
    dimensions: Option<Arc<dyn DimensionProvider>>,
}

impl FetchClient {
    pub fn new(
        provider: Arc<ProviderDefinition>,
        transport: Arc<dyn HttpTransport>,
        credentials: Credentials,
    ) -> Self {
        Self {
            provider,
            transport,
            credentials,
            dimensions: None,
        }
    }

    /// Constrains unconstrained queries to the desktop size reported by `dimensions`.
    pub fn with_dimensions(mut self, dimensions: Arc<dyn DimensionProvider>) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn provider(&self) -> &Arc<ProviderDefinition> {
        &self.provider
    }

    /// Fetches one page of `query` and returns its images.
    pub async fn fetch(
        &self,
        ctx: &FetchContext,
        query: &NormalizedQuery,
        page: u32,
    ) -> FetchResult<Vec<NormalizedImage>> {
        self.fetch_page(ctx, query, page).await.map(|p| p.images)
    }

    /// Fetches one page of `query`, keeping the pagination info the provider reports.
    ///
    /// Pages are 1-based; page 0 is treated as page 1.
    pub async fn fetch_page(
        &self,
        ctx: &FetchContext,
        query: &NormalizedQuery,
        page: u32,
    ) -> FetchResult<ImagePage> {
        let page = page.max(1);
        let request = self.build_request(query, page)?;
        let provider = self.provider.id();

        debug!("Fetching page {} of {} query {}", page, provider, query);
        let response = send(ctx, self.transport.as_ref(), request).await?;

        if !response.is_success() {
            let retry_after = retry_after(&response);
            warn!(
                "{} answered {} for page {} of {}",
                provider, response.status, page, query
            );
            return Err(FetchError::Provider {
                status: response.status,
                retry_after,
            });
        }

        let decoded = decode_page(provider, page, &response.body).map_err(|e| {
            error!("Could not decode {} response: {}", provider, e);
            FetchError::Decode(e.to_string())
        })?;

        trace!(
            "Decoded {} images from page {} of {}",
            decoded.images.len(),
            page,
            query
        );
        Ok(decoded)
    }

    fn build_request(&self, query: &NormalizedQuery, page: u32) -> FetchResult<HttpRequest> {
        let mut url = Url::parse(query.as_str())
            .map_err(|e| FetchError::InvalidQuery(format!("{query}: {e}")))?;

        let dims = self
            .dimensions
            .as_ref()
            .and_then(|d| d.desktop_dimensions());
        if let (Some(hint), Some(dims)) = (self.provider.resolution_hint(), dims) {
            if apply_resolution_hint(&mut url, hint, dims) {
                trace!("Applied {}={} to {}", hint.param(), hint.value(dims), query);
            }
        }

        set_param(&mut url, self.provider.page_param(), &page.to_string());
        if let Some((param, size)) = self.provider.page_size() {
            if !url.query_pairs().any(|(key, _)| key == param) {
                url.query_pairs_mut().append_pair(param, &size.to_string());
            }
        }

        let key = self.credentials.api_key(self.provider.id());
        let headers = authorize(&self.provider, &mut url, key.as_deref());

        let mut request = HttpRequest::get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        Ok(request)
    }
}

/// Replaces every occurrence of `key` with a single `key=value`.
fn set_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(key, value);
}
