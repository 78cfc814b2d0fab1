//! Best-effort attribution lookup.
//!
//! Listing endpoints do not always carry the uploader. For providers with a per-item
//! detail endpoint the enricher fetches it and fills in the attribution. A failed lookup
//! never loses the image: network errors and non-2xx answers hand the original back.
//! A 2xx body that does not decode, or a canceled context, is reported to the caller.

use std::sync::Arc;

use futures::future::join_all;
use url::Url;

use super::transport::{HttpRequest, HttpTransport};
use super::{authorize, send, Credentials, FetchContext};
use crate::error::{FetchError, FetchResult};
use crate::image::NormalizedImage;
use crate::provider::schema::decode_attribution;
use crate::provider::ProviderDefinition;

#[derive(Clone)]
pub struct ImageEnricher {
    provider: Arc<ProviderDefinition>,
    transport: Arc<dyn HttpTransport>,
    credentials: Credentials,
}

impl ImageEnricher {
    pub fn new(
        provider: Arc<ProviderDefinition>,
        transport: Arc<dyn HttpTransport>,
        credentials: Credentials,
    ) -> Self {
        Self {
            provider,
            transport,
            credentials,
        }
    }

    /// Returns `image` with its attribution filled in when it can be found.
    pub async fn enrich(&self, ctx: &FetchContext, image: NormalizedImage) -> FetchResult<NormalizedImage> {
        if image.has_attribution() {
            return Ok(image);
        }
        if image.provider != self.provider.id() {
            debug!(
                "Not enriching {} image {} with the {} enricher",
                image.provider,
                image.id,
                self.provider.id()
            );
            return Ok(image);
        }
        let Some(detail) = self.provider.detail_url(&image.id) else {
            return Ok(image);
        };

        let mut url = match Url::parse(&detail) {
            Ok(url) => url,
            Err(e) => {
                warn!("Bad detail URL '{}' for image {}: {}", detail, image.id, e);
                return Ok(image);
            }
        };
        let key = self.credentials.api_key(self.provider.id());
        let headers = authorize(&self.provider, &mut url, key.as_deref());
        let mut request = HttpRequest::get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = match send(ctx, self.transport.as_ref(), request).await {
            Ok(response) => response,
            Err(FetchError::Canceled) => return Err(FetchError::Canceled),
            Err(e) => {
                warn!("Detail lookup for {} failed: {}", image.id, e);
                return Ok(image);
            }
        };

        if !response.is_success() {
            warn!(
                "Detail lookup for {} answered HTTP {}, keeping image as is",
                image.id, response.status
            );
            return Ok(image);
        }

        let attribution = decode_attribution(self.provider.id(), &response.body).map_err(|e| {
            error!("Could not decode detail for {}: {}", image.id, e);
            FetchError::Decode(e.to_string())
        })?;

        match attribution.filter(|a| !a.trim().is_empty()) {
            Some(attribution) => {
                trace!("Attributed {} to {}", image.id, attribution);
                Ok(NormalizedImage {
                    attribution,
                    ..image
                })
            }
            None => Ok(image),
        }
    }

    /// Enriches every image concurrently, preserving order.
    ///
    /// Fails with the first surfaced error; swallowed failures leave their image unchanged.
    pub async fn enrich_all(
        &self,
        ctx: &FetchContext,
        images: Vec<NormalizedImage>,
    ) -> FetchResult<Vec<NormalizedImage>> {
        join_all(images.into_iter().map(|image| self.enrich(ctx, image)))
            .await
            .into_iter()
            .collect()
    }
}
