//! Provider query normalization and management for a wallpaper rotator.
//!
//! Users paste browser or API URLs from Wallhaven, Unsplash or Pexels. The crate turns
//! them into canonical API queries, keeps a persisted and deduplicated collection per
//! provider, fetches result pages, and fills in missing attribution.

#[macro_use]
extern crate log;

pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod image;
pub mod provider;
pub mod query;

pub use error::{FetchError, FetchResult, QueryError, QueryResult};
pub use fetch::{CancelHandle, Credentials, FetchClient, FetchContext, ImageEnricher};
pub use image::{ImagePage, NormalizedImage};
pub use provider::{ProviderDefinition, ProviderId, ProviderRegistry};
pub use query::{NormalizedQuery, Normalizer, QueryId, QueryStore, SavedQuery};
