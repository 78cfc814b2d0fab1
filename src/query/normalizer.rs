//! URL Normalizer
//!
//! Turns any URL a provider's pattern table recognizes into its canonical API query:
//! 1. classify the trimmed input against the patterns in priority order
//! 2. rewrite it into the API form (or pass an already-canonical input through)
//! 3. drop volatile per-fetch parameters, the fragment and trailing slashes
//! 4. re-serialize with parameters in a deterministic order

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{QueryError, QueryResult};
use crate::provider::pattern::RewriteError;
use crate::provider::ProviderDefinition;

/// A canonical API URL without API key or page parameter.
///
/// Only the [`Normalizer`] produces these, so two equal values always describe the
/// same search or collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedQuery(String);

impl NormalizedQuery {
    pub(crate) fn from_canonical(url: &str) -> Self {
        NormalizedQuery(url.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizer for one provider, generic over its pattern table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    provider: Arc<ProviderDefinition>,
    username: Option<String>,
}

impl Normalizer {
    pub fn new(provider: Arc<ProviderDefinition>) -> Self {
        Self {
            provider,
            username: None,
        }
    }

    /// Sets the account used to resolve "own favorites" URLs.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.username = if username.trim().is_empty() {
            None
        } else {
            Some(username.trim().to_string())
        };
        self
    }

    pub fn provider(&self) -> &Arc<ProviderDefinition> {
        &self.provider
    }

    /// Normalizes `raw` into its canonical API query.
    pub fn normalize(&self, raw: &str) -> QueryResult<NormalizedQuery> {
        let input = raw.trim();

        let mut vars = HashMap::new();
        if let Some(username) = &self.username {
            vars.insert("username", username.clone());
        }

        let rewritten = self
            .provider
            .patterns()
            .iter()
            .find_map(|pattern| {
                pattern.captures(input).map(|caps| {
                    trace!("{}: '{}' matched {:?}", self.provider.id(), input, pattern.kind());
                    pattern.rewrite(input, &caps, &vars)
                })
            })
            .ok_or_else(|| QueryError::UnsupportedUrl(input.to_string()))?
            .map_err(|e| match e {
                RewriteError::MissingVariable(name) if name == "username" => {
                    QueryError::MissingUsername(self.provider.id())
                }
                RewriteError::MissingVariable(_) => QueryError::UnsupportedUrl(input.to_string()),
            })?;

        let url = Url::parse(&rewritten).map_err(|e| {
            debug!("Rewritten URL '{}' failed to parse: {}", rewritten, e);
            QueryError::UnsupportedUrl(input.to_string())
        })?;

        let normalized = self.canonicalize(url);
        debug!("Normalized '{}' -> '{}'", input, normalized);
        Ok(normalized)
    }

    /// Strips volatile parameters and fixes the parameter order.
    fn canonicalize(&self, mut url: Url) -> NormalizedQuery {
        let volatile = self.provider.volatile_params();

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !key.is_empty() && !volatile.iter().any(|v| *v == key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        // Stable: repeated keys keep their relative order.
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        // Pass-through inputs may differ from the API base in scheme or port.
        if let Ok(api) = Url::parse(self.provider.api_base()) {
            if url.scheme() != api.scheme() {
                let _ = url.set_scheme(api.scheme());
            }
            if url.host_str() != api.host_str() {
                let _ = url.set_host(api.host_str());
            }
            let _ = url.set_port(api.port());
        }

        url.set_fragment(None);
        url.set_query(None);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        let path = url.path().to_string();
        let trimmed = path.trim_end_matches('/');
        if trimmed.len() != path.len() {
            url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
        }

        NormalizedQuery(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderDefinition;
    use crate::query::QueryId;

    fn svc() -> Normalizer {
        Normalizer::new(Arc::new(ProviderDefinition::wallhaven_at("https://svc")))
    }

    fn assert_normalizes(normalizer: &Normalizer, raw: &str, expected: &str) {
        let first = normalizer.normalize(raw).unwrap();
        assert_eq!(first.as_str(), expected, "normalizing {raw}");
        let second = normalizer.normalize(first.as_str()).unwrap();
        assert_eq!(second, first, "re-normalizing {raw}");
    }

    #[test]
    fn test_strips_apikey_and_page() {
        assert_normalizes(
            &svc(),
            "https://svc/api/v1/search?q=cats&apikey=XYZ&page=3",
            "https://svc/api/v1/search?q=cats",
        );
    }

    #[test]
    fn test_rewrites_user_favorites() {
        assert_normalizes(
            &svc(),
            "https://svc/user/Alice/favorites/42",
            "https://svc/api/v1/collections/Alice/42",
        );
    }

    #[test]
    fn test_bare_search_has_no_question_mark() {
        assert_normalizes(&svc(), "https://svc/search", "https://svc/api/v1/search");
        assert_normalizes(&svc(), "https://svc/search?", "https://svc/api/v1/search");
        assert_normalizes(&svc(), "https://svc/search?page=2", "https://svc/api/v1/search");
    }

    #[test]
    fn test_trailing_slash_before_query() {
        assert_normalizes(
            &svc(),
            "  https://svc/search/?q=cats&categories=110  ",
            "https://svc/api/v1/search?categories=110&q=cats",
        );
        assert_normalizes(
            &svc(),
            "https://svc/api/v1/search/?q=cats",
            "https://svc/api/v1/search?q=cats",
        );
    }

    #[test]
    fn test_parameter_order_is_canonical() {
        let n = svc();
        let a = n.normalize("https://svc/search?q=cats&purity=100&sorting=toplist").unwrap();
        let b = n.normalize("https://svc/search?sorting=toplist&q=cats&purity=100#top").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_listing_pages_become_sorted_searches() {
        assert_normalizes(
            &svc(),
            "https://svc/toplist?topRange=1M&page=4",
            "https://svc/api/v1/search?sorting=toplist&topRange=1M",
        );
        assert_normalizes(&svc(), "https://svc/latest", "https://svc/api/v1/search?sorting=latest");
    }

    #[test]
    fn test_own_favorites_need_username() {
        let n = svc();
        assert!(matches!(
            n.normalize("https://svc/favorites/7"),
            Err(QueryError::MissingUsername(_))
        ));

        let n = svc().with_username("bob");
        assert_normalizes(&n, "https://svc/favorites/7?purity=110", "https://svc/api/v1/collections/bob/7?purity=110");
    }

    #[test]
    fn test_scheme_variants_share_one_form() {
        let n = Normalizer::new(Arc::new(ProviderDefinition::wallhaven()));
        let expected = "https://wallhaven.cc/api/v1/search?q=cats";
        for raw in [
            "https://wallhaven.cc/api/v1/search?q=cats",
            "http://wallhaven.cc/api/v1/search?q=cats",
            "http://wallhaven.cc/search?q=cats",
            "https://www.wallhaven.cc/search?q=cats",
        ] {
            assert_normalizes(&n, raw, expected);
        }

        let a = n.normalize("http://wallhaven.cc/api/v1/search?q=cats").unwrap();
        let b = n.normalize("https://wallhaven.cc/api/v1/search?q=cats").unwrap();
        assert_eq!(QueryId::of(&a), QueryId::of(&b));

        let pexels = Normalizer::new(Arc::new(ProviderDefinition::pexels()));
        assert_normalizes(
            &pexels,
            "http://api.pexels.com/v1/search?query=sea",
            "https://api.pexels.com/v1/search?query=sea",
        );
    }

    #[test]
    fn test_search_terms_keep_reserved_characters() {
        let unsplash = Normalizer::new(Arc::new(ProviderDefinition::unsplash()));
        assert_normalizes(
            &unsplash,
            "https://unsplash.com/s/photos/cats&dogs",
            "https://api.unsplash.com/search/photos?query=cats%26dogs",
        );

        let pexels = Normalizer::new(Arc::new(ProviderDefinition::pexels()));
        assert_normalizes(
            &pexels,
            "https://www.pexels.com/search/c++/",
            "https://api.pexels.com/v1/search?query=c%2B%2B",
        );
        assert_normalizes(
            &pexels,
            "https://www.pexels.com/search/a=b/",
            "https://api.pexels.com/v1/search?query=a%3Db",
        );
    }

    #[test]
    fn test_unsupported_url() {
        match svc().normalize("https://unrelated.example.com") {
            Err(QueryError::UnsupportedUrl(url)) => assert_eq!(url, "https://unrelated.example.com"),
            other => panic!("expected UnsupportedUrl, got {other:?}"),
        }
        assert!(svc().normalize("").is_err());
        assert!(svc().normalize("https://svc/user/Alice").is_err());
    }

    #[test]
    fn test_public_wallhaven_origin() {
        let n = Normalizer::new(Arc::new(ProviderDefinition::wallhaven()));
        assert_normalizes(
            &n,
            "https://www.wallhaven.cc/search?q=id%3A1&atleast=1920x1080",
            "https://wallhaven.cc/api/v1/search?atleast=1920x1080&q=id%3A1",
        );
    }

    #[test]
    fn test_unsplash_shapes() {
        let n = Normalizer::new(Arc::new(ProviderDefinition::unsplash()));
        assert_normalizes(
            &n,
            "https://unsplash.com/s/photos/mountain-lake?orientation=landscape",
            "https://api.unsplash.com/search/photos?orientation=landscape&query=mountain-lake",
        );
        assert_normalizes(
            &n,
            "https://unsplash.com/collections/3330445/wallpapers",
            "https://api.unsplash.com/collections/3330445/photos",
        );
        assert_normalizes(
            &n,
            "https://api.unsplash.com/search/photos?query=sea&client_id=KEY&per_page=30&page=2",
            "https://api.unsplash.com/search/photos?query=sea",
        );
    }

    #[test]
    fn test_pexels_shapes() {
        let n = Normalizer::new(Arc::new(ProviderDefinition::pexels()));
        assert_normalizes(
            &n,
            "https://www.pexels.com/search/ocean%20sunset/",
            "https://api.pexels.com/v1/search?query=ocean+sunset",
        );
        assert_normalizes(
            &n,
            "https://www.pexels.com/collections/calm-nature-8xntbhr/",
            "https://api.pexels.com/v1/collections/8xntbhr",
        );
        assert!(n.normalize("https://wallhaven.cc/search").is_err());
    }
}
