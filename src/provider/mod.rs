//! Photo service providers
//!
//! Each provider is a [`ProviderDefinition`]: its pattern table, canonical API base,
//! authentication scheme, pagination and volatile parameters, and the response schema
//! its results decode through. Definitions are plain data built at startup and handed
//! around through an explicit [`ProviderRegistry`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod pattern;
pub mod schema;

use pattern::{origin_regex, PatternKind, ProviderPattern};

pub const WALLHAVEN_WEB: &str = "https://wallhaven.cc";
pub const UNSPLASH_WEB: &str = "https://unsplash.com";
pub const UNSPLASH_API: &str = "https://api.unsplash.com";
pub const PEXELS_WEB: &str = "https://www.pexels.com";
pub const PEXELS_API: &str = "https://api.pexels.com/v1";

/// Supported photo services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Wallhaven,
    Unsplash,
    Pexels,
}

impl ProviderId {
    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::Wallhaven, ProviderId::Unsplash, ProviderId::Pexels]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::Wallhaven => "wallhaven",
            ProviderId::Unsplash => "unsplash",
            ProviderId::Pexels => "pexels",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wallhaven" => Ok(ProviderId::Wallhaven),
            "unsplash" => Ok(ProviderId::Unsplash),
            "pexels" => Ok(ProviderId::Pexels),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// How the API key is attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `?<param>=<key>`
    QueryParam(&'static str),
    /// `<name>: <prefix><key>`
    Header {
        name: &'static str,
        prefix: &'static str,
    },
}

/// Parameter appended from the desktop dimensions when a query carries no constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionHint {
    /// `<param>=<W>x<H>` minimum resolution.
    AtLeast(&'static str),
    /// `<param>=landscape|portrait`.
    Orientation(&'static str),
}

impl ResolutionHint {
    pub fn param(&self) -> &'static str {
        match self {
            ResolutionHint::AtLeast(p) | ResolutionHint::Orientation(p) => p,
        }
    }

    /// The value to append for the given desktop dimensions.
    pub fn value(&self, (width, height): (u32, u32)) -> String {
        match self {
            ResolutionHint::AtLeast(_) => format!("{width}x{height}"),
            ResolutionHint::Orientation(_) if height > width => "portrait".to_string(),
            ResolutionHint::Orientation(_) => "landscape".to_string(),
        }
    }
}

/// A photo service: its pattern table plus everything the fetch path needs.
#[derive(Debug, Clone)]
pub struct ProviderDefinition {
    id: ProviderId,
    api_base: String,
    patterns: Vec<ProviderPattern>,
    auth: AuthScheme,
    page_param: &'static str,
    page_size: Option<(&'static str, u32)>,
    volatile_params: Vec<&'static str>,
    resolution_hint: Option<ResolutionHint>,
    detail_template: Option<String>,
}

impl ProviderDefinition {
    /// Wallhaven at its public origin.
    pub fn wallhaven() -> Self {
        Self::wallhaven_at(WALLHAVEN_WEB)
    }

    /// Wallhaven served from `origin`; the API lives under `<origin>/api/v1`.
    pub fn wallhaven_at(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        let api = format!("{origin}/api/v1");
        let web_re = origin_regex(origin, true);
        let api_re = origin_regex(&api, false);

        let patterns = vec![
            ProviderPattern::pass_through(
                PatternKind::ApiCollection,
                &api_re,
                r"/collections/[^/?#]+/\d+",
            ),
            ProviderPattern::pass_through(PatternKind::ApiSearch, &api_re, "/search"),
            ProviderPattern::template(
                PatternKind::UserFavorites,
                &web_re,
                r"/user/(?P<user>[^/?#]+)/favorites/(?P<id>\d+)",
                format!("{api}/collections/{{user}}/{{id}}"),
            ),
            ProviderPattern::template(
                PatternKind::OwnFavorites,
                &web_re,
                r"/favorites/(?P<id>\d+)",
                format!("{api}/collections/{{username}}/{{id}}"),
            ),
            ProviderPattern::template(
                PatternKind::Listing,
                &web_re,
                r"/(?P<sorting>toplist|latest|hot|random)",
                format!("{api}/search?sorting={{sorting}}"),
            ),
            ProviderPattern::template(
                PatternKind::Search,
                &web_re,
                "/search",
                format!("{api}/search"),
            ),
        ];

        Self {
            id: ProviderId::Wallhaven,
            detail_template: Some(format!("{api}/w/{{id}}")),
            api_base: api,
            patterns,
            auth: AuthScheme::QueryParam("apikey"),
            page_param: "page",
            page_size: None,
            volatile_params: vec!["apikey", "page"],
            resolution_hint: Some(ResolutionHint::AtLeast("atleast")),
        }
    }

    /// Unsplash at its public origins.
    pub fn unsplash() -> Self {
        Self::unsplash_at(UNSPLASH_WEB, UNSPLASH_API)
    }

    pub fn unsplash_at(web: &str, api: &str) -> Self {
        let api = api.trim_end_matches('/').to_string();
        let web_re = origin_regex(web, true);
        let api_re = origin_regex(&api, false);

        let patterns = vec![
            ProviderPattern::pass_through(
                PatternKind::ApiCollection,
                &api_re,
                r"/collections/[^/?#]+/photos",
            ),
            ProviderPattern::pass_through(PatternKind::ApiSearch, &api_re, "/search/photos"),
            ProviderPattern::template(
                PatternKind::Collection,
                &web_re,
                r"/collections/(?P<id>[A-Za-z0-9_-]+)(?:/[^/?#]+)?",
                format!("{api}/collections/{{id}}/photos"),
            ),
            ProviderPattern::template(
                PatternKind::Search,
                &web_re,
                r"/s/photos/(?P<term>[^/?#]+)",
                format!("{api}/search/photos?query={{term}}"),
            ),
        ];

        Self {
            id: ProviderId::Unsplash,
            api_base: api,
            patterns,
            auth: AuthScheme::Header {
                name: "Authorization",
                prefix: "Client-ID ",
            },
            page_param: "page",
            page_size: Some(("per_page", 30)),
            volatile_params: vec!["client_id", "page", "per_page"],
            resolution_hint: Some(ResolutionHint::Orientation("orientation")),
            detail_template: None,
        }
    }

    /// Pexels at its public origins.
    pub fn pexels() -> Self {
        Self::pexels_at(PEXELS_WEB, PEXELS_API)
    }

    pub fn pexels_at(web: &str, api: &str) -> Self {
        let api = api.trim_end_matches('/').to_string();
        let web_re = origin_regex(web, true);
        let api_re = origin_regex(&api, false);

        let patterns = vec![
            ProviderPattern::pass_through(
                PatternKind::ApiCollection,
                &api_re,
                r"/collections/[A-Za-z0-9]+",
            ),
            ProviderPattern::pass_through(PatternKind::ApiSearch, &api_re, "/search"),
            ProviderPattern::template(
                PatternKind::Collection,
                &web_re,
                r"/collections/(?:[^/?#]*-)?(?P<id>[A-Za-z0-9]+)",
                format!("{api}/collections/{{id}}"),
            ),
            ProviderPattern::template(
                PatternKind::Search,
                &web_re,
                r"/search/(?P<term>[^/?#]+)",
                format!("{api}/search?query={{term}}"),
            ),
        ];

        Self {
            id: ProviderId::Pexels,
            api_base: api,
            patterns,
            auth: AuthScheme::Header {
                name: "Authorization",
                prefix: "",
            },
            page_param: "page",
            page_size: Some(("per_page", 40)),
            volatile_params: vec!["page", "per_page"],
            resolution_hint: Some(ResolutionHint::Orientation("orientation")),
            detail_template: None,
        }
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Recognizers in priority order.
    pub fn patterns(&self) -> &[ProviderPattern] {
        &self.patterns
    }

    pub fn auth(&self) -> &AuthScheme {
        &self.auth
    }

    pub fn page_param(&self) -> &'static str {
        self.page_param
    }

    pub fn page_size(&self) -> Option<(&'static str, u32)> {
        self.page_size
    }

    /// Per-fetch parameters that never take part in a query's identity.
    pub fn volatile_params(&self) -> &[&'static str] {
        &self.volatile_params
    }

    pub fn resolution_hint(&self) -> Option<&ResolutionHint> {
        self.resolution_hint.as_ref()
    }

    /// Per-item lookup URL used for enrichment, if the provider has one.
    pub fn detail_url(&self, image_id: &str) -> Option<String> {
        self.detail_template
            .as_ref()
            .map(|t| t.replace("{id}", image_id))
    }

    /// Whether any pattern in the table recognizes `raw`.
    pub fn recognizes(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        self.patterns.iter().any(|p| p.matcher().is_match(trimmed))
    }
}

/// Explicit set of providers, built at startup and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<ProviderDefinition>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in providers at their public origins.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderDefinition::wallhaven());
        registry.register(ProviderDefinition::unsplash());
        registry.register(ProviderDefinition::pexels());
        registry
    }

    /// Adds a provider, replacing any previous definition with the same id.
    pub fn register(&mut self, definition: ProviderDefinition) {
        self.providers.retain(|p| p.id() != definition.id());
        self.providers.push(Arc::new(definition));
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<ProviderDefinition>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// The first provider whose pattern table recognizes `raw`.
    pub fn detect(&self, raw: &str) -> Option<Arc<ProviderDefinition>> {
        self.providers.iter().find(|p| p.recognizes(raw)).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProviderDefinition>> {
        self.providers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_round_trip_names() {
        for id in ProviderId::all() {
            assert_eq!(id.name().parse::<ProviderId>().unwrap(), *id);
        }
        assert!("flickr".parse::<ProviderId>().is_err());
        assert_eq!(" Wallhaven ".parse::<ProviderId>().unwrap(), ProviderId::Wallhaven);
    }

    #[test]
    fn test_registry_detects_provider() {
        let registry = ProviderRegistry::builtin();

        let wh = registry.detect("https://wallhaven.cc/search?q=cats").unwrap();
        assert_eq!(wh.id(), ProviderId::Wallhaven);

        let us = registry.detect("https://unsplash.com/s/photos/forest").unwrap();
        assert_eq!(us.id(), ProviderId::Unsplash);

        let px = registry.detect("https://www.pexels.com/search/ocean/").unwrap();
        assert_eq!(px.id(), ProviderId::Pexels);

        assert!(registry.detect("https://unrelated.example.com").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = ProviderRegistry::builtin();
        registry.register(ProviderDefinition::wallhaven_at("https://svc"));

        assert_eq!(registry.iter().count(), 3);
        let wh = registry.get(ProviderId::Wallhaven).unwrap();
        assert_eq!(wh.api_base(), "https://svc/api/v1");
    }

    #[test]
    fn test_detail_url() {
        let wh = ProviderDefinition::wallhaven();
        assert_eq!(
            wh.detail_url("94x38z").as_deref(),
            Some("https://wallhaven.cc/api/v1/w/94x38z")
        );
        assert!(ProviderDefinition::unsplash().detail_url("abc").is_none());
    }

    #[test]
    fn test_resolution_hint_values() {
        let at_least = ResolutionHint::AtLeast("atleast");
        assert_eq!(at_least.value((2560, 1440)), "2560x1440");

        let orientation = ResolutionHint::Orientation("orientation");
        assert_eq!(orientation.value((1920, 1080)), "landscape");
        assert_eq!(orientation.value((1080, 1920)), "portrait");
        assert_eq!(orientation.param(), "orientation");
    }
}
