//! Optional desktop dimension hook.

use url::Url;

use crate::provider::ResolutionHint;

/// Supplies the desktop size used to constrain queries that carry no resolution filter.
pub trait DimensionProvider: Send + Sync {
    fn desktop_dimensions(&self) -> Option<(u32, u32)>;
}

/// Fixed dimensions, e.g. from the `[display]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticDimensions {
    pub width: u32,
    pub height: u32,
}

impl StaticDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl DimensionProvider for StaticDimensions {
    fn desktop_dimensions(&self) -> Option<(u32, u32)> {
        (self.width > 0 && self.height > 0).then_some((self.width, self.height))
    }
}

/// Appends the hint parameter unless `url` already carries it.
///
/// Returns whether the URL was changed.
pub fn apply_resolution_hint(url: &mut Url, hint: &ResolutionHint, dimensions: (u32, u32)) -> bool {
    if url.query_pairs().any(|(key, _)| key == hint.param()) {
        return false;
    }
    url.query_pairs_mut()
        .append_pair(hint.param(), &hint.value(dimensions));
    true
}
