use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// An image result, normalized across providers.
///
/// Produced per fetch and never persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImage {
    /// Provider-side identifier.
    pub id: String,
    /// Direct download URL of the full image.
    pub path: String,
    /// Human-facing page for the image.
    pub view_url: String,
    /// Author/uploader credit; empty until known.
    pub attribution: String,
    pub provider: ProviderId,
    /// MIME type, e.g. `image/jpeg`.
    pub file_type: String,
}

impl NormalizedImage {
    pub fn has_attribution(&self) -> bool {
        !self.attribution.trim().is_empty()
    }
}

/// One decoded page of provider results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePage {
    pub page: u32,
    /// Last available page, when the provider reports it.
    pub last_page: Option<u32>,
    pub images: Vec<NormalizedImage>,
}

impl ImagePage {
    /// Whether a later page may hold more results.
    pub fn has_more(&self) -> bool {
        match self.last_page {
            Some(last) => self.page < last,
            None => !self.images.is_empty(),
        }
    }
}

/// Guesses a MIME type from a file URL's extension.
pub fn file_type_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_url() {
        assert_eq!(file_type_from_url("https://x/y/photo.PNG?w=100"), "image/png");
        assert_eq!(file_type_from_url("https://x/y/photo.jpeg"), "image/jpeg");
        assert_eq!(file_type_from_url("https://x/y/photo"), "image/jpeg");
    }

    #[test]
    fn test_has_more() {
        let page = ImagePage {
            page: 2,
            last_page: Some(2),
            images: Vec::new(),
        };
        assert!(!page.has_more());

        let open_ended = ImagePage {
            page: 1,
            last_page: None,
            images: vec![NormalizedImage {
                id: "1".into(),
                path: "p".into(),
                view_url: "v".into(),
                attribution: String::new(),
                provider: ProviderId::Unsplash,
                file_type: "image/jpeg".into(),
            }],
        };
        assert!(open_ended.has_more());
        assert!(!open_ended.images[0].has_attribution());
    }
}
