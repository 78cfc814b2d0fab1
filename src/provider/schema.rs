//! Fixed response schemas for each provider's API.
//!
//! Only the fields the core uses are declared; everything else in the payload is ignored.

use serde::Deserialize;

use super::ProviderId;
use crate::image::{file_type_from_url, ImagePage, NormalizedImage};

/// Wallhaven search / collection listing.
#[derive(Debug, Deserialize)]
pub struct WallhavenListing {
    pub data: Vec<WallhavenWallpaper>,
    pub meta: Option<WallhavenMeta>,
}

#[derive(Debug, Deserialize)]
pub struct WallhavenMeta {
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WallhavenWallpaper {
    pub id: String,
    pub url: String,
    pub path: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub uploader: Option<WallhavenUploader>,
}

#[derive(Debug, Deserialize)]
pub struct WallhavenUploader {
    pub username: String,
}

/// Wallhaven `/w/{id}` detail.
#[derive(Debug, Deserialize)]
pub struct WallhavenDetail {
    pub data: WallhavenWallpaper,
}

/// Unsplash photo, as returned by both search and collection endpoints.
#[derive(Debug, Deserialize)]
pub struct UnsplashPhoto {
    pub id: String,
    pub urls: UnsplashUrls,
    pub links: UnsplashLinks,
    #[serde(default)]
    pub user: Option<UnsplashUser>,
}

#[derive(Debug, Deserialize)]
pub struct UnsplashUrls {
    pub full: String,
}

#[derive(Debug, Deserialize)]
pub struct UnsplashLinks {
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct UnsplashUser {
    pub name: String,
}

/// Unsplash search answers with an envelope, collection photos with a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UnsplashListing {
    Search {
        results: Vec<UnsplashPhoto>,
        total_pages: Option<u32>,
    },
    Photos(Vec<UnsplashPhoto>),
}

/// Pexels search (`photos`) or collection (`media`) listing.
#[derive(Debug, Deserialize)]
pub struct PexelsListing {
    #[serde(alias = "media")]
    pub photos: Vec<PexelsPhoto>,
    pub per_page: Option<u32>,
    pub total_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PexelsPhoto {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub photographer: Option<String>,
    #[serde(default)]
    pub src: Option<PexelsSource>,
}

#[derive(Debug, Deserialize)]
pub struct PexelsSource {
    pub original: String,
}

impl WallhavenWallpaper {
    fn into_image(self) -> NormalizedImage {
        let file_type = self
            .file_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| file_type_from_url(&self.path));
        NormalizedImage {
            attribution: self.uploader.map(|u| u.username).unwrap_or_default(),
            id: self.id,
            path: self.path,
            view_url: self.url,
            provider: ProviderId::Wallhaven,
            file_type,
        }
    }
}

impl UnsplashPhoto {
    fn into_image(self) -> NormalizedImage {
        NormalizedImage {
            id: self.id,
            file_type: "image/jpeg".to_string(),
            path: self.urls.full,
            view_url: self.links.html,
            attribution: self.user.map(|u| u.name).unwrap_or_default(),
            provider: ProviderId::Unsplash,
        }
    }
}

impl PexelsPhoto {
    fn is_photo(&self) -> bool {
        self.kind
            .as_deref()
            .map(|k| k.eq_ignore_ascii_case("photo"))
            .unwrap_or(true)
    }

    fn into_image(self) -> Option<NormalizedImage> {
        let src = self.src?;
        Some(NormalizedImage {
            id: self.id.to_string(),
            file_type: file_type_from_url(&src.original),
            path: src.original,
            view_url: self.url,
            attribution: self.photographer.unwrap_or_default(),
            provider: ProviderId::Pexels,
        })
    }
}

/// Decodes one page of results for `provider`.
pub fn decode_page(provider: ProviderId, page: u32, body: &[u8]) -> Result<ImagePage, serde_json::Error> {
    let (images, last_page) = match provider {
        ProviderId::Wallhaven => {
            let listing: WallhavenListing = serde_json::from_slice(body)?;
            let last_page = listing.meta.and_then(|m| m.last_page);
            let images = listing.data.into_iter().map(WallhavenWallpaper::into_image).collect();
            (images, last_page)
        }
        ProviderId::Unsplash => match serde_json::from_slice::<UnsplashListing>(body)? {
            UnsplashListing::Search {
                results,
                total_pages,
            } => (
                results.into_iter().map(UnsplashPhoto::into_image).collect(),
                total_pages,
            ),
            UnsplashListing::Photos(photos) => {
                (photos.into_iter().map(UnsplashPhoto::into_image).collect(), None)
            }
        },
        ProviderId::Pexels => {
            let listing: PexelsListing = serde_json::from_slice(body)?;
            let last_page = match (listing.total_results, listing.per_page) {
                (Some(total), Some(per_page)) if per_page > 0 => Some(total.div_ceil(per_page)),
                _ => None,
            };
            let images = listing
                .photos
                .into_iter()
                .filter(PexelsPhoto::is_photo)
                .filter_map(PexelsPhoto::into_image)
                .collect();
            (images, last_page)
        }
    };

    Ok(ImagePage {
        page,
        last_page,
        images,
    })
}

/// Decodes a per-item detail response into the attribution it carries.
pub fn decode_attribution(provider: ProviderId, body: &[u8]) -> Result<Option<String>, serde_json::Error> {
    match provider {
        ProviderId::Wallhaven => {
            let detail: WallhavenDetail = serde_json::from_slice(body)?;
            Ok(detail.data.uploader.map(|u| u.username))
        }
        ProviderId::Unsplash => {
            let photo: UnsplashPhoto = serde_json::from_slice(body)?;
            Ok(photo.user.map(|u| u.name))
        }
        ProviderId::Pexels => {
            let photo: PexelsPhoto = serde_json::from_slice(body)?;
            Ok(photo.photographer)
        }
    }
}
