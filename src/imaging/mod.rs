//! Image URL building against the CMS image CDN.
//!
//! Nothing is resized locally. An image reference (an asset id like
//! `image-3f2a…-1200x800-jpg`, or an already-resolved CDN URL) is turned into
//! a CDN URL carrying the requested transformation as query parameters.
//!
//! ## Fallback policy
//!
//! Image transformation must never block a page render. [`ImageUrlBuilder::resolve`]
//! swallows every failure (missing source, unrecognized URL such as a video
//! file, malformed asset id) and returns the configured placeholder instead.
//! Callers that need the error use [`ImageUrlBuilder::try_url`].
//!
//! The module is split into:
//! - **Parameters**: [`ImageOptions`], [`Fit`], [`Dimensions`]
//! - **Builder**: [`ImageUrlBuilder`] plus [`image_dimensions`] and [`avatar_url`]

mod params;

pub use params::{Dimensions, Fit, ImageOptions};

use crate::config::SiteConfig;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;
use url::Url;

const CDN_ORIGIN: &str = "https://cdn.sanity.io";

static ASSET_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^image-([A-Za-z0-9]+)-(\d+)x(\d+)-([A-Za-z0-9]+)$").expect("valid asset id regex")
});

static CDN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https://cdn\.sanity\.io/images/([^/]+)/([^/]+)/([A-Za-z0-9]+)-(\d+)x(\d+)\.([A-Za-z0-9]+)(?:\?.*)?$",
    )
    .expect("valid cdn url regex")
});

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("not an image reference: {0}")]
    Unrecognized(String),
    #[error("invalid image URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A parsed image asset: enough to address it on the CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageAsset {
    project_id: String,
    dataset: String,
    hash: String,
    dimensions: Dimensions,
    extension: String,
}

/// Builds CDN URLs for image references.
#[derive(Debug, Clone)]
pub struct ImageUrlBuilder {
    project_id: String,
    dataset: String,
    placeholder: String,
    profile_placeholder: String,
}

impl ImageUrlBuilder {
    pub fn new(project_id: &str, dataset: &str) -> Self {
        let defaults = crate::config::ImagesConfig::default();
        Self {
            project_id: project_id.to_string(),
            dataset: dataset.to_string(),
            placeholder: defaults.placeholder,
            profile_placeholder: defaults.profile_placeholder,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            project_id: config.cms.project_id.clone(),
            dataset: config.cms.dataset.clone(),
            placeholder: config.images.placeholder.clone(),
            profile_placeholder: config.images.profile_placeholder.clone(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn profile_placeholder(&self) -> &str {
        &self.profile_placeholder
    }

    /// Derived URL for `source`, or the placeholder on any failure.
    pub fn resolve(&self, source: Option<&str>, opts: &ImageOptions) -> String {
        let Some(source) = source else {
            return self.placeholder.clone();
        };
        match self.try_url(source, opts) {
            Ok(url) => url,
            Err(err) => {
                debug!(source, %err, "image url fell back to placeholder");
                self.placeholder.clone()
            }
        }
    }

    /// Derived URL for `source`.
    pub fn try_url(&self, source: &str, opts: &ImageOptions) -> Result<String, ImageError> {
        let asset = self.parse(source)?;
        let base = format!(
            "{CDN_ORIGIN}/images/{}/{}/{}-{}x{}.{}",
            asset.project_id,
            asset.dataset,
            asset.hash,
            asset.dimensions.width,
            asset.dimensions.height,
            asset.extension
        );
        let mut url = Url::parse(&base)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(w) = opts.width {
                query.append_pair("w", &w.to_string());
            }
            if let Some(h) = opts.height {
                query.append_pair("h", &h.to_string());
            }
            if let Some(fit) = opts.fit {
                query.append_pair("fit", fit.as_param());
            }
            if opts.auto_format {
                query.append_pair("auto", "format");
            }
        }
        let mut out = String::from(url);
        // An empty query leaves a dangling `?`.
        if out.ends_with('?') {
            out.pop();
        }
        Ok(out)
    }

    fn parse(&self, source: &str) -> Result<ImageAsset, ImageError> {
        let source = source.trim();
        if let Some(caps) = ASSET_ID.captures(source) {
            return Ok(ImageAsset {
                project_id: self.project_id.clone(),
                dataset: self.dataset.clone(),
                hash: caps[1].to_string(),
                dimensions: parse_dimensions(&caps[2], &caps[3])
                    .ok_or_else(|| ImageError::Unrecognized(source.to_string()))?,
                extension: caps[4].to_string(),
            });
        }
        if let Some(caps) = CDN_URL.captures(source) {
            return Ok(ImageAsset {
                project_id: caps[1].to_string(),
                dataset: caps[2].to_string(),
                hash: caps[3].to_string(),
                dimensions: parse_dimensions(&caps[4], &caps[5])
                    .ok_or_else(|| ImageError::Unrecognized(source.to_string()))?,
                extension: caps[6].to_string(),
            });
        }
        Err(ImageError::Unrecognized(source.to_string()))
    }
}

fn parse_dimensions(w: &str, h: &str) -> Option<Dimensions> {
    Some(Dimensions {
        width: w.parse().ok()?,
        height: h.parse().ok()?,
    })
}

/// Original pixel dimensions encoded in an asset id or CDN URL.
pub fn image_dimensions(source: &str) -> Option<Dimensions> {
    let source = source.trim();
    if let Some(caps) = ASSET_ID.captures(source) {
        return parse_dimensions(&caps[2], &caps[3]);
    }
    let caps = CDN_URL.captures(source)?;
    parse_dimensions(&caps[4], &caps[5])
}

/// Generated initials avatar for contributors without a profile picture.
pub fn avatar_url(name: &str) -> String {
    let mut url = Url::parse("https://api.dicebear.com/9.x/initials/svg")
        .expect("static avatar url is valid");
    url.query_pairs_mut().append_pair("seed", name);
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ImageUrlBuilder {
        ImageUrlBuilder::new("proj", "production")
    }

    #[test]
    fn asset_id_builds_cdn_url() {
        let url = builder()
            .try_url("image-abc123-1200x800-jpg", &ImageOptions::full())
            .unwrap();
        assert_eq!(
            url,
            "https://cdn.sanity.io/images/proj/production/abc123-1200x800.jpg?fit=max&auto=format"
        );
    }

    #[test]
    fn sized_options_add_width_and_height() {
        let url = builder()
            .try_url("image-abc123-1200x800-png", &ImageOptions::card())
            .unwrap();
        assert!(url.ends_with("abc123-1200x800.png?w=600&h=400&fit=max&auto=format"));
    }

    #[test]
    fn cdn_url_keeps_its_project_and_drops_old_query() {
        let url = builder()
            .try_url(
                "https://cdn.sanity.io/images/other/staging/ff00-640x480.webp?w=10",
                &ImageOptions::avatar(),
            )
            .unwrap();
        assert_eq!(
            url,
            "https://cdn.sanity.io/images/other/staging/ff00-640x480.webp?w=100&h=100&fit=max&auto=format"
        );
    }

    #[test]
    fn no_options_means_no_query() {
        let url = builder()
            .try_url("image-abc-10x10-jpg", &ImageOptions::default())
            .unwrap();
        assert_eq!(url, "https://cdn.sanity.io/images/proj/production/abc-10x10.jpg");
    }

    #[test]
    fn video_file_url_is_rejected() {
        let result = builder().try_url(
            "https://cdn.sanity.io/files/proj/production/abc.mp4",
            &ImageOptions::full(),
        );
        assert!(matches!(result, Err(ImageError::Unrecognized(_))));
    }

    #[test]
    fn resolve_falls_back_to_placeholder() {
        let b = builder();
        assert_eq!(b.resolve(Some("not an image"), &ImageOptions::full()), "/src/images/banner.jpg");
        assert_eq!(b.resolve(None, &ImageOptions::full()), "/src/images/banner.jpg");
    }

    #[test]
    fn placeholder_follows_config() {
        let mut config = SiteConfig::default();
        config.images.placeholder = "/img/fallback.png".to_string();
        let b = ImageUrlBuilder::from_config(&config);
        assert_eq!(b.resolve(Some("bogus"), &ImageOptions::full()), "/img/fallback.png");
    }

    #[test]
    fn dimensions_from_asset_id_and_url() {
        assert_eq!(
            image_dimensions("image-abc-1200x800-jpg"),
            Some(Dimensions { width: 1200, height: 800 })
        );
        assert_eq!(
            image_dimensions("https://cdn.sanity.io/images/p/d/abc-300x450.png"),
            Some(Dimensions { width: 300, height: 450 })
        );
        assert_eq!(image_dimensions("/src/images/banner.jpg"), None);
    }

    #[test]
    fn avatar_url_encodes_name() {
        assert_eq!(
            avatar_url("Jane Doe"),
            "https://api.dicebear.com/9.x/initials/svg?seed=Jane+Doe"
        );
    }
}
