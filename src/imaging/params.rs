//! Parameter types for image URL building.
//!
//! These describe *what* derived image is wanted; the CDN does the pixel
//! work. Options map one-to-one onto the CDN's query parameters.

/// How the CDN fits the image into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Clip,
    Crop,
    Fill,
    FillMax,
    Max,
    Min,
    Scale,
}

impl Fit {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Clip => "clip",
            Self::Crop => "crop",
            Self::Fill => "fill",
            Self::FillMax => "fillmax",
            Self::Max => "max",
            Self::Min => "min",
            Self::Scale => "scale",
        }
    }
}

/// Requested transformation for a derived image URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<Fit>,
    /// Let the CDN pick the best format the browser accepts.
    pub auto_format: bool,
}

impl ImageOptions {
    /// Full-size image, bounded by the original: `fit=max&auto=format`.
    pub fn full() -> Self {
        Self {
            width: None,
            height: None,
            fit: Some(Fit::Max),
            auto_format: true,
        }
    }

    /// Article card image (600×400).
    pub fn card() -> Self {
        Self::full().size(600, 400)
    }

    /// Contributor avatar (100×100).
    pub fn avatar() -> Self {
        Self::full().size(100, 100)
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Pixel dimensions of an original asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}
