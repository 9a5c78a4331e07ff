//! Typed Content Repository documents.
//!
//! These are the projections the query layer asks for. Optional CMS fields
//! are `Option`/empty here and nowhere else: once a document decodes, the
//! formatters trust its shape and never poke at raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// URL-safe unique identifier for a document.
///
/// Decodes from either a bare string or the CMS slug object
/// `{ "_type": "slug", "current": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(pub String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Plain(String),
            Object { current: String },
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Plain(s) | Raw::Object { current: s } => Slug(s),
        })
    }
}

/// Editorial classification of an article. At most one per article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ArticleType {
    Feature,
    Opinion,
    Sports,
    NewsAndAnnouncements,
    Other(String),
}

impl From<String> for ArticleType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "feature" => Self::Feature,
            "opinion" => Self::Opinion,
            "sports" => Self::Sports,
            "newsandannouncements" => Self::NewsAndAnnouncements,
            _ => Self::Other(raw),
        }
    }
}

impl From<ArticleType> for String {
    fn from(kind: ArticleType) -> Self {
        kind.as_str().to_string()
    }
}

impl ArticleType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Feature => "feature",
            Self::Opinion => "opinion",
            Self::Sports => "sports",
            Self::NewsAndAnnouncements => "newsandannouncements",
            Self::Other(raw) => raw,
        }
    }

    /// Badge label shown on article cards, or `None` for the news feed
    /// type, which is never badged.
    pub fn label(&self) -> Option<String> {
        if *self == Self::NewsAndAnnouncements {
            return None;
        }
        let raw = self.as_str();
        let mut chars = raw.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().chain(chars).collect())
    }
}

/// Reference to an uploaded asset, either as a `_ref` (raw image field) or a
/// dereferenced `{ _id, url }` projection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AssetRef {
    #[serde(rename = "_ref", alias = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A CMS image field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ImageField {
    #[serde(default)]
    pub asset: Option<AssetRef>,
}

impl ImageField {
    /// The best source for URL building: the asset id when present (the CDN
    /// builder needs it for dimensions), else the resolved URL.
    pub fn source(&self) -> Option<&str> {
        let asset = self.asset.as_ref()?;
        asset.id.as_deref().or(asset.url.as_deref())
    }
}

/// One gallery entry on an article, in presentation order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "_type")]
pub enum MediaItem {
    #[serde(rename = "image")]
    Image {
        #[serde(rename = "_key", default)]
        key: String,
        #[serde(default)]
        url: Option<String>,
    },
    /// A video file with an optional poster thumbnail.
    #[serde(rename = "file")]
    Video {
        #[serde(rename = "_key", default)]
        key: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(rename = "thumbnailUrl", default)]
        thumbnail_url: Option<String>,
    },
}

impl MediaItem {
    pub fn key(&self) -> &str {
        match self {
            Self::Image { key, .. } | Self::Video { key, .. } => key,
        }
    }

    /// Primary URL: the image itself, or the video file.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Image { url, .. } | Self::Video { url, .. } => url.as_deref(),
        }
    }

    /// What to show as a still: the thumbnail if present, else the primary URL.
    pub fn display_source(&self) -> Option<&str> {
        match self {
            Self::Image { url, .. } => url.as_deref(),
            Self::Video {
                url, thumbnail_url, ..
            } => thumbnail_url.as_deref().or(url.as_deref()),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video { .. })
    }
}

/// A run of text inside a rich-text block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Span {
    #[serde(default)]
    pub text: String,
    /// Decorator names (`strong`, `em`, ...) or keys into the block's
    /// `markDefs`.
    #[serde(default)]
    pub marks: Vec<String>,
}

/// Annotation definition referenced from a span's marks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarkDef {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TextBlock {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(rename = "listItem", default)]
    pub list_item: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub children: Vec<Span>,
    #[serde(rename = "markDefs", default)]
    pub mark_defs: Vec<MarkDef>,
}

/// Rich-text body entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "_type")]
pub enum Block {
    #[serde(rename = "block")]
    Text(TextBlock),
    #[serde(rename = "image")]
    Image(ImageField),
    #[serde(other)]
    Unknown,
}

impl Block {
    /// Text of the first span, if this is a text block with any.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(block) => block.children.first().map(|s| s.text.as_str()),
            _ => None,
        }
    }
}

/// Contributor as credited on an article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InkerRef {
    pub name: String,
    pub username: Slug,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(rename = "profilePicture", default)]
    pub profile_picture: Option<ImageField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(rename = "linkName")]
    pub link_name: Slug,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub article_type: Option<ArticleType>,
    #[serde(rename = "inkersOnDuty", default, deserialize_with = "null_as_empty")]
    pub inkers_on_duty: Vec<InkerRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub media: Vec<MediaItem>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: Vec<Block>,
    #[serde(rename = "fbLink", default)]
    pub fb_link: Option<String>,
}

impl Article {
    pub fn credited_names(&self) -> Vec<&str> {
        self.inkers_on_duty.iter().map(|i| i.name.as_str()).collect()
    }
}

/// Contributor profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Inker {
    pub name: String,
    pub username: Slug,
    #[serde(rename = "profilePicture", default)]
    pub profile_picture: Option<ImageField>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PublishedPaper {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(rename = "linkName")]
    pub link_name: Slug,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Flipbook pages in reading order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pages: Vec<ImageField>,
}

/// Singleton editorial settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WebsiteSettings {
    #[serde(rename = "featuredArticles", default, deserialize_with = "null_as_empty")]
    pub featured_articles: Vec<Article>,
}

/// A search result, scored by the CMS.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "_type")]
pub enum SearchHit {
    #[serde(rename = "article")]
    Article(Article),
    #[serde(rename = "inker")]
    Inker(Inker),
}

/// The "for you" tab: curated features plus the latest non-featured articles.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ForYouFeed {
    #[serde(rename = "websiteSettings", default)]
    pub website_settings: Option<WebsiteSettings>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub response: Vec<Article>,
}

/// All homepage feeds, fetched in one request and kept for the page view.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HomeFeeds {
    #[serde(default)]
    pub foryou: ForYouFeed,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub newsandannouncements: Vec<Article>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub explore: Vec<Article>,
}

/// Title and slug of a document listed in the sitemap.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SitemapEntry {
    #[serde(rename = "_type")]
    pub kind: String,
    pub title: String,
    pub slug: Slug,
}

/// The CMS returns `null` for projected arrays that were never set.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
