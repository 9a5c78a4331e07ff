//! Shared test utilities.
//!
//! Provides a canned [`ContentSource`], record builders with predictable
//! values, and the JSON shapes the CMS returns for them.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = FixtureSource::new()
//!     .with(PageKind::SingleArticle, article_json("my-article"));
//! let article = fetch_article(&source, "my-article").unwrap().unwrap();
//! assert_eq!(source.requests(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::{Value, json};

use crate::assemble::PageContext;
use crate::cms::{CmsError, ContentSource, PageKind, Query};
use crate::imaging::ImageUrlBuilder;
use crate::types::{
    Article, AssetRef, Block, ImageField, Inker, InkerRef, PublishedPaper, Slug, Span, TextBlock,
};

// =========================================================================
// Content source
// =========================================================================

/// Answers queries from canned JSON keyed by [`PageKind`].
///
/// Kinds without a fixture fail with a 503, so a test that forgets one sees
/// the same error a build would on a broken network.
#[derive(Default)]
pub struct FixtureSource {
    fixtures: HashMap<PageKind, Value>,
    log: Mutex<Vec<Query>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: PageKind, value: Value) -> Self {
        self.fixtures.insert(kind, value);
        self
    }

    /// Number of queries answered or refused so far.
    pub fn requests(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<Query> {
        self.log.lock().unwrap().clone()
    }
}

impl ContentSource for FixtureSource {
    fn fetch(&self, query: &Query) -> Result<Value, CmsError> {
        self.log.lock().unwrap().push(query.clone());
        self.fixtures
            .get(&query.kind)
            .cloned()
            .ok_or_else(|| CmsError::Status {
                status: 503,
                body: format!("no fixture for {:?}", query.kind),
            })
    }
}

// =========================================================================
// Record builders
// =========================================================================

/// 2025-03-04 10:00 UTC, the publish time of every sample record.
pub fn sample_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap()
}

/// Assembly context with a `proj/production` image builder and UTC dates.
pub fn test_context() -> PageContext {
    PageContext {
        base_url: "https://themaroon.ink".to_string(),
        images: ImageUrlBuilder::new("proj", "production"),
        max_visible_media: 5,
        time_zone: FixedOffset::east_opt(0).unwrap(),
    }
}

pub fn text_block(text: &str) -> Block {
    Block::Text(TextBlock {
        style: Some("normal".to_string()),
        children: vec![Span {
            text: text.to_string(),
            marks: Vec::new(),
        }],
        ..TextBlock::default()
    })
}

/// Image field pointing at an asset id such as `image-abc-100x200-jpg`.
pub fn image_field(asset_id: &str) -> ImageField {
    ImageField {
        asset: Some(AssetRef {
            id: Some(asset_id.to_string()),
            url: None,
        }),
    }
}

/// Article credited to Jane Doe, no subtitle, no media, two-sentence body.
pub fn sample_article(slug: &str) -> Article {
    Article {
        title: format!("Article {slug}"),
        subtitle: None,
        link_name: Slug(slug.to_string()),
        published_at: sample_time(),
        article_type: None,
        inkers_on_duty: vec![InkerRef {
            name: "Jane Doe".to_string(),
            username: Slug("jane-doe".to_string()),
            role: Some("Editor".to_string()),
            profile_picture: None,
        }],
        media: Vec::new(),
        body: vec![text_block("First sentence. Second sentence.")],
        fb_link: None,
    }
}

/// Jane Doe, Editor, without a profile picture.
pub fn sample_inker(username: &str) -> Inker {
    Inker {
        name: "Jane Doe".to_string(),
        username: Slug(username.to_string()),
        profile_picture: None,
        role: Some("Editor".to_string()),
        bio: Some("Writes things.".to_string()),
    }
}

/// "Issue One" with `pages` CDN page scans.
pub fn sample_paper(slug: &str, pages: usize) -> PublishedPaper {
    PublishedPaper {
        title: "Issue One".to_string(),
        subtitle: None,
        link_name: Slug(slug.to_string()),
        published_at: Some(sample_time()),
        pages: (0..pages)
            .map(|i| ImageField {
                asset: Some(AssetRef {
                    id: None,
                    url: Some(format!(
                        "https://cdn.sanity.io/images/proj/production/p{i}-1000x1400.jpg"
                    )),
                }),
            })
            .collect(),
    }
}

// =========================================================================
// CMS JSON shapes
// =========================================================================

/// [`sample_article`] as the query endpoint returns it.
pub fn article_json(slug: &str) -> Value {
    json!({
        "_type": "article",
        "title": format!("Article {slug}"),
        "subtitle": null,
        "linkName": slug,
        "publishedAt": "2025-03-04T10:00:00Z",
        "type": null,
        "inkersOnDuty": [{
            "name": "Jane Doe",
            "username": {"_type": "slug", "current": "jane-doe"},
            "role": "Editor",
            "profilePicture": null
        }],
        "media": null,
        "body": [{
            "_type": "block",
            "style": "normal",
            "markDefs": [],
            "children": [{"_type": "span", "text": "First sentence. Second sentence.", "marks": []}]
        }],
        "fbLink": null
    })
}

/// [`sample_inker`] as the query endpoint returns it.
pub fn inker_json(username: &str) -> Value {
    json!({
        "_type": "inker",
        "name": "Jane Doe",
        "username": {"_type": "slug", "current": username},
        "profilePicture": null,
        "role": "Editor",
        "bio": "Writes things."
    })
}

pub fn paper_json(slug: &str) -> Value {
    json!({
        "title": "Issue One",
        "subtitle": null,
        "linkName": slug,
        "publishedAt": "2025-03-04T10:00:00Z",
        "pages": [
            {"asset": {"_id": "image-p0-1000x1400-jpg", "url": "https://cdn.sanity.io/images/proj/production/p0-1000x1400.jpg"}}
        ]
    })
}
