//! Query layer over the Content Repository.
//!
//! Every page kind has one GROQ query with a fixed projection. User input
//! (slugs, search terms) travels as `$param` values next to the query text and
//! is never spliced into it.
//!
//! [`ContentSource`] is the seam between the query text and the network: the
//! build and the navigator only see typed helpers such as [`fetch_article`],
//! and tests swap in a canned source. [`HttpContentSource`] is the real one:
//! one blocking GET per query against the CMS HTTP API.
//!
//! ## Empty vs failed
//!
//! A lookup that matches nothing is `Ok(None)` (or an empty `Vec`). Only a
//! transport failure, a non-2xx status, or a result that does not decode into
//! the expected shape is an `Err`.

use crate::config::CmsConfig;
use crate::types::{
    Article, HomeFeeds, Inker, PublishedPaper, SearchHit, SitemapEntry, WebsiteSettings,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

const TIMEOUT_SECONDS: u64 = 60;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content Repository returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected {kind:?} result: {source}")]
    Decode {
        kind: PageKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid query URL: {0}")]
    Url(#[from] url::ParseError),
}

/// What a query is for. Used to pick fixtures in tests and label errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    ArticleList,
    SingleArticle,
    SingleInker,
    SinglePublishedPaper,
    Search,
    Settings,
    InkerList,
    InkerArticles,
    PublishedPaperList,
    HomeFeeds,
    Archives,
    Staff,
    SitemapEntries,
}

// GROQ fragments shared by several queries. Macros so they can be spliced
// with `concat!` at compile time.
macro_rules! media_projection {
    () => {
        r#"media[] {
        _type,
        _key,
        _type == 'image' => { "url": asset->url },
        _type == 'file' => { "url": asset->url, "thumbnailUrl": thumbnail.asset->url }
    }"#
    };
}

macro_rules! card_projection {
    () => {
        concat!(
            r#"{
    title,
    subtitle,
    "linkName": linkName.current,
    publishedAt,
    type,
    "#,
            media_projection!(),
            r#",
    body
}"#
        )
    };
}

macro_rules! article_projection {
    () => {
        concat!(
            r#"{
    title,
    subtitle,
    "linkName": linkName.current,
    publishedAt,
    type,
    "inkersOnDuty": inkersOnDuty[]->{ name, username, role, profilePicture },
    "#,
            media_projection!(),
            r#",
    body,
    fbLink
}"#
        )
    };
}

macro_rules! inker_projection {
    () => {
        r#"{ name, username, profilePicture, role, bio }"#
    };
}

macro_rules! paper_projection {
    () => {
        r#"{
    title,
    subtitle,
    "linkName": linkName.current,
    publishedAt,
    pages[] { asset->{ _id, url } }
}"#
    };
}

macro_rules! not_featured {
    () => {
        r#"!(_id in *[_type == "websiteSettings"][0].featuredArticles[]._ref)"#
    };
}

const ARTICLES_GROQ: &str = concat!(
    r#"*[_type == "article" && defined(linkName.current)] | order(publishedAt desc) "#,
    article_projection!()
);

const ARTICLE_GROQ: &str = concat!(
    r#"*[_type == "article" && linkName.current == $slug][0] "#,
    article_projection!()
);

const INKERS_GROQ: &str = concat!(
    r#"*[_type == "inker" && defined(username.current)] | order(name asc) "#,
    inker_projection!()
);

const INKER_GROQ: &str = concat!(
    r#"*[_type == "inker" && username.current == $username][0] "#,
    inker_projection!()
);

const INKER_ARTICLES_GROQ: &str = concat!(
    r#"{
    "inker": *[_type == "inker" && username.current == $username][0] "#,
    inker_projection!(),
    r#",
    "articles": *[_type == "article" && $username in inkersOnDuty[]->username.current]
        | order(publishedAt desc) "#,
    card_projection!(),
    r#"
}"#
);

const PAPERS_GROQ: &str = concat!(
    r#"*[_type == "publishedPaper" && defined(linkName.current)] | order(publishedAt desc) "#,
    paper_projection!()
);

const PAPER_GROQ: &str = concat!(
    r#"*[_type == "publishedPaper" && linkName.current == $slug][0] "#,
    paper_projection!()
);

const SETTINGS_GROQ: &str = concat!(
    r#"*[_type == "websiteSettings"][0] {
    "featuredArticles": featuredArticles[]-> "#,
    card_projection!(),
    r#"
}"#
);

const HOME_FEEDS_GROQ: &str = concat!(
    r#"{
    "foryou": {
        "websiteSettings": *[_type == "websiteSettings"][0] {
            "featuredArticles": featuredArticles[]-> "#,
    card_projection!(),
    r#"
        },
        "response": *[_type == "article" && "#,
    not_featured!(),
    r#"] | order(publishedAt desc)[0...7] "#,
    card_projection!(),
    r#"
    },
    "newsandannouncements": *[_type == "article" && type == "newsandannouncements"]
        | order(publishedAt desc)[0...10] "#,
    card_projection!(),
    r#",
    "explore": *[_type == "article" && type != "newsandannouncements" && "#,
    not_featured!(),
    r#"] | order(publishedAt desc)[0...10] "#,
    card_projection!(),
    r#"
}"#
);

const ARCHIVES_GROQ: &str = concat!(
    r#"*[_type == "article" && defined(linkName.current)] | order(publishedAt desc) "#,
    card_projection!()
);

const STAFF_GROQ: &str = concat!(
    r#"{
    "Editor in Chief": *[_type == "inker" && role match "editor in chief"] "#,
    inker_projection!(),
    r#",
    "Associate Editor": *[_type == "inker" && role match "associate editor"] "#,
    inker_projection!(),
    r#",
    "Editorial Board": *[_type == "inker" && !(role match "editor in chief")
        && !(role match "associate editor")
        && (role match "lead" || role match "editor" || role match "manager")]
        | order(lower(role) asc) "#,
    inker_projection!(),
    r#",
    "Members": *[_type == "inker"
        && !(role match "lead" || role match "editor" || role match "manager" || role match "adviser")]
        | order(lower(role) asc) "#,
    inker_projection!(),
    r#",
    "Adviser": *[_type == "inker" && role match "adviser"] "#,
    inker_projection!(),
    r#"
}"#
);

const SEARCH_GROQ: &str = concat!(
    r#"*[
    (_type == "article" || _type == "inker") &&
    (title match "*" + $searchQuery + "*" ||
     subtitle match "*" + $searchQuery + "*" ||
     name match "*" + $searchQuery + "*" ||
     "*" + body[].children[].text match $searchQuery + "*" ||
     "*" + role match $searchQuery + "*")
] {
    _type == "article" => {
        "_type": "article",
        title,
        subtitle,
        "linkName": linkName.current,
        publishedAt,
        type,
        "#,
    media_projection!(),
    r#",
        body,
        "relevance": select(
            title match $searchQuery => 100,
            subtitle match $searchQuery => 90,
            string::startsWith(lower(title), lower($searchQuery)) => 86,
            string::startsWith(lower(subtitle), lower($searchQuery)) => 83,
            title match $searchQuery + "*" => 80,
            subtitle match $searchQuery + "*" => 70,
            title match "*" + $searchQuery + "*" => 60,
            subtitle match "*" + $searchQuery + "*" => 50,
            0
        )
    },
    _type == "inker" => {
        "_type": "inker",
        name,
        username,
        profilePicture,
        role,
        bio,
        "relevance": select(
            name match $searchQuery => 100,
            string::startsWith(lower(name), lower($searchQuery)) => 86,
            string::startsWith(lower(role), lower($searchQuery)) => 83,
            name match $searchQuery + "*" => 81,
            role match $searchQuery => 80,
            name match "*" + $searchQuery + "*" => 70,
            role match $searchQuery + "*" => 60,
            role match "*" + $searchQuery + "*" => 50,
            0
        )
    }
} | order(relevance desc, name asc, publishedAt desc)"#
);

const SITEMAP_GROQ: &str = r#"*[_type in ["inker", "article"]] {
    _type,
    "title": select(_type == "article" => title, _type == "inker" => name),
    "slug": select(_type == "article" => linkName.current, _type == "inker" => username.current)
}[defined(slug)] | order(title asc)"#;

/// Staff page groups, in display order.
pub const STAFF_GROUPS: &[&str] = &[
    "Editor in Chief",
    "Associate Editor",
    "Editorial Board",
    "Members",
    "Adviser",
];

/// A parametrized query against the Content Repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: PageKind,
    pub groq: &'static str,
    /// Sent as `$name` parameters, JSON-encoded.
    pub params: Map<String, Value>,
}

impl Query {
    fn new(kind: PageKind, groq: &'static str) -> Self {
        Self {
            kind,
            groq,
            params: Map::new(),
        }
    }

    fn param(mut self, name: &str, value: &str) -> Self {
        self.params
            .insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn articles() -> Self {
        Self::new(PageKind::ArticleList, ARTICLES_GROQ)
    }

    pub fn article(slug: &str) -> Self {
        Self::new(PageKind::SingleArticle, ARTICLE_GROQ).param("slug", slug)
    }

    pub fn inkers() -> Self {
        Self::new(PageKind::InkerList, INKERS_GROQ)
    }

    pub fn inker(username: &str) -> Self {
        Self::new(PageKind::SingleInker, INKER_GROQ).param("username", username)
    }

    pub fn inker_articles(username: &str) -> Self {
        Self::new(PageKind::InkerArticles, INKER_ARTICLES_GROQ).param("username", username)
    }

    pub fn published_papers() -> Self {
        Self::new(PageKind::PublishedPaperList, PAPERS_GROQ)
    }

    pub fn published_paper(slug: &str) -> Self {
        Self::new(PageKind::SinglePublishedPaper, PAPER_GROQ).param("slug", slug)
    }

    pub fn search(term: &str) -> Self {
        Self::new(PageKind::Search, SEARCH_GROQ).param("searchQuery", term)
    }

    pub fn settings() -> Self {
        Self::new(PageKind::Settings, SETTINGS_GROQ)
    }

    pub fn home_feeds() -> Self {
        Self::new(PageKind::HomeFeeds, HOME_FEEDS_GROQ)
    }

    pub fn archives() -> Self {
        Self::new(PageKind::Archives, ARCHIVES_GROQ)
    }

    pub fn staff() -> Self {
        Self::new(PageKind::Staff, STAFF_GROQ)
    }

    pub fn sitemap_entries() -> Self {
        Self::new(PageKind::SitemapEntries, SITEMAP_GROQ)
    }
}

/// Anything that can answer a [`Query`] with the raw `result` JSON.
pub trait ContentSource {
    fn fetch(&self, query: &Query) -> Result<Value, CmsError>;
}

/// Response envelope of the query endpoint.
#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

/// Blocking HTTP client for the CMS query API.
pub struct HttpContentSource {
    client: reqwest::blocking::Client,
    endpoint: Url,
}

impl HttpContentSource {
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()?;
        Ok(Self {
            client,
            endpoint: query_endpoint(config)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL for `query`: the GROQ text plus one `$name` pair per
    /// parameter.
    pub fn query_url(&self, query: &Query) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query.groq);
            for (name, value) in &query.params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }
        url
    }
}

impl ContentSource for HttpContentSource {
    fn fetch(&self, query: &Query) -> Result<Value, CmsError> {
        let url = self.query_url(query);
        debug!(kind = ?query.kind, params = ?query.params, "querying content repository");

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CmsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: QueryResponse = response.json()?;
        Ok(envelope.result)
    }
}

/// `https://<project>.api[cdn].sanity.io/v<version>/data/query/<dataset>`
pub fn query_endpoint(config: &CmsConfig) -> Result<Url, CmsError> {
    let host = if config.use_cdn { "apicdn" } else { "api" };
    let url = Url::parse(&format!(
        "https://{}.{}.sanity.io/v{}/data/query/{}",
        config.project_id, host, config.api_version, config.dataset
    ))?;
    Ok(url)
}

fn fetch_as<T: DeserializeOwned>(source: &dyn ContentSource, query: Query) -> Result<T, CmsError> {
    let value = source.fetch(&query)?;
    serde_json::from_value(value).map_err(|source| CmsError::Decode {
        kind: query.kind,
        source,
    })
}

/// `null` (nothing matched) decodes to an empty list.
fn fetch_list<T: DeserializeOwned>(
    source: &dyn ContentSource,
    query: Query,
) -> Result<Vec<T>, CmsError> {
    Ok(fetch_as::<Option<Vec<T>>>(source, query)?.unwrap_or_default())
}

// =============================================================================
// Typed helpers
// =============================================================================

/// Every article with a slug, newest first, with full page projection.
pub fn fetch_articles(source: &dyn ContentSource) -> Result<Vec<Article>, CmsError> {
    fetch_list(source, Query::articles())
}

pub fn fetch_article(source: &dyn ContentSource, slug: &str) -> Result<Option<Article>, CmsError> {
    fetch_as(source, Query::article(slug))
}

pub fn fetch_inkers(source: &dyn ContentSource) -> Result<Vec<Inker>, CmsError> {
    fetch_list(source, Query::inkers())
}

pub fn fetch_inker(source: &dyn ContentSource, username: &str) -> Result<Option<Inker>, CmsError> {
    fetch_as(source, Query::inker(username))
}

/// A contributor and the articles crediting them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InkerProfile {
    pub inker: Inker,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// `None` when no inker has that username.
pub fn fetch_inker_articles(
    source: &dyn ContentSource,
    username: &str,
) -> Result<Option<InkerProfile>, CmsError> {
    #[derive(Deserialize)]
    struct Raw {
        inker: Option<Inker>,
        #[serde(default)]
        articles: Option<Vec<Article>>,
    }
    let raw: Raw = fetch_as(source, Query::inker_articles(username))?;
    Ok(raw.inker.map(|inker| InkerProfile {
        inker,
        articles: raw.articles.unwrap_or_default(),
    }))
}

pub fn fetch_published_papers(source: &dyn ContentSource) -> Result<Vec<PublishedPaper>, CmsError> {
    fetch_list(source, Query::published_papers())
}

pub fn fetch_published_paper(
    source: &dyn ContentSource,
    slug: &str,
) -> Result<Option<PublishedPaper>, CmsError> {
    fetch_as(source, Query::published_paper(slug))
}

/// Articles and inkers matching `term`, most relevant first.
///
/// A blank term matches nothing and issues no request.
pub fn search(source: &dyn ContentSource, term: &str) -> Result<Vec<SearchHit>, CmsError> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    fetch_list(source, Query::search(term))
}

/// Site settings; defaults when the singleton was never created.
pub fn fetch_settings(source: &dyn ContentSource) -> Result<WebsiteSettings, CmsError> {
    Ok(fetch_as::<Option<WebsiteSettings>>(source, Query::settings())?.unwrap_or_default())
}

pub fn fetch_home_feeds(source: &dyn ContentSource) -> Result<HomeFeeds, CmsError> {
    fetch_as(source, Query::home_feeds())
}

/// All articles, newest first, with card projection.
pub fn fetch_archives(source: &dyn ContentSource) -> Result<Vec<Article>, CmsError> {
    fetch_list(source, Query::archives())
}

/// One staff page section.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffGroup {
    pub title: &'static str,
    pub members: Vec<Inker>,
}

/// Staff grouped by role, in [`STAFF_GROUPS`] order. Empty groups are kept.
pub fn fetch_staff(source: &dyn ContentSource) -> Result<Vec<StaffGroup>, CmsError> {
    let mut raw: Map<String, Value> = fetch_as(source, Query::staff())?;
    STAFF_GROUPS
        .iter()
        .map(|title| {
            let members = match raw.remove(*title) {
                Some(Value::Null) | None => Vec::new(),
                Some(value) => serde_json::from_value(value).map_err(|source| CmsError::Decode {
                    kind: PageKind::Staff,
                    source,
                })?,
            };
            Ok(StaffGroup {
                title: *title,
                members,
            })
        })
        .collect()
}

pub fn fetch_sitemap_entries(source: &dyn ContentSource) -> Result<Vec<SitemapEntry>, CmsError> {
    fetch_list(source, Query::sitemap_entries())
}
