//! Scraped-post importer.
//!
//! Reads the posts a scraper left in `fb_posts.json`, drops duplicates, and
//! pushes each one into the Content Repository as an `article` document:
//!
//! ```text
//! fb_posts.json → dedupe → [upload image] → createOrReplace fb-post-<slug> → delete local image
//! ```
//!
//! ## Duplicates
//!
//! Scrapers see the same post more than once (shared, edited, re-fetched).
//! Two posts are the same when their titles match after normalization
//! (lowercase, alphanumerics only) and they were published in the same UTC
//! hour. The first occurrence wins. See [`fingerprint`].
//!
//! ## Concurrency and retry
//!
//! Posts are imported on a dedicated rayon pool of `import.concurrency`
//! workers. Each network call is retried with exponential backoff (backon)
//! up to `import.max_attempts` attempts in total, but only for transient
//! failures: transport errors, 429 and 5xx. A post that still fails is
//! reported and skipped; the rest of the import carries on.
//!
//! [`AssetStore`] is the seam to the write API. [`HttpAssetStore`] talks to
//! the CMS with a bearer token read from the environment.
//!
//! ## Undo
//!
//! Every imported document id starts with [`DOCUMENT_ID_PREFIX`], so
//! [`clean_import`] can delete all of them with one query without touching
//! articles written in the CMS.

use crate::config::{CmsConfig, ImportConfig};
use crate::types::Slug;
use backon::{BlockingRetryable, ExponentialBuilder};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Prefix of imported document ids.
pub const DOCUMENT_ID_PREFIX: &str = "fb-post-";

/// Every article the importer has written.
pub const IMPORTED_ARTICLES_QUERY: &str = r#"*[_type == "article" && _id match "fb-post-*"]"#;

const RETRY_MIN_DELAY: Duration = Duration::from_millis(500);
const UPLOAD_TIMEOUT_SECONDS: u64 = 120;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid posts file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content Repository returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Write token not set: export {0}")]
    MissingToken(String),
    #[error("Post \"{0}\" has no slug")]
    MissingSlug(String),
    #[error("Posts file not found: {0}")]
    PostsNotFound(PathBuf),
    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),
    #[error("Could not start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl ImportError {
    /// Whether trying again could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// =============================================================================
// Posts
// =============================================================================

/// One post as written by the scraper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScrapedPost {
    pub title: String,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub article_type: Option<String>,
    #[serde(rename = "linkName", default)]
    pub link_name: Option<Slug>,
    /// Rich-text body, passed through untouched.
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub image: Option<LocalImage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalImage {
    #[serde(rename = "localPath", default)]
    pub local_path: Option<PathBuf>,
}

impl ScrapedPost {
    pub fn slug(&self) -> Option<&str> {
        self.link_name
            .as_ref()
            .map(Slug::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image.as_ref()?.local_path.as_deref()
    }
}

pub fn load_posts(path: &Path) -> Result<Vec<ScrapedPost>, ImportError> {
    if !path.exists() {
        return Err(ImportError::PostsNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Identity of a post for duplicate detection: SHA-256 over the normalized
/// title and the UTC hour it was published in.
pub fn fingerprint(post: &ScrapedPost) -> String {
    let title: String = post
        .title
        .nfkd()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(post.published_at.format("%Y-%m-%dT%H").to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Drop later posts whose fingerprint was already seen.
///
/// Returns the kept posts in input order and the number dropped.
pub fn dedupe(posts: Vec<ScrapedPost>) -> (Vec<ScrapedPost>, usize) {
    let mut seen = HashSet::new();
    let before = posts.len();
    let kept: Vec<ScrapedPost> = posts
        .into_iter()
        .filter(|post| seen.insert(fingerprint(post)))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// The `article` document written for a post.
pub fn article_document(post: &ScrapedPost, slug: &str, asset_id: Option<&str>) -> Value {
    let mut doc = json!({
        "_id": format!("{DOCUMENT_ID_PREFIX}{slug}"),
        "_type": "article",
        "title": post.title,
        "publishedAt": post.published_at,
        "type": post.article_type,
        "linkName": {"_type": "slug", "current": slug},
        "body": post.body,
    });
    if let Some(id) = asset_id {
        doc["image"] = json!({
            "_type": "image",
            "asset": {"_type": "reference", "_ref": id}
        });
    }
    doc
}

// =============================================================================
// Asset store
// =============================================================================

/// Write side of the Content Repository.
pub trait AssetStore: Sync {
    /// Upload an image file; returns the new asset id.
    fn upload_image(&self, path: &Path, label: &str) -> Result<String, ImportError>;
    /// Create or overwrite a document by its `_id`; returns that id.
    fn create_or_replace(&self, document: &Value) -> Result<String, ImportError>;
    /// Delete every document matching a GROQ query; returns how many.
    fn delete_by_query(&self, query: &str) -> Result<usize, ImportError>;
}

/// Blocking client for the CMS assets and mutation endpoints.
pub struct HttpAssetStore {
    client: reqwest::blocking::Client,
    token: String,
    api_base: Url,
    dataset: String,
}

impl HttpAssetStore {
    /// Reads the write token from the environment variable named by
    /// `cms.token_env`.
    pub fn new(config: &CmsConfig) -> Result<Self, ImportError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ImportError::MissingToken(config.token_env.clone()))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECONDS))
            .build()?;
        Ok(Self {
            client,
            token,
            api_base: api_base(config)?,
            dataset: config.dataset.clone(),
        })
    }

    fn check(response: reqwest::blocking::Response) -> Result<Value, ImportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&response.text()?)
    }

    fn mutate(&self, mutations: Value) -> Result<Value, ImportError> {
        let url = self
            .api_base
            .join(&format!("data/mutate/{}", self.dataset))?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "mutations": mutations }))
            .send()?;
        Self::check(response)
    }
}

/// Decode a successful response body. The write already happened, so a body
/// we cannot read is not worth retrying.
fn parse_response(body: &str) -> Result<Value, ImportError> {
    serde_json::from_str(body).map_err(|e| ImportError::UnexpectedResponse(format!("{e}: {body}")))
}

impl AssetStore for HttpAssetStore {
    fn upload_image(&self, path: &Path, label: &str) -> Result<String, ImportError> {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = asset_upload_url(&self.api_base, &self.dataset, &filename, label)?;
        let bytes = std::fs::read(path)?;
        debug!(file = %filename, size = bytes.len(), "uploading image");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(bytes)
            .send()?;
        let body = Self::check(response)?;
        body.pointer("/document/_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ImportError::UnexpectedResponse(body.to_string()))
    }

    fn create_or_replace(&self, document: &Value) -> Result<String, ImportError> {
        let body = self.mutate(json!([{ "createOrReplace": document }]))?;
        body.pointer("/results/0/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ImportError::UnexpectedResponse(body.to_string()))
    }

    fn delete_by_query(&self, query: &str) -> Result<usize, ImportError> {
        let body = self.mutate(json!([{ "delete": { "query": query } }]))?;
        body.get("results")
            .and_then(Value::as_array)
            .map(Vec::len)
            .ok_or_else(|| ImportError::UnexpectedResponse(body.to_string()))
    }
}

/// `https://<project>.api.sanity.io/v<version>/`. Writes never go through
/// the CDN.
pub fn api_base(config: &CmsConfig) -> Result<Url, ImportError> {
    Ok(Url::parse(&format!(
        "https://{}.api.sanity.io/v{}/",
        config.project_id, config.api_version
    ))?)
}

pub fn asset_upload_url(
    api_base: &Url,
    dataset: &str,
    filename: &str,
    label: &str,
) -> Result<Url, ImportError> {
    let mut url = api_base.join(&format!("assets/images/{dataset}"))?;
    url.query_pairs_mut()
        .append_pair("filename", filename)
        .append_pair("label", label);
    Ok(url)
}

// =============================================================================
// Import run
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Worker threads.
    pub concurrency: usize,
    /// Attempts per network call, first one included.
    pub max_attempts: usize,
    /// Pause after each imported document, per worker.
    pub throttle: Duration,
    /// First backoff delay; doubles on every retry.
    pub retry_delay: Duration,
}

impl ImportOptions {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            max_attempts: config.max_attempts,
            throttle: Duration::from_millis(config.throttle_ms),
            retry_delay: RETRY_MIN_DELAY,
        }
    }
}

/// Progress events sent while importing.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    Started {
        total: usize,
        duplicates: usize,
        workers: usize,
    },
    /// The post names an image that is not on disk. It is imported without one.
    ImageMissing {
        index: usize,
        path: PathBuf,
    },
    Imported {
        index: usize,
        title: String,
        document_id: String,
        asset_id: Option<String>,
    },
    Failed {
        index: usize,
        title: String,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// Posts left after dedupe.
    pub total: usize,
    pub duplicates: usize,
    pub imported: usize,
    pub failed: usize,
}

/// Import `posts` through `store`.
///
/// Per-post failures are sent as [`ImportEvent::Failed`] and counted; only
/// failing to start the worker pool is an `Err`.
pub fn run_import(
    store: &dyn AssetStore,
    posts: Vec<ScrapedPost>,
    options: &ImportOptions,
    events: Option<Sender<ImportEvent>>,
) -> Result<ImportSummary, ImportError> {
    let (posts, duplicates) = dedupe(posts);
    let total = posts.len();
    let workers = options.concurrency.max(1);
    send(
        &events,
        ImportEvent::Started {
            total,
            duplicates,
            workers,
        },
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    let imported = pool.install(|| {
        posts
            .par_iter()
            .enumerate()
            .map(|(i, post)| {
                let index = i + 1;
                match import_post(store, post, index, options, &events) {
                    Ok((document_id, asset_id)) => {
                        send(
                            &events,
                            ImportEvent::Imported {
                                index,
                                title: post.title.clone(),
                                document_id,
                                asset_id,
                            },
                        );
                        std::thread::sleep(options.throttle);
                        true
                    }
                    Err(e) => {
                        warn!(title = %post.title, error = %e, "post import failed");
                        send(
                            &events,
                            ImportEvent::Failed {
                                index,
                                title: post.title.clone(),
                                error: e.to_string(),
                            },
                        );
                        false
                    }
                }
            })
            .filter(|ok| *ok)
            .count()
    });

    Ok(ImportSummary {
        total,
        duplicates,
        imported,
        failed: total - imported,
    })
}

/// Upload, write, clean up. Returns `(document_id, asset_id)`.
fn import_post(
    store: &dyn AssetStore,
    post: &ScrapedPost,
    index: usize,
    options: &ImportOptions,
    events: &Option<Sender<ImportEvent>>,
) -> Result<(String, Option<String>), ImportError> {
    let slug = post
        .slug()
        .ok_or_else(|| ImportError::MissingSlug(post.title.clone()))?;

    let image = match post.image_path() {
        Some(path) if path.is_file() => Some(path),
        Some(path) => {
            send(
                events,
                ImportEvent::ImageMissing {
                    index,
                    path: path.to_path_buf(),
                },
            );
            None
        }
        None => None,
    };

    let asset_id = match image {
        Some(path) => {
            let label = format!("Facebook Import: {slug}");
            Some(with_retry(options, "image upload", || {
                store.upload_image(path, &label)
            })?)
        }
        None => None,
    };

    let document = article_document(post, slug, asset_id.as_deref());
    let document_id = with_retry(options, "document write", || {
        store.create_or_replace(&document)
    })?;

    if let Some(path) = image {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed local image"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove local image"),
        }
    }
    Ok((document_id, asset_id))
}

/// Delete every article a previous import wrote. Returns how many went.
pub fn clean_import(store: &dyn AssetStore, options: &ImportOptions) -> Result<usize, ImportError> {
    let deleted = with_retry(options, "cleanup", || {
        store.delete_by_query(IMPORTED_ARTICLES_QUERY)
    })?;
    info!(deleted, "removed imported articles");
    Ok(deleted)
}

fn with_retry<T>(
    options: &ImportOptions,
    what: &str,
    op: impl FnMut() -> Result<T, ImportError>,
) -> Result<T, ImportError> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(options.retry_delay)
        .with_max_times(options.max_attempts.saturating_sub(1));
    op.retry(backoff)
        .sleep(std::thread::sleep)
        .when(ImportError::is_transient)
        .notify(|err, delay| warn!(%what, error = %err, ?delay, "retrying"))
        .call()
}

fn send(events: &Option<Sender<ImportEvent>>, event: ImportEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}
