//! Site configuration module.
//!
//! Handles loading, validating, and merging `site.toml`. Stock defaults are
//! the production values for The Maroon Ink; a user file only needs the keys
//! it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [cms]
//! project_id = "w7ogeebt"
//! dataset = "production"
//! api_version = "2025-12-25"
//! use_cdn = true                 # Read through the CDN query endpoint
//! token_env = "SANITY_AUTH_TOKEN" # Env var holding the write token (import only)
//!
//! [site]
//! base_url = "https://themaroon.ink"
//! public_dir = "public"          # Hosting root; pages land in public/<section>/
//! hosting_config = "firebase.json"
//! # templates_dir = "build"      # Overrides the built-in page templates
//!
//! [images]
//! placeholder = "/src/images/banner.jpg"
//! profile_placeholder = "/src/images/placeholder-profile.png"
//! max_visible_media = 5          # Gallery items before the "+N" badge
//!
//! [import]
//! posts = "fb_posts.json"
//! concurrency = 3                # Simultaneous asset uploads (1-10)
//! max_attempts = 3               # Upload attempts before giving up
//! throttle_ms = 200              # Pause between imported documents
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Content Repository connection.
    pub cms: CmsConfig,
    /// Output locations and public URL.
    pub site: SiteSettings,
    /// Image URL fallbacks and gallery layout.
    pub images: ImagesConfig,
    /// Scraped-post importer settings.
    pub import: ImportConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cms.project_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cms.project_id must not be empty".into(),
            ));
        }
        if self.cms.dataset.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cms.dataset must not be empty".into(),
            ));
        }
        if self.images.max_visible_media == 0 {
            return Err(ConfigError::Validation(
                "images.max_visible_media must be at least 1".into(),
            ));
        }
        if !(1..=10).contains(&self.import.concurrency) {
            return Err(ConfigError::Validation(
                "import.concurrency must be 1-10".into(),
            ));
        }
        if self.import.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "import.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CmsConfig {
    pub project_id: String,
    pub dataset: String,
    /// Dated API version, sent as `v<api_version>` in the request path.
    pub api_version: String,
    pub use_cdn: bool,
    /// Name of the environment variable that holds the write token.
    pub token_env: String,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            project_id: "w7ogeebt".to_string(),
            dataset: "production".to_string(),
            api_version: "2025-12-25".to_string(),
            use_cdn: true,
            token_env: "SANITY_AUTH_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Canonical origin used in SEO tags.
    pub base_url: String,
    pub public_dir: PathBuf,
    /// Hosting config holding the `hosting.rewrites` table.
    pub hosting_config: PathBuf,
    /// Directory with `article.html`, `inker.html`, `published-paper.html`.
    /// Missing files fall back to the built-in templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "https://themaroon.ink".to_string(),
            public_dir: PathBuf::from("public"),
            hosting_config: PathBuf::from("firebase.json"),
            templates_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Substituted whenever an image URL cannot be built.
    pub placeholder: String,
    pub profile_placeholder: String,
    pub max_visible_media: usize,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            placeholder: "/src/images/banner.jpg".to_string(),
            profile_placeholder: "/src/images/placeholder-profile.png".to_string(),
            max_visible_media: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub posts: PathBuf,
    pub concurrency: usize,
    pub max_attempts: usize,
    pub throttle_ms: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            posts: PathBuf::from("fb_posts.json"),
            concurrency: 3,
            max_attempts: 3,
            throttle_ms: 200,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, layered over stock defaults.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# The Maroon Ink build configuration
# ==================================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Content Repository
# ---------------------------------------------------------------------------
[cms]
project_id = "w7ogeebt"
dataset = "production"
api_version = "2025-12-25"
# Read queries through the CDN endpoint (apicdn.sanity.io).
use_cdn = true
# Environment variable holding the write token. Only `import` needs it.
token_env = "SANITY_AUTH_TOKEN"

# ---------------------------------------------------------------------------
# Site output
# ---------------------------------------------------------------------------
[site]
base_url = "https://themaroon.ink"
# Hosting root. Pages are written to public/articles/, public/inkers/, ...
public_dir = "public"
# Hosting config whose hosting.rewrites table maps clean URLs to pages.
hosting_config = "firebase.json"
# Directory holding article.html, inker.html and published-paper.html.
# Files that are missing fall back to the built-in templates.
# templates_dir = "build"

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Used whenever an image URL cannot be built.
placeholder = "/src/images/banner.jpg"
profile_placeholder = "/src/images/placeholder-profile.png"
# Gallery items shown before the "+N" badge.
max_visible_media = 5

# ---------------------------------------------------------------------------
# Importer
# ---------------------------------------------------------------------------
[import]
posts = "fb_posts.json"
# Simultaneous asset uploads (1-10).
concurrency = 3
# Attempts per upload, with exponential backoff between them.
max_attempts = 3
# Pause between imported documents, in milliseconds.
throttle_ms = 200
"##
}
