//! Static page emission.
//!
//! Turns one site section (articles, inkers, published papers) into flat
//! HTML files and points the hosting rewrite table at them.
//!
//! ## Output Structure
//!
//! ```text
//! public/
//! ├── articles/
//! │   ├── my-article.html
//! │   └── ...
//! ├── inkers/
//! │   └── jane-doe.html
//! └── published-papers/
//!     └── issue-1.html
//! firebase.json          # hosting.rewrites: /articles/my-article → /articles/my-article.html
//! ```
//!
//! ## Rewrite replacement
//!
//! A section owns every rewrite whose `destination` starts with its prefix
//! (`/articles/`, ...). Each run drops all of them and puts the fresh list
//! first, followed by the untouched remainder in its original order. Every
//! other key of the hosting config is written back as it was read.
//!
//! Pages are written before the manifest. A failure halfway leaves the files
//! already written in place and the manifest unchanged.

use crate::assemble::PageContext;
use crate::cms::{self, CmsError, ContentSource};
use crate::config::SiteConfig;
use crate::template::{Replacements, Template, TemplateError, TemplateKind, unresolved_tokens};
use crate::types::Slug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Query failed: {0}")]
    Cms(#[from] CmsError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Hosting config not found: {0}")]
    ManifestNotFound(PathBuf),
    #[error("Hosting config {0} has no hosting.rewrites array")]
    MissingRewrites(PathBuf),
    #[error("Slug {0:?} cannot be used as a file name")]
    InvalidSlug(String),
}

/// A statically generated site section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Articles,
    Inkers,
    PublishedPapers,
}

impl Section {
    pub const ALL: [Section; 3] = [Self::Articles, Self::Inkers, Self::PublishedPapers];

    /// Directory under the public root, also the URL path segment.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Articles => "articles",
            Self::Inkers => "inkers",
            Self::PublishedPapers => "published-papers",
        }
    }

    /// Destination prefix identifying this section's rewrites.
    pub fn prefix(self) -> String {
        format!("/{}/", self.dir_name())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Articles => "Articles",
            Self::Inkers => "Inkers",
            Self::PublishedPapers => "Published papers",
        }
    }

    fn template_kind(self) -> TemplateKind {
        match self {
            Self::Articles => TemplateKind::Article,
            Self::Inkers => TemplateKind::Inker,
            Self::PublishedPapers => TemplateKind::PublishedPaper,
        }
    }
}

/// One rendered page, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub slug: Slug,
    pub title: String,
    pub html: String,
}

/// A `{source, destination}` pair in `hosting.rewrites`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub source: String,
    pub destination: String,
}

impl Rewrite {
    /// `/articles/<slug>` → `/articles/<slug>.html`
    pub fn for_page(section: Section, slug: &Slug) -> Self {
        let source = format!("{}{}", section.prefix(), slug);
        Self {
            destination: format!("{source}.html"),
            source,
        }
    }
}

/// What one section run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitReport {
    pub section: Section,
    /// `(title, file name)` in write order.
    pub pages: Vec<(String, String)>,
    pub rewrites_removed: usize,
    pub hosting_config: PathBuf,
}

// =============================================================================
// Rendering
// =============================================================================

/// Fetch a section's records and render each one into its page template.
pub fn render_section(
    section: Section,
    source: &dyn ContentSource,
    ctx: &PageContext,
    templates_dir: Option<&Path>,
) -> Result<Vec<RenderedPage>, EmitError> {
    let template = Template::load(section.template_kind(), templates_dir)?;
    let pages: Vec<(Slug, String, Replacements)> = match section {
        Section::Articles => cms::fetch_articles(source)?
            .into_iter()
            .map(|a| {
                let tokens = ctx.article_page(&a);
                (a.link_name, a.title, tokens)
            })
            .collect(),
        Section::Inkers => cms::fetch_inkers(source)?
            .into_iter()
            .map(|i| {
                let tokens = ctx.inker_page(&i);
                (i.username, i.name, tokens)
            })
            .collect(),
        Section::PublishedPapers => cms::fetch_published_papers(source)?
            .into_iter()
            .map(|p| {
                let tokens = ctx.published_paper_page(&p);
                (p.link_name, p.title, tokens)
            })
            .collect(),
    };

    Ok(pages
        .into_iter()
        .map(|(slug, title, tokens)| {
            let html = template.render(&tokens);
            let leftover = unresolved_tokens(&html);
            if !leftover.is_empty() {
                debug!(%slug, ?leftover, "page has unresolved tokens");
            }
            RenderedPage { slug, title, html }
        })
        .collect())
}

// =============================================================================
// Writing
// =============================================================================

/// Write `pages` under `<public_dir>/<section>/` and replace the section's
/// rewrites in the hosting config.
pub fn emit_section(
    section: Section,
    pages: &[RenderedPage],
    public_dir: &Path,
    hosting_config: &Path,
) -> Result<EmitReport, EmitError> {
    // Load first so a broken hosting config fails before any file is written.
    let mut manifest = HostingManifest::load(hosting_config)?;

    let out_dir = public_dir.join(section.dir_name());
    fs::create_dir_all(&out_dir)?;

    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let file_name = page_file_name(&page.slug)?;
        fs::write(out_dir.join(&file_name), &page.html)?;
        debug!(file = %file_name, "wrote page");
        written.push((page.title.clone(), file_name));
    }

    let rewrites: Vec<Rewrite> = pages
        .iter()
        .map(|p| Rewrite::for_page(section, &p.slug))
        .collect();
    let removed = manifest.replace_section(section, &rewrites)?;
    manifest.save()?;
    info!(
        section = section.dir_name(),
        pages = written.len(),
        removed,
        "hosting rewrites updated"
    );

    Ok(EmitReport {
        section,
        pages: written,
        rewrites_removed: removed,
        hosting_config: hosting_config.to_path_buf(),
    })
}

/// Render and emit one section with paths from the site config.
pub fn build_section(
    section: Section,
    source: &dyn ContentSource,
    config: &SiteConfig,
) -> Result<EmitReport, EmitError> {
    let ctx = PageContext::from_config(config);
    let pages = render_section(section, source, &ctx, config.site.templates_dir.as_deref())?;
    emit_section(
        section,
        &pages,
        &config.site.public_dir,
        &config.site.hosting_config,
    )
}

/// `<slug>.html`, refusing slugs that would escape the section directory.
fn page_file_name(slug: &Slug) -> Result<String, EmitError> {
    let s = slug.as_str();
    if s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\']) {
        return Err(EmitError::InvalidSlug(s.to_string()));
    }
    Ok(format!("{s}.html"))
}

// =============================================================================
// Hosting manifest
// =============================================================================

/// The hosting config file, kept as a JSON tree so unknown keys survive.
#[derive(Debug, Clone)]
pub struct HostingManifest {
    path: PathBuf,
    root: Value,
}

impl HostingManifest {
    pub fn load(path: &Path) -> Result<Self, EmitError> {
        if !path.exists() {
            return Err(EmitError::ManifestNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let root: Value = serde_json::from_str(&content)?;
        let manifest = Self {
            path: path.to_path_buf(),
            root,
        };
        // Validate shape up front.
        manifest.rewrites()?;
        Ok(manifest)
    }

    pub fn rewrites(&self) -> Result<&Vec<Value>, EmitError> {
        self.root
            .get("hosting")
            .and_then(|h| h.get("rewrites"))
            .and_then(Value::as_array)
            .ok_or_else(|| EmitError::MissingRewrites(self.path.clone()))
    }

    fn rewrites_mut(&mut self) -> Result<&mut Vec<Value>, EmitError> {
        let path = self.path.clone();
        self.root
            .get_mut("hosting")
            .and_then(|h| h.get_mut("rewrites"))
            .and_then(Value::as_array_mut)
            .ok_or(EmitError::MissingRewrites(path))
    }

    /// Swap the section's rewrites for `entries`. Returns how many were
    /// dropped.
    pub fn replace_section(
        &mut self,
        section: Section,
        entries: &[Rewrite],
    ) -> Result<usize, EmitError> {
        let prefix = section.prefix();
        let current = std::mem::take(self.rewrites_mut()?);
        let before = current.len();
        let others: Vec<Value> = current
            .into_iter()
            .filter(|r| {
                !r.get("destination")
                    .and_then(Value::as_str)
                    .is_some_and(|d| d.starts_with(&prefix))
            })
            .collect();
        let removed = before - others.len();

        let mut next = Vec::with_capacity(entries.len() + others.len());
        for entry in entries {
            next.push(serde_json::to_value(entry)?);
        }
        next.extend(others);
        *self.rewrites_mut()? = next;
        Ok(removed)
    }

    /// Write back as 2-space indented JSON.
    pub fn save(&self) -> Result<(), EmitError> {
        let json = serde_json::to_string_pretty(&self.root)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
