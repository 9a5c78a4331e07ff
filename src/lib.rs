//! # Maroon Ink
//!
//! Build tooling for The Maroon Ink, a student publication whose content
//! lives in a hosted Content Repository (Sanity). Editors write articles,
//! contributor profiles ("inkers") and scanned print issues in the CMS; this
//! crate turns them into a site.
//!
//! # Two Ways to a Page
//!
//! Every page is produced by one of two paths that share the same query
//! layer and the same fragment renderers:
//!
//! ```text
//! Static build   cms query → assemble tokens → template → public/<section>/<slug>.html
//!                                                         + hosting rewrites
//! Navigation     path → route → cms query → patches on a Surface
//! ```
//!
//! The static build gives crawlers and link previews a real HTML file per
//! article, inker and published paper. The hosting config's rewrite table
//! maps the extensionless URL (`/articles/slug`) onto that file. Everything
//! else (home feeds, search, archives, staff) is rendered at navigation time.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`cms`] | GROQ queries, the [`cms::ContentSource`] seam, typed fetch helpers |
//! | [`types`] | Decoded CMS documents (`Article`, `Inker`, `PublishedPaper`, ...) |
//! | [`format`] | Dates, previews, credits and title truncation |
//! | [`imaging`] | Image CDN URL building and dimension parsing |
//! | [`portable_text`] | Rich-text body to HTML |
//! | [`template`] | `{{Token}}` templates and their replacement maps |
//! | [`assemble`] | Page tokens and card fragments for every page kind |
//! | [`emit`] | Static section build: page files plus hosting rewrites |
//! | [`sitemap`] | Human-readable `sitemap.html` |
//! | [`navigator`] | Runtime routing, view state and surface patching |
//! | [`import`] | Scraped-post importer with dedupe and retrying uploads |
//! | [`config`] | `site.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting for every command |
//!
//! # Design Decisions
//!
//! ## Queries Are Data
//!
//! Query text is a compile-time constant per page kind; slugs and search
//! terms are always sent as `$param` values. A hostile search term can change
//! what matches, never what is asked.
//!
//! ## One Render Per Card
//!
//! Article, inker, staff and paper cards are built once, in [`assemble`], with
//! maud. The navigator appends the same markup the static build would write,
//! so there is no second copy of any card to drift.
//!
//! ## Fallbacks Over Failures
//!
//! A missing or malformed image never fails a page: URL building falls back
//! to the configured placeholder. A query that matches nothing is `None`, and
//! single-entity routes redirect to `/404.html`. Only a failed query is an
//! error.
//!
//! ## Stale Responses Lose
//!
//! The navigator numbers every load. When a slow response for a page the
//! reader already left comes back, it is dropped instead of overwriting the
//! newer page.

pub mod assemble;
pub mod cms;
pub mod config;
pub mod emit;
pub mod format;
pub mod imaging;
pub mod import;
pub mod navigator;
pub mod output;
pub mod portable_text;
pub mod sitemap;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
