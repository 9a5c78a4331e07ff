//! Human-readable HTML sitemap.
//!
//! One page listing the fixed site pages, every article and every inker,
//! written to `<public>/sitemap.html`.

use crate::cms::{self, CmsError, ContentSource};
use crate::types::SitemapEntry;
use chrono::NaiveDate;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SITEMAP_FILENAME: &str = "sitemap.html";

/// `(name, path)` of pages that exist regardless of content.
pub const STATIC_PAGES: &[(&str, &str)] = &[
    ("Home", "/"),
    ("About Us", "/about"),
    ("Privacy Policy", "/privacy-policy"),
    ("Staff", "/staff"),
    ("Archives", "/archives"),
    ("Published Papers", "/published-papers"),
];

const STYLE: &str = "\
body { font-family: sans-serif; line-height: 1.6; padding: 40px; max-width: 800px; margin: auto; color: #333; }
h1 { border-bottom: 2px solid #800000; color: #800000; padding-bottom: 10px; }
h2 { margin-top: 30px; color: #555; }
ul { list-style: none; padding: 0; }
li { margin-bottom: 8px; }
a { color: #004a99; text-decoration: none; }
a:hover { text-decoration: underline; }
.grid { display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }
@media (max-width: 600px) { .grid { grid-template-columns: 1fr; } }";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Query failed: {0}")]
    Cms(#[from] CmsError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapReport {
    pub path: PathBuf,
    pub articles: usize,
    pub inkers: usize,
}

/// Render the sitemap document.
pub fn render_sitemap(entries: &[SitemapEntry], updated: NaiveDate) -> Markup {
    let articles: Vec<&SitemapEntry> = entries.iter().filter(|e| e.kind == "article").collect();
    let inkers: Vec<&SitemapEntry> = entries.iter().filter(|e| e.kind == "inker").collect();

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Sitemap | The Maroon Ink" }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 { "Sitemap" }
                section {
                    h2 { "Main Pages" }
                    ul {
                        @for (name, path) in STATIC_PAGES {
                            li { a href=(path) { (name) } }
                        }
                    }
                }
                div.grid {
                    (entry_section("Articles", "/articles/", &articles))
                    (entry_section("Our Inkers", "/inkers/", &inkers))
                }
                footer {
                    p { small { "Last updated: " (updated.format("%-m/%-d/%Y")) } }
                }
            }
        }
    }
}

fn entry_section(heading: &str, prefix: &str, entries: &[&SitemapEntry]) -> Markup {
    html! {
        section {
            h2 { (heading) }
            ul {
                @for entry in entries {
                    li { a href={ (prefix) (entry.slug) } { (entry.title) } }
                }
            }
        }
    }
}

/// Query the sitemap entries and write `<public_dir>/sitemap.html`.
pub fn write_sitemap(
    source: &dyn ContentSource,
    public_dir: &Path,
    updated: NaiveDate,
) -> Result<SitemapReport, SitemapError> {
    let entries = cms::fetch_sitemap_entries(source)?;
    let html = render_sitemap(&entries, updated);

    fs::create_dir_all(public_dir)?;
    let path = public_dir.join(SITEMAP_FILENAME);
    fs::write(&path, html.into_string())?;

    Ok(SitemapReport {
        path,
        articles: entries.iter().filter(|e| e.kind == "article").count(),
        inkers: entries.iter().filter(|e| e.kind == "inker").count(),
    })
}
