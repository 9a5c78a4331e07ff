//! CLI output formatting for every command.
//!
//! Output is **record-first**: each line leads with what was produced (an
//! article title, an inker name, a post) and shows where it went after an
//! arrow. Paths are secondary context.
//!
//! # Output Format
//!
//! ## Section build
//!
//! ```text
//! Articles
//!     001 Intramurals Day One → articles/intramurals-day-one.html
//!     002 Editorial: Why We Write → articles/why-we-write.html
//! Rewrites: 2 written, 5 replaced → firebase.json
//! Processed 2 articles
//! ```
//!
//! ## Sitemap
//!
//! ```text
//! Sitemap → public/sitemap.html
//!     42 articles, 17 inkers
//! ```
//!
//! ## Import
//!
//! ```text
//! Importing 12 posts (3 duplicates skipped, 3 workers)
//! [001/012] Intramurals Day One → fb-post-intramurals-day-one
//!     Image: image-Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000-jpg
//! [002/012] FAILED Old Post
//!     Content Repository returned 400: ...
//! Imported 11 of 12 posts, 1 failed
//! ```
//!
//! With `--clean`:
//!
//! ```text
//! Deleted 12 imported articles
//! ```
//!
//! ## Render
//!
//! ```text
//! /articles/my-article → rendered
//!     loading: on
//!     #title = My Article
//!     #media hidden
//!     #body ← <p>First...</p>
//!     loading: off
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::emit::{EmitReport, Section};
use crate::import::{ImportEvent, ImportSummary};
use crate::navigator::{LoadOutcome, Patch};
use crate::sitemap::SitemapReport;

/// Longest markup preview shown for an HTML patch.
const PATCH_PREVIEW_CHARS: usize = 60;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 article`, `2 articles`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Cut `text` to `max` characters, appending `...` if it was longer.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

// ============================================================================
// Section builds
// ============================================================================

/// Format one section build: every written page, then the rewrite change.
pub fn format_emit_report(report: &EmitReport) -> Vec<String> {
    let mut lines = vec![report.section.label().to_string()];
    let dir = report.section.dir_name();
    for (i, (title, file_name)) in report.pages.iter().enumerate() {
        lines.push(format!(
            "{}{} {} \u{2192} {}/{}",
            indent(1),
            format_index(i + 1),
            title,
            dir,
            file_name
        ));
    }
    lines.push(format!(
        "Rewrites: {} written, {} replaced \u{2192} {}",
        report.pages.len(),
        report.rewrites_removed,
        report.hosting_config.display()
    ));
    let noun = match report.section {
        Section::Articles => "article",
        Section::Inkers => "inker",
        Section::PublishedPapers => "published paper",
    };
    lines.push(format!("Processed {}", plural(report.pages.len(), noun)));
    lines
}

pub fn print_emit_report(report: &EmitReport) {
    for line in format_emit_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Sitemap
// ============================================================================

pub fn format_sitemap_report(report: &SitemapReport) -> Vec<String> {
    vec![
        format!("Sitemap \u{2192} {}", report.path.display()),
        format!(
            "{}{}, {}",
            indent(1),
            plural(report.articles, "article"),
            plural(report.inkers, "inker")
        ),
    ]
}

pub fn print_sitemap_report(report: &SitemapReport) {
    for line in format_sitemap_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Import
// ============================================================================

/// Format a single import progress event as display lines.
///
/// `total` is the post count after dedupe, used for the `[NNN/NNN]` prefix.
pub fn format_import_event(event: &ImportEvent, total: usize) -> Vec<String> {
    let counter = |index: usize| format!("[{}/{}]", format_index(index), format_index(total));
    match event {
        ImportEvent::Started {
            total,
            duplicates,
            workers,
        } => vec![format!(
            "Importing {} ({} skipped, {})",
            plural(*total, "post"),
            plural(*duplicates, "duplicate"),
            plural(*workers, "worker")
        )],
        ImportEvent::ImageMissing { index, path } => vec![format!(
            "{} Image missing, importing without it: {}",
            counter(*index),
            path.display()
        )],
        ImportEvent::Imported {
            index,
            title,
            document_id,
            asset_id,
        } => {
            let mut lines = vec![format!("{} {} \u{2192} {}", counter(*index), title, document_id)];
            if let Some(id) = asset_id {
                lines.push(format!("{}Image: {}", indent(1), id));
            }
            lines
        }
        ImportEvent::Failed {
            index,
            title,
            error,
        } => vec![
            format!("{} FAILED {}", counter(*index), title),
            format!("{}{}", indent(1), error),
        ],
    }
}

pub fn format_import_summary(summary: &ImportSummary) -> Vec<String> {
    let mut line = format!(
        "Imported {} of {}",
        summary.imported,
        plural(summary.total, "post")
    );
    if summary.failed > 0 {
        line.push_str(&format!(", {} failed", summary.failed));
    }
    vec![line]
}

pub fn print_import_summary(summary: &ImportSummary) {
    for line in format_import_summary(summary) {
        println!("{}", line);
    }
}

/// ```text
/// Deleted 12 imported articles
/// ```
pub fn format_clean_report(deleted: usize) -> Vec<String> {
    vec![format!("Deleted {}", plural(deleted, "imported article"))]
}

pub fn print_clean_report(deleted: usize) {
    for line in format_clean_report(deleted) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

/// Format the surface patches applied while rendering `path`.
pub fn format_render(path: &str, outcome: &LoadOutcome, patches: &[Patch]) -> Vec<String> {
    let status = match outcome {
        LoadOutcome::Rendered(_) => "rendered".to_string(),
        LoadOutcome::Redirected(to) => format!("redirected to {}", to),
        LoadOutcome::Stale => "discarded (stale)".to_string(),
    };
    let mut lines = vec![format!("{} \u{2192} {}", path, status)];
    lines.extend(patches.iter().map(|p| format!("{}{}", indent(1), format_patch(p))));
    lines
}

pub fn print_render(path: &str, outcome: &LoadOutcome, patches: &[Patch]) {
    for line in format_render(path, outcome, patches) {
        println!("{}", line);
    }
}

fn format_patch(patch: &Patch) -> String {
    match patch {
        Patch::SetText { id, text } => format!("#{} = {}", id, text),
        Patch::SetHtml { id, html } => {
            format!("#{} \u{2190} {}", id, preview(html, PATCH_PREVIEW_CHARS))
        }
        Patch::AppendHtml { id, html } => {
            format!("#{} += {}", id, preview(html, PATCH_PREVIEW_CHARS))
        }
        Patch::Clear { id } => format!("#{} cleared", id),
        Patch::SetVisible { id, visible: true } => format!("#{} shown", id),
        Patch::SetVisible { id, visible: false } => format!("#{} hidden", id),
        Patch::SetAttr { id, name, value } => format!("#{}[{}] = {}", id, name, value),
        Patch::RemoveAttr { id, name } => format!("#{}[{}] removed", id, name),
        Patch::ShowLoading => "loading: on".to_string(),
        Patch::HideLoading => "loading: off".to_string(),
        Patch::Redirect { path } => format!("redirect \u{2192} {}", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::Route;
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "article"), "1 article");
        assert_eq!(plural(0, "article"), "0 articles");
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("hi", 5), "hi");
    }

    // =========================================================================
    // Emit and sitemap
    // =========================================================================

    #[test]
    fn emit_report_lists_pages_and_rewrites() {
        let report = EmitReport {
            section: Section::Articles,
            pages: vec![
                ("Hello".to_string(), "hello.html".to_string()),
                ("World".to_string(), "world.html".to_string()),
            ],
            rewrites_removed: 5,
            hosting_config: PathBuf::from("firebase.json"),
        };
        let lines = format_emit_report(&report);
        assert_eq!(
            lines,
            vec![
                "Articles",
                "    001 Hello \u{2192} articles/hello.html",
                "    002 World \u{2192} articles/world.html",
                "Rewrites: 2 written, 5 replaced \u{2192} firebase.json",
                "Processed 2 articles",
            ]
        );
    }

    #[test]
    fn emit_report_single_paper() {
        let report = EmitReport {
            section: Section::PublishedPapers,
            pages: vec![("Issue One".to_string(), "issue-1.html".to_string())],
            rewrites_removed: 0,
            hosting_config: PathBuf::from("firebase.json"),
        };
        let lines = format_emit_report(&report);
        assert_eq!(lines[1], "    001 Issue One \u{2192} published-papers/issue-1.html");
        assert_eq!(lines.last().unwrap(), "Processed 1 published paper");
    }

    #[test]
    fn sitemap_report() {
        let report = SitemapReport {
            path: PathBuf::from("public/sitemap.html"),
            articles: 1,
            inkers: 3,
        };
        assert_eq!(
            format_sitemap_report(&report),
            vec!["Sitemap \u{2192} public/sitemap.html", "    1 article, 3 inkers"]
        );
    }

    // =========================================================================
    // Import
    // =========================================================================

    #[test]
    fn import_started() {
        let event = ImportEvent::Started {
            total: 12,
            duplicates: 3,
            workers: 3,
        };
        assert_eq!(
            format_import_event(&event, 12),
            vec!["Importing 12 posts (3 duplicates skipped, 3 workers)"]
        );
    }

    #[test]
    fn import_success_with_image() {
        let event = ImportEvent::Imported {
            index: 1,
            title: "Hello".to_string(),
            document_id: "fb-post-hello".to_string(),
            asset_id: Some("image-abc".to_string()),
        };
        assert_eq!(
            format_import_event(&event, 12),
            vec!["[001/012] Hello \u{2192} fb-post-hello", "    Image: image-abc"]
        );
    }

    #[test]
    fn import_failure() {
        let event = ImportEvent::Failed {
            index: 2,
            title: "Old".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(
            format_import_event(&event, 2),
            vec!["[002/002] FAILED Old", "    boom"]
        );
    }

    #[test]
    fn import_summary_mentions_failures() {
        let summary = ImportSummary {
            total: 12,
            duplicates: 0,
            imported: 11,
            failed: 1,
        };
        assert_eq!(format_import_summary(&summary), vec!["Imported 11 of 12 posts, 1 failed"]);
        let clean = ImportSummary {
            failed: 0,
            imported: 12,
            ..summary
        };
        assert_eq!(format_import_summary(&clean), vec!["Imported 12 of 12 posts"]);
    }

    #[test]
    fn clean_report() {
        assert_eq!(format_clean_report(1), vec!["Deleted 1 imported article"]);
        assert_eq!(format_clean_report(0), vec!["Deleted 0 imported articles"]);
    }

    // =========================================================================
    // Render
    // =========================================================================

    #[test]
    fn render_lists_patches() {
        let patches = vec![
            Patch::ShowLoading,
            Patch::SetText {
                id: "title".to_string(),
                text: "Hello".to_string(),
            },
            Patch::SetVisible {
                id: "media".to_string(),
                visible: false,
            },
            Patch::SetAttr {
                id: "fbButton".to_string(),
                name: "href".to_string(),
                value: "/404.html".to_string(),
            },
            Patch::HideLoading,
        ];
        let lines = format_render(
            "/articles/hello",
            &LoadOutcome::Rendered(Route::Article("hello".to_string())),
            &patches,
        );
        assert_eq!(
            lines,
            vec![
                "/articles/hello \u{2192} rendered",
                "    loading: on",
                "    #title = Hello",
                "    #media hidden",
                "    #fbButton[href] = /404.html",
                "    loading: off",
            ]
        );
    }

    #[test]
    fn render_redirect() {
        let lines = format_render(
            "/articles/ghost",
            &LoadOutcome::Redirected("/404.html".to_string()),
            &[Patch::Redirect {
                path: "/404.html".to_string(),
            }],
        );
        assert_eq!(lines[0], "/articles/ghost \u{2192} redirected to /404.html");
        assert_eq!(lines[1], "    redirect \u{2192} /404.html");
    }
}
