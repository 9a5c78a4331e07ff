//! Rich-text (block/span document) to HTML.
//!
//! Article bodies arrive as an ordered list of typed blocks. Each text block
//! has a style (`normal`, `h1`…`h6`, `blockquote`), an optional list item
//! kind, and a list of spans. A span's marks are either decorator names
//! (`strong`, `em`, `underline`, `code`, `strike-through`) or keys into the
//! block's `markDefs`, where `link` annotations live.
//!
//! All text goes through maud's escaping, so the only markup in the output is
//! the markup built here.
//!
//! ## Links
//!
//! A link's target is the annotation's `href`, or the linked text itself
//! when the annotation carries none (editors often paste the URL as the
//! text). Targets are screened with [`uri_looks_safe`]: unsafe schemes such
//! as `javascript:` render the text without an anchor. Safe targets are
//! normalized with [`valid_url`] and open in a new tab.

use crate::imaging::{ImageOptions, ImageUrlBuilder};
use crate::types::{Block, MarkDef, Span, TextBlock};
use maud::{Markup, html};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

const ALLOWED_PROTOCOLS: &[&str] = &["http", "https", "mailto", "tel"];

static WEB_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(f|ht)tps?://").expect("valid scheme regex"));

/// Render a rich-text body to an HTML string.
pub fn to_html(blocks: &[Block], images: &ImageUrlBuilder) -> String {
    let mut out = String::new();
    let mut idx = 0;
    while idx < blocks.len() {
        match &blocks[idx] {
            Block::Text(block) if block.list_item.is_some() => {
                let kind = block.list_item.as_deref();
                let run: Vec<&TextBlock> = blocks[idx..]
                    .iter()
                    .map_while(|b| match b {
                        Block::Text(t) if t.list_item.as_deref() == kind => Some(t),
                        _ => None,
                    })
                    .collect();
                idx += run.len();
                out.push_str(&render_list(kind, &run).into_string());
            }
            Block::Text(block) => {
                out.push_str(&render_block(block).into_string());
                idx += 1;
            }
            Block::Image(field) => {
                let src = images.resolve(field.source(), &ImageOptions::full());
                out.push_str(&html! { figure { img src=(src) loading="lazy" alt=""; } }.into_string());
                idx += 1;
            }
            Block::Unknown => idx += 1,
        }
    }
    out
}

fn render_list(kind: Option<&str>, items: &[&TextBlock]) -> Markup {
    let body = html! {
        @for item in items {
            li { (render_spans(item)) }
        }
    };
    if kind == Some("number") {
        html! { ol { (body) } }
    } else {
        html! { ul { (body) } }
    }
}

fn render_block(block: &TextBlock) -> Markup {
    let inner = render_spans(block);
    match block.style.as_deref().unwrap_or("normal") {
        "h1" => html! { h1 { (inner) } },
        "h2" => html! { h2 { (inner) } },
        "h3" => html! { h3 { (inner) } },
        "h4" => html! { h4 { (inner) } },
        "h5" => html! { h5 { (inner) } },
        "h6" => html! { h6 { (inner) } },
        "blockquote" => html! { blockquote { (inner) } },
        _ => html! { p { (inner) } },
    }
}

fn render_spans(block: &TextBlock) -> Markup {
    html! {
        @for span in &block.children {
            (render_span(span, &block.mark_defs))
        }
    }
}

/// The first mark is the outermost element.
fn render_span(span: &Span, mark_defs: &[MarkDef]) -> Markup {
    let mut inner = html! { (span.text) };
    for mark in span.marks.iter().rev() {
        inner = wrap_mark(mark, inner, span, mark_defs);
    }
    inner
}

fn wrap_mark(mark: &str, inner: Markup, span: &Span, mark_defs: &[MarkDef]) -> Markup {
    match mark {
        "strong" => html! { strong { (inner) } },
        "em" => html! { em { (inner) } },
        "code" => html! { code { (inner) } },
        "underline" => html! { span style="text-decoration: underline" { (inner) } },
        "strike-through" => html! { del { (inner) } },
        key => match mark_defs.iter().find(|d| d.key == key) {
            Some(def) if def.kind == "link" => {
                let target = def
                    .href
                    .as_deref()
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or(&span.text);
                render_link(target, inner)
            }
            _ => inner,
        },
    }
}

fn render_link(target: &str, inner: Markup) -> Markup {
    if uri_looks_safe(target) {
        html! { a href=(valid_url(target)) target="_blank" { (inner) } }
    } else {
        inner
    }
}

/// Whether a link target is acceptable.
///
/// Fragment links, absolute paths, and scheme-less values pass; otherwise
/// the scheme must be one of `http`, `https`, `mailto`, `tel`. A colon that
/// only appears after a `?` or `#` does not count as a scheme separator.
pub fn uri_looks_safe(uri: &str) -> bool {
    let url = uri.trim();
    if url.starts_with('#') || url.starts_with('/') {
        return true;
    }
    let Some(colon) = url.find(':') else {
        return true;
    };
    let proto = url[..colon].to_ascii_lowercase();
    if ALLOWED_PROTOCOLS.contains(&proto.as_str()) {
        return true;
    }
    if url.find('?').is_some_and(|q| colon > q) {
        return true;
    }
    url.find('#').is_some_and(|h| colon > h)
}

/// Normalize a link target into an absolute web URL.
///
/// Percent-decodes, trims, removes all whitespace, then ensures a
/// `http(s)://` or `ftp(s)://` scheme, defaulting to `http://`.
pub fn valid_url(url: &str) -> String {
    let decoded = percent_decode_str(url).decode_utf8_lossy();
    let compact: String = decoded.trim().chars().filter(|c| !c.is_whitespace()).collect();

    if compact.starts_with("://") {
        return format!("http{compact}");
    }
    if !WEB_SCHEME.is_match(&compact) {
        return format!("http://{compact}");
    }
    compact
}
