//! Page assembly: which template token gets which value.
//!
//! Each page kind has one entry point returning a [`Replacements`] map for
//! its template, built from fixed sections (SEO, header, media, body,
//! footer). The same module also renders the card fragments the runtime
//! navigator appends to list pages, so a card looks identical in both
//! contexts.
//!
//! ## Escaping
//!
//! Token values land in two kinds of places. Values inside attribute quotes
//! (`content="{{SEOTitle}}"`) go through [`escape_attr`]; values used as
//! element text or whole fragments are built with maud and are escaped
//! there. The rich-text body is produced by [`portable_text`].
//!
//! ## Hidden sections
//!
//! Optional parts of a page are never removed from the template. Their
//! `...IsVisible` token is set to `style="display: none;"` instead, so the
//! layout stays stable for the client scripts.

use crate::config::SiteConfig;
use crate::format::{
    CARD_TITLE_MAX_CHARS, derive_preview, escape_attr, format_contributor_credit,
    format_published_date, format_relative_date, truncate_title,
};
use crate::imaging::{ImageOptions, ImageUrlBuilder, avatar_url, image_dimensions};
use crate::portable_text;
use crate::template::Replacements;
use crate::types::{Article, Inker, InkerRef, MediaItem, PublishedPaper};
use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone};
use maud::{Markup, html};

/// Attribute fragment that hides an element.
pub const HIDDEN: &str = r#"style="display: none;""#;

/// Where the Facebook button points when an article has no post.
pub const MISSING_LINK: &str = "/404.html";

/// Everything page assembly needs besides the record itself.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Canonical origin, without trailing slash.
    pub base_url: String,
    pub images: ImageUrlBuilder,
    pub max_visible_media: usize,
    /// Zone used for absolute dates in headers.
    pub time_zone: FixedOffset,
}

impl PageContext {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            base_url: config.site.base_url.trim_end_matches('/').to_string(),
            images: ImageUrlBuilder::from_config(config),
            max_visible_media: config.images.max_visible_media,
            time_zone: Local::now().offset().fix(),
        }
    }

    fn canonical(&self, section: &str, slug: &str) -> String {
        format!("{}/{}/{}", self.base_url, section, slug)
    }

    // =========================================================================
    // Article pages
    // =========================================================================

    /// All tokens for the article template.
    pub fn article_page(&self, article: &Article) -> Replacements {
        let mut r = Replacements::new();
        r.extend(self.article_seo(article));
        r.extend(self.article_header(article));
        r.extend(self.article_media(article));
        r.set("MainContent", portable_text::to_html(&article.body, &self.images));
        r.extend(self.article_footer(article));
        r
    }

    fn article_seo(&self, article: &Article) -> Replacements {
        let image = article
            .media
            .first()
            .and_then(MediaItem::display_source)
            .unwrap_or(self.images.placeholder());
        let mut r = Replacements::new();
        r.set("SEOUrl", escape_attr(&self.canonical("articles", article.link_name.as_str())))
            .set("SEOTitle", escape_attr(&article.title))
            .set(
                "SEODescription",
                escape_attr(&derive_preview(article.subtitle.as_deref(), &article.body)),
            )
            .set("SEOImage", escape_attr(image));
        r
    }

    fn article_header(&self, article: &Article) -> Replacements {
        let names = article.credited_names();
        let published = article.published_at.with_timezone(&self.time_zone);
        let mut r = Replacements::new();
        r.set("HeaderTitle", text(&article.title))
            .set("HeaderSubtitle", text(article.subtitle.as_deref().unwrap_or("")))
            .set("HeaderInkers", text(&format_contributor_credit(&names)))
            .set("HeaderDate", text(&format_published_date(&published)))
            .set("HeaderIsVisible", visibility(!names.is_empty()));
        r
    }

    fn article_media(&self, article: &Article) -> Replacements {
        let mut r = Replacements::new();
        r.set(
            "MediaContent",
            build_media_gallery(&article.media, &article.title, self.max_visible_media, &self.images)
                .into_string(),
        )
        .set("MediaIsVisible", visibility(!article.media.is_empty()));
        r
    }

    fn article_footer(&self, article: &Article) -> Replacements {
        let fb_link = fb_link(article);
        let inkers = html! {
            @for inker in &article.inkers_on_duty {
                (self.credit_card(inker))
            }
        };
        let mut r = Replacements::new();
        r.set("FooterFbButtonIsVisible", visibility(fb_link.is_some()))
            .set("FooterFbButtonHref", escape_attr(fb_link.unwrap_or(MISSING_LINK)))
            .set("FooterInkersOnDuty", inkers.into_string());
        r
    }

    /// Contributor card in an article footer.
    pub fn credit_card(&self, inker: &InkerRef) -> Markup {
        let picture = match inker.profile_picture.as_ref().and_then(|p| p.source()) {
            Some(source) => self.images.resolve(Some(source), &ImageOptions::avatar()),
            None => avatar_url(&inker.name),
        };
        html! {
            a href={ "/inkers/" (inker.username) } target="_self" {
                article.inkers {
                    img alt=(inker.name) src=(picture);
                    div {
                        h3 { (inker.name) }
                        p { (inker.role.as_deref().unwrap_or("")) }
                    }
                }
            }
        }
    }

    // =========================================================================
    // Inker pages
    // =========================================================================

    /// Profile photo for an inker page. Falls back to the profile
    /// placeholder; only a CDN asset with known dimensions opens in the
    /// lightbox.
    pub fn profile_photo(&self, inker: &Inker) -> ProfilePhoto {
        let source = inker.profile_picture.as_ref().and_then(|p| p.source());
        let src = match source {
            Some(s) => self.images.resolve(Some(s), &ImageOptions::full()),
            None => self.images.profile_placeholder().to_string(),
        };
        let link_attrs = match source.and_then(image_dimensions) {
            Some(dim) => vec![
                ("title", format!("{}. Click to expand profile picture", inker.name)),
                ("data-pswp-src", src.clone()),
                ("data-pswp-width", dim.width.to_string()),
                ("data-pswp-height", dim.height.to_string()),
            ],
            None => vec![("title", inker.name.clone())],
        };
        ProfilePhoto {
            src,
            alt: inker.name.clone(),
            link_attrs,
        }
    }

    /// All tokens for the inker profile template.
    pub fn inker_page(&self, inker: &Inker) -> Replacements {
        let photo = self.profile_photo(inker);
        let image = &photo.src;
        let description = format!(
            "{} - {}. {}",
            inker.name,
            inker.role.as_deref().unwrap_or("Contributor"),
            inker.bio.as_deref().unwrap_or("")
        );

        let picture_attrs = format!(
            r#"src="{}" alt="{}""#,
            escape_attr(image),
            escape_attr(&photo.alt)
        );
        let photo_swipe = photo
            .link_attrs
            .iter()
            .map(|(name, value)| format!(r#"{}="{}""#, name, escape_attr(value)))
            .collect::<Vec<_>>()
            .join(" ");

        let mut r = Replacements::new();
        r.set("SEOUrl", escape_attr(&self.canonical("inkers", inker.username.as_str())))
            .set("SEOTitle", escape_attr(&inker.name))
            .set("SEODescription", escape_attr(description.trim_end()))
            .set("SEOImage", escape_attr(image))
            .set("HeaderProfilePicture", picture_attrs)
            .set("HeaderPhotoSwipe", photo_swipe)
            .set("HeaderName", text(&inker.name))
            .set("HeaderRole", text(inker.role.as_deref().unwrap_or("")))
            .set("HeaderBio", text(inker.bio.as_deref().unwrap_or("")));
        r
    }

    // =========================================================================
    // Published paper pages
    // =========================================================================

    /// All tokens for the published-paper (flipbook) template.
    pub fn published_paper_page(&self, paper: &PublishedPaper) -> Replacements {
        let first_page = paper
            .pages
            .first()
            .and_then(|p| p.asset.as_ref())
            .and_then(|a| a.url.as_deref())
            .unwrap_or(self.images.placeholder());
        let description = match paper.subtitle.as_deref().filter(|s| !s.is_empty()) {
            Some(subtitle) => subtitle.to_string(),
            None => format!(
                "Read more about the published paper: \"{}\" at The Maroon Ink",
                paper.title
            ),
        };
        let date = paper
            .published_at
            .map(|t| format_published_date(&t.with_timezone(&self.time_zone)))
            .unwrap_or_default();
        let pages = html! {
            @for (idx, page) in paper.pages.iter().enumerate() {
                img.page
                    src=(self.images.resolve(page.source(), &ImageOptions::full()))
                    data-page=(idx + 1)
                    loading="lazy"
                    alt={ "Page " (idx + 1) };
            }
        };

        let mut r = Replacements::new();
        r.set(
            "SEOUrl",
            escape_attr(&self.canonical("published-papers", paper.link_name.as_str())),
        )
        .set("SEOTitle", escape_attr(&paper.title))
        .set("SEODescription", escape_attr(&description))
        .set("SEOImage", escape_attr(first_page))
        .set("HeaderTitle", text(&paper.title))
        .set("HeaderSubtitle", text(paper.subtitle.as_deref().unwrap_or("")))
        .set("HeaderDate", text(&date))
        .set("FlipbookPages", pages.into_string());
        r
    }

    // =========================================================================
    // Cards for list pages
    // =========================================================================

    /// Article card used on the homepage, archives, search and inker pages.
    pub fn article_card<Tz: TimeZone>(&self, article: &Article, now: &DateTime<Tz>) -> Markup {
        let image = self.images.resolve(
            article.media.first().and_then(MediaItem::url),
            &ImageOptions::card(),
        );
        let badge = article.article_type.as_ref().and_then(|t| t.label());
        html! {
            a href={ "/articles/" (article.link_name) } {
                article.articles {
                    div {
                        @if let Some(label) = &badge {
                            span.article-type data-article-type="true" { (label) }
                        }
                        h1 { (truncate_title(&article.title, CARD_TITLE_MAX_CHARS)) }
                        h2 { (derive_preview(article.subtitle.as_deref(), &article.body)) }
                        p { (format_relative_date(&article.published_at, now)) }
                    }
                    img alt=(article.title) src=(image);
                }
            }
        }
    }

    /// Contributor card used on search results.
    pub fn inker_card(&self, inker: &Inker) -> Markup {
        self.contributor_card(inker, false)
    }

    /// Staff directory entry: smaller headings, lazily loaded photo.
    pub fn staff_card(&self, inker: &Inker) -> Markup {
        self.contributor_card(inker, true)
    }

    fn contributor_card(&self, inker: &Inker, staff: bool) -> Markup {
        let picture = match inker.profile_picture.as_ref().and_then(|p| p.source()) {
            Some(source) => self.images.resolve(Some(source), &ImageOptions::avatar()),
            None => self.images.profile_placeholder().to_string(),
        };
        let role = inker.role.as_deref().unwrap_or("");
        html! {
            a href={ "/inkers/" (inker.username) } target="_self" {
                article.inkers {
                    img alt=(inker.name) src=(picture) loading=[staff.then_some("lazy")];
                    div {
                        @if staff {
                            h3 { (inker.name) }
                            p { (role) }
                        } @else {
                            h1 { (inker.name) }
                            h2 { (role) }
                        }
                    }
                }
            }
        }
    }

    /// Cover card on the published-papers listing.
    pub fn paper_card(&self, paper: &PublishedPaper) -> Markup {
        let cover = self
            .images
            .resolve(paper.pages.first().and_then(|p| p.source()), &ImageOptions::card());
        html! {
            a href={ "/published-papers/" (paper.link_name) } {
                article.published-papers {
                    img alt=(paper.title) src=(cover) loading="lazy";
                    div {
                        h1 { (truncate_title(&paper.title, CARD_TITLE_MAX_CHARS)) }
                        @if let Some(subtitle) = &paper.subtitle {
                            h2 { (subtitle) }
                        }
                    }
                }
            }
        }
    }
}

/// An inker's profile photo and the attributes of the link wrapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePhoto {
    pub src: String,
    pub alt: String,
    /// `(name, value)` pairs in page order, unescaped.
    pub link_attrs: Vec<(&'static str, String)>,
}

/// The article's Facebook post, unless missing or blank.
pub fn fb_link(article: &Article) -> Option<&str> {
    article.fb_link.as_deref().filter(|l| !l.trim().is_empty())
}

/// Lightbox gallery for an article's media.
///
/// Every item is rendered. When there are more than `max_visible` items, the
/// item at index `max_visible - 1` carries `data-count="+N"` where N counts it
/// and everything after it; the stylesheet hides the rest behind that badge.
pub fn build_media_gallery(
    items: &[MediaItem],
    title: &str,
    max_visible: usize,
    images: &ImageUrlBuilder,
) -> Markup {
    let badge_index = max_visible.saturating_sub(1);
    let overflow = items.len() > max_visible;
    html! {
        @for (idx, item) in items.iter().enumerate() {
            @let source = item.display_source();
            @let src = images.resolve(source, &ImageOptions::full());
            @let dim = source.and_then(image_dimensions);
            @let video = if item.is_video() { item.url() } else { None };
            @let count = (overflow && idx == badge_index)
                .then(|| format!("+{}", items.len() - badge_index));
            a title="Click to expand"
                data-pswp-src=(src)
                data-pswp-width=[dim.map(|d| d.width)]
                data-pswp-height=[dim.map(|d| d.height)]
                data-pswp-video-src=[video]
                data-pswp-type=[video.map(|_| "video")]
                data-count=[count] {
                img.image src=(src) loading="lazy" alt=(title);
            }
        }
    }
}

/// Escape a value used as element text.
fn text(value: &str) -> String {
    html! { (value) }.into_string()
}

fn visibility(visible: bool) -> String {
    if visible {
        String::new()
    } else {
        HIDDEN.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use chrono::Utc;

    fn ctx() -> PageContext {
        test_context()
    }

    fn image_items(n: usize) -> Vec<MediaItem> {
        (0..n)
            .map(|i| MediaItem::Image {
                key: format!("k{i}"),
                url: Some(format!(
                    "https://cdn.sanity.io/images/proj/production/h{i}-800x600.jpg"
                )),
            })
            .collect()
    }

    // =========================================================================
    // Media gallery
    // =========================================================================

    #[test]
    fn gallery_badges_only_fifth_of_seven() {
        let html = build_media_gallery(&image_items(7), "T", 5, &ctx().images).into_string();
        let anchors: Vec<&str> = html.split("<a ").skip(1).collect();
        assert_eq!(anchors.len(), 7);
        for (idx, anchor) in anchors.iter().enumerate() {
            if idx == 4 {
                assert!(anchor.contains(r#"data-count="+3""#), "anchor {idx}: {anchor}");
            } else {
                assert!(!anchor.contains("data-count"), "anchor {idx}: {anchor}");
            }
        }
    }

    #[test]
    fn gallery_without_overflow_has_no_badge() {
        let html = build_media_gallery(&image_items(5), "T", 5, &ctx().images).into_string();
        assert!(!html.contains("data-count"));
    }

    #[test]
    fn gallery_video_uses_thumbnail_and_video_attrs() {
        let items = vec![MediaItem::Video {
            key: "v".to_string(),
            url: Some("https://cdn.sanity.io/files/proj/production/v.mp4".to_string()),
            thumbnail_url: Some(
                "https://cdn.sanity.io/images/proj/production/t-640x360.jpg".to_string(),
            ),
        }];
        let html = build_media_gallery(&items, "T", 5, &ctx().images).into_string();
        assert!(html.contains("t-640x360.jpg?fit=max&amp;auto=format"));
        assert!(html.contains(r#"data-pswp-video-src="https://cdn.sanity.io/files/proj/production/v.mp4""#));
        assert!(html.contains(r#"data-pswp-type="video""#));
        assert!(html.contains(r#"data-pswp-width="640""#));
    }

    #[test]
    fn gallery_falls_back_to_placeholder() {
        let items = vec![MediaItem::Video {
            key: "v".to_string(),
            url: Some("https://cdn.sanity.io/files/proj/production/v.mp4".to_string()),
            thumbnail_url: None,
        }];
        let html = build_media_gallery(&items, "T", 5, &ctx().images).into_string();
        assert!(html.contains(r#"src="/src/images/banner.jpg""#));
        assert!(!html.contains("data-pswp-width"));
    }

    // =========================================================================
    // Article page tokens
    // =========================================================================

    #[test]
    fn article_seo_tokens() {
        let mut article = sample_article("my-article");
        article.title = r#"The "Big" Story"#.to_string();
        let r = ctx().article_page(&article);
        assert_eq!(r.get("SEOUrl"), Some("https://themaroon.ink/articles/my-article"));
        assert_eq!(r.get("SEOTitle"), Some("The &quot;Big&quot; Story"));
        assert_eq!(r.get("SEODescription"), Some("First sentence."));
    }

    #[test]
    fn article_header_hides_credit_without_inkers() {
        let mut article = sample_article("a");
        article.inkers_on_duty.clear();
        let r = ctx().article_page(&article);
        assert_eq!(r.get("HeaderIsVisible"), Some(HIDDEN));
        assert_eq!(r.get("HeaderInkers"), Some(""));
    }

    #[test]
    fn article_header_credits_inkers() {
        let article = sample_article("a");
        let r = ctx().article_page(&article);
        assert_eq!(r.get("HeaderIsVisible"), Some(""));
        assert_eq!(r.get("HeaderInkers"), Some("By: Jane Doe"));
        assert_eq!(r.get("HeaderDate"), Some("March 4, 2025 at 10:00 AM"));
    }

    #[test]
    fn article_without_media_hides_gallery_and_uses_placeholder_seo_image() {
        let article = sample_article("a");
        let r = ctx().article_page(&article);
        assert_eq!(r.get("MediaIsVisible"), Some(HIDDEN));
        assert_eq!(r.get("MediaContent"), Some(""));
        assert_eq!(r.get("SEOImage"), Some("/src/images/banner.jpg"));
    }

    #[test]
    fn article_footer_without_fb_link() {
        let r = ctx().article_page(&sample_article("a"));
        assert_eq!(r.get("FooterFbButtonIsVisible"), Some(HIDDEN));
        assert_eq!(r.get("FooterFbButtonHref"), Some("/404.html"));
        let footer = r.get("FooterInkersOnDuty").unwrap();
        assert!(footer.contains(r#"href="/inkers/jane-doe""#));
        assert!(footer.contains("api.dicebear.com"));
    }

    #[test]
    fn article_footer_with_fb_link() {
        let mut article = sample_article("a");
        article.fb_link = Some("https://facebook.com/post/1".to_string());
        let r = ctx().article_page(&article);
        assert_eq!(r.get("FooterFbButtonIsVisible"), Some(""));
        assert_eq!(r.get("FooterFbButtonHref"), Some("https://facebook.com/post/1"));
    }

    #[test]
    fn blank_fb_link_counts_as_missing() {
        let mut article = sample_article("a");
        article.fb_link = Some("   ".to_string());
        assert_eq!(fb_link(&article), None);
        let r = ctx().article_page(&article);
        assert_eq!(r.get("FooterFbButtonIsVisible"), Some(HIDDEN));
        assert_eq!(r.get("FooterFbButtonHref"), Some(MISSING_LINK));
    }

    #[test]
    fn article_body_is_rendered() {
        let r = ctx().article_page(&sample_article("a"));
        assert!(r.get("MainContent").unwrap().starts_with("<p>First sentence."));
    }

    #[test]
    fn header_text_is_escaped() {
        let mut article = sample_article("a");
        article.title = "<b>Bold</b>".to_string();
        let r = ctx().article_page(&article);
        assert_eq!(r.get("HeaderTitle"), Some("&lt;b&gt;Bold&lt;/b&gt;"));
    }

    // =========================================================================
    // Inker and paper tokens
    // =========================================================================

    #[test]
    fn inker_page_without_picture() {
        let inker = sample_inker("jane-doe");
        let r = ctx().inker_page(&inker);
        assert_eq!(r.get("SEOUrl"), Some("https://themaroon.ink/inkers/jane-doe"));
        assert_eq!(r.get("SEOImage"), Some("/src/images/placeholder-profile.png"));
        assert_eq!(r.get("SEODescription"), Some("Jane Doe - Editor. Writes things."));
        assert_eq!(r.get("HeaderPhotoSwipe"), Some(r#"title="Jane Doe""#));
    }

    #[test]
    fn inker_page_with_picture_enables_lightbox() {
        let mut inker = sample_inker("jane-doe");
        inker.profile_picture = Some(image_field("image-pp-400x500-jpg"));
        let r = ctx().inker_page(&inker);
        let swipe = r.get("HeaderPhotoSwipe").unwrap();
        assert!(swipe.contains(r#"data-pswp-width="400""#));
        assert!(swipe.contains(r#"data-pswp-height="500""#));
        assert!(r.get("SEOImage").unwrap().starts_with("https://cdn.sanity.io/images/proj/production/pp-400x500.jpg"));
    }

    #[test]
    fn inker_description_defaults_role() {
        let mut inker = sample_inker("x");
        inker.role = None;
        inker.bio = None;
        let r = ctx().inker_page(&inker);
        assert_eq!(r.get("SEODescription"), Some("Jane Doe - Contributor."));
    }

    #[test]
    fn paper_page_default_description_and_pages() {
        let paper = sample_paper("issue-1", 3);
        let r = ctx().published_paper_page(&paper);
        assert_eq!(
            r.get("SEODescription"),
            Some("Read more about the published paper: &quot;Issue One&quot; at The Maroon Ink")
        );
        let pages = r.get("FlipbookPages").unwrap();
        assert_eq!(pages.matches("<img").count(), 3);
        assert!(pages.contains(r#"data-page="3""#));
        assert_eq!(
            r.get("SEOImage"),
            Some("https://cdn.sanity.io/images/proj/production/p0-1000x1400.jpg")
        );
    }

    // =========================================================================
    // Cards
    // =========================================================================

    #[test]
    fn article_card_shows_relative_date_and_badge() {
        let mut article = sample_article("a");
        article.article_type = Some(crate::types::ArticleType::Opinion);
        let now = article.published_at + chrono::Duration::minutes(5);
        let html = ctx().article_card(&article, &now).into_string();
        assert!(html.contains("5 minutes ago"));
        assert!(html.contains(">Opinion<"));
        assert!(html.contains(r#"href="/articles/a""#));
    }

    #[test]
    fn staff_and_search_cards_differ_only_in_headings() {
        let inker = sample_inker("jane-doe");
        let search = ctx().inker_card(&inker).into_string();
        let staff = ctx().staff_card(&inker).into_string();
        assert!(search.contains("<h1>Jane Doe</h1><h2>Editor</h2>"));
        assert!(!search.contains("loading="));
        assert!(staff.contains("<h3>Jane Doe</h3><p>Editor</p>"));
        assert!(staff.contains(r#"loading="lazy""#));
        assert!(staff.contains(r#"href="/inkers/jane-doe""#));
    }

    #[test]
    fn article_card_truncates_title() {
        let mut article = sample_article("a");
        article.title = "x".repeat(70);
        let html = ctx().article_card(&article, &Utc::now()).into_string();
        assert!(html.contains(&format!("<h1>{}...</h1>", "x".repeat(60))));
    }

    #[test]
    fn news_articles_get_no_badge() {
        let mut article = sample_article("a");
        article.article_type = Some(crate::types::ArticleType::NewsAndAnnouncements);
        let html = ctx().article_card(&article, &Utc::now()).into_string();
        assert!(!html.contains("data-article-type"));
    }
}
