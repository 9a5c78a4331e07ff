//! Runtime navigation.
//!
//! The browser-side counterpart of the static emitter: given the current
//! path, issue the matching query and patch a [`Surface`] instead of writing
//! files. The surface is an abstract element tree addressed by element id,
//! so the same code drives a real DOM binding or a [`RecordingSurface`].
//!
//! ## View state
//!
//! Everything a page view remembers lives in one [`ViewState`] owned by the
//! [`Navigator`]: the current route, the last query result (reused when
//! switching home-feed tabs or archive years), the selected tab, and a
//! request generation counter. Navigating to a new path resets it.
//!
//! ## Stale responses
//!
//! A load is split into [`Navigator::begin`], [`Navigator::fetch`] and
//! [`Navigator::finish`]. `begin` takes a ticket from the generation
//! counter; `finish` renders only if that ticket is still the newest. A
//! slow response for a page the user already left is dropped instead of
//! overwriting the fresher render. [`Navigator::load`] runs the three steps
//! back to back.

use crate::assemble::{MISSING_LINK, PageContext, build_media_gallery, fb_link};
use crate::cms::{self, CmsError, ContentSource, InkerProfile, StaffGroup};
use crate::format::{format_contributor_credit, format_published_date};
use crate::portable_text;
use crate::types::{Article, HomeFeeds, PublishedPaper, SearchHit};
use chrono::{DateTime, Datelike, FixedOffset, Local};
use maud::html;
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Where single-entity pages send visitors when nothing matched.
pub const NOT_FOUND_PATH: &str = "/404.html";

/// Lightbox attributes an inker's photo link may carry.
const LIGHTBOX_ATTRS: [&str; 3] = ["data-pswp-src", "data-pswp-width", "data-pswp-height"];

static SITE_ROOT: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://themaroon.ink/").expect("static site root is valid"));

#[derive(Error, Debug)]
pub enum NavigateError {
    #[error("Query failed: {0}")]
    Cms(#[from] CmsError),
}

// =============================================================================
// Routes
// =============================================================================

/// A page of the site, recovered from its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Article(String),
    Inker(String),
    PublishedPaper(String),
    PublishedPapers,
    Search(String),
    Archives,
    Staff,
    About,
    NotFound,
}

impl Route {
    /// Parse a path with optional query string, e.g. `/search?q=sports`.
    ///
    /// Trailing slashes and `.html` suffixes are ignored; path segments and
    /// the `q` parameter are percent-decoded.
    pub fn parse(path_and_query: &str) -> Self {
        let Ok(url) = SITE_ROOT.join(path_and_query.trim()) else {
            return Self::NotFound;
        };
        let segments: Vec<String> = url
            .path_segments()
            .map(|segs| {
                segs.filter(|s| !s.is_empty())
                    .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let segments: Vec<&str> = segments
            .iter()
            .map(|s| s.strip_suffix(".html").unwrap_or(s))
            .collect();

        match segments.as_slice() {
            [] | ["index"] => Self::Home,
            ["articles", slug] => Self::Article(slug.to_string()),
            ["inkers", username] => Self::Inker(username.to_string()),
            ["published-papers"] => Self::PublishedPapers,
            ["published-papers", slug] => Self::PublishedPaper(slug.to_string()),
            ["search"] => Self::Search(
                url.query_pairs()
                    .find(|(k, _)| k == "q")
                    .map(|(_, v)| v.trim().to_string())
                    .unwrap_or_default(),
            ),
            ["archives"] => Self::Archives,
            ["staff"] => Self::Staff,
            ["about"] => Self::About,
            _ => Self::NotFound,
        }
    }
}

/// Homepage feed tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedTab {
    #[default]
    ForYou,
    News,
    Explore,
}

impl FeedTab {
    pub fn key(self) -> &'static str {
        match self {
            Self::ForYou => "foryou",
            Self::News => "newsandannouncements",
            Self::Explore => "explore",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "foryou" => Some(Self::ForYou),
            "newsandannouncements" => Some(Self::News),
            "explore" => Some(Self::Explore),
            _ => None,
        }
    }

    pub fn list_title(self) -> &'static str {
        match self {
            Self::ForYou => "Recent Articles",
            Self::News => "News & Announcements",
            Self::Explore => "Explore Other Articles",
        }
    }
}

// =============================================================================
// Surface
// =============================================================================

/// Mutable view addressed by element id.
pub trait Surface {
    /// Replace an element's content with plain text.
    fn set_text(&mut self, id: &str, text: &str);
    /// Replace an element's content with markup.
    fn set_html(&mut self, id: &str, html: &str);
    fn append_html(&mut self, id: &str, html: &str);
    fn clear(&mut self, id: &str);
    fn set_visible(&mut self, id: &str, visible: bool);
    /// Set an attribute; the surface escapes `value`.
    fn set_attr(&mut self, id: &str, name: &str, value: &str);
    fn remove_attr(&mut self, id: &str, name: &str);
    fn show_loading(&mut self);
    fn hide_loading(&mut self);
    /// Replace the current location.
    fn redirect(&mut self, path: &str);
}

/// One surface mutation, as recorded by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    SetText { id: String, text: String },
    SetHtml { id: String, html: String },
    AppendHtml { id: String, html: String },
    Clear { id: String },
    SetVisible { id: String, visible: bool },
    SetAttr { id: String, name: String, value: String },
    RemoveAttr { id: String, name: String },
    ShowLoading,
    HideLoading,
    Redirect { path: String },
}

/// In-memory surface: keeps every patch and the resulting element state.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    patches: Vec<Patch>,
    content: BTreeMap<String, String>,
    hidden: BTreeSet<String>,
    attrs: BTreeMap<(String, String), String>,
    loading: bool,
    location: Option<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Current content of an element (text is stored HTML-escaped).
    pub fn content(&self, id: &str) -> Option<&str> {
        self.content.get(id).map(String::as_str)
    }

    pub fn is_visible(&self, id: &str) -> bool {
        !self.hidden.contains(id)
    }

    pub fn attr(&self, id: &str, name: &str) -> Option<&str> {
        self.attrs
            .get(&(id.to_string(), name.to_string()))
            .map(String::as_str)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn redirected_to(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl Surface for RecordingSurface {
    fn set_text(&mut self, id: &str, text: &str) {
        self.content
            .insert(id.to_string(), html! { (text) }.into_string());
        self.patches.push(Patch::SetText {
            id: id.to_string(),
            text: text.to_string(),
        });
    }

    fn set_html(&mut self, id: &str, html: &str) {
        self.content.insert(id.to_string(), html.to_string());
        self.patches.push(Patch::SetHtml {
            id: id.to_string(),
            html: html.to_string(),
        });
    }

    fn append_html(&mut self, id: &str, html: &str) {
        self.content.entry(id.to_string()).or_default().push_str(html);
        self.patches.push(Patch::AppendHtml {
            id: id.to_string(),
            html: html.to_string(),
        });
    }

    fn clear(&mut self, id: &str) {
        self.content.insert(id.to_string(), String::new());
        self.patches.push(Patch::Clear { id: id.to_string() });
    }

    fn set_visible(&mut self, id: &str, visible: bool) {
        if visible {
            self.hidden.remove(id);
        } else {
            self.hidden.insert(id.to_string());
        }
        self.patches.push(Patch::SetVisible {
            id: id.to_string(),
            visible,
        });
    }

    fn set_attr(&mut self, id: &str, name: &str, value: &str) {
        self.attrs
            .insert((id.to_string(), name.to_string()), value.to_string());
        self.patches.push(Patch::SetAttr {
            id: id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_attr(&mut self, id: &str, name: &str) {
        self.attrs.remove(&(id.to_string(), name.to_string()));
        self.patches.push(Patch::RemoveAttr {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    fn show_loading(&mut self) {
        self.loading = true;
        self.patches.push(Patch::ShowLoading);
    }

    fn hide_loading(&mut self) {
        self.loading = false;
        self.patches.push(Patch::HideLoading);
    }

    fn redirect(&mut self, path: &str) {
        self.location = Some(path.to_string());
        self.patches.push(Patch::Redirect {
            path: path.to_string(),
        });
    }
}

// =============================================================================
// View state
// =============================================================================

/// Generation number handed out when a load begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Query result for one route.
#[derive(Debug, Clone, PartialEq)]
pub enum PageData {
    Home(HomeFeeds),
    Article(Option<Article>),
    Inker(Option<InkerProfile>),
    PublishedPaper(Option<PublishedPaper>),
    PublishedPapers(Vec<PublishedPaper>),
    Search { term: String, hits: Vec<SearchHit> },
    Archives(Vec<Article>),
    Staff(Vec<StaffGroup>),
    /// Pages with no content query.
    Static,
    NotFound,
}

/// Issue the route's query. One request at most.
pub fn fetch_page(source: &dyn ContentSource, route: &Route) -> Result<PageData, CmsError> {
    Ok(match route {
        Route::Home => PageData::Home(cms::fetch_home_feeds(source)?),
        Route::Article(slug) => PageData::Article(cms::fetch_article(source, slug)?),
        Route::Inker(username) => PageData::Inker(cms::fetch_inker_articles(source, username)?),
        Route::PublishedPaper(slug) => {
            PageData::PublishedPaper(cms::fetch_published_paper(source, slug)?)
        }
        Route::PublishedPapers => PageData::PublishedPapers(cms::fetch_published_papers(source)?),
        Route::Search(term) => PageData::Search {
            term: term.clone(),
            hits: cms::search(source, term)?,
        },
        Route::Archives => PageData::Archives(cms::fetch_archives(source)?),
        Route::Staff => PageData::Staff(cms::fetch_staff(source)?),
        Route::About => PageData::Static,
        Route::NotFound => PageData::NotFound,
    })
}

/// Per-page-view state. Replaced wholesale on navigation, except for the
/// generation counter, which only ever grows.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    route: Option<Route>,
    last_result: Option<PageData>,
    tab: FeedTab,
    year: Option<i32>,
    generation: u64,
}

impl ViewState {
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn tab(&self) -> FeedTab {
        self.tab
    }

    /// Archive year filter; `None` shows all years.
    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn cached_feeds(&self) -> Option<&HomeFeeds> {
        match &self.last_result {
            Some(PageData::Home(feeds)) => Some(feeds),
            _ => None,
        }
    }

    fn cached_archives(&self) -> Option<&[Article]> {
        match &self.last_result {
            Some(PageData::Archives(articles)) => Some(articles),
            _ => None,
        }
    }

    fn enter(&mut self, route: Route) {
        *self = Self {
            route: Some(route),
            generation: self.generation,
            ..Self::default()
        };
    }

    fn next_ticket(&mut self) -> Ticket {
        self.generation += 1;
        Ticket(self.generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }
}

// =============================================================================
// Navigator
// =============================================================================

/// A load that has started but not fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    pub ticket: Ticket,
    pub route: Route,
}

/// A fetched load waiting to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    pub ticket: Ticket,
    pub route: Route,
    pub data: PageData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Rendered(Route),
    Redirected(String),
    /// A newer load started before this one finished.
    Stale,
}

pub struct Navigator<'a> {
    source: &'a dyn ContentSource,
    ctx: PageContext,
    state: ViewState,
    pinned_now: Option<DateTime<FixedOffset>>,
}

impl<'a> Navigator<'a> {
    pub fn new(source: &'a dyn ContentSource, ctx: PageContext) -> Self {
        Self {
            source,
            ctx,
            state: ViewState::default(),
            pinned_now: None,
        }
    }

    /// Fix "now" for relative dates.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.pinned_now = Some(now);
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.pinned_now
            .unwrap_or_else(|| Local::now().fixed_offset())
    }

    /// Navigate to `path`, fetch its data and render it.
    ///
    /// On a query failure the loading overlay stays up and the error is
    /// returned.
    pub fn load(&mut self, path: &str, surface: &mut dyn Surface) -> Result<LoadOutcome, NavigateError> {
        let pending = self.begin(path, surface);
        let loaded = self.fetch(pending)?;
        Ok(self.finish(loaded, surface))
    }

    /// Tear down the current view and start loading `path`.
    pub fn begin(&mut self, path: &str, surface: &mut dyn Surface) -> PendingLoad {
        let route = Route::parse(path);
        self.state.enter(route.clone());
        let ticket = self.state.next_ticket();
        debug!(?route, ?ticket, "navigation started");
        surface.show_loading();
        PendingLoad { ticket, route }
    }

    /// Run the query for a pending load. Touches neither state nor surface.
    pub fn fetch(&self, pending: PendingLoad) -> Result<LoadedPage, NavigateError> {
        let data = fetch_page(self.source, &pending.route)?;
        Ok(LoadedPage {
            ticket: pending.ticket,
            route: pending.route,
            data,
        })
    }

    /// Render a fetched page unless a newer load has started since.
    pub fn finish(&mut self, loaded: LoadedPage, surface: &mut dyn Surface) -> LoadOutcome {
        if !self.state.is_current(loaded.ticket) {
            debug!(route = ?loaded.route, ticket = ?loaded.ticket, "discarding stale response");
            return LoadOutcome::Stale;
        }

        let outcome = match &loaded.data {
            PageData::Article(None)
            | PageData::Inker(None)
            | PageData::PublishedPaper(None)
            | PageData::NotFound => {
                surface.redirect(NOT_FOUND_PATH);
                return LoadOutcome::Redirected(NOT_FOUND_PATH.to_string());
            }
            PageData::Home(feeds) => {
                self.render_feed(feeds, FeedTab::ForYou, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::Article(Some(article)) => {
                self.render_article(article, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::Inker(Some(profile)) => {
                self.render_inker(profile, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::PublishedPaper(Some(paper)) => {
                self.render_paper(paper, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::PublishedPapers(papers) => {
                surface.set_text("title", "Published Papers");
                surface.clear("articleList");
                for paper in papers {
                    surface.append_html("articleList", &self.ctx.paper_card(paper).into_string());
                }
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::Search { term, hits } => {
                self.render_search(term, hits, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::Archives(articles) => {
                self.render_archives(articles, None, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::Staff(groups) => {
                self.render_staff(groups, surface);
                LoadOutcome::Rendered(loaded.route.clone())
            }
            PageData::Static => LoadOutcome::Rendered(loaded.route.clone()),
        };
        surface.hide_loading();

        if matches!(loaded.data, PageData::Home(_) | PageData::Archives(_)) {
            self.state.last_result = Some(loaded.data);
        }
        outcome
    }

    /// Show another homepage tab, reusing the feeds fetched on load.
    pub fn switch_feed(&mut self, tab: FeedTab, surface: &mut dyn Surface) -> Result<(), NavigateError> {
        let feeds = match self.state.cached_feeds() {
            Some(feeds) => feeds.clone(),
            None => {
                surface.show_loading();
                let feeds = cms::fetch_home_feeds(self.source)?;
                self.state.last_result = Some(PageData::Home(feeds.clone()));
                feeds
            }
        };
        self.render_feed(&feeds, tab, surface);
        surface.hide_loading();
        Ok(())
    }

    /// Filter the archives to one year (`None` for all), reusing the list
    /// fetched on load.
    pub fn switch_year(&mut self, year: Option<i32>, surface: &mut dyn Surface) -> Result<(), NavigateError> {
        let articles = match self.state.cached_archives() {
            Some(articles) => articles.to_vec(),
            None => {
                surface.show_loading();
                let articles = cms::fetch_archives(self.source)?;
                self.state.last_result = Some(PageData::Archives(articles.clone()));
                articles
            }
        };
        self.render_archives(&articles, year, surface);
        surface.hide_loading();
        Ok(())
    }

    // =========================================================================
    // Page renderers
    // =========================================================================

    fn render_feed(&mut self, feeds: &HomeFeeds, tab: FeedTab, surface: &mut dyn Surface) {
        self.state.tab = tab;
        let now = self.now();
        surface.clear("featuredArticles");
        surface.clear("articleList");
        surface.set_text("articleListTitle", tab.list_title());
        surface.set_visible("featuredArticlesTitle", tab == FeedTab::ForYou);

        let list = match tab {
            FeedTab::ForYou => {
                let featured = feeds
                    .foryou
                    .website_settings
                    .as_ref()
                    .map(|s| s.featured_articles.as_slice())
                    .unwrap_or_default();
                for article in featured {
                    surface.append_html(
                        "featuredArticles",
                        &self.ctx.article_card(article, &now).into_string(),
                    );
                }
                &feeds.foryou.response
            }
            FeedTab::News => &feeds.newsandannouncements,
            FeedTab::Explore => &feeds.explore,
        };
        for article in list {
            surface.append_html("articleList", &self.ctx.article_card(article, &now).into_string());
        }
    }

    fn render_article(&self, article: &Article, surface: &mut dyn Surface) {
        let names = article.credited_names();
        let published = article.published_at.with_timezone(&self.ctx.time_zone);

        surface.set_text("title", &article.title);
        surface.set_text("subtitle", article.subtitle.as_deref().unwrap_or(""));
        surface.set_text("inkers", &format_contributor_credit(&names));
        surface.set_visible("inkers", !names.is_empty());
        surface.set_text("date", &format_published_date(&published));

        surface.set_html(
            "media",
            &build_media_gallery(
                &article.media,
                &article.title,
                self.ctx.max_visible_media,
                &self.ctx.images,
            )
            .into_string(),
        );
        surface.set_visible("media", !article.media.is_empty());
        surface.set_html("body", &portable_text::to_html(&article.body, &self.ctx.images));

        let fb = fb_link(article);
        surface.set_attr("fbButton", "href", fb.unwrap_or(MISSING_LINK));
        surface.set_visible("fbButton", fb.is_some());
        surface.clear("inkersOnDuty");
        for inker in &article.inkers_on_duty {
            surface.append_html("inkersOnDuty", &self.ctx.credit_card(inker).into_string());
        }
    }

    fn render_inker(&self, profile: &InkerProfile, surface: &mut dyn Surface) {
        let inker = &profile.inker;
        let photo = self.ctx.profile_photo(inker);
        let picture = html! { img #profilePicture src=(photo.src) alt=(photo.alt); };
        for name in LIGHTBOX_ATTRS {
            if !photo.link_attrs.iter().any(|(n, _)| *n == name) {
                surface.remove_attr("profilePictureLink", name);
            }
        }
        for (name, value) in &photo.link_attrs {
            surface.set_attr("profilePictureLink", name, value);
        }
        surface.set_html("profilePictureLink", &picture.into_string());
        surface.set_text("name", &inker.name);
        surface.set_text("role", inker.role.as_deref().unwrap_or(""));
        surface.set_text("bio", inker.bio.as_deref().unwrap_or(""));

        let now = self.now();
        surface.clear("articleList");
        for article in &profile.articles {
            surface.append_html("articleList", &self.ctx.article_card(article, &now).into_string());
        }
    }

    fn render_paper(&self, paper: &PublishedPaper, surface: &mut dyn Surface) {
        let tokens = self.ctx.published_paper_page(paper);
        let date = paper
            .published_at
            .map(|t| format_published_date(&t.with_timezone(&self.ctx.time_zone)))
            .unwrap_or_default();
        surface.set_text("title", &paper.title);
        surface.set_text("subtitle", paper.subtitle.as_deref().unwrap_or(""));
        surface.set_text("date", &date);
        surface.set_html("flipbook", tokens.get("FlipbookPages").unwrap_or_default());
    }

    fn render_search(&self, term: &str, hits: &[SearchHit], surface: &mut dyn Surface) {
        surface.clear("articleList");
        if hits.is_empty() {
            surface.set_text(
                "title",
                &format!("Your search - {term} - did not match any results"),
            );
            return;
        }
        surface.set_text("title", &format!("Results for {term}"));
        let now = self.now();
        for hit in hits {
            let card = match hit {
                SearchHit::Article(article) => self.ctx.article_card(article, &now),
                SearchHit::Inker(inker) => self.ctx.inker_card(inker),
            };
            surface.append_html("articleList", &card.into_string());
        }
    }

    fn render_archives(&mut self, articles: &[Article], year: Option<i32>, surface: &mut dyn Surface) {
        self.state.year = year;
        let tz = self.ctx.time_zone;
        let now = self.now();

        let years = archive_years(articles, &tz);
        let total: usize = years.iter().map(|(_, n)| n).sum();
        let subnav = html! {
            a data-value="all" { "All (" (total) ")" }
            @for (y, count) in &years {
                a data-value=(y) { (y) " (" (count) ")" }
            }
        };
        surface.set_html("subnav", &subnav.into_string());

        surface.clear("main");
        for month in archive_months(articles, &tz)
            .into_iter()
            .filter(|m| year.is_none_or(|y| m.year == y))
        {
            let heading = html! { h2 { (month.label) " (" (month.articles.len()) ")" } };
            surface.append_html("main", &heading.into_string());
            for article in month.articles {
                surface.append_html("main", &self.ctx.article_card(article, &now).into_string());
            }
        }
    }

    fn render_staff(&self, groups: &[StaffGroup], surface: &mut dyn Surface) {
        surface.clear("main");
        for group in groups {
            let section = html! {
                h2 { (group.title) }
                div.stafflist {
                    @for inker in &group.members {
                        (self.ctx.staff_card(inker))
                    }
                }
            };
            surface.append_html("main", &section.into_string());
        }
    }
}

// =============================================================================
// Archive grouping
// =============================================================================

/// Articles published in one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMonth<'a> {
    /// "March 2025"
    pub label: String,
    pub year: i32,
    pub articles: Vec<&'a Article>,
}

/// Group consecutive articles (newest first) by month in `tz`.
pub fn archive_months<'a>(articles: &'a [Article], tz: &FixedOffset) -> Vec<ArchiveMonth<'a>> {
    let mut months: Vec<ArchiveMonth<'a>> = Vec::new();
    for article in articles {
        let local = article.published_at.with_timezone(tz);
        let label = local.format("%B %Y").to_string();
        match months.last_mut() {
            Some(month) if month.label == label => month.articles.push(article),
            _ => months.push(ArchiveMonth {
                label,
                year: local.year(),
                articles: vec![article],
            }),
        }
    }
    months
}

/// `(year, article count)` in first-seen order.
pub fn archive_years(articles: &[Article], tz: &FixedOffset) -> Vec<(i32, usize)> {
    let mut years: Vec<(i32, usize)> = Vec::new();
    for article in articles {
        let year = article.published_at.with_timezone(tz).year();
        match years.iter_mut().find(|(y, _)| *y == year) {
            Some((_, count)) => *count += 1,
            None => years.push((year, 1)),
        }
    }
    years
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::PageKind;
    use crate::test_helpers::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{Value, json};

    fn now() -> DateTime<FixedOffset> {
        (sample_time() + Duration::minutes(30)).fixed_offset()
    }

    fn navigator(source: &FixtureSource) -> Navigator<'_> {
        Navigator::new(source, test_context()).with_now(now())
    }

    fn home_json() -> Value {
        json!({
            "foryou": {
                "websiteSettings": {"featuredArticles": [article_json("featured")]},
                "response": [article_json("latest-1"), article_json("latest-2")]
            },
            "newsandannouncements": [article_json("news-1")],
            "explore": [article_json("explore-1"), article_json("explore-2"), article_json("explore-3")]
        })
    }

    fn dated(slug: &str, y: i32, m: u32, d: u32) -> Article {
        let mut article = sample_article(slug);
        article.published_at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        article
    }

    // =========================================================================
    // Route parsing
    // =========================================================================

    #[test]
    fn parses_entity_routes() {
        assert_eq!(Route::parse("/articles/my-article"), Route::Article("my-article".into()));
        assert_eq!(Route::parse("/inkers/jane-doe/"), Route::Inker("jane-doe".into()));
        assert_eq!(
            Route::parse("/published-papers/issue-1.html"),
            Route::PublishedPaper("issue-1".into())
        );
        assert_eq!(Route::parse("/published-papers"), Route::PublishedPapers);
    }

    #[test]
    fn parses_static_routes() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/index.html"), Route::Home);
        assert_eq!(Route::parse("/archives"), Route::Archives);
        assert_eq!(Route::parse("/staff"), Route::Staff);
        assert_eq!(Route::parse("/about"), Route::About);
        assert_eq!(Route::parse("/nope/at/all"), Route::NotFound);
    }

    #[test]
    fn search_term_is_decoded() {
        assert_eq!(Route::parse("/search?q=student+council"), Route::Search("student council".into()));
        assert_eq!(Route::parse("/search?q=caf%C3%A9"), Route::Search("café".into()));
        assert_eq!(Route::parse("/search"), Route::Search(String::new()));
    }

    #[test]
    fn slug_segments_are_decoded() {
        assert_eq!(Route::parse("/articles/a%20b"), Route::Article("a b".into()));
    }

    // =========================================================================
    // Single-entity pages
    // =========================================================================

    #[test]
    fn missing_article_redirects_to_not_found() {
        let source = FixtureSource::new().with(PageKind::SingleArticle, Value::Null);
        let mut surface = RecordingSurface::new();
        let outcome = navigator(&source).load("/articles/ghost", &mut surface).unwrap();
        assert_eq!(outcome, LoadOutcome::Redirected("/404.html".into()));
        assert_eq!(surface.redirected_to(), Some("/404.html"));
        assert_eq!(source.queries()[0].params["slug"], json!("ghost"));
    }

    #[test]
    fn article_page_is_patched() {
        let source = FixtureSource::new().with(PageKind::SingleArticle, article_json("my-article"));
        let mut surface = RecordingSurface::new();
        navigator(&source).load("/articles/my-article", &mut surface).unwrap();
        assert_eq!(surface.content("title"), Some("Article my-article"));
        assert_eq!(surface.content("inkers"), Some("By: Jane Doe"));
        assert!(!surface.is_visible("media"));
        assert!(!surface.is_visible("fbButton"));
        assert!(surface.content("body").unwrap().starts_with("<p>First sentence."));
        assert!(surface.content("inkersOnDuty").unwrap().contains("/inkers/jane-doe"));
        assert!(!surface.is_loading());
    }

    #[test]
    fn fb_button_follows_each_article() {
        let mut with_post = article_json("first");
        with_post["fbLink"] = json!("https://facebook.com/post/FIRST");
        let mut blank = article_json("second");
        blank["fbLink"] = json!("  ");

        let mut surface = RecordingSurface::new();
        let source = FixtureSource::new().with(PageKind::SingleArticle, with_post);
        navigator(&source).load("/articles/first", &mut surface).unwrap();
        assert!(surface.is_visible("fbButton"));
        assert_eq!(surface.attr("fbButton", "href"), Some("https://facebook.com/post/FIRST"));

        let source = FixtureSource::new().with(PageKind::SingleArticle, blank);
        navigator(&source).load("/articles/second", &mut surface).unwrap();
        assert!(!surface.is_visible("fbButton"));
        assert_eq!(surface.attr("fbButton", "href"), Some("/404.html"));
    }

    #[test]
    fn loading_overlay_wraps_the_fetch() {
        let source = FixtureSource::new().with(PageKind::SingleArticle, article_json("a"));
        let mut surface = RecordingSurface::new();
        navigator(&source).load("/articles/a", &mut surface).unwrap();
        assert_eq!(surface.patches().first(), Some(&Patch::ShowLoading));
        assert_eq!(surface.patches().last(), Some(&Patch::HideLoading));
    }

    #[test]
    fn missing_inker_redirects() {
        let source = FixtureSource::new()
            .with(PageKind::InkerArticles, json!({"inker": null, "articles": []}));
        let mut surface = RecordingSurface::new();
        let outcome = navigator(&source).load("/inkers/ghost", &mut surface).unwrap();
        assert_eq!(outcome, LoadOutcome::Redirected(NOT_FOUND_PATH.into()));
    }

    #[test]
    fn inker_page_lists_articles() {
        let source = FixtureSource::new().with(
            PageKind::InkerArticles,
            json!({"inker": inker_json("jane-doe"), "articles": [article_json("a"), article_json("b")]}),
        );
        let mut surface = RecordingSurface::new();
        navigator(&source).load("/inkers/jane-doe", &mut surface).unwrap();
        assert_eq!(surface.content("name"), Some("Jane Doe"));
        let list = surface.content("articleList").unwrap();
        assert_eq!(list.matches("<article class=\"articles\">").count(), 2);
        assert!(list.contains("30 minutes ago"));
    }

    #[test]
    fn inker_photo_link_carries_lightbox() {
        let mut with_photo = inker_json("jane-doe");
        with_photo["profilePicture"] = json!({"asset": {"_ref": "image-pp-400x500-jpg"}});

        let mut surface = RecordingSurface::new();
        let source = FixtureSource::new().with(
            PageKind::InkerArticles,
            json!({"inker": with_photo, "articles": []}),
        );
        navigator(&source).load("/inkers/jane-doe", &mut surface).unwrap();
        assert_eq!(surface.attr("profilePictureLink", "data-pswp-width"), Some("400"));
        assert_eq!(surface.attr("profilePictureLink", "data-pswp-height"), Some("500"));
        assert_eq!(
            surface.attr("profilePictureLink", "title"),
            Some("Jane Doe. Click to expand profile picture")
        );
        assert!(surface.content("profilePictureLink").unwrap().contains("pp-400x500.jpg"));

        let source = FixtureSource::new().with(
            PageKind::InkerArticles,
            json!({"inker": inker_json("john"), "articles": []}),
        );
        navigator(&source).load("/inkers/john", &mut surface).unwrap();
        assert_eq!(surface.attr("profilePictureLink", "data-pswp-src"), None);
        assert_eq!(surface.attr("profilePictureLink", "title"), Some("Jane Doe"));
    }

    #[test]
    fn unknown_path_redirects_without_query() {
        let source = FixtureSource::new();
        let mut surface = RecordingSurface::new();
        let outcome = navigator(&source).load("/does/not/exist", &mut surface).unwrap();
        assert_eq!(outcome, LoadOutcome::Redirected(NOT_FOUND_PATH.into()));
        assert_eq!(source.requests(), 0);
    }

    #[test]
    fn query_failure_is_an_error() {
        let source = FixtureSource::new();
        let mut surface = RecordingSurface::new();
        let result = navigator(&source).load("/articles/a", &mut surface);
        assert!(matches!(result, Err(NavigateError::Cms(_))));
        assert!(surface.is_loading());
    }

    // =========================================================================
    // Search
    // =========================================================================

    #[test]
    fn search_without_results_says_so() {
        let source = FixtureSource::new().with(PageKind::Search, json!([]));
        let mut surface = RecordingSurface::new();
        navigator(&source).load("/search?q=zzz", &mut surface).unwrap();
        assert_eq!(
            surface.content("title"),
            Some("Your search - zzz - did not match any results")
        );
        assert_eq!(surface.content("articleList"), Some(""));
    }

    #[test]
    fn search_renders_mixed_hits() {
        let source = FixtureSource::new().with(
            PageKind::Search,
            json!([inker_json("jane-doe"), article_json("jane-writes")]),
        );
        let mut surface = RecordingSurface::new();
        navigator(&source).load("/search?q=jane", &mut surface).unwrap();
        assert_eq!(surface.content("title"), Some("Results for jane"));
        let list = surface.content("articleList").unwrap();
        let inker = list.find("/inkers/jane-doe").unwrap();
        let article = list.find("/articles/jane-writes").unwrap();
        assert!(inker < article);
    }

    // =========================================================================
    // Home feeds
    // =========================================================================

    #[test]
    fn home_shows_for_you_first() {
        let source = FixtureSource::new().with(PageKind::HomeFeeds, home_json());
        let mut surface = RecordingSurface::new();
        let mut nav = navigator(&source);
        nav.load("/", &mut surface).unwrap();
        assert_eq!(nav.state().tab(), FeedTab::ForYou);
        assert!(surface.content("featuredArticles").unwrap().contains("/articles/featured"));
        assert_eq!(surface.content("articleList").unwrap().matches("<a ").count(), 2);
        assert_eq!(surface.content("articleListTitle"), Some("Recent Articles"));
        assert!(surface.is_visible("featuredArticlesTitle"));
    }

    #[test]
    fn switching_tabs_reuses_cached_feeds() {
        let source = FixtureSource::new().with(PageKind::HomeFeeds, home_json());
        let mut surface = RecordingSurface::new();
        let mut nav = navigator(&source);
        nav.load("/", &mut surface).unwrap();
        nav.switch_feed(FeedTab::Explore, &mut surface).unwrap();
        nav.switch_feed(FeedTab::News, &mut surface).unwrap();
        assert_eq!(source.requests(), 1);
        assert_eq!(nav.state().tab(), FeedTab::News);
        assert_eq!(surface.content("articleListTitle"), Some("News &amp; Announcements"));
        assert_eq!(surface.content("featuredArticles"), Some(""));
        assert!(!surface.is_visible("featuredArticlesTitle"));
        assert!(surface.content("articleList").unwrap().contains("/articles/news-1"));
    }

    #[test]
    fn navigation_drops_cached_feeds() {
        let source = FixtureSource::new()
            .with(PageKind::HomeFeeds, home_json())
            .with(PageKind::Staff, json!({}));
        let mut surface = RecordingSurface::new();
        let mut nav = navigator(&source);
        nav.load("/", &mut surface).unwrap();
        nav.load("/staff", &mut surface).unwrap();
        assert!(nav.state().cached_feeds().is_none());
        nav.switch_feed(FeedTab::ForYou, &mut surface).unwrap();
        assert_eq!(source.requests(), 3);
    }

    #[test]
    fn feed_tab_keys_round_trip() {
        for tab in [FeedTab::ForYou, FeedTab::News, FeedTab::Explore] {
            assert_eq!(FeedTab::from_key(tab.key()), Some(tab));
        }
        assert_eq!(FeedTab::from_key("other"), None);
    }

    // =========================================================================
    // Stale responses
    // =========================================================================

    #[test]
    fn older_response_is_discarded() {
        let source = FixtureSource::new()
            .with(PageKind::SingleArticle, article_json("slow"))
            .with(PageKind::SinglePublishedPaper, paper_json("issue-1"));
        let mut surface = RecordingSurface::new();
        let mut nav = navigator(&source);

        let first = nav.begin("/articles/slow", &mut surface);
        let second = nav.begin("/published-papers/issue-1", &mut surface);
        let second = nav.fetch(second).unwrap();
        let first = nav.fetch(first).unwrap();

        assert_eq!(
            nav.finish(second, &mut surface),
            LoadOutcome::Rendered(Route::PublishedPaper("issue-1".into()))
        );
        assert_eq!(nav.finish(first, &mut surface), LoadOutcome::Stale);
        assert_eq!(surface.content("title"), Some("Issue One"));
        assert!(surface.content("flipbook").unwrap().contains("data-page=\"1\""));
    }

    #[test]
    fn stale_response_is_discarded_even_when_first() {
        let source = FixtureSource::new().with(PageKind::SingleArticle, article_json("a"));
        let mut surface = RecordingSurface::new();
        let mut nav = navigator(&source);
        let first = nav.begin("/articles/a", &mut surface);
        let first = nav.fetch(first).unwrap();
        let _second = nav.begin("/articles/b", &mut surface);
        assert_eq!(nav.finish(first, &mut surface), LoadOutcome::Stale);
        assert_eq!(surface.content("title"), None);
    }

    // =========================================================================
    // Archives and staff
    // =========================================================================

    #[test]
    fn archive_months_group_consecutive_articles() {
        let articles = vec![
            dated("a", 2025, 3, 20),
            dated("b", 2025, 3, 2),
            dated("c", 2025, 1, 9),
            dated("d", 2024, 12, 31),
        ];
        let tz = FixedOffset::east_opt(0).unwrap();
        let months = archive_months(&articles, &tz);
        let labels: Vec<&str> = months.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["March 2025", "January 2025", "December 2024"]);
        assert_eq!(months[0].articles.len(), 2);
        assert_eq!(archive_years(&articles, &tz), vec![(2025, 3), (2024, 1)]);
    }

    #[test]
    fn archives_filter_by_year_from_cache() {
        let articles: Vec<Value> = vec![
            json!({"title": "A", "linkName": "a", "publishedAt": "2025-03-20T12:00:00Z"}),
            json!({"title": "B", "linkName": "b", "publishedAt": "2024-06-01T12:00:00Z"}),
        ];
        let source = FixtureSource::new().with(PageKind::Archives, Value::Array(articles));
        let mut surface = RecordingSurface::new();
        let mut nav = navigator(&source);
        nav.load("/archives", &mut surface).unwrap();

        let subnav = surface.content("subnav").unwrap();
        assert!(subnav.contains(r#"<a data-value="all">All (2)</a>"#));
        assert!(subnav.contains(r#"<a data-value="2024">2024 (1)</a>"#));
        assert!(surface.content("main").unwrap().contains("<h2>March 2025 (1)</h2>"));

        nav.switch_year(Some(2024), &mut surface).unwrap();
        let main = surface.content("main").unwrap();
        assert!(main.contains("<h2>June 2024 (1)</h2>"));
        assert!(!main.contains("March 2025"));
        assert_eq!(nav.state().year(), Some(2024));
        assert_eq!(source.requests(), 1);
    }

    #[test]
    fn staff_sections_in_order() {
        let source = FixtureSource::new().with(
            PageKind::Staff,
            json!({"Editor in Chief": [inker_json("chief")], "Members": [inker_json("m1"), inker_json("m2")]}),
        );
        let mut surface = RecordingSurface::new();
        navigator(&source).load("/staff", &mut surface).unwrap();
        let main = surface.content("main").unwrap();
        let chief = main.find("<h2>Editor in Chief</h2>").unwrap();
        let members = main.find("<h2>Members</h2>").unwrap();
        assert!(chief < members);
        assert!(main.contains("/src/images/placeholder-profile.png"));
        assert_eq!(main.matches("class=\"stafflist\"").count(), 5);
    }

    #[test]
    fn about_needs_no_query() {
        let source = FixtureSource::new();
        let mut surface = RecordingSurface::new();
        let outcome = navigator(&source).load("/about", &mut surface).unwrap();
        assert_eq!(outcome, LoadOutcome::Rendered(Route::About));
        assert_eq!(source.requests(), 0);
        assert!(!surface.is_loading());
    }
}
