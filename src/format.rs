//! Pure display formatting for CMS records.
//!
//! Every function here is a pure mapping from record fields (plus, for
//! dates, the current time) to display text. Both the static emitter and
//! the runtime navigator go through these, so a page reads the same whether
//! it was pre-rendered or patched in place.
//!
//! | Function | Produces |
//! |----------|----------|
//! | [`format_relative_date`] | "Just now", "5 minutes ago", "Yesterday", "Mar 4", "Mar 4, 2023" |
//! | [`format_published_date`] | Absolute header label, "March 4, 2025 at 3:07 PM" |
//! | [`derive_preview`] | Subtitle, else the first sentence of the body (≤ 100 chars) |
//! | [`format_contributor_credit`] | "By: A", "By: A & B", "By: A, B, & N others" |
//! | [`truncate_title`] | Hard character truncation with `...` |
//! | [`escape_attr`] | Double-quote escaping for attribute-bound values |

use crate::types::Block;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use unicode_normalization::UnicodeNormalization;

/// Preview length before the ellipsis kicks in.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Title length on article cards.
pub const CARD_TITLE_MAX_CHARS: usize = 60;

/// Recency label for a publication timestamp, relative to `now`.
///
/// Calendar comparisons happen in `now`'s time zone; the minute and hour
/// counts are plain wall-clock differences floored to whole units. A
/// timestamp in the future counts as "Just now".
pub fn format_relative_date<Tz: TimeZone>(published: &DateTime<Utc>, now: &DateTime<Tz>) -> String {
    let local = published.with_timezone(&now.timezone());
    let published_day = local.date_naive();
    let today = now.date_naive();

    if published_day == today {
        let elapsed = now.clone().signed_duration_since(local);
        let minutes = elapsed.num_minutes();
        let hours = elapsed.num_hours();
        if minutes < 1 {
            return "Just now".to_string();
        }
        if hours < 1 {
            return format!("{} minute{} ago", minutes, plural(minutes));
        }
        return format!("{} hour{} ago", hours, plural(hours));
    }

    if today.pred_opt() == Some(published_day) {
        return "Yesterday".to_string();
    }

    if published_day.year() == today.year() {
        published_day.format("%b %-d").to_string()
    } else {
        published_day.format("%b %-d, %Y").to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Absolute publication label used in article headers.
pub fn format_published_date<Tz: TimeZone>(published: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    published.format("%B %-d, %Y at %-I:%M %p").to_string()
}

/// Short description for cards and SEO tags.
///
/// Prefers a non-empty subtitle. Otherwise takes the first span of the first
/// body block, keeps its first sentence (split at `.`, `!` or `?` followed by
/// whitespace), cuts it to [`PREVIEW_MAX_CHARS`] with a trailing `...`, then
/// NFKD-normalizes and drops everything outside printable ASCII except en
/// and em dashes.
pub fn derive_preview(subtitle: Option<&str>, body: &[Block]) -> String {
    if let Some(subtitle) = subtitle.filter(|s| !s.is_empty()) {
        return subtitle.to_string();
    }

    let Some(text) = body.first().and_then(Block::first_text).filter(|t| !t.is_empty()) else {
        return String::new();
    };

    let sentence = first_sentence(text);
    let clipped = if sentence.chars().count() > PREVIEW_MAX_CHARS {
        let head: String = sentence.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        sentence.to_string()
    };

    clipped.nfkd().filter(|c| is_preview_char(*c)).collect()
}

/// Everything up to and including the first sentence terminator that is
/// followed by whitespace. The whole input when there is none.
fn first_sentence(text: &str) -> &str {
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            return &text[..idx + c.len_utf8()];
        }
    }
    text
}

fn is_preview_char(c: char) -> bool {
    matches!(c, '\x20'..='\x7E' | '\u{2013}' | '\u{2014}')
}

/// Credit line for an article's contributors.
///
/// ```text
/// []                  → ""
/// [A]                 → "By: A"
/// [A, B]              → "By: A & B"
/// [A, B, C]           → "By: A, B, & 1 other"
/// [A, B, C, D, E]     → "By: A, B, & 3 others"
/// ```
pub fn format_contributor_credit<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [a] => format!("By: {}", a.as_ref()),
        [a, b] => format!("By: {} & {}", a.as_ref(), b.as_ref()),
        [a, b, _] => format!("By: {}, {}, & 1 other", a.as_ref(), b.as_ref()),
        [a, b, rest @ ..] => format!(
            "By: {}, {}, & {} others",
            a.as_ref(),
            b.as_ref(),
            rest.len()
        ),
    }
}

/// Cut `title` to `max` characters, appending `...` when anything was cut.
pub fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        title.to_string()
    } else {
        let head: String = title.chars().take(max).collect();
        format!("{head}...")
    }
}

/// Escape double quotes for values that land inside `"..."` attributes.
pub fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;")
}
