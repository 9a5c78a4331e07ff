//! `{{Token}}` page templates.
//!
//! A page template is plain HTML with `{{Name}}` placeholders. Rendering is a
//! global literal substitution of every token present in a [`Replacements`]
//! map; placeholders with no entry are left in place. There is no escaping
//! here: values are inserted verbatim, so attribute-bound values must already
//! be passed through [`escape_attr`](crate::format::escape_attr) and markup
//! fragments must come from the escaping renderers.
//!
//! ## Built-in templates
//!
//! The three page kinds ship with templates embedded at compile time. A site
//! can override any of them by dropping `article.html`, `inker.html` or
//! `published-paper.html` into `site.templates_dir`.

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

const ARTICLE_TEMPLATE: &str = include_str!("../templates/article.html");
const INKER_TEMPLATE: &str = include_str!("../templates/inker.html");
const PUBLISHED_PAPER_TEMPLATE: &str = include_str!("../templates/published-paper.html");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z][A-Za-z0-9_]*)\}\}").expect("valid placeholder regex"));

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error reading template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which page a template renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Article,
    Inker,
    PublishedPaper,
}

impl TemplateKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Article => "article.html",
            Self::Inker => "inker.html",
            Self::PublishedPaper => "published-paper.html",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Self::Article => ARTICLE_TEMPLATE,
            Self::Inker => INKER_TEMPLATE,
            Self::PublishedPaper => PUBLISHED_PAPER_TEMPLATE,
        }
    }
}

/// Token name → replacement text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replacements(BTreeMap<String, String>);

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, token: &str, value: impl Into<String>) -> &mut Self {
        self.0.insert(token.to_string(), value.into());
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(String::as_str)
    }

    pub fn extend(&mut self, other: Replacements) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// An HTML page template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn builtin(kind: TemplateKind) -> Self {
        Self::new(kind.builtin())
    }

    /// Template for `kind`, read from `dir` when it has one, else built in.
    pub fn load(kind: TemplateKind, dir: Option<&Path>) -> Result<Self, TemplateError> {
        let Some(path) = dir.map(|d| d.join(kind.file_name())).filter(|p| p.exists()) else {
            return Ok(Self::builtin(kind));
        };
        debug!(path = %path.display(), "using template override");
        let source = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(source))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute every known token, everywhere it appears.
    ///
    /// Replacement text is not rescanned, so a value that happens to contain
    /// `{{Token}}` is inserted literally.
    pub fn render(&self, replacements: &Replacements) -> String {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &regex::Captures<'_>| {
                match replacements.get(&caps[1]) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Token names still present in rendered output, in first-seen order.
pub fn unresolved_tokens(html: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(html) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}
