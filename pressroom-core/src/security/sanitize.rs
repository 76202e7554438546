//! Content sanitization applied to user input before it is persisted.
//!
//! Sanitization happens on the server only. The HTML strategy is picked once
//! at startup through [`SanitizerMode`] and shared behind [`ContentSanitizer`].

use crate::config::SanitizerMode;
use ammonia::{Builder, UrlRelative};
use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "u", "s", "b", "i", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol",
    "li", "blockquote", "code", "pre", "a", "img", "table", "thead", "tbody", "tfoot", "tr", "th",
    "td", "caption", "colgroup", "col", "div", "span", "hr", "del", "ins", "sub", "sup",
];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "class", "id", "title", "href", "target", "rel", "name", "src", "alt", "width", "height",
    "colspan", "rowspan", "lang",
];

/// Removed together with everything inside them.
const DENIED_CONTENT_TAGS: &[&str] = &["script", "style", "iframe", "embed", "object"];

/// Removed, but their text content is kept.
const DENIED_TAGS: &[&str] = &["form", "input", "button"];

const DENIED_ATTRIBUTES: &[&str] = &[
    "onerror",
    "onload",
    "onclick",
    "onmouseover",
    "onfocus",
    "onblur",
];

const URI_ATTRIBUTES: &[&str] = &["href", "src"];

lazy_static::lazy_static! {
    static ref ALLOWED_URI_REGEX: regex::Regex = regex::Regex::new(
        r"(?i)^(?:(?:https?|mailto|tel|callto|sms|cid|xmpp):|data:image/(?:png|jpe?g|gif|webp);base64,|[^a-z]|[a-z+.\-]+(?:[^a-z+.\-:]|$))"
    )
    .unwrap();
    static ref SLUG_DISALLOWED: regex::Regex = regex::Regex::new(r"[^a-z0-9\-_]").unwrap();
    static ref SLUG_HYPHEN_RUN: regex::Regex = regex::Regex::new(r"-{2,}").unwrap();
}

/// HTML cleaning strategy.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, input: &str) -> String;
    fn name(&self) -> &'static str;
}

/// Escape `& < > " ' /` for fields rendered as text, never as markup.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Lowercase, map anything outside `[a-z0-9-_]` to a hyphen, collapse hyphen
/// runs and trim hyphens from both ends.
pub fn sanitize_slug(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let replaced = SLUG_DISALLOWED.replace_all(&lowered, "-");
    let collapsed = SLUG_HYPHEN_RUN.replace_all(&replaced, "-");
    collapsed.trim_matches('-').to_string()
}

fn is_attribute_whitespace(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{0020}' | '\u{00A0}' | '\u{1680}' | '\u{180E}' | '\u{2000}'..='\u{2029}' | '\u{205F}' | '\u{3000}')
}

/// Whether a URI attribute value uses an allowed scheme (or is relative).
pub fn is_allowed_uri(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !is_attribute_whitespace(*c)).collect();
    ALLOWED_URI_REGEX.is_match(&compact)
}

fn filter_attribute<'u>(_element: &str, attribute: &str, value: &'u str) -> Option<Cow<'u, str>> {
    let attribute = attribute.to_ascii_lowercase();
    if attribute.starts_with("on") || DENIED_ATTRIBUTES.contains(&attribute.as_str()) {
        return None;
    }
    if URI_ATTRIBUTES.contains(&attribute.as_str()) && !is_allowed_uri(value) {
        return None;
    }
    Some(Cow::Borrowed(value))
}

/// Run a cleaner, falling back to escaped text if it fails.
fn clean_or_escape<F: FnOnce() -> String>(input: &str, clean: F) -> String {
    match catch_unwind(AssertUnwindSafe(clean)) {
        Ok(cleaned) => cleaned,
        Err(_) => {
            tracing::error!(
                input_len = input.len(),
                "HTML sanitizer failed, storing escaped text instead"
            );
            escape_text(input)
        }
    }
}

/// Allow-list based rich HTML sanitizer.
pub struct AllowListSanitizer {
    builder: Builder<'static>,
}

impl AllowListSanitizer {
    pub fn new() -> Self {
        let mut builder = Builder::default();
        builder
            .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
            .clean_content_tags(DENIED_CONTENT_TAGS.iter().copied().collect::<HashSet<_>>())
            .tag_attributes(HashMap::new())
            .generic_attributes(ALLOWED_ATTRIBUTES.iter().copied().collect::<HashSet<_>>())
            .url_schemes(
                [
                    "http", "https", "mailto", "tel", "callto", "sms", "cid", "xmpp", "data",
                ]
                .into_iter()
                .collect::<HashSet<_>>(),
            )
            .url_relative(UrlRelative::PassThrough)
            .link_rel(None)
            .attribute_filter(filter_attribute);
        debug_assert!(DENIED_TAGS.iter().all(|t| !ALLOWED_TAGS.contains(t)));
        Self { builder }
    }
}

impl Default for AllowListSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSanitizer for AllowListSanitizer {
    fn sanitize(&self, input: &str) -> String {
        clean_or_escape(input, || self.builder.clean(input).to_string())
    }

    fn name(&self) -> &'static str {
        "allow_list"
    }
}

/// Escapes all markup; nothing is interpreted as HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextSanitizer;

impl HtmlSanitizer for PlainTextSanitizer {
    fn sanitize(&self, input: &str) -> String {
        escape_text(input)
    }

    fn name(&self) -> &'static str {
        "text_only"
    }
}

#[derive(Clone)]
pub struct ContentSanitizer {
    html: Arc<dyn HtmlSanitizer>,
}

impl ContentSanitizer {
    pub fn new(html: Arc<dyn HtmlSanitizer>) -> Self {
        Self { html }
    }

    pub fn from_mode(mode: SanitizerMode) -> Self {
        let html: Arc<dyn HtmlSanitizer> = match mode {
            SanitizerMode::AllowList => Arc::new(AllowListSanitizer::new()),
            SanitizerMode::TextOnly => Arc::new(PlainTextSanitizer),
        };
        tracing::info!(sanitizer = html.name(), "HTML sanitizer selected");
        Self { html }
    }

    pub fn escape_text(&self, input: &str) -> String {
        escape_text(input)
    }

    pub fn sanitize_html(&self, input: &str) -> String {
        self.html.sanitize(input)
    }

    pub fn sanitize_slug(&self, input: &str) -> String {
        sanitize_slug(input)
    }
}

impl std::fmt::Debug for ContentSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSanitizer")
            .field("html", &self.html.name())
            .finish()
    }
}
