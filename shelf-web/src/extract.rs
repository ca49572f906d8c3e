//! Page metadata extraction.
//!
//! [`extract`] turns raw markup into a [`PageMetadata`] record. The document
//! is parsed with html5ever (via `scraper`), which accepts any input, and each
//! field is resolved by walking an ordered chain of [`Source`]s: the first
//! source yielding a non-empty value wins. Within one source, candidates are
//! visited in document order.
//!
//! | field       | chain                                                    |
//! |-------------|----------------------------------------------------------|
//! | title       | `<title>`, `og:title`, `twitter:title`, first `<h1>`     |
//! | description | `description`, `og:description`, `twitter:description`  |
//! | image       | `og:image`, `twitter:image`                              |
//! | favicon     | `rel="icon"`, `rel="shortcut icon"`, `rel="apple-touch-icon"` |
//!
//! The winning `image` and `favicon` values are made absolute when they are
//! root-relative paths; see [`resolve_root_relative`].

use std::fmt;

use scraper::{ElementRef, Html};
use shelf_common::PageMetadata;
use url::Url;

/// One place in a document a field value can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Text of a `<title>` element outside inline SVG.
    TitleTag,
    /// `content` of a `<meta>` whose `name` or `property` equals the key.
    Meta(&'static str),
    /// Text of an `<h1>` element.
    Heading,
    /// `href` of a `<link>` whose normalized `rel` equals the value.
    LinkRel(&'static str),
}

pub const TITLE_CHAIN: &[Source] = &[
    Source::TitleTag,
    Source::Meta("og:title"),
    Source::Meta("twitter:title"),
    Source::Heading,
];

pub const DESCRIPTION_CHAIN: &[Source] = &[
    Source::Meta("description"),
    Source::Meta("og:description"),
    Source::Meta("twitter:description"),
];

pub const IMAGE_CHAIN: &[Source] = &[Source::Meta("og:image"), Source::Meta("twitter:image")];

pub const FAVICON_CHAIN: &[Source] = &[
    Source::LinkRel("icon"),
    Source::LinkRel("shortcut icon"),
    Source::LinkRel("apple-touch-icon"),
];

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::TitleTag => f.write_str("title"),
            Source::Meta(key) => write!(f, "meta[{key}]"),
            Source::Heading => f.write_str("h1"),
            Source::LinkRel(rel) => write!(f, "link[rel={rel}]"),
        }
    }
}

impl Source {
    /// First non-empty value this source yields, in document order.
    fn probe(&self, elements: &[ElementRef<'_>]) -> Option<String> {
        elements
            .iter()
            .filter(|el| self.matches(el))
            .find_map(|el| self.value(el))
    }

    fn matches(&self, el: &ElementRef<'_>) -> bool {
        let element = el.value();
        match self {
            Source::TitleTag => element.name() == "title" && !inside_svg(el),
            Source::Heading => element.name() == "h1",
            Source::Meta(key) => {
                element.name() == "meta"
                    && ["name", "property"].iter().any(|attr| {
                        element
                            .attr(attr)
                            .is_some_and(|v| v.trim().eq_ignore_ascii_case(key))
                    })
            }
            Source::LinkRel(rel) => {
                element.name() == "link"
                    && element
                        .attr("rel")
                        .is_some_and(|v| normalize_rel(v) == *rel)
            }
        }
    }

    fn value(&self, el: &ElementRef<'_>) -> Option<String> {
        match self {
            Source::TitleTag | Source::Heading => non_empty(collapse_whitespace(el)),
            Source::Meta(_) => el.value().attr("content").and_then(trimmed),
            Source::LinkRel(_) => el.value().attr("href").and_then(trimmed),
        }
    }
}

/// Extract a metadata summary from `html`, resolving root-relative image and
/// favicon paths against `source_url`.
///
/// Never fails: anything missing or unparseable simply leaves the field `None`.
///
/// ```
/// use shelf_web::extract::extract;
/// use url::Url;
///
/// let base = Url::parse("https://example.com").unwrap();
/// let meta = extract(
///     r#"<title>Test Title</title><meta name="description" content="Test Description">"#,
///     &base,
/// );
/// assert_eq!(meta.title.as_deref(), Some("Test Title"));
/// assert_eq!(meta.description.as_deref(), Some("Test Description"));
/// assert_eq!(meta.image, None);
/// assert_eq!(meta.favicon, None);
/// ```
pub fn extract(html: &str, source_url: &Url) -> PageMetadata {
    let document = Html::parse_document(html);
    let elements: Vec<ElementRef<'_>> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    let title = first_of(&elements, TITLE_CHAIN);
    let description = first_of(&elements, DESCRIPTION_CHAIN);
    let image = first_of(&elements, IMAGE_CHAIN);
    let favicon = first_of(&elements, FAVICON_CHAIN);

    tracing::debug!(
        source_url = %source_url,
        html_len = html.len(),
        title = ?title.as_ref().map(|(_, s)| s.to_string()),
        description = ?description.as_ref().map(|(_, s)| s.to_string()),
        image = ?image.as_ref().map(|(_, s)| s.to_string()),
        favicon = ?favicon.as_ref().map(|(_, s)| s.to_string()),
        "extract.metadata.done"
    );

    PageMetadata {
        title: title.map(|(v, _)| v),
        description: description.map(|(v, _)| v),
        image: image.map(|(v, _)| resolve_root_relative(v, source_url)),
        favicon: favicon.map(|(v, _)| resolve_root_relative(v, source_url)),
    }
}

/// Walk `chain` in priority order and return the first value found with its source.
pub fn first_of(elements: &[ElementRef<'_>], chain: &[Source]) -> Option<(String, Source)> {
    chain
        .iter()
        .find_map(|source| source.probe(elements).map(|value| (value, *source)))
}

/// Prefix a root-relative path (`/img.png`) with the origin of `base`.
///
/// Protocol-relative (`//cdn/x.png`), absolute, and other relative values are
/// returned unchanged, as is everything when `base` has an opaque origin.
///
/// ```
/// use shelf_web::extract::resolve_root_relative;
/// use url::Url;
///
/// let base = Url::parse("https://example.com:8443/posts/1").unwrap();
/// assert_eq!(
///     resolve_root_relative("/img.jpg".into(), &base),
///     "https://example.com:8443/img.jpg"
/// );
/// assert_eq!(
///     resolve_root_relative("//cdn.example.com/img.jpg".into(), &base),
///     "//cdn.example.com/img.jpg"
/// );
/// ```
pub fn resolve_root_relative(value: String, base: &Url) -> String {
    if !value.starts_with('/') || value.starts_with("//") {
        return value;
    }
    let origin = base.origin();
    if !origin.is_tuple() {
        return value;
    }
    format!("{}{}", origin.ascii_serialization(), value)
}

fn inside_svg(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "svg")
}

/// `"Shortcut   ICON"` -> `"shortcut icon"`
fn normalize_rel(rel: &str) -> String {
    rel.split_ascii_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(el: &ElementRef<'_>) -> String {
    let text: String = el.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trimmed(value: &str) -> Option<String> {
    non_empty(value.trim().to_string())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
