//! Common types and utilities shared across Shelf crates.
//!
//! This crate defines the records that flow between the extractor, the store
//! and the HTTP surface, input validation shared by callers, observability
//! helpers, and the shared error type. It is intentionally lightweight so that
//! every crate can depend on it without pulling in heavy transitive costs.
//!
//! # Overview
//!
//! - [`PageMetadata`]: best-effort summary extracted from a page
//! - [`NewArticle`] / [`Article`]: a saved link before and after persistence
//! - [`PageRequest`]: validated pagination window
//! - [`parse_article_url`]: validation for submitted links
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ShelfError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use shelf_common::{PageMetadata, PageRequest};
//!
//! let meta = PageMetadata::default();
//! assert!(meta.is_empty());
//!
//! let window = PageRequest::new(2, 20).unwrap();
//! assert_eq!(window.offset(), 40);
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub mod observability;

/// Upper bound for a single page of the article list.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Metadata derived from a fetched HTML document.
///
/// Every field is independently optional. A present value is never empty;
/// `image` and `favicon` are absolute whenever the page declared them as
/// root-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub favicon: Option<String>,
}

impl PageMetadata {
    /// True when no field could be extracted.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image.is_none()
            && self.favicon.is_none()
    }
}

/// A link ready to be persisted: the submitted URL plus what was extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub url: Url,
    pub metadata: PageMetadata,
}

/// A saved link as returned by the store and the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub favicon: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Zero-based pagination window over the article list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Validate a pagination window; `limit` must be within `1..=MAX_PAGE_LIMIT`.
    ///
    /// ```
    /// use shelf_common::PageRequest;
    ///
    /// assert!(PageRequest::new(0, 0).is_err());
    /// assert!(PageRequest::new(0, 101).is_err());
    /// assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 30);
    /// ```
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ShelfError::InvalidPage(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        Ok(Self { page, limit })
    }

    /// Number of rows preceding this page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.limit)
    }
}

/// Validate a user-submitted link: it must be an absolute `http(s)` URL with a host.
///
/// ```
/// use shelf_common::parse_article_url;
///
/// assert!(parse_article_url("https://example.com/post").is_ok());
/// assert!(parse_article_url("example.com").is_err());
/// assert!(parse_article_url("ftp://example.com/file").is_err());
/// ```
pub fn parse_article_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ShelfError::InvalidUrl("url is required".into()));
    }
    let url = Url::parse(raw).map_err(|e| ShelfError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ShelfError::InvalidUrl(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ShelfError::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(url)
}

/// Error types used across the Shelf system.
#[derive(thiserror::Error, Debug)]
pub enum ShelfError {
    /// A submitted link was not an absolute http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Pagination parameters were out of range.
    #[error("Invalid page request: {0}")]
    InvalidPage(String),
}

/// Convenient alias for results that use [`ShelfError`].
pub type Result<T> = std::result::Result<T, ShelfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_with_any_field_is_not_empty() {
        let meta = PageMetadata {
            favicon: Some("https://example.com/favicon.ico".into()),
            ..Default::default()
        };
        assert!(!meta.is_empty());
    }

    #[test]
    fn article_serializes_with_camel_case_keys() {
        let article = Article {
            id: 7,
            url: "https://example.com".into(),
            title: Some("Example".into()),
            description: None,
            image: None,
            favicon: None,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["createdAt"], "2023-11-14T22:13:20Z");
        assert!(json["description"].is_null());
    }

    #[test]
    fn article_url_is_trimmed_and_validated() {
        let url = parse_article_url("  https://example.com/a  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");

        assert!(matches!(
            parse_article_url(""),
            Err(ShelfError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_article_url("mailto:someone@example.com"),
            Err(ShelfError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_article_url("/relative/path"),
            Err(ShelfError::InvalidUrl(_))
        ));
    }

    #[test]
    fn page_request_offsets_do_not_overflow() {
        let window = PageRequest::new(u32::MAX, MAX_PAGE_LIMIT).unwrap();
        assert_eq!(window.offset(), i64::from(u32::MAX) * 100);
    }
}
