//! Page acquisition and metadata extraction.
//!
//! - Pure, synchronous HTML metadata extraction (`extract`)
//! - Fetcher trait and `reqwest`-backed implementation (`fetch`)
//! - [`summarize`]: fetch a page, then extract its metadata
//!
//! Extraction never fails; fetching is the only fallible step and surfaces a
//! [`FetchError`] before any extraction is attempted.

pub mod extract;
pub mod fetch;

pub use extract::extract;
pub use fetch::{HttpFetcher, PageFetcher};
pub use shelf_http::FetchError;

use shelf_common::PageMetadata;
use url::Url;

/// Fetch `url` and extract its metadata, using `url` as the base for
/// root-relative image and favicon paths.
pub async fn summarize(fetcher: &dyn PageFetcher, url: &Url) -> Result<PageMetadata, FetchError> {
    let html = fetcher.fetch(url).await?;
    let metadata = extract(&html, url);
    tracing::info!(
        url = %url,
        has_title = metadata.title.is_some(),
        has_description = metadata.description.is_some(),
        has_image = metadata.image.is_some(),
        has_favicon = metadata.favicon.is_some(),
        "web.summarize.done"
    );
    Ok(metadata)
}
