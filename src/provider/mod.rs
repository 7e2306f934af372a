//! Provider module defines the lookup contracts every external metadata source implements.
//!
//! The matchers depend only on the [`BookProvider`] and [`ComicProvider`] traits, never on
//! a concrete HTTP client, so test doubles can stand in for the real services. The
//! concrete providers live in the submodules and share the status mapping in [`fetch_json`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::types::{CoverSize, ResolvedComicMetadata, ResolvedMetadata};

pub mod comic_vine;
pub mod google_books;
pub mod metron;
pub mod open_library;

pub use comic_vine::ComicVineProvider;
pub use google_books::GoogleBooksProvider;
pub use metron::MetronProvider;
pub use open_library::OpenLibraryProvider;

/// Common interface for plain-book metadata sources.
///
/// Implementations map their service's "not found" answers to [`Error::NoMatch`] and
/// throttling answers to [`Error::RateLimited`]. Cancellation is handled by the caller
/// dropping the returned future.
#[async_trait]
pub trait BookProvider: Send + Sync {
    /// Short identifier stored in `ResolvedMetadata::source`.
    fn name(&self) -> &str;

    /// Looks up a single edition by ISBN.
    async fn lookup_by_isbn(&self, isbn: &str) -> Result<ResolvedMetadata>;

    /// Free-text search by title and author. Either argument may be empty.
    async fn search(&self, title: &str, author: &str) -> Result<Vec<ResolvedMetadata>>;

    /// Cover image URL for an ISBN. Does not perform any I/O.
    fn cover_url(&self, isbn: &str, size: CoverSize) -> String;
}

/// Common interface for comic metadata sources.
#[async_trait]
pub trait ComicProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Searches issues of a series with a given issue number.
    async fn search_by_series_and_issue(
        &self,
        series: &str,
        issue: &str,
    ) -> Result<Vec<ResolvedComicMetadata>>;

    /// Searches issues by free-text title.
    async fn search_by_title(&self, title: &str) -> Result<Vec<ResolvedComicMetadata>>;

    /// Fetches the full record of one issue by its provider-specific id.
    async fn get_issue_details(&self, source_id: &str) -> Result<ResolvedComicMetadata>;
}

/// The primary/fallback chains handed to the engine.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub book_primary: Option<Arc<dyn BookProvider>>,
    pub book_fallback: Option<Arc<dyn BookProvider>>,
    pub comic_primary: Option<Arc<dyn ComicProvider>>,
    pub comic_fallback: Option<Arc<dyn ComicProvider>>,
}

impl ProviderSet {
    /// Builds the default HTTP providers for a configuration.
    ///
    /// Open Library is the primary book source with Google Books as fallback. Comic
    /// sources are only added when their credentials are configured: Comic Vine first,
    /// Metron second (or alone, when no Comic Vine key is set).
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let book_primary: Arc<dyn BookProvider> = Arc::new(OpenLibraryProvider::new(config)?);
        let book_fallback: Arc<dyn BookProvider> = Arc::new(GoogleBooksProvider::new(config)?);

        let comic_vine: Option<Arc<dyn ComicProvider>> = match &config.comic_vine_api_key {
            Some(key) if !key.is_empty() => {
                Some(Arc::new(ComicVineProvider::new(config, key.clone())?))
            }
            _ => None,
        };
        let metron: Option<Arc<dyn ComicProvider>> =
            match (&config.metron_username, &config.metron_password) {
                (Some(user), Some(password)) => Some(Arc::new(MetronProvider::new(
                    config,
                    user.clone(),
                    password.clone(),
                )?)),
                _ => None,
            };

        let (comic_primary, comic_fallback) = match (comic_vine, metron) {
            (Some(primary), fallback) => (Some(primary), fallback),
            (None, Some(primary)) => (Some(primary), None),
            (None, None) => (None, None),
        };

        Ok(Self {
            book_primary: Some(book_primary),
            book_fallback: Some(book_fallback),
            comic_primary,
            comic_fallback,
        })
    }
}

/// Builds the shared HTTP client with the configured user agent and timeout.
pub(crate) fn build_http_client(config: &EngineConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("Failed to build HTTP client: {}", e)))
}

/// Sends a request and decodes its JSON body, mapping HTTP outcomes onto the error taxonomy.
///
/// * transport failures and gateway errors → [`Error::ProviderUnavailable`]
/// * 404 → [`Error::NoMatch`]
/// * 429 → [`Error::RateLimited`]
/// * any other non-success status or an undecodable body → [`Error::Provider`]
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::ProviderUnavailable(provider.to_string(), e.to_string()))?;

    let status = response.status();
    log::debug!("{} answered HTTP {}", provider, status.as_u16());

    match status {
        StatusCode::NOT_FOUND => return Err(Error::NoMatch),
        StatusCode::TOO_MANY_REQUESTS => return Err(Error::RateLimited(provider.to_string())),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            return Err(Error::ProviderUnavailable(
                provider.to_string(),
                format!("HTTP {}", status.as_u16()),
            ));
        }
        _ => {}
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::Provider(
            provider.to_string(),
            format!("HTTP {}: {}", status.as_u16(), error_text),
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::ProviderUnavailable(provider.to_string(), e.to_string()))?;

    decode_json(provider, &body)
}

/// Decodes a provider body, reporting failures as provider errors.
pub(crate) fn decode_json<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        Error::Provider(provider.to_string(), format!("Invalid response body: {}", e))
    })
}

/// Drops HTML tags and collapses whitespace in provider descriptions.
pub(crate) fn strip_html(text: &str) -> String {
    lazy_static::lazy_static! {
        static ref TAG_REGEX: regex::Regex = regex::Regex::new(r"<[^>]*>").unwrap();
    }
    let without_tags = TAG_REGEX.replace_all(text, " ");
    without_tags
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
