//! Engine configuration and the caller-facing [`MetadataEngine`] facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::filename;
use crate::matcher::{BookMatcher, BookQuery, ComicMatcher, ComicQuery};
use crate::provider::ProviderSet;
use crate::rate_limiter::RateLimiter;
use crate::rewriter::ArchiveRewriter;
use crate::types::{
    ArchiveMetadata, CoverSize, FilenameInfo, ResolvedComicMetadata, ResolvedMetadata,
    RewriteOutcome,
};

pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_USER_AGENT: &str = concat!("shiori/", env!("CARGO_PKG_VERSION"));
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Engine configuration, built declaratively using the builder pattern.
///
/// ```rust
/// # use shiori::prelude::*;
/// # use std::time::Duration;
/// let config = EngineConfig::builder()
///     .min_request_interval(Duration::from_millis(500))
///     .user_agent("my-library/1.0 (admin@example.org)")
///     .comic_vine_api_key("secret")
///     .build()
///     .expect("Invalid configuration");
/// assert_eq!(config.cover_size, CoverSize::Large);
/// ```
///
/// It can also be loaded with serde; missing fields take their defaults. Call
/// [`EngineConfig::validate`] on deserialized values.
#[derive(Clone, derive_builder::Builder, serde::Deserialize)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum spacing between two outbound calls of one matcher. Zero disables throttling.
    #[builder(default = "DEFAULT_MIN_REQUEST_INTERVAL")]
    pub min_request_interval: Duration,

    /// Per-request HTTP timeout, between 1 and 120 seconds.
    #[builder(default = "DEFAULT_REQUEST_TIMEOUT")]
    pub request_timeout: Duration,

    #[builder(default = "DEFAULT_USER_AGENT.to_string()")]
    pub user_agent: String,

    /// Size of cover URLs filled in for ISBN matches.
    #[builder(default)]
    pub cover_size: CoverSize,

    /// Complete the best comic match with a detail lookup.
    #[builder(default = "true")]
    pub enrich_comic_details: bool,

    /// Reject a second concurrent rewrite of the same archive path.
    #[builder(default = "true")]
    pub serialize_rewrites: bool,

    #[builder(default)]
    pub google_books_api_key: Option<String>,

    /// Enables the Comic Vine provider.
    #[builder(default)]
    pub comic_vine_api_key: Option<String>,

    /// Metron credentials; both or neither.
    #[builder(default)]
    pub metron_username: Option<String>,
    #[builder(default)]
    pub metron_password: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_request_interval: DEFAULT_MIN_REQUEST_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cover_size: CoverSize::default(),
            enrich_comic_details: true,
            serialize_rewrites: true,
            google_books_api_key: None,
            comic_vine_api_key: None,
            metron_username: None,
            metron_password: None,
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| if secret.is_some() { "Some(***)" } else { "None" };
        f.debug_struct("EngineConfig")
            .field("min_request_interval", &self.min_request_interval)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("cover_size", &self.cover_size)
            .field("enrich_comic_details", &self.enrich_comic_details)
            .field("serialize_rewrites", &self.serialize_rewrites)
            .field("google_books_api_key", &redact(&self.google_books_api_key))
            .field("comic_vine_api_key", &redact(&self.comic_vine_api_key))
            .field("metron_username", &self.metron_username)
            .field("metron_password", &redact(&self.metron_password))
            .finish()
    }
}

impl EngineConfig {
    /// Creates a new builder for configuring `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Applies the builder's checks to an already constructed (e.g. deserialized) value.
    pub fn validate(&self) -> Result<()> {
        check_settings(
            &self.user_agent,
            self.request_timeout,
            self.metron_username.is_some(),
            self.metron_password.is_some(),
        )
        .map_err(Error::InvalidConfig)
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let has_user = matches!(self.metron_username, Some(Some(_)));
        let has_password = matches!(self.metron_password, Some(Some(_)));
        check_settings(user_agent, timeout, has_user, has_password)
    }
}

fn check_settings(
    user_agent: &str,
    request_timeout: Duration,
    has_metron_username: bool,
    has_metron_password: bool,
) -> std::result::Result<(), String> {
    if user_agent.trim().is_empty() {
        return Err("User agent must not be empty.".to_string());
    }
    if request_timeout < Duration::from_secs(1) || request_timeout > MAX_REQUEST_TIMEOUT {
        return Err(format!(
            "Request timeout must be between 1 and {} seconds.",
            MAX_REQUEST_TIMEOUT.as_secs()
        ));
    }
    if has_metron_username != has_metron_password {
        return Err("Metron username and password must be set together.".to_string());
    }
    Ok(())
}

/// Resolves metadata from external providers and writes it back into archives.
///
/// The book and comic matchers each own a separate [`RateLimiter`], so book lookups
/// never wait on comic traffic. All provider-bound operations race against the
/// caller's [`CancellationToken`].
pub struct MetadataEngine {
    config: EngineConfig,
    books: Option<BookMatcher>,
    comics: Option<ComicMatcher>,
    rewriter: ArchiveRewriter,
}

impl MetadataEngine {
    /// Builds an engine over explicit provider chains.
    pub fn new(config: EngineConfig, providers: ProviderSet) -> Self {
        let books = providers.book_primary.map(|primary| {
            let limiter = Arc::new(RateLimiter::new(config.min_request_interval));
            BookMatcher::new(primary, providers.book_fallback, limiter)
                .with_cover_size(config.cover_size)
        });
        let comics = providers.comic_primary.map(|primary| {
            let limiter = Arc::new(RateLimiter::new(config.min_request_interval));
            ComicMatcher::new(primary, providers.comic_fallback, limiter)
                .with_detail_enrichment(config.enrich_comic_details)
        });
        let rewriter = if config.serialize_rewrites {
            ArchiveRewriter::new()
        } else {
            ArchiveRewriter::without_path_locking()
        };

        Self {
            config,
            books,
            comics,
            rewriter,
        }
    }

    /// Builds an engine with the default HTTP providers for `config`.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let providers = ProviderSet::from_config(&config)?;
        Ok(Self::new(config, providers))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Best book match: ISBN lookup first, then title/author search.
    pub async fn resolve_book_metadata(
        &self,
        cancel: &CancellationToken,
        isbn: &str,
        title: &str,
        author: &str,
    ) -> Result<ResolvedMetadata> {
        self.book_matcher()?
            .resolve(cancel, &BookQuery::new(isbn, title, author))
            .await
    }

    /// All book candidates, de-duplicated and ranked by confidence.
    pub async fn search_book_metadata(
        &self,
        cancel: &CancellationToken,
        isbn: &str,
        title: &str,
        author: &str,
    ) -> Result<Vec<ResolvedMetadata>> {
        self.book_matcher()?
            .search(cancel, &BookQuery::new(isbn, title, author))
            .await
    }

    /// Best comic issue match. `year` is `0` when unknown.
    pub async fn resolve_comic_metadata(
        &self,
        cancel: &CancellationToken,
        series: &str,
        issue: &str,
        title: &str,
        year: i32,
    ) -> Result<ResolvedComicMetadata> {
        self.comic_matcher()?
            .resolve(cancel, &ComicQuery::new(series, issue, title, year))
            .await
    }

    /// All comic candidates, de-duplicated and ranked by confidence.
    pub async fn search_comic_metadata(
        &self,
        cancel: &CancellationToken,
        series: &str,
        issue: &str,
        title: &str,
        year: i32,
    ) -> Result<Vec<ResolvedComicMetadata>> {
        self.comic_matcher()?
            .search(cancel, &ComicQuery::new(series, issue, title, year))
            .await
    }

    /// Parses a comic filename and resolves the issue it names.
    pub async fn resolve_comic_from_filename(
        &self,
        cancel: &CancellationToken,
        filename: &str,
    ) -> Result<ResolvedComicMetadata> {
        let info = self.parse_comic_filename(filename);
        if info.series.is_empty() {
            log::debug!("No series in filename {:?}", filename);
            return Err(Error::NoMatch);
        }
        self.comic_matcher()?
            .resolve(cancel, &ComicQuery::from(&info))
            .await
    }

    pub fn parse_comic_filename(&self, filename: &str) -> FilenameInfo {
        filename::parse(filename)
    }

    /// Writes `metadata` into the archive at `path`.
    ///
    /// The blocking rewrite runs on the blocking thread pool. Cancellation is honored
    /// only before the rewrite starts; once started it runs to one of its terminal outcomes.
    pub async fn rewrite_archive_metadata(
        &self,
        cancel: &CancellationToken,
        path: impl AsRef<Path>,
        metadata: ArchiveMetadata,
    ) -> Result<RewriteOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let path: PathBuf = path.as_ref().to_path_buf();
        let rewriter = self.rewriter.clone();
        spawn_blocking(move || rewriter.rewrite(&path, &metadata)).await?
    }

    /// Reads the metadata currently stored in the archive at `path`.
    pub async fn read_archive_metadata(&self, path: impl AsRef<Path>) -> Result<ArchiveMetadata> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let rewriter = self.rewriter.clone();
        spawn_blocking(move || rewriter.read_metadata(&path)).await?
    }

    /// Cover URL for an ISBN from the primary book provider.
    pub fn cover_url(&self, isbn: &str, size: CoverSize) -> Result<String> {
        Ok(self.book_matcher()?.cover_url(isbn, size))
    }

    fn book_matcher(&self) -> Result<&BookMatcher> {
        self.books
            .as_ref()
            .ok_or_else(|| Error::Unsupported("No book provider configured".to_string()))
    }

    fn comic_matcher(&self) -> Result<&ComicMatcher> {
        self.comics
            .as_ref()
            .ok_or_else(|| Error::Unsupported("No comic provider configured".to_string()))
    }
}
