use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::matcher::{Attempts, EXACT_MATCH_CONFIDENCE, dedupe_by, guarded, rank_by, score_book};
use crate::provider::BookProvider;
use crate::rate_limiter::RateLimiter;
use crate::similarity::normalize_isbn;
use crate::types::{CoverSize, ResolvedMetadata};

/// What the caller knows about a book. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookQuery {
    pub isbn: String,
    pub title: String,
    pub author: String,
}

impl BookQuery {
    pub fn new(isbn: impl Into<String>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            author: author.into(),
        }
    }

    fn has_text(&self) -> bool {
        !self.title.trim().is_empty() || !self.author.trim().is_empty()
    }
}

/// Resolves book metadata over a primary→fallback chain of [`BookProvider`]s.
pub struct BookMatcher {
    chain: Vec<Arc<dyn BookProvider>>,
    rate_limiter: Arc<RateLimiter>,
    cover_size: CoverSize,
}

impl BookMatcher {
    /// Creates a matcher. The rate limiter is owned by the caller so that
    /// separate matchers never share throttling state by accident.
    pub fn new(
        primary: Arc<dyn BookProvider>,
        fallback: Option<Arc<dyn BookProvider>>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let mut chain = vec![primary];
        chain.extend(fallback);
        Self {
            chain,
            rate_limiter,
            cover_size: CoverSize::default(),
        }
    }

    pub fn with_cover_size(mut self, cover_size: CoverSize) -> Self {
        self.cover_size = cover_size;
        self
    }

    /// Cover URL for an ISBN from the primary provider.
    pub fn cover_url(&self, isbn: &str, size: CoverSize) -> String {
        self.chain[0].cover_url(&normalize_isbn(isbn), size)
    }

    /// Returns the single best match.
    ///
    /// An ISBN hit is returned immediately with confidence `1.0`. Otherwise the
    /// title/author search runs on each provider in turn and the highest-scoring
    /// candidate of the first non-empty result set wins.
    pub async fn resolve(&self, cancel: &CancellationToken, query: &BookQuery) -> Result<ResolvedMetadata> {
        let isbn = normalize_isbn(&query.isbn);
        let mut attempts = Attempts::default();

        if !isbn.is_empty() {
            for provider in &self.chain {
                match self.lookup_isbn(cancel, provider, &isbn).await {
                    Ok(metadata) => {
                        log::info!(
                            "Resolved ISBN {} via {}: '{}'",
                            isbn,
                            provider.name(),
                            metadata.title
                        );
                        return Ok(metadata);
                    }
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => attempts.record(provider.name(), e),
                }
            }
        }

        if query.has_text() {
            for provider in &self.chain {
                match self.search_scored(cancel, provider, query).await {
                    Ok(mut candidates) if !candidates.is_empty() => {
                        let best = candidates.swap_remove(0);
                        log::info!(
                            "Resolved '{}' via {} with confidence {:.2}",
                            best.title,
                            provider.name(),
                            best.confidence
                        );
                        return Ok(best);
                    }
                    Ok(_) => attempts.record(provider.name(), Error::NoMatch),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => attempts.record(provider.name(), e),
                }
            }
        }

        Err(attempts.into_error())
    }

    /// Returns every candidate from every provider, de-duplicated and ranked.
    pub async fn search(&self, cancel: &CancellationToken, query: &BookQuery) -> Result<Vec<ResolvedMetadata>> {
        let isbn = normalize_isbn(&query.isbn);
        let mut attempts = Attempts::default();
        let mut collected = Vec::new();

        if !isbn.is_empty() {
            for provider in &self.chain {
                match self.lookup_isbn(cancel, provider, &isbn).await {
                    Ok(metadata) => collected.push(metadata),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => attempts.record(provider.name(), e),
                }
            }
        }

        if query.has_text() {
            for provider in &self.chain {
                match self.search_scored(cancel, provider, query).await {
                    Ok(candidates) if !candidates.is_empty() => collected.extend(candidates),
                    Ok(_) => attempts.record(provider.name(), Error::NoMatch),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => attempts.record(provider.name(), e),
                }
            }
        }

        let mut candidates = dedupe_by(collected, ResolvedMetadata::identity_key);
        if candidates.is_empty() {
            return Err(attempts.into_error());
        }
        rank_by(&mut candidates, |candidate| candidate.confidence);
        Ok(candidates)
    }

    async fn lookup_isbn(
        &self,
        cancel: &CancellationToken,
        provider: &Arc<dyn BookProvider>,
        isbn: &str,
    ) -> Result<ResolvedMetadata> {
        self.rate_limiter.wait(cancel).await?;
        log::debug!("ISBN lookup {} on {}", isbn, provider.name());

        let mut metadata = guarded(cancel, provider.lookup_by_isbn(isbn)).await?;
        // An identifier match is never down-ranked by text similarity
        metadata.confidence = EXACT_MATCH_CONFIDENCE;
        if metadata.isbn.is_empty() {
            metadata.isbn = isbn.to_string();
        }
        if metadata.cover_url.is_empty() {
            metadata.cover_url = provider.cover_url(isbn, self.cover_size);
        }
        Ok(metadata)
    }

    /// Runs one provider search and returns its candidates scored and ranked.
    async fn search_scored(
        &self,
        cancel: &CancellationToken,
        provider: &Arc<dyn BookProvider>,
        query: &BookQuery,
    ) -> Result<Vec<ResolvedMetadata>> {
        self.rate_limiter.wait(cancel).await?;
        log::debug!(
            "Searching {} for title={:?} author={:?}",
            provider.name(),
            query.title,
            query.author
        );

        let mut candidates = guarded(cancel, provider.search(&query.title, &query.author)).await?;
        for candidate in candidates.iter_mut() {
            candidate.confidence = score_book(candidate, &query.title, &query.author);
        }
        rank_by(&mut candidates, |candidate| candidate.confidence);
        Ok(candidates)
    }
}
