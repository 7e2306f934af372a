use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::matcher::{Attempts, dedupe_by, guarded, rank_by, score_comic};
use crate::provider::ComicProvider;
use crate::rate_limiter::RateLimiter;
use crate::types::{FilenameInfo, ResolvedComicMetadata};

/// What the caller knows about a comic issue. Empty strings and a `0` year mean "unknown".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComicQuery {
    pub series: String,
    pub issue: String,
    pub title: String,
    pub year: i32,
}

impl ComicQuery {
    pub fn new(
        series: impl Into<String>,
        issue: impl Into<String>,
        title: impl Into<String>,
        year: i32,
    ) -> Self {
        Self {
            series: series.into(),
            issue: issue.into(),
            title: title.into(),
            year,
        }
    }
}

impl From<&FilenameInfo> for ComicQuery {
    fn from(info: &FilenameInfo) -> Self {
        Self {
            series: info.series.clone(),
            issue: info.issue_number.clone(),
            title: String::new(),
            year: info.year,
        }
    }
}

/// One provider call in the comic search order.
#[derive(Debug, Clone, PartialEq)]
enum SearchStep {
    SeriesAndIssue,
    Title(String),
}

/// Resolves comic issue metadata over a primary→fallback chain of [`ComicProvider`]s.
pub struct ComicMatcher {
    chain: Vec<Arc<dyn ComicProvider>>,
    rate_limiter: Arc<RateLimiter>,
    enrich_details: bool,
}

impl ComicMatcher {
    pub fn new(
        primary: Arc<dyn ComicProvider>,
        fallback: Option<Arc<dyn ComicProvider>>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let mut chain = vec![primary];
        chain.extend(fallback);
        Self {
            chain,
            rate_limiter,
            enrich_details: true,
        }
    }

    /// Whether the winning candidate is completed with a detail lookup.
    pub fn with_detail_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_details = enabled;
        self
    }

    /// Returns the single best issue.
    ///
    /// Tries series+issue search first, then title search, then (with only a
    /// series given) a title search on the series name. Each step runs on the primary
    /// provider before the fallback; the first non-empty result set is scored, including
    /// the year boost, and its best candidate wins.
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        query: &ComicQuery,
    ) -> Result<ResolvedComicMetadata> {
        let mut attempts = Attempts::default();

        for step in search_plan(query) {
            for provider in &self.chain {
                match self.run_step(cancel, provider, &step, query).await {
                    Ok(mut candidates) if !candidates.is_empty() => {
                        let mut best = candidates.swap_remove(0);
                        if self.enrich_details {
                            self.enrich(cancel, provider, &mut best).await?;
                        }
                        log::info!(
                            "Resolved {} #{} via {} with confidence {:.2}",
                            best.series,
                            best.issue_number,
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

    /// Returns every candidate from every step and provider, de-duplicated and ranked.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query: &ComicQuery,
    ) -> Result<Vec<ResolvedComicMetadata>> {
        let mut attempts = Attempts::default();
        let mut collected = Vec::new();

        for step in search_plan(query) {
            for provider in &self.chain {
                match self.run_step(cancel, provider, &step, query).await {
                    Ok(candidates) if !candidates.is_empty() => collected.extend(candidates),
                    Ok(_) => attempts.record(provider.name(), Error::NoMatch),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => attempts.record(provider.name(), e),
                }
            }
        }

        let mut candidates = dedupe_by(collected, ResolvedComicMetadata::identity_key);
        if candidates.is_empty() {
            return Err(attempts.into_error());
        }
        rank_by(&mut candidates, |candidate| candidate.confidence);
        Ok(candidates)
    }

    async fn run_step(
        &self,
        cancel: &CancellationToken,
        provider: &Arc<dyn ComicProvider>,
        step: &SearchStep,
        query: &ComicQuery,
    ) -> Result<Vec<ResolvedComicMetadata>> {
        self.rate_limiter.wait(cancel).await?;
        log::debug!("Comic search {:?} on {}", step, provider.name());

        let mut candidates = match step {
            SearchStep::SeriesAndIssue => {
                guarded(
                    cancel,
                    provider.search_by_series_and_issue(&query.series, &query.issue),
                )
                .await?
            }
            SearchStep::Title(title) => guarded(cancel, provider.search_by_title(title)).await?,
        };

        for candidate in candidates.iter_mut() {
            candidate.confidence = score_comic(candidate, query);
        }
        rank_by(&mut candidates, |candidate| candidate.confidence);
        Ok(candidates)
    }

    /// Completes `best` with the provider's detail record; a failed lookup keeps it as is.
    async fn enrich(
        &self,
        cancel: &CancellationToken,
        provider: &Arc<dyn ComicProvider>,
        best: &mut ResolvedComicMetadata,
    ) -> Result<()> {
        if best.source_id.is_empty() {
            return Ok(());
        }
        self.rate_limiter.wait(cancel).await?;

        match guarded(cancel, provider.get_issue_details(&best.source_id)).await {
            Ok(details) => best.merge_missing(details),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => log::debug!(
                "Keeping search result for {}: detail lookup failed: {}",
                best.source_id,
                e
            ),
        }
        Ok(())
    }
}

fn search_plan(query: &ComicQuery) -> Vec<SearchStep> {
    let series = query.series.trim();
    let title = query.title.trim();
    let mut plan = Vec::new();

    if !series.is_empty() && !query.issue.trim().is_empty() {
        plan.push(SearchStep::SeriesAndIssue);
    }
    if !title.is_empty() {
        plan.push(SearchStep::Title(title.to_string()));
    } else if !series.is_empty() {
        plan.push(SearchStep::Title(series.to_string()));
    }
    plan
}
