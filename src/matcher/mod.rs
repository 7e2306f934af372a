//! Matching engine: provider chains, confidence scoring and ranking.
//!
//! Both matchers walk an ordered primary→fallback provider chain, rate-limit every
//! outbound call through an injected [`RateLimiter`](crate::rate_limiter::RateLimiter)
//! and race each call against the caller's cancellation token.
//!
//! Scoring is a fixed, reproducible function:
//! - books: `0.6 * title similarity + 0.4 * author score`
//! - comics: `0.6 * max(series, title similarity) + issue score + year adjustment`

use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::similarity::{normalize_issue_number, similarity};
use crate::types::{ResolvedComicMetadata, ResolvedMetadata};

pub mod book;
pub mod comic;

pub use book::{BookMatcher, BookQuery};
pub use comic::{ComicMatcher, ComicQuery};

/// Confidence of an exact external-identifier (ISBN) match.
pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;
/// Weight of the title (or series/title) similarity.
pub const TITLE_WEIGHT: f64 = 0.6;
/// Weight of the author similarity for books.
pub const AUTHOR_WEIGHT: f64 = 0.4;
/// Issue component for an exact issue-number match.
pub const ISSUE_MATCH_SCORE: f64 = 0.4;
/// Issue component when the numbers differ.
pub const ISSUE_PARTIAL_SCORE: f64 = 0.1;
/// Boost for a release year equal to the query year.
pub const YEAR_EXACT_BOOST: f64 = 0.15;
/// Boost for a release year one year away from the query year.
pub const YEAR_NEAR_BOOST: f64 = 0.05;
/// Penalty for a release year more than [`YEAR_FAR_THRESHOLD`] years away.
pub const YEAR_FAR_PENALTY: f64 = 0.10;
pub const YEAR_FAR_THRESHOLD: i32 = 5;

/// Scores a book candidate against a title/author query.
///
/// An empty query author yields a full author score: an absent constraint never
/// penalizes a candidate.
pub fn score_book(candidate: &ResolvedMetadata, title: &str, author: &str) -> f64 {
    let title_score = similarity(&candidate.title, title);
    let author_score = if author.trim().is_empty() {
        1.0
    } else {
        candidate
            .authors
            .iter()
            .map(|name| similarity(name, author))
            .fold(0.0, f64::max)
    };
    TITLE_WEIGHT * title_score + AUTHOR_WEIGHT * author_score
}

/// Scores a comic candidate, including the release-year adjustment.
///
/// The result is not clamped: year boosts may push it above `1.0` and penalties may
/// push it below `0.0`. Ranking relies on the raw value.
pub fn score_comic(candidate: &ResolvedComicMetadata, query: &ComicQuery) -> f64 {
    let query_title = if query.title.is_empty() {
        &query.series
    } else {
        &query.title
    };
    let name_score = similarity(&candidate.series, &query.series)
        .max(similarity(&candidate.title, query_title));

    let issue_score = if query.issue.trim().is_empty() {
        ISSUE_MATCH_SCORE
    } else if normalize_issue_number(&candidate.issue_number)
        == normalize_issue_number(&query.issue)
    {
        ISSUE_MATCH_SCORE
    } else {
        ISSUE_PARTIAL_SCORE
    };

    TITLE_WEIGHT * name_score + issue_score + year_adjustment(candidate.release_year(), query.year)
}

/// Confidence adjustment for the distance between a candidate's year and the query year.
///
/// No adjustment when either year is unknown (query year `0` means absent).
pub fn year_adjustment(candidate_year: Option<i32>, query_year: i32) -> f64 {
    let Some(candidate_year) = candidate_year else {
        return 0.0;
    };
    if query_year <= 0 {
        return 0.0;
    }
    match (candidate_year - query_year).abs() {
        0 => YEAR_EXACT_BOOST,
        1 => YEAR_NEAR_BOOST,
        diff if diff > YEAR_FAR_THRESHOLD => -YEAR_FAR_PENALTY,
        _ => 0.0,
    }
}

/// Sorts by descending confidence. The sort is stable, so ties keep their input order.
pub(crate) fn rank_by<T>(items: &mut [T], confidence: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| {
        confidence(b)
            .partial_cmp(&confidence(a))
            .unwrap_or(Ordering::Equal)
    });
}

/// Keeps the first occurrence of every identity key.
pub(crate) fn dedupe_by<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Races a provider call against the cancellation token.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = call => result,
    }
}

/// Bookkeeping of failed provider attempts, deciding which error a caller finally sees.
///
/// A definitive "no match" from any provider wins over transport failures of others;
/// otherwise the last failure is reported, and `NoMatch` when nothing was attempted.
#[derive(Debug, Default)]
pub(crate) struct Attempts {
    answered_no_match: bool,
    last_failure: Option<Error>,
}

impl Attempts {
    pub(crate) fn record(&mut self, provider: &str, error: Error) {
        if error.is_no_match() {
            log::debug!("{} has no match", provider);
            self.answered_no_match = true;
        } else {
            log::warn!("{} failed, trying next source: {}", provider, error);
            self.last_failure = Some(error);
        }
    }

    pub(crate) fn into_error(self) -> Error {
        match (self.answered_no_match, self.last_failure) {
            (true, _) | (false, None) => Error::NoMatch,
            (false, Some(error)) => error,
        }
    }
}
