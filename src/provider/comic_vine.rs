//! Comic Vine comic provider.
//!
//! Every Comic Vine answer is wrapped in an envelope carrying a `status_code`; the
//! envelope code, not the HTTP status, tells rate limiting and missing objects apart.

use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::provider::{ComicProvider, build_http_client, fetch_json, strip_html};
use crate::types::ResolvedComicMetadata;

const COMIC_VINE_BASE_URL: &str = "https://comicvine.gamespot.com/api";
const PROVIDER_NAME: &str = "comicvine";
const ISSUE_RESOURCE_PREFIX: &str = "4000";
const SEARCH_LIMIT: &str = "20";

const STATUS_OK: i64 = 1;
const STATUS_INVALID_API_KEY: i64 = 100;
const STATUS_OBJECT_NOT_FOUND: i64 = 101;
const STATUS_RATE_LIMITED: i64 = 107;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CvEnvelope {
    status_code: i64,
    error: String,
    results: serde_json::Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CvIssue {
    id: u64,
    name: Option<String>,
    issue_number: Option<String>,
    cover_date: Option<String>,
    store_date: Option<String>,
    description: Option<String>,
    deck: Option<String>,
    image: Option<CvImage>,
    volume: Option<CvVolume>,
    person_credits: Vec<CvPersonCredit>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CvImage {
    original_url: String,
    super_url: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CvVolume {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CvPersonCredit {
    name: String,
    role: String,
}

/// Comic provider backed by the Comic Vine API.
pub struct ComicVineProvider {
    http_client: reqwest::Client,
    api_key: String,
}

impl ComicVineProvider {
    pub fn new(config: &EngineConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(config)?,
            api_key,
        })
    }

    async fn get(&self, path: &str, extra: &[(&str, &str)]) -> Result<serde_json::Value> {
        let mut params = vec![("api_key", self.api_key.as_str()), ("format", "json")];
        params.extend_from_slice(extra);

        let request = self
            .http_client
            .get(format!("{}/{}", COMIC_VINE_BASE_URL, path))
            .query(&params);
        let envelope: CvEnvelope = fetch_json(PROVIDER_NAME, request).await?;
        check_envelope(envelope)
    }

    async fn search(&self, query: &str) -> Result<Vec<ResolvedComicMetadata>> {
        log::debug!("Searching Comic Vine: {:?}", query);
        let results = self
            .get(
                "search/",
                &[
                    ("resources", "issue"),
                    ("query", query),
                    ("limit", SEARCH_LIMIT),
                ],
            )
            .await?;
        parse_issue_list(results)
    }
}

#[async_trait]
impl ComicProvider for ComicVineProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search_by_series_and_issue(
        &self,
        series: &str,
        issue: &str,
    ) -> Result<Vec<ResolvedComicMetadata>> {
        self.search(&format!("{} {}", series, issue)).await
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<ResolvedComicMetadata>> {
        self.search(title).await
    }

    async fn get_issue_details(&self, source_id: &str) -> Result<ResolvedComicMetadata> {
        let path = format!("issue/{}-{}/", ISSUE_RESOURCE_PREFIX, source_id);
        let results = self.get(&path, &[]).await?;
        let issue: CvIssue = serde_json::from_value(results)
            .map_err(|e| Error::Provider(PROVIDER_NAME.to_string(), e.to_string()))?;
        Ok(issue_to_metadata(issue))
    }
}

/// Unwraps the Comic Vine envelope, mapping its status codes onto the error taxonomy.
fn check_envelope(envelope: CvEnvelope) -> Result<serde_json::Value> {
    match envelope.status_code {
        STATUS_OK => Ok(envelope.results),
        STATUS_OBJECT_NOT_FOUND => Err(Error::NoMatch),
        STATUS_RATE_LIMITED => Err(Error::RateLimited(PROVIDER_NAME.to_string())),
        STATUS_INVALID_API_KEY => Err(Error::Provider(
            PROVIDER_NAME.to_string(),
            "Invalid API key".to_string(),
        )),
        code => Err(Error::Provider(
            PROVIDER_NAME.to_string(),
            format!("Status {}: {}", code, envelope.error),
        )),
    }
}

fn parse_issue_list(results: serde_json::Value) -> Result<Vec<ResolvedComicMetadata>> {
    let issues: Vec<CvIssue> = serde_json::from_value(results)
        .map_err(|e| Error::Provider(PROVIDER_NAME.to_string(), e.to_string()))?;
    if issues.is_empty() {
        return Err(Error::NoMatch);
    }
    Ok(issues.into_iter().map(issue_to_metadata).collect())
}

fn issue_to_metadata(issue: CvIssue) -> ResolvedComicMetadata {
    let description = issue
        .description
        .filter(|d| !d.is_empty())
        .or(issue.deck)
        .map(|d| strip_html(&d))
        .unwrap_or_default();

    let cover_url = issue
        .image
        .map(|image| {
            if image.original_url.is_empty() {
                image.super_url
            } else {
                image.original_url
            }
        })
        .unwrap_or_default();

    let writers = issue
        .person_credits
        .into_iter()
        .filter(|credit| credit.role.to_lowercase().contains("writer"))
        .map(|credit| credit.name)
        .collect();

    ResolvedComicMetadata {
        title: issue.name.unwrap_or_default(),
        series: issue.volume.map(|v| v.name).unwrap_or_default(),
        issue_number: issue.issue_number.unwrap_or_default(),
        writers,
        release_date: issue
            .cover_date
            .filter(|d| !d.is_empty())
            .or(issue.store_date)
            .unwrap_or_default(),
        description,
        cover_url,
        source: PROVIDER_NAME.to_string(),
        source_id: if issue.id == 0 {
            String::new()
        } else {
            issue.id.to_string()
        },
        ..Default::default()
    }
}
