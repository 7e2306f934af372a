//! Metron comic provider (metron.cloud), authenticated with HTTP basic auth.

use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::provider::{ComicProvider, build_http_client, fetch_json, strip_html};
use crate::types::ResolvedComicMetadata;

const METRON_BASE_URL: &str = "https://metron.cloud/api";
const PROVIDER_NAME: &str = "metron";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MetronPage {
    count: u64,
    results: Vec<MetronIssue>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MetronIssue {
    id: u64,
    publisher: Option<MetronNamed>,
    series: Option<MetronSeries>,
    number: String,
    title: Option<String>,
    name: Vec<String>,  // Story titles, only present on the detail endpoint
    issue: String,      // Display name in list results, e.g. "Batman (2016) #1"
    cover_date: Option<String>,
    store_date: Option<String>,
    desc: Option<String>,
    image: Option<String>,
    credits: Vec<MetronCredit>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MetronNamed {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MetronSeries {
    name: String,
    volume: Option<u32>,
    genres: Vec<MetronNamed>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MetronCredit {
    creator: String,
    role: Vec<MetronNamed>,
}

/// Comic provider backed by the Metron API.
pub struct MetronProvider {
    http_client: reqwest::Client,
    username: String,
    password: String,
}

impl MetronProvider {
    pub fn new(config: &EngineConfig, username: String, password: String) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(config)?,
            username,
            password,
        })
    }

    async fn list_issues(&self, params: &[(&str, &str)]) -> Result<Vec<ResolvedComicMetadata>> {
        log::debug!("Querying Metron issues: {:?}", params);
        let request = self
            .http_client
            .get(format!("{}/issue/", METRON_BASE_URL))
            .basic_auth(&self.username, Some(&self.password))
            .query(params);
        let page: MetronPage = fetch_json(PROVIDER_NAME, request).await?;
        parse_issue_page(page)
    }
}

#[async_trait]
impl ComicProvider for MetronProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search_by_series_and_issue(
        &self,
        series: &str,
        issue: &str,
    ) -> Result<Vec<ResolvedComicMetadata>> {
        self.list_issues(&[("series_name", series), ("number", issue)])
            .await
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<ResolvedComicMetadata>> {
        // Metron has no free-text issue search; series names carry most titles
        self.list_issues(&[("series_name", title)]).await
    }

    async fn get_issue_details(&self, source_id: &str) -> Result<ResolvedComicMetadata> {
        let request = self
            .http_client
            .get(format!("{}/issue/{}/", METRON_BASE_URL, source_id))
            .basic_auth(&self.username, Some(&self.password));
        let issue: MetronIssue = fetch_json(PROVIDER_NAME, request).await?;
        Ok(issue_to_metadata(issue))
    }
}

fn parse_issue_page(page: MetronPage) -> Result<Vec<ResolvedComicMetadata>> {
    if page.count == 0 || page.results.is_empty() {
        return Err(Error::NoMatch);
    }
    Ok(page.results.into_iter().map(issue_to_metadata).collect())
}

fn issue_to_metadata(issue: MetronIssue) -> ResolvedComicMetadata {
    let title = issue
        .title
        .filter(|t| !t.is_empty())
        .or_else(|| issue.name.into_iter().next())
        .unwrap_or(issue.issue);

    let writers = issue
        .credits
        .into_iter()
        .filter(|credit| {
            credit
                .role
                .iter()
                .any(|role| role.name.eq_ignore_ascii_case("writer"))
        })
        .map(|credit| credit.creator)
        .collect();

    let (series, volume, genres) = match issue.series {
        Some(series) => (
            series.name,
            series.volume.unwrap_or(0),
            series.genres.into_iter().map(|g| g.name).collect(),
        ),
        None => (String::new(), 0, Vec::new()),
    };

    ResolvedComicMetadata {
        title,
        series,
        issue_number: issue.number,
        volume,
        writers,
        publisher: issue.publisher.map(|p| p.name).unwrap_or_default(),
        release_date: issue
            .cover_date
            .filter(|d| !d.is_empty())
            .or(issue.store_date)
            .unwrap_or_default(),
        description: issue.desc.map(|d| strip_html(&d)).unwrap_or_default(),
        genres,
        cover_url: issue.image.unwrap_or_default(),
        source: PROVIDER_NAME.to_string(),
        source_id: if issue.id == 0 {
            String::new()
        } else {
            issue.id.to_string()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_issue_page() {
        let page: MetronPage = serde_json::from_value(json!({
            "count": 1,
            "next": null,
            "results": [{
                "id": 3519,
                "series": {"name": "Batman", "volume": 3, "year_began": 2016},
                "number": "1",
                "issue": "Batman (2016) #1",
                "cover_date": "2016-08-01",
                "store_date": "2016-06-15",
                "image": "https://static.metron.cloud/batman-1.jpg"
            }]
        }))
        .unwrap();
        let issues = parse_issue_page(page).unwrap();
        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.title, "Batman (2016) #1");
        assert_eq!(issue.series, "Batman");
        assert_eq!(issue.volume, 3);
        assert_eq!(issue.release_year(), Some(2016));
        assert_eq!(issue.source_id, "3519");
    }

    #[test]
    fn test_parse_issue_page_empty() {
        let page: MetronPage = serde_json::from_value(json!({"count": 0, "results": []})).unwrap();
        assert!(matches!(parse_issue_page(page), Err(Error::NoMatch)));
    }

    #[test]
    fn test_issue_details_mapping() {
        let issue: MetronIssue = serde_json::from_value(json!({
            "id": 3519,
            "publisher": {"id": 2, "name": "DC Comics"},
            "series": {"id": 1, "name": "Batman", "genres": [{"id": 10, "name": "Super-Hero"}]},
            "number": "1",
            "name": ["I Am Gotham, Part One"],
            "cover_date": "2016-08-01",
            "desc": "<p>No one can stop Batman.</p>",
            "credits": [
                {"id": 1, "creator": "Tom King", "role": [{"id": 1, "name": "Writer"}]},
                {"id": 2, "creator": "David Finch", "role": [{"id": 2, "name": "Penciller"}]}
            ]
        }))
        .unwrap();
        let meta = issue_to_metadata(issue);
        assert_eq!(meta.title, "I Am Gotham, Part One");
        assert_eq!(meta.publisher, "DC Comics");
        assert_eq!(meta.writers, vec!["Tom King".to_string()]);
        assert_eq!(meta.genres, vec!["Super-Hero".to_string()]);
        assert_eq!(meta.description, "No one can stop Batman.");
    }
}
