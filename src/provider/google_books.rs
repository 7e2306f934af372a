//! Google Books provider, used as the fallback book source.

use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::provider::{BookProvider, build_http_client, fetch_json};
use crate::types::{CoverSize, ResolvedMetadata};

const GOOGLE_BOOKS_BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";
const GOOGLE_BOOKS_CONTENT_URL: &str = "https://books.google.com/books/content";
const PROVIDER_NAME: &str = "googlebooks";
const MAX_RESULTS: &str = "10";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GbResponse {
    #[serde(rename = "totalItems")]
    total_items: u64,
    items: Vec<GbVolume>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GbVolume {
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: GbVolumeInfo,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct GbVolumeInfo {
    title: String,
    subtitle: String,
    authors: Vec<String>,
    publisher: String,
    published_date: String,
    description: String,
    industry_identifiers: Vec<GbIdentifier>,
    categories: Vec<String>,
    language: String,
    image_links: Option<GbImageLinks>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GbIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct GbImageLinks {
    small_thumbnail: String,
    thumbnail: String,
}

/// Book provider backed by the Google Books volumes API.
pub struct GoogleBooksProvider {
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(config)?,
            api_key: config.google_books_api_key.clone(),
        })
    }

    async fn query(&self, q: &str) -> Result<Vec<ResolvedMetadata>> {
        let mut params = vec![("q", q), ("maxResults", MAX_RESULTS)];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }
        log::debug!("Querying Google Books: {}", q);

        let request = self.http_client.get(GOOGLE_BOOKS_BASE_URL).query(&params);
        let body: serde_json::Value = fetch_json(PROVIDER_NAME, request).await?;
        parse_volumes_response(&body)
    }
}

#[async_trait]
impl BookProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn lookup_by_isbn(&self, isbn: &str) -> Result<ResolvedMetadata> {
        let mut results = self.query(&format!("isbn:{}", isbn)).await?;
        let mut metadata = results.swap_remove(0);
        if metadata.isbn.is_empty() {
            metadata.isbn = isbn.to_string();
        }
        Ok(metadata)
    }

    async fn search(&self, title: &str, author: &str) -> Result<Vec<ResolvedMetadata>> {
        let mut terms = Vec::new();
        if !title.is_empty() {
            terms.push(format!("intitle:{}", title));
        }
        if !author.is_empty() {
            terms.push(format!("inauthor:{}", author));
        }
        if terms.is_empty() {
            return Err(Error::NoMatch);
        }
        self.query(&terms.join(" ")).await
    }

    fn cover_url(&self, isbn: &str, size: CoverSize) -> String {
        let zoom = match size {
            CoverSize::Small => 5,
            CoverSize::Medium => 1,
            CoverSize::Large => 0,
        };
        format!(
            "{}?vid=ISBN{}&printsec=frontcover&img=1&zoom={}",
            GOOGLE_BOOKS_CONTENT_URL, isbn, zoom
        )
    }
}

/// Maps a volumes answer onto candidates; zero items is `NoMatch`.
fn parse_volumes_response(body: &serde_json::Value) -> Result<Vec<ResolvedMetadata>> {
    let response: GbResponse = serde_json::from_value(body.clone())
        .map_err(|e| Error::Provider(PROVIDER_NAME.to_string(), e.to_string()))?;
    if response.total_items == 0 || response.items.is_empty() {
        return Err(Error::NoMatch);
    }

    Ok(response.items.into_iter().map(volume_to_metadata).collect())
}

fn volume_to_metadata(volume: GbVolume) -> ResolvedMetadata {
    let info = volume.volume_info;

    let isbn = ["ISBN_13", "ISBN_10"]
        .iter()
        .find_map(|kind| {
            info.industry_identifiers
                .iter()
                .find(|id| id.kind == *kind)
                .map(|id| id.identifier.clone())
        })
        .unwrap_or_default();

    let title = if info.subtitle.is_empty() {
        info.title
    } else {
        format!("{}: {}", info.title, info.subtitle)
    };

    let cover_url = info
        .image_links
        .map(|links| {
            let url = if links.thumbnail.is_empty() {
                links.small_thumbnail
            } else {
                links.thumbnail
            };
            url.replacen("http://", "https://", 1)
        })
        .unwrap_or_default();

    ResolvedMetadata {
        title,
        authors: info.authors,
        publisher: info.publisher,
        publish_date: info.published_date,
        description: info.description,
        language: info.language,
        isbn,
        subjects: info.categories,
        cover_url,
        source: PROVIDER_NAME.to_string(),
        external_id: volume.id,
        ..Default::default()
    }
}
