//! Open Library book provider.
//!
//! ISBN lookups use the `api/books` endpoint with `jscmd=data`, searches use `search.json`.
//! Cover URLs are derived locally from the ISBN and never require a request.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::provider::{BookProvider, build_http_client, fetch_json};
use crate::types::{CoverSize, ResolvedMetadata};

const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org";
const OPEN_LIBRARY_COVERS_URL: &str = "https://covers.openlibrary.org/b";
const PROVIDER_NAME: &str = "openlibrary";
const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OlNamed {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OlCover {
    small: String,
    medium: String,
    large: String,
}

/// One entry of the `api/books?jscmd=data` answer.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OlEdition {
    key: String,
    title: String,
    subtitle: String,
    authors: Vec<OlNamed>,
    publishers: Vec<OlNamed>,
    publish_date: String,
    subjects: Vec<OlNamed>,
    notes: Option<serde_json::Value>, // Either a string or {"type": ..., "value": ...}
    cover: Option<OlCover>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OlSearchResponse {
    docs: Vec<OlSearchDoc>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OlSearchDoc {
    key: String,
    title: String,
    author_name: Vec<String>,
    publisher: Vec<String>,
    first_publish_year: Option<i32>,
    isbn: Vec<String>,
    language: Vec<String>,
    subject: Vec<String>,
    cover_i: Option<i64>,
}

/// Book provider backed by openlibrary.org.
pub struct OpenLibraryProvider {
    http_client: reqwest::Client,
    cover_size: CoverSize,
}

impl OpenLibraryProvider {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(config)?,
            cover_size: config.cover_size,
        })
    }
}

#[async_trait]
impl BookProvider for OpenLibraryProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn lookup_by_isbn(&self, isbn: &str) -> Result<ResolvedMetadata> {
        let bibkey = format!("ISBN:{}", isbn);
        log::debug!("Querying Open Library for {}", bibkey);

        let request = self
            .http_client
            .get(format!("{}/api/books", OPEN_LIBRARY_BASE_URL))
            .query(&[
                ("bibkeys", bibkey.as_str()),
                ("format", "json"),
                ("jscmd", "data"),
            ]);
        let body: serde_json::Value = fetch_json(PROVIDER_NAME, request).await?;
        let mut metadata = parse_isbn_response(&body, isbn)?;
        if metadata.cover_url.is_empty() {
            metadata.cover_url = self.cover_url(isbn, self.cover_size);
        }
        Ok(metadata)
    }

    async fn search(&self, title: &str, author: &str) -> Result<Vec<ResolvedMetadata>> {
        let mut params = vec![("limit", SEARCH_LIMIT)];
        if !title.is_empty() {
            params.push(("title", title));
        }
        if !author.is_empty() {
            params.push(("author", author));
        }
        log::debug!("Searching Open Library: title={:?} author={:?}", title, author);

        let request = self
            .http_client
            .get(format!("{}/search.json", OPEN_LIBRARY_BASE_URL))
            .query(&params);
        let body: serde_json::Value = fetch_json(PROVIDER_NAME, request).await?;
        parse_search_response(&body, self.cover_size)
    }

    fn cover_url(&self, isbn: &str, size: CoverSize) -> String {
        format!("{}/isbn/{}-{}.jpg", OPEN_LIBRARY_COVERS_URL, isbn, size.letter())
    }
}

/// Maps an `api/books` answer for one bibkey onto `ResolvedMetadata`.
fn parse_isbn_response(body: &serde_json::Value, isbn: &str) -> Result<ResolvedMetadata> {
    let entries: HashMap<String, OlEdition> = serde_json::from_value(body.clone())
        .map_err(|e| Error::Provider(PROVIDER_NAME.to_string(), e.to_string()))?;
    // Keyed by the single bibkey we sent
    let edition = entries.into_values().next().ok_or(Error::NoMatch)?;

    let mut title = edition.title;
    if !edition.subtitle.is_empty() {
        title = format!("{}: {}", title, edition.subtitle);
    }

    let description = match edition.notes {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Object(map)) => map
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };

    let cover_url = edition
        .cover
        .map(|cover| {
            if !cover.large.is_empty() {
                cover.large
            } else if !cover.medium.is_empty() {
                cover.medium
            } else {
                cover.small
            }
        })
        .unwrap_or_default();

    Ok(ResolvedMetadata {
        title,
        authors: edition.authors.into_iter().map(|a| a.name).collect(),
        publisher: edition
            .publishers
            .into_iter()
            .next()
            .map(|p| p.name)
            .unwrap_or_default(),
        publish_date: edition.publish_date,
        description,
        isbn: isbn.to_string(),
        subjects: edition.subjects.into_iter().map(|s| s.name).collect(),
        cover_url,
        source: PROVIDER_NAME.to_string(),
        external_id: edition.key,
        ..Default::default()
    })
}

/// Maps a `search.json` answer onto candidates; an empty `docs` list is `NoMatch`.
fn parse_search_response(
    body: &serde_json::Value,
    cover_size: CoverSize,
) -> Result<Vec<ResolvedMetadata>> {
    let response: OlSearchResponse = serde_json::from_value(body.clone())
        .map_err(|e| Error::Provider(PROVIDER_NAME.to_string(), e.to_string()))?;
    if response.docs.is_empty() {
        return Err(Error::NoMatch);
    }

    Ok(response
        .docs
        .into_iter()
        .map(|doc| ResolvedMetadata {
            title: doc.title,
            authors: doc.author_name,
            publisher: doc.publisher.into_iter().next().unwrap_or_default(),
            publish_date: doc
                .first_publish_year
                .map(|year| year.to_string())
                .unwrap_or_default(),
            language: doc.language.into_iter().next().unwrap_or_default(),
            isbn: doc.isbn.into_iter().next().unwrap_or_default(),
            subjects: doc.subject.into_iter().take(10).collect(),
            cover_url: doc
                .cover_i
                .map(|id| format!("{}/id/{}-{}.jpg", OPEN_LIBRARY_COVERS_URL, id, cover_size.letter()))
                .unwrap_or_default(),
            source: PROVIDER_NAME.to_string(),
            external_id: doc.key,
            ..Default::default()
        })
        .collect())
}
