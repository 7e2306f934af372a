//! Core data types for the Shiori metadata engine.
//!
//! This module defines the value objects passed between the engine's stages:
//! - Resolved provider records (`ResolvedMetadata`, `ResolvedComicMetadata`)
//! - Parsed filename signals (`FilenameInfo`)
//! - The field set written into archives (`ArchiveMetadata`) and the rewrite outcome
//! - Small enumerations (`CoverSize`, `ArchiveKind`)

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata for a plain book, as produced by the book matcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub series: String,
    pub series_index: String,
    pub publisher: String,
    pub publish_date: String,
    pub description: String,
    pub language: String,
    pub isbn: String,
    pub subjects: Vec<String>,
    pub cover_url: String,
    pub source: String,      // Provider name, e.g. "openlibrary"
    pub external_id: String, // Provider-specific identifier
    pub confidence: f64,
}

/// Metadata for a single comic issue, as produced by the comic matcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedComicMetadata {
    pub title: String,
    pub series: String,
    pub issue_number: String,
    pub volume: u32,
    pub writers: Vec<String>,
    pub publisher: String,
    pub release_date: String, // Usually "YYYY-MM-DD"
    pub description: String,
    pub language: String,
    pub genres: Vec<String>,
    pub cover_url: String,
    pub source: String,
    pub source_id: String,
    pub confidence: f64,
}

impl ResolvedComicMetadata {
    /// Publication year taken from the first dash-delimited segment of the release date.
    pub fn release_year(&self) -> Option<i32> {
        let segment = self.release_date.split('-').next()?.trim();
        if segment.len() != 4 {
            return None;
        }
        segment.parse::<i32>().ok()
    }

    /// Identity used to de-duplicate candidates collected from several calls.
    pub(crate) fn identity_key(&self) -> String {
        if self.source_id.is_empty() {
            format!(
                "{}#{}",
                crate::similarity::normalize(&self.series),
                crate::similarity::normalize_issue_number(&self.issue_number)
            )
        } else {
            format!("{}:{}", self.source, self.source_id)
        }
    }

    /// Fills empty fields of `self` from `details`, keeping everything already present.
    pub(crate) fn merge_missing(&mut self, details: ResolvedComicMetadata) {
        fn fill(target: &mut String, value: String) {
            if target.is_empty() {
                *target = value;
            }
        }
        fill(&mut self.title, details.title);
        fill(&mut self.series, details.series);
        fill(&mut self.issue_number, details.issue_number);
        fill(&mut self.publisher, details.publisher);
        fill(&mut self.release_date, details.release_date);
        fill(&mut self.description, details.description);
        fill(&mut self.language, details.language);
        fill(&mut self.cover_url, details.cover_url);
        if self.volume == 0 {
            self.volume = details.volume;
        }
        if self.writers.is_empty() {
            self.writers = details.writers;
        }
        if self.genres.is_empty() {
            self.genres = details.genres;
        }
    }
}

impl ResolvedMetadata {
    pub(crate) fn identity_key(&self) -> String {
        if self.external_id.is_empty() {
            format!(
                "{}|{}",
                crate::similarity::normalize(&self.title),
                crate::similarity::normalize(&self.authors.join(" "))
            )
        } else {
            format!("{}:{}", self.source, self.external_id)
        }
    }
}

/// Structured signals extracted from a comic filename.
///
/// Numeric fields use `0` for "absent"; `issue_number` keeps the original
/// formatting (leading zeros, decimals) while `issue_number_float` is meant for sorting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilenameInfo {
    pub series: String,
    pub title: String,
    pub issue_number: String,
    pub issue_number_float: f64,
    pub volume: u32,
    pub year: i32,
    pub original_filename: String,
}

/// Requested size for provider cover URLs.
#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum CoverSize {
    Small,
    Medium,
    #[default]
    Large,
}

impl CoverSize {
    /// Single-letter size code used by Open Library style cover endpoints.
    pub fn letter(&self) -> &'static str {
        match self {
            CoverSize::Small => "S",
            CoverSize::Medium => "M",
            CoverSize::Large => "L",
        }
    }
}

/// The container formats the rewriter knows how to patch.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum ArchiveKind {
    Epub, // OPF descriptor located through META-INF/container.xml
    Cbz,  // ComicInfo.xml at the archive root
}

impl ArchiveKind {
    /// Detects the container kind from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "epub" => Some(ArchiveKind::Epub),
            "cbz" => Some(ArchiveKind::Cbz),
            _ => None,
        }
    }
}

/// The field set the rewriter writes into an archive descriptor.
/// Empty strings and empty lists mean "leave this field alone".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub series: String,
    pub series_index: String,
    pub volume: u32,
    pub publisher: String,
    pub publish_date: String,
    pub description: String,
    pub language: String,
    pub isbn: String,
    pub subjects: Vec<String>,
    pub web: String,
}

impl ArchiveMetadata {
    /// True when no field carries a value, i.e. a rewrite would have nothing to do.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.authors.is_empty()
            && self.series.is_empty()
            && self.series_index.is_empty()
            && self.volume == 0
            && self.publisher.is_empty()
            && self.publish_date.is_empty()
            && self.description.is_empty()
            && self.language.is_empty()
            && self.isbn.is_empty()
            && self.subjects.is_empty()
            && self.web.is_empty()
    }
}

impl From<&ResolvedMetadata> for ArchiveMetadata {
    fn from(meta: &ResolvedMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            authors: meta.authors.clone(),
            series: meta.series.clone(),
            series_index: meta.series_index.clone(),
            volume: 0,
            publisher: meta.publisher.clone(),
            publish_date: meta.publish_date.clone(),
            description: meta.description.clone(),
            language: meta.language.clone(),
            isbn: meta.isbn.clone(),
            subjects: meta.subjects.clone(),
            web: String::new(),
        }
    }
}

impl From<&ResolvedComicMetadata> for ArchiveMetadata {
    fn from(meta: &ResolvedComicMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            authors: meta.writers.clone(),
            series: meta.series.clone(),
            series_index: meta.issue_number.clone(),
            volume: meta.volume,
            publisher: meta.publisher.clone(),
            publish_date: meta.release_date.clone(),
            description: meta.description.clone(),
            language: meta.language.clone(),
            isbn: String::new(),
            subjects: meta.genres.clone(),
            web: String::new(),
        }
    }
}

/// Terminal outcome of a successful rewrite call. Failures are reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewriteOutcome {
    /// The original file was replaced by the patched archive
    Rewritten,
    /// Nothing to write; the original file is untouched
    NoOp,
}
