//! Shiori - Metadata Resolution & Archive Rewriting Engine
//!
//! This crate resolves bibliographic metadata for library items (books and comic
//! issues) against external providers, and writes the result back into the item's
//! zip-based container (EPUB or CBZ) without ever leaving a half-written file behind.
//!
//! The pieces can be used on their own:
//! - [`filename`] extracts series, issue number, volume and year from comic filenames
//! - [`similarity`] holds the text normalization and token similarity used for scoring
//! - [`matcher`] walks primary→fallback provider chains and ranks candidates
//! - [`rewriter`] patches archive descriptors and installs the result atomically
//!
//! or through the [`MetadataEngine`] facade:
//!
//! ```rust,no_run
//! use shiori::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> shiori::error::Result<()> {
//!     let config = EngineConfig::builder()
//!         .user_agent("my-library/1.0 (admin@example.org)")
//!         .metron_username("reader")
//!         .metron_password("secret")
//!         .build()?;
//!     let engine = MetadataEngine::from_config(config)?;
//!     let cancel = CancellationToken::new();
//!
//!     let issue = engine
//!         .resolve_comic_from_filename(&cancel, "Saga 054 (2018) (Digital).cbz")
//!         .await?;
//!     println!("{} #{} ({:.2})", issue.series, issue.issue_number, issue.confidence);
//!
//!     let outcome = engine
//!         .rewrite_archive_metadata(&cancel, "Saga 054 (2018) (Digital).cbz", (&issue).into())
//!         .await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod filename;
pub mod matcher;
pub mod path_utils;
pub mod provider;
pub mod rate_limiter;
pub mod rewriter;
pub mod similarity;
pub mod types;

// Publicly expose the engine facade and its configuration
pub use engine::{EngineConfig, EngineConfigBuilder, MetadataEngine};

pub use types::{
    ArchiveKind, ArchiveMetadata, CoverSize, FilenameInfo, ResolvedComicMetadata,
    ResolvedMetadata, RewriteOutcome,
};

/// Prelude module for convenient imports.
///
/// Re-exports the most commonly used types and traits, so that
/// `use shiori::prelude::*;` is enough for typical engine usage.
pub mod prelude {
    pub use super::{
        ArchiveKind, ArchiveMetadata, CoverSize, EngineConfig, EngineConfigBuilder,
        FilenameInfo, MetadataEngine, ResolvedComicMetadata, ResolvedMetadata, RewriteOutcome,
        error, matcher, provider, types,
    };
    pub use crate::error::Error;
    pub use crate::provider::{BookProvider, ComicProvider, ProviderSet};
    pub use crate::rewriter::ArchiveRewriter;
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
