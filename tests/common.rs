//! Common test utilities for the Shiori crate.
//!
//! Provides unique scratch directories, sample EPUB/CBZ archives and in-process
//! provider doubles shared by the integration tests.

use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use shiori::error::{Error, Result};
use shiori::provider::{BookProvider, ComicProvider};
use shiori::types::{CoverSize, ResolvedComicMetadata, ResolvedMetadata};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::fs;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

#[allow(dead_code)]
pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

#[allow(dead_code)]
pub const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:opf="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Old Title</dc:title>
    <dc:creator opf:role="aut">Jane Doe</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="BookId">urn:uuid:5b1e9a52-7a3f-4c43-9b0d-3f4f4b1d2c11</dc:identifier>
  </metadata>
  <manifest>
    <item id="ch1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
  </spine>
</package>
"#;

#[allow(dead_code)]
pub const CHAPTER_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter 1</title></head>
<body><p>It was a dark and stormy night.</p></body></html>
"#;

/// Creates a clean, uniquely named test directory.
#[allow(dead_code)]
pub async fn setup_test_dir(sub_path: &str) -> PathBuf {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).await.unwrap();
    }
    fs::create_dir_all(&test_dir).await.unwrap();
    test_dir
}

/// Removes one test directory, ignoring errors.
#[allow(dead_code)]
pub async fn cleanup_test_dir(test_dir: &Path) {
    let _ = fs::remove_dir_all(test_dir).await;
}

/// Writes a zip archive with the given `(name, content, compression)` entries.
#[allow(dead_code)]
pub fn write_zip(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content, compression) in entries {
        let options = SimpleFileOptions::default().compression_method(*compression);
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

/// Writes a minimal valid EPUB (stored mimetype first, container, OPF, one chapter).
#[allow(dead_code)]
pub fn create_sample_epub(path: &Path) {
    write_zip(
        path,
        &[
            ("mimetype", &b"application/epub+zip"[..], CompressionMethod::Stored),
            ("META-INF/container.xml", CONTAINER_XML.as_bytes(), CompressionMethod::Deflated),
            ("OEBPS/content.opf", CONTENT_OPF.as_bytes(), CompressionMethod::Deflated),
            ("OEBPS/chapter1.xhtml", CHAPTER_XHTML.as_bytes(), CompressionMethod::Deflated),
        ],
    );
}

/// Writes a CBZ with two pages and, optionally, a ComicInfo.xml.
#[allow(dead_code)]
pub fn create_sample_cbz(path: &Path, comic_info: Option<&str>) {
    let page_one = vec![0xFFu8; 2048];
    let page_two = vec![0xD8u8; 2048];
    let mut entries: Vec<(&str, &[u8], CompressionMethod)> = vec![
        ("page_001.jpg", page_one.as_slice(), CompressionMethod::Stored),
        ("page_002.jpg", page_two.as_slice(), CompressionMethod::Stored),
    ];
    if let Some(xml) = comic_info {
        entries.push(("ComicInfo.xml", xml.as_bytes(), CompressionMethod::Deflated));
    }
    write_zip(path, &entries);
}

/// Reads every entry of an archive as `(name, raw compressed bytes, compression)`.
#[allow(dead_code)]
pub fn raw_entries(path: &Path) -> Vec<(String, Vec<u8>, CompressionMethod)> {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|index| {
            let mut entry = archive.by_index_raw(index).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes, entry.compression())
        })
        .collect()
}

/// Reads one decompressed entry as text.
#[allow(dead_code)]
pub fn read_entry(path: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

/// Names of `.tmp` files left in a directory.
#[allow(dead_code)]
pub fn temp_files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
        .collect()
}

/// Scripted answer of a mock provider call.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Reply<T> {
    Found(T),
    NoMatch,
    RateLimited,
    Unavailable,
    /// Never completes; used to exercise cancellation
    Hang,
}

#[allow(dead_code)]
impl<T: Clone> Reply<T> {
    async fn resolve(&self, provider: &str) -> Result<T> {
        match self {
            Reply::Found(value) => Ok(value.clone()),
            Reply::NoMatch => Err(Error::NoMatch),
            Reply::RateLimited => Err(Error::RateLimited(provider.to_string())),
            Reply::Unavailable => Err(Error::ProviderUnavailable(
                provider.to_string(),
                "connection refused".to_string(),
            )),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// In-process book provider with scripted replies and a call counter.
#[allow(dead_code)]
pub struct MockBookProvider {
    pub name: &'static str,
    pub isbn_reply: Reply<ResolvedMetadata>,
    pub search_reply: Reply<Vec<ResolvedMetadata>>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockBookProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            isbn_reply: Reply::NoMatch,
            search_reply: Reply::Found(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_isbn(mut self, reply: Reply<ResolvedMetadata>) -> Self {
        self.isbn_reply = reply;
        self
    }

    pub fn with_search(mut self, reply: Reply<Vec<ResolvedMetadata>>) -> Self {
        self.search_reply = reply;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookProvider for MockBookProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn lookup_by_isbn(&self, _isbn: &str) -> Result<ResolvedMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.isbn_reply.resolve(self.name).await
    }

    async fn search(&self, _title: &str, _author: &str) -> Result<Vec<ResolvedMetadata>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.search_reply.resolve(self.name).await
    }

    fn cover_url(&self, isbn: &str, size: CoverSize) -> String {
        format!("https://covers.test/{}-{}.jpg", isbn, size.letter())
    }
}

/// In-process comic provider with scripted replies; records every call.
#[allow(dead_code)]
pub struct MockComicProvider {
    pub name: &'static str,
    pub series_reply: Reply<Vec<ResolvedComicMetadata>>,
    pub title_reply: Reply<Vec<ResolvedComicMetadata>>,
    pub details_reply: Reply<ResolvedComicMetadata>,
    pub calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockComicProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            series_reply: Reply::Found(Vec::new()),
            title_reply: Reply::Found(Vec::new()),
            details_reply: Reply::NoMatch,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, reply: Reply<Vec<ResolvedComicMetadata>>) -> Self {
        self.series_reply = reply;
        self
    }

    pub fn with_title(mut self, reply: Reply<Vec<ResolvedComicMetadata>>) -> Self {
        self.title_reply = reply;
        self
    }

    pub fn with_details(mut self, reply: Reply<ResolvedComicMetadata>) -> Self {
        self.details_reply = reply;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ComicProvider for MockComicProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn search_by_series_and_issue(
        &self,
        series: &str,
        issue: &str,
    ) -> Result<Vec<ResolvedComicMetadata>> {
        self.record(format!("series:{}#{}", series, issue));
        self.series_reply.resolve(self.name).await
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<ResolvedComicMetadata>> {
        self.record(format!("title:{}", title));
        self.title_reply.resolve(self.name).await
    }

    async fn get_issue_details(&self, source_id: &str) -> Result<ResolvedComicMetadata> {
        self.record(format!("details:{}", source_id));
        self.details_reply.resolve(self.name).await
    }
}

/// A book record as a provider would return it.
#[allow(dead_code)]
pub fn book(title: &str, author: &str, source: &str, id: &str) -> ResolvedMetadata {
    ResolvedMetadata {
        title: title.to_string(),
        authors: vec![author.to_string()],
        source: source.to_string(),
        external_id: id.to_string(),
        ..Default::default()
    }
}

/// A comic issue record as a provider would return it.
#[allow(dead_code)]
pub fn issue(series: &str, number: &str, date: &str, source: &str, id: &str) -> ResolvedComicMetadata {
    ResolvedComicMetadata {
        title: format!("{} #{}", series, number),
        series: series.to_string(),
        issue_number: number.to_string(),
        release_date: date.to_string(),
        source: source.to_string(),
        source_id: id.to_string(),
        ..Default::default()
    }
}
