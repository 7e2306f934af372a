use shiori::error::Error;
use shiori::rewriter::ArchiveRewriter;
use shiori::types::{ArchiveMetadata, RewriteOutcome};
use std::fs;
use zip::CompressionMethod;

mod common;
use common::{
    CONTAINER_XML, CONTENT_OPF, cleanup_test_dir, create_sample_cbz, create_sample_epub,
    raw_entries, read_entry, setup_test_dir, temp_files_in, write_zip,
};

fn title_only(title: &str) -> ArchiveMetadata {
    ArchiveMetadata {
        title: title.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_epub_title_roundtrip_keeps_other_entries() {
    let dir = setup_test_dir("epub_roundtrip").await;
    let path = dir.join("book.epub");
    create_sample_epub(&path);
    let before = raw_entries(&path);

    let rewriter = ArchiveRewriter::new();
    let outcome = rewriter.rewrite(&path, &title_only("New Title")).unwrap();
    assert_eq!(outcome, RewriteOutcome::Rewritten);

    let metadata = rewriter.read_metadata(&path).unwrap();
    assert_eq!(metadata.title, "New Title");
    assert_eq!(metadata.authors, vec!["Jane Doe".to_string()]);
    assert_eq!(metadata.language, "en");

    let after = raw_entries(&path);
    assert_eq!(after.len(), before.len());
    for ((name_before, bytes_before, method_before), (name_after, bytes_after, method_after)) in
        before.iter().zip(after.iter())
    {
        assert_eq!(name_before, name_after);
        assert_eq!(method_before, method_after);
        if name_before != "OEBPS/content.opf" {
            assert_eq!(bytes_before, bytes_after, "{} changed", name_before);
        }
    }
    assert_eq!(after[0].0, "mimetype");
    assert_eq!(after[0].2, CompressionMethod::Stored);

    // Only the title element changed inside the descriptor
    assert_eq!(
        read_entry(&path, "OEBPS/content.opf"),
        CONTENT_OPF.replace("Old Title", "New Title")
    );
    assert!(temp_files_in(&dir).is_empty());
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_epub_full_metadata_write() {
    let dir = setup_test_dir("epub_full").await;
    let path = dir.join("book.epub");
    create_sample_epub(&path);

    let metadata = ArchiveMetadata {
        title: "Ancillary Justice".to_string(),
        authors: vec!["Ann Leckie".to_string()],
        series: "Imperial Radch".to_string(),
        series_index: "1".to_string(),
        publisher: "Orbit".to_string(),
        publish_date: "2013-10-01".to_string(),
        description: "Breq & the Radch <AI>".to_string(),
        isbn: "9780316246620".to_string(),
        subjects: vec!["Science Fiction".to_string(), "Space Opera".to_string()],
        ..Default::default()
    };
    let rewriter = ArchiveRewriter::new();
    assert_eq!(
        rewriter.rewrite(&path, &metadata).unwrap(),
        RewriteOutcome::Rewritten
    );

    let read_back = rewriter.read_metadata(&path).unwrap();
    assert_eq!(read_back.title, metadata.title);
    assert_eq!(read_back.authors, metadata.authors);
    assert_eq!(read_back.series, metadata.series);
    assert_eq!(read_back.series_index, metadata.series_index);
    assert_eq!(read_back.publisher, metadata.publisher);
    assert_eq!(read_back.publish_date, metadata.publish_date);
    assert_eq!(read_back.description, metadata.description);
    assert_eq!(read_back.isbn, metadata.isbn);
    assert_eq!(read_back.subjects, metadata.subjects);
    // Untouched fields survive
    assert_eq!(read_back.language, "en");
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_unchanged_descriptor_is_noop() {
    let dir = setup_test_dir("epub_noop").await;
    let path = dir.join("book.epub");
    create_sample_epub(&path);
    let before = fs::read(&path).unwrap();

    let rewriter = ArchiveRewriter::new();
    assert_eq!(
        rewriter.rewrite(&path, &title_only("Old Title")).unwrap(),
        RewriteOutcome::NoOp
    );
    assert_eq!(
        rewriter.rewrite(&path, &ArchiveMetadata::default()).unwrap(),
        RewriteOutcome::NoOp
    );
    assert_eq!(fs::read(&path).unwrap(), before);
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_missing_container_is_malformed_and_untouched() {
    let dir = setup_test_dir("epub_no_container").await;
    let path = dir.join("broken.epub");
    write_zip(
        &path,
        &[
            ("mimetype", &b"application/epub+zip"[..], CompressionMethod::Stored),
            ("OEBPS/content.opf", CONTENT_OPF.as_bytes(), CompressionMethod::Deflated),
        ],
    );
    let before = fs::read(&path).unwrap();
    let modified = fs::metadata(&path).unwrap().modified().unwrap();

    let result = ArchiveRewriter::new().rewrite(&path, &title_only("New Title"));
    assert!(matches!(result, Err(Error::MalformedArchive(_, _))));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    assert!(temp_files_in(&dir).is_empty());
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_container_pointing_nowhere_is_malformed() {
    let dir = setup_test_dir("epub_dangling_opf").await;
    let path = dir.join("dangling.epub");
    write_zip(
        &path,
        &[
            ("mimetype", &b"application/epub+zip"[..], CompressionMethod::Stored),
            ("META-INF/container.xml", CONTAINER_XML.as_bytes(), CompressionMethod::Deflated),
        ],
    );

    let rewriter = ArchiveRewriter::new();
    assert!(matches!(
        rewriter.rewrite(&path, &title_only("New Title")),
        Err(Error::MalformedArchive(_, _))
    ));
    assert!(matches!(
        rewriter.read_metadata(&path),
        Err(Error::MalformedArchive(_, _))
    ));
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_not_a_zip_is_malformed() {
    let dir = setup_test_dir("not_zip").await;
    let path = dir.join("fake.epub");
    fs::write(&path, b"this is not a zip archive").unwrap();

    let result = ArchiveRewriter::new().rewrite(&path, &title_only("New Title"));
    assert!(matches!(result, Err(Error::MalformedArchive(_, _))));
    assert_eq!(fs::read(&path).unwrap(), b"this is not a zip archive");

    let missing = ArchiveRewriter::new().rewrite(&dir.join("missing.cbz"), &title_only("X"));
    assert!(matches!(missing, Err(Error::MalformedArchive(_, _))));
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_pdf_is_unsupported() {
    let dir = setup_test_dir("pdf").await;
    let path = dir.join("paper.pdf");
    fs::write(&path, b"%PDF-1.7\n").unwrap();

    let result = ArchiveRewriter::new().rewrite(&path, &title_only("Paper"));
    assert!(matches!(result, Err(Error::Unsupported(_))));
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_cbz_existing_comic_info_is_patched() {
    let dir = setup_test_dir("cbz_patch").await;
    let path = dir.join("Saga 054 (2018).cbz");
    let comic_info = "<?xml version=\"1.0\"?>\n<ComicInfo>\n  <Series>Saga</Series>\n  <Number>54</Number>\n  <PageCount>2</PageCount>\n</ComicInfo>\n";
    create_sample_cbz(&path, Some(comic_info));
    let before = raw_entries(&path);

    let metadata = ArchiveMetadata {
        title: "Chapter Fifty-Four".to_string(),
        authors: vec!["Brian K. Vaughan".to_string(), "Fiona Staples".to_string()],
        publish_date: "2018-07-25".to_string(),
        ..Default::default()
    };
    let rewriter = ArchiveRewriter::new();
    assert_eq!(
        rewriter.rewrite(&path, &metadata).unwrap(),
        RewriteOutcome::Rewritten
    );

    let after = raw_entries(&path);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[1]);

    let xml = read_entry(&path, "ComicInfo.xml");
    assert!(xml.contains("<PageCount>2</PageCount>"));
    assert!(xml.contains("<Writer>Brian K. Vaughan, Fiona Staples</Writer>"));
    assert!(xml.contains("<Year>2018</Year>"));

    let read_back = rewriter.read_metadata(&path).unwrap();
    assert_eq!(read_back.title, "Chapter Fifty-Four");
    assert_eq!(read_back.series, "Saga");
    assert_eq!(read_back.series_index, "54");
    assert_eq!(read_back.publish_date, "2018-07-25");
    cleanup_test_dir(&dir).await;
}

#[tokio::test]
async fn test_cbz_without_comic_info_gets_one() {
    let dir = setup_test_dir("cbz_new").await;
    let path = dir.join("Batman 001 (2016).cbz");
    create_sample_cbz(&path, None);

    let rewriter = ArchiveRewriter::new();
    assert_eq!(
        rewriter.read_metadata(&path).unwrap(),
        ArchiveMetadata::default()
    );

    let metadata = ArchiveMetadata {
        series: "Batman".to_string(),
        series_index: "1".to_string(),
        volume: 3,
        ..Default::default()
    };
    assert_eq!(
        rewriter.rewrite(&path, &metadata).unwrap(),
        RewriteOutcome::Rewritten
    );

    let entries = raw_entries(&path);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].0, "ComicInfo.xml");
    let read_back = rewriter.read_metadata(&path).unwrap();
    assert_eq!(read_back.series, "Batman");
    assert_eq!(read_back.volume, 3);
    assert!(temp_files_in(&dir).is_empty());
    cleanup_test_dir(&dir).await;
}
