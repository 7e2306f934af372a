//! EPUB package document (OPF) patching and extraction.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::rewriter::markup::{
    element_values, escape_xml, first_element_value, insert_after, insert_before, remove_elements,
    replace_element_value, replace_first, unescape_xml,
};
use crate::types::ArchiveMetadata;

/// Path of the container descriptor inside every EPUB.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const CALIBRE_SERIES: &str = "calibre:series";
const CALIBRE_SERIES_INDEX: &str = "calibre:series_index";
const INDENT: &str = "\n    ";

lazy_static! {
    static ref ROOTFILE_REGEX: Regex =
        Regex::new(r#"<rootfile\b[^>]*\bfull-path\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref METADATA_OPEN_REGEX: Regex = Regex::new(r"<(?:opf:)?metadata\b[^>]*>").unwrap();
    static ref METADATA_CLOSE_REGEX: Regex =
        Regex::new(r"\r?\n?[ \t]*</(?:opf:)?metadata\s*>").unwrap();
    static ref ISBN_SCHEME_REGEX: Regex = Regex::new(
        r#"(?si)(<dc:identifier\b[^>]*\bscheme\s*=\s*"isbn"[^>]*>)(.*?)(</dc:identifier\s*>)"#
    )
    .unwrap();
    static ref ISBN_URN_REGEX: Regex =
        Regex::new(r"(?si)(<dc:identifier\b[^>]*>\s*urn:isbn:)(.*?)(</dc:identifier\s*>)").unwrap();
}

/// Finds the OPF path announced by `META-INF/container.xml`.
pub fn locate_package_path(container_xml: &str) -> Option<String> {
    ROOTFILE_REGEX
        .captures(container_xml)
        .map(|caps| unescape_xml(caps[1].trim()))
        .filter(|path| !path.is_empty())
}

/// Applies every non-empty field of `metadata` to the OPF text.
///
/// Single-valued fields replace the value of an existing element or get a new element
/// right after the `<metadata>` opening tag. Creators and subjects replace the whole
/// existing list and are re-inserted before `</metadata>`. A field without an insertion
/// point is skipped.
pub fn patch(opf: &str, metadata: &ArchiveMetadata) -> Result<String> {
    let mut text = opf.to_string();

    let single_fields = [
        ("dc:title", &metadata.title),
        ("dc:publisher", &metadata.publisher),
        ("dc:date", &metadata.publish_date),
        ("dc:description", &metadata.description),
        ("dc:language", &metadata.language),
    ];
    for (tag, value) in single_fields {
        if !value.is_empty() {
            text = patch_element(text, tag, value)?;
        }
    }

    if !metadata.isbn.is_empty() {
        text = patch_isbn(text, &metadata.isbn);
    }
    if !metadata.series.is_empty() {
        text = patch_calibre_meta(text, CALIBRE_SERIES, &metadata.series)?;
    }
    if !metadata.series_index.is_empty() {
        text = patch_calibre_meta(text, CALIBRE_SERIES_INDEX, &metadata.series_index)?;
    }

    if !metadata.authors.is_empty() {
        text = replace_list(text, "dc:creator", &metadata.authors, " opf:role=\"aut\"")?;
    }
    if !metadata.subjects.is_empty() {
        text = replace_list(text, "dc:subject", &metadata.subjects, "")?;
    }

    Ok(text)
}

/// Reads the current descriptor values back out of an OPF document.
pub fn extract(opf: &str) -> Result<ArchiveMetadata> {
    let isbn = ISBN_SCHEME_REGEX
        .captures(opf)
        .or_else(|| ISBN_URN_REGEX.captures(opf))
        .map(|caps| unescape_xml(caps[2].trim()))
        .unwrap_or_default();

    Ok(ArchiveMetadata {
        title: first_element_value(opf, "dc:title")?,
        authors: element_values(opf, "dc:creator")?,
        series: calibre_meta_value(opf, CALIBRE_SERIES)?,
        series_index: calibre_meta_value(opf, CALIBRE_SERIES_INDEX)?,
        publisher: first_element_value(opf, "dc:publisher")?,
        publish_date: first_element_value(opf, "dc:date")?,
        description: first_element_value(opf, "dc:description")?,
        language: first_element_value(opf, "dc:language")?,
        isbn,
        subjects: element_values(opf, "dc:subject")?,
        ..Default::default()
    })
}

fn patch_element(text: String, tag: &str, value: &str) -> Result<String> {
    let escaped = escape_xml(value);
    if let Some(patched) = replace_element_value(&text, tag, &escaped)? {
        return Ok(patched);
    }
    let snippet = format!("{}<{tag}>{}</{tag}>", INDENT, escaped);
    Ok(insert_or_skip(text, &METADATA_OPEN_REGEX, &snippet, tag, true))
}

fn patch_isbn(text: String, isbn: &str) -> String {
    let escaped = escape_xml(isbn);
    if let Some(patched) = replace_first(&text, &ISBN_SCHEME_REGEX, &escaped) {
        return patched;
    }
    if let Some(patched) = replace_first(&text, &ISBN_URN_REGEX, &escaped) {
        return patched;
    }
    // The opf: prefix is only usable when the package declares it
    let snippet = if text.contains("xmlns:opf") {
        format!("{}<dc:identifier opf:scheme=\"ISBN\">{}</dc:identifier>", INDENT, escaped)
    } else {
        format!("{}<dc:identifier>urn:isbn:{}</dc:identifier>", INDENT, escaped)
    };
    insert_or_skip(text, &METADATA_OPEN_REGEX, &snippet, "dc:identifier", true)
}

fn calibre_meta_regexes(name: &str) -> Result<[Regex; 2]> {
    let name = regex::escape(name);
    Ok([
        Regex::new(&format!(
            r#"(<meta\b[^>]*\bname\s*=\s*"{name}"[^>]*\bcontent\s*=\s*")([^"]*)(")"#
        ))?,
        Regex::new(&format!(
            r#"(<meta\b[^>]*\bcontent\s*=\s*")([^"]*)("[^>]*\bname\s*=\s*"{name}")"#
        ))?,
    ])
}

fn patch_calibre_meta(text: String, name: &str, value: &str) -> Result<String> {
    let escaped = escape_xml(value);
    for regex in calibre_meta_regexes(name)? {
        if let Some(patched) = replace_first(&text, &regex, &escaped) {
            return Ok(patched);
        }
    }
    let snippet = format!("{}<meta name=\"{}\" content=\"{}\"/>", INDENT, name, escaped);
    Ok(insert_or_skip(text, &METADATA_OPEN_REGEX, &snippet, name, true))
}

fn calibre_meta_value(text: &str, name: &str) -> Result<String> {
    for regex in calibre_meta_regexes(name)? {
        if let Some(caps) = regex.captures(text) {
            return Ok(unescape_xml(caps[2].trim()));
        }
    }
    Ok(String::new())
}

fn replace_list(text: String, tag: &str, values: &[String], attributes: &str) -> Result<String> {
    // Make sure there is somewhere to put the new list before dropping the old one
    if !METADATA_CLOSE_REGEX.is_match(&text) {
        log::debug!("No </metadata> in package document, skipping {}", tag);
        return Ok(text);
    }
    let cleaned = remove_elements(&text, tag)?;
    let snippet: String = values
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| format!("{}<{tag}{}>{}</{tag}>", INDENT, attributes, escape_xml(value)))
        .collect();
    Ok(insert_or_skip(cleaned, &METADATA_CLOSE_REGEX, &snippet, tag, false))
}

fn insert_or_skip(text: String, anchor: &Regex, snippet: &str, field: &str, after: bool) -> String {
    let patched = if after {
        insert_after(&text, anchor, snippet)
    } else {
        insert_before(&text, anchor, snippet)
    };
    match patched {
        Some(patched) => patched,
        None => {
            log::debug!("No insertion point for {}, field skipped", field);
            text
        }
    }
}
