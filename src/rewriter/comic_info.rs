//! `ComicInfo.xml` patching and extraction for CBZ archives.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::rewriter::markup::{
    escape_xml, first_element_value, insert_after, remove_elements, replace_element_value,
};
use crate::types::ArchiveMetadata;

/// Entry name of the descriptor at the archive root.
pub const COMIC_INFO_PATH: &str = "ComicInfo.xml";

/// Descriptor written into archives that carry none.
pub const TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ComicInfo xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
</ComicInfo>
"#;

lazy_static! {
    static ref OPEN_REGEX: Regex = Regex::new(r"<ComicInfo\b[^>]*>").unwrap();
    static ref SELF_CLOSED_REGEX: Regex = Regex::new(r"<ComicInfo\b([^>]*?)\s*/>").unwrap();
}

/// Applies every non-empty field of `metadata` to a ComicInfo document.
///
/// Existing elements keep their position; new ones go right after the `<ComicInfo>`
/// opening tag in schema order.
pub fn patch(xml: &str, metadata: &ArchiveMetadata) -> Result<String> {
    let mut text = expand_self_closed(xml);
    let mut missing = String::new();

    for (tag, value) in fields(metadata) {
        let escaped = escape_xml(&value);
        match replace_element_value(&text, tag, &escaped)? {
            Some(patched) => text = patched,
            None => missing.push_str(&format!("\n  <{tag}>{}</{tag}>", escaped)),
        }
    }

    // A supplied date replaces the whole Year/Month/Day triple
    let (year, month, day) = split_date(&metadata.publish_date);
    if !year.is_empty() {
        if month.is_empty() {
            text = remove_elements(&text, "Month")?;
        }
        if day.is_empty() {
            text = remove_elements(&text, "Day")?;
        }
    }

    if missing.is_empty() {
        return Ok(text);
    }
    match insert_after(&text, &OPEN_REGEX, &missing) {
        Some(patched) => Ok(patched),
        None => {
            log::debug!("ComicInfo has no root element, new fields skipped");
            Ok(text)
        }
    }
}

/// Reads the current descriptor values back out of a ComicInfo document.
pub fn extract(xml: &str) -> Result<ArchiveMetadata> {
    let year = first_element_value(xml, "Year")?;
    let month = first_element_value(xml, "Month")?;
    let day = first_element_value(xml, "Day")?;

    Ok(ArchiveMetadata {
        title: first_element_value(xml, "Title")?,
        authors: split_list(&first_element_value(xml, "Writer")?),
        series: first_element_value(xml, "Series")?,
        series_index: first_element_value(xml, "Number")?,
        volume: first_element_value(xml, "Volume")?.parse().unwrap_or(0),
        publisher: first_element_value(xml, "Publisher")?,
        publish_date: join_date(&year, &month, &day),
        description: first_element_value(xml, "Summary")?,
        language: first_element_value(xml, "LanguageISO")?,
        subjects: split_list(&first_element_value(xml, "Genre")?),
        web: first_element_value(xml, "Web")?,
        ..Default::default()
    })
}

/// Element/value pairs in ComicInfo schema order, skipping empty fields.
fn fields(metadata: &ArchiveMetadata) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("Title", metadata.title.clone()),
        ("Series", metadata.series.clone()),
        ("Number", metadata.series_index.clone()),
    ];
    if metadata.volume > 0 {
        fields.push(("Volume", metadata.volume.to_string()));
    }
    fields.push(("Summary", metadata.description.clone()));

    let (year, month, day) = split_date(&metadata.publish_date);
    fields.push(("Year", year));
    fields.push(("Month", month));
    fields.push(("Day", day));

    fields.push(("Writer", metadata.authors.join(", ")));
    fields.push(("Publisher", metadata.publisher.clone()));
    fields.push(("Genre", metadata.subjects.join(", ")));
    fields.push(("Web", metadata.web.clone()));
    fields.push(("LanguageISO", metadata.language.clone()));

    fields
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
}

/// Splits a provider date into ComicInfo's Year/Month/Day. Unparseable parts stay empty.
fn split_date(date: &str) -> (String, String, String) {
    let date = date.trim();
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return (
            parsed.year().to_string(),
            parsed.month().to_string(),
            parsed.day().to_string(),
        );
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(&format!("{}-01", date), "%Y-%m-%d") {
        return (parsed.year().to_string(), parsed.month().to_string(), String::new());
    }
    match date.get(..4) {
        Some(year) if year.chars().all(|c| c.is_ascii_digit()) => {
            (year.to_string(), String::new(), String::new())
        }
        _ => Default::default(),
    }
}

fn join_date(year: &str, month: &str, day: &str) -> String {
    let (Ok(y), Ok(m)) = (year.parse::<i32>(), month.parse::<u32>()) else {
        return year.to_string();
    };
    match day.parse::<u32>() {
        Ok(d) => NaiveDate::from_ymd_opt(y, m, d)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| year.to_string()),
        Err(_) => NaiveDate::from_ymd_opt(y, m, 1)
            .map(|date| date.format("%Y-%m").to_string())
            .unwrap_or_else(|| year.to_string()),
    }
}

/// Splits a comma-separated ComicInfo list such as `Writer` or `Genre`.
///
/// The format has no escaping, so a value that itself contains a comma
/// (`"Vaughan, Brian K."`) comes back as separate entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand_self_closed(xml: &str) -> String {
    SELF_CLOSED_REGEX
        .replacen(xml, 1, "<ComicInfo$1>\n</ComicInfo>")
        .into_owned()
}
