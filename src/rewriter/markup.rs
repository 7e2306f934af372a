//! Targeted text patches on XML descriptors.
//!
//! The rewriter never re-serializes a descriptor: it edits the bytes between an
//! element's tags, or splices a new element next to a section tag, and leaves every
//! other byte as it was.

use regex::{Captures, Regex};

use crate::error::Result;

/// Escapes text for use in element content or a double-quoted attribute.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Reverses [`escape_xml`] and the common numeric entities.
pub fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&#34;", "\"")
        .replace("&amp;", "&")
}

/// Regex matching `<tag ...>value</tag>` with the open tag, value and close tag as groups 1-3.
pub fn element_regex(tag: &str) -> Result<Regex> {
    let tag = regex::escape(tag);
    Ok(Regex::new(&format!(
        r"(?s)(<{tag}(?:\s[^>]*[^/>])?\s*>)(.*?)(</{tag}\s*>)"
    ))?)
}

/// Replaces the value of the first `tag` element. Returns `None` when no such element exists.
pub fn replace_element_value(text: &str, tag: &str, escaped_value: &str) -> Result<Option<String>> {
    let regex = element_regex(tag)?;
    Ok(replace_first(text, &regex, escaped_value))
}

/// Replaces group 2 of the first match of `regex`, keeping groups 1 and 3.
pub fn replace_first(text: &str, regex: &Regex, escaped_value: &str) -> Option<String> {
    if !regex.is_match(text) {
        return None;
    }
    let patched = regex.replacen(text, 1, |caps: &Captures| {
        format!("{}{}{}", &caps[1], escaped_value, &caps[3])
    });
    Some(patched.into_owned())
}

/// Inserts `snippet` right after the first match of `open_tag`.
pub fn insert_after(text: &str, open_tag: &Regex, snippet: &str) -> Option<String> {
    let found = open_tag.find(text)?;
    let mut patched = String::with_capacity(text.len() + snippet.len());
    patched.push_str(&text[..found.end()]);
    patched.push_str(snippet);
    patched.push_str(&text[found.end()..]);
    Some(patched)
}

/// Inserts `snippet` right before the first match of `close_tag`.
pub fn insert_before(text: &str, close_tag: &Regex, snippet: &str) -> Option<String> {
    let found = close_tag.find(text)?;
    let mut patched = String::with_capacity(text.len() + snippet.len());
    patched.push_str(&text[..found.start()]);
    patched.push_str(snippet);
    patched.push_str(&text[found.start()..]);
    Some(patched)
}

/// Removes every `tag` element, including the whitespace that precedes it.
pub fn remove_elements(text: &str, tag: &str) -> Result<String> {
    let tag = regex::escape(tag);
    // Self-closed and paired forms are separate so attributes never run past a `/>`
    let regex = Regex::new(&format!(
        r"(?s)[ \t]*\r?\n?[ \t]*(?:<{tag}(?:\s[^>]*)?/>|<{tag}(?:\s[^>]*[^/>])?\s*>.*?</{tag}\s*>)"
    ))?;
    Ok(regex.replace_all(text, "").into_owned())
}

/// Unescaped, trimmed values of all `tag` elements in document order.
pub fn element_values(text: &str, tag: &str) -> Result<Vec<String>> {
    let regex = element_regex(tag)?;
    Ok(regex
        .captures_iter(text)
        .map(|caps| unescape_xml(caps[2].trim()))
        .filter(|value| !value.is_empty())
        .collect())
}

/// Value of the first `tag` element, or an empty string.
pub fn first_element_value(text: &str, tag: &str) -> Result<String> {
    Ok(element_values(text, tag)?.into_iter().next().unwrap_or_default())
}
