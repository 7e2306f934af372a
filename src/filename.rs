//! Comic filename heuristics.
//!
//! Turns names such as `Amazing Spider-Man v5 001 (2018) (Digital) (Zone-Empire).cbz`
//! into structured [`FilenameInfo`] values. Issue numbers are located with an ordered
//! list of patterns evaluated first-match-wins, from the most syntactically distinctive
//! marker (`#12`) to the most ambiguous (a bare trailing number).

use std::ops::Range;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::path_utils::get_file_name_lossy;
use crate::types::FilenameInfo;

/// Earliest and latest accepted publication years.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

/// Release-group and digital-edition tags removed before the generic bracket strip.
pub const RELEASE_TAGS: &[&str] = &[
    "(Digital)",
    "(digital)",
    "(Digital-Empire)",
    "(Zone-Empire)",
    "(Minutemen-Slayer)",
    "(Son of Ultron-Empire)",
    "(The Last Kryptonian-DCP)",
    "(GetComics)",
    "(Webrip)",
    "(webrip)",
    "(c2c)",
    "(F)",
];

/// One entry of the ordered issue-number pattern list.
///
/// Every regex exposes two groups: group 1 is the token removed from the series
/// name, group 2 is the number itself.
#[derive(Debug)]
pub struct IssuePattern {
    pub name: &'static str,
    pub regex: Regex,
}

/// A successful issue-number match.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueMatch {
    pub pattern: &'static str,
    pub number: String,
    pub token: Range<usize>,
}

lazy_static! {
    static ref EXTENSION_REGEX: Regex =
        Regex::new(r"(?i)\.(cbz|cbr|cb7|cbt|cba|zip|rar|7z|pdf|epub)$").unwrap();
    /// `(2020)`, `[2020]`, `(Jan 2020)`, `(Sep. 2020)`
    static ref YEAR_REGEX: Regex =
        Regex::new(r"(?i)[\(\[](?:[a-z]{3}\.?\s+)?(\d{4})[\)\]]").unwrap();
    static ref VOLUME_REGEX: Regex =
        Regex::new(r"(?i)\b(?:vol(?:ume)?\.?\s*|v)(\d+)\b").unwrap();
    static ref BRACKETED_REGEX: Regex = Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();

    /// Issue-number patterns, most specific first.
    pub static ref ISSUE_PATTERNS: Vec<IssuePattern> = vec![
        IssuePattern {
            name: "hash",
            regex: Regex::new(r"(#\s*(\d+(?:\.\d+)?))").unwrap(),
        },
        IssuePattern {
            name: "keyword",
            regex: Regex::new(r"(?i)\b((?:no\.?|issue)\s*#?\s*(\d+(?:\.\d+)?))").unwrap(),
        },
        IssuePattern {
            name: "padded",
            regex: Regex::new(r"(?:^|[\s\-.,])((\d{3}))(?:$|[\s\-.,\(\[])").unwrap(),
        },
        IssuePattern {
            name: "trailing",
            regex: Regex::new(r"(?:^|\s)((\d{1,2}))\s*(?:$|[\(\[])").unwrap(),
        },
        IssuePattern {
            name: "annual",
            regex: Regex::new(r"(?i)\bannual\s*#?\s*((\d+))").unwrap(),
        },
    ];
}

/// Parses a path's file name. See [`parse`].
pub fn parse_path(path: &Path) -> FilenameInfo {
    parse(&get_file_name_lossy(path))
}

/// Extracts series, issue, volume and year from a comic filename.
///
/// Never fails: anything that cannot be found is left at its zero value.
pub fn parse(filename: &str) -> FilenameInfo {
    let year = extract_year(filename);

    let stem = EXTENSION_REGEX.replace(filename, "");
    let mut working = stem.replace('_', " ").trim().to_string();

    let mut volume = 0;
    if let Some(caps) = VOLUME_REGEX.captures(&working) {
        volume = caps[1].parse::<u32>().unwrap_or(0);
        if let Some(token) = caps.get(0) {
            // Blank instead of delete so that later spans stay valid
            let range = token.range();
            blank(&mut working, range);
        }
    }

    let mut issue_number = String::new();
    let mut issue_number_float = 0.0;
    if let Some(found) = match_issue(&working) {
        issue_number_float = found.number.parse::<f64>().unwrap_or(0.0);
        issue_number = found.number;
        blank(&mut working, found.token);
    }

    let series = clean_series(&working);
    let title = compose_title(&series, volume, &issue_number, year);

    FilenameInfo {
        series,
        title,
        issue_number,
        issue_number_float,
        volume,
        year,
        original_filename: filename.to_string(),
    }
}

/// Runs the issue patterns in order and returns the first hit.
pub fn match_issue(name: &str) -> Option<IssueMatch> {
    ISSUE_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.regex.captures(name)?;
        let token = caps.get(1)?;
        let number = caps.get(2)?;
        Some(IssueMatch {
            pattern: pattern.name,
            number: number.as_str().to_string(),
            token: token.range(),
        })
    })
}

/// First bracketed 4-digit year within [`YEAR_RANGE`], or 0.
pub fn extract_year(name: &str) -> i32 {
    YEAR_REGEX
        .captures_iter(name)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .find(|year| YEAR_RANGE.contains(year))
        .unwrap_or(0)
}

fn blank(s: &mut String, range: Range<usize>) {
    let width = range.len();
    s.replace_range(range, &" ".repeat(width));
}

fn clean_series(working: &str) -> String {
    let mut series = working.to_string();
    for tag in RELEASE_TAGS {
        series = series.replace(tag, " ");
    }
    let series = BRACKETED_REGEX.replace_all(&series, " ");
    let series = WHITESPACE_REGEX.replace_all(&series, " ");
    series.trim().trim_end_matches('-').trim().to_string()
}

fn compose_title(series: &str, volume: u32, issue: &str, year: i32) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !series.is_empty() {
        parts.push(series.to_string());
    }
    if volume > 0 {
        parts.push(format!("Vol. {}", volume));
    }
    if !issue.is_empty() {
        parts.push(format!("#{}", issue));
    }
    if year > 0 {
        parts.push(format!("({})", year));
    }
    parts.join(" ")
}
