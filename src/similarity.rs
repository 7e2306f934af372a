//! Token-based string normalization and similarity scoring.
//!
//! These helpers are pure functions used by the matchers to compare provider
//! candidates against a query. They intentionally stay simple: lower-casing,
//! article stripping, punctuation removal and a Jaccard-style token overlap.

/// Leading English articles removed by [`normalize`].
const ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Normalizes a string for comparison.
///
/// Lower-cases, drops every character that is not a letter, digit or whitespace,
/// collapses whitespace and strips a leading English article. Articles are stripped
/// until none leads the string, which keeps `normalize(normalize(s)) == normalize(s)`.
///
/// # Examples
///
/// ```
/// assert_eq!(shiori::similarity::normalize("The Amazing  Spider-Man!"), "amazing spiderman");
/// ```
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let mut tokens: Vec<&str> = filtered.split_whitespace().collect();

    // A lone article is kept, otherwise "The" would normalize to nothing
    while tokens.len() > 1 && ARTICLES.contains(&tokens[0]) {
        tokens.remove(0);
    }

    tokens.join(" ")
}

/// Jaccard-style token overlap of two strings, in `[0, 1]`.
///
/// Both inputs are normalized and split on whitespace. Each token can take part in at
/// most one match on either side, so repeated words cannot push the score above `1.0`.
/// Returns `0.0` when either side is empty after tokenization.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut available: Vec<Option<&str>> = tokens_b.iter().map(|t| Some(*t)).collect();
    let mut matches = 0usize;
    for token in &tokens_a {
        if let Some(slot) = available.iter_mut().find(|slot| **slot == Some(*token)) {
            *slot = None;
            matches += 1;
        }
    }

    matches as f64 / (tokens_a.len() + tokens_b.len() - matches) as f64
}

/// Canonical form of an issue number for equality checks.
///
/// Removes `#` and `No.` prefixes, surrounding whitespace and leading zeros,
/// so `"#001"`, `"No. 1"` and `"1"` all compare equal. `"0"` and `"0.5"` survive intact.
pub fn normalize_issue_number(issue: &str) -> String {
    let mut value = issue.trim();
    loop {
        let before = value;
        value = value.trim_start_matches('#').trim_start();
        if starts_with_ignore_case(value, "no.") {
            value = value[3..].trim_start();
        } else if starts_with_ignore_case(value, "no")
            // "No 5" without the dot
            && value[2..].starts_with(|c: char| c.is_whitespace() || c.is_ascii_digit())
        {
            value = value[2..].trim_start();
        }
        if value == before {
            break;
        }
    }

    let stripped = value.trim_start_matches('0');
    if stripped.is_empty() {
        if value.is_empty() {
            String::new()
        } else {
            "0".to_string()
        }
    } else if stripped.starts_with('.') {
        format!("0{}", stripped)
    } else {
        stripped.to_lowercase()
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Strips everything but digits and a trailing `X` from an ISBN.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x' || *c == 'X')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, distributions::Alphanumeric};

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("The Walking Dead"), "walking dead");
        assert_eq!(normalize("  A   Game of Thrones "), "game of thrones");
        assert_eq!(normalize("An Unexpected Journey"), "unexpected journey");
        assert_eq!(normalize("Spider-Man: Blue"), "spiderman blue");
        assert_eq!(normalize("The"), "the");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_does_not_strip_inner_articles() {
        assert_eq!(normalize("Theory of the Leisure Class"), "theory of the leisure class");
        assert_eq!(normalize("Anthem"), "anthem");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let fixed = [
            "The A-Team",
            "a. b",
            "The a b",
            "Saga #54 (2018)",
            "İstanbul Hatırası",
            "  the   THE the ",
        ];
        for input in fixed {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {:?}", input);
        }

        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let len = rng.gen_range(1..24);
            let mut s: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            // Sprinkle in separators, punctuation and articles
            if rng.gen_bool(0.5) {
                s = format!("the {} - a.{}", s, s);
            }
            let once = normalize(&s);
            assert_eq!(normalize(&once), once, "input: {:?}", s);
        }
    }

    #[test]
    fn test_similarity_identity_and_empty() {
        assert_eq!(similarity("Batman", "Batman"), 1.0);
        assert_eq!(similarity("The Dark Knight Returns", "dark knight returns"), 1.0);
        assert_eq!(similarity("Batman", ""), 0.0);
        assert_eq!(similarity("", "Batman"), 0.0);
        assert_eq!(similarity("!!!", "Batman"), 0.0);
    }

    #[test]
    fn test_similarity_partial_overlap() {
        // {amazing, spiderman} vs {spiderman}: 1 / (2 + 1 - 1)
        assert!((similarity("Amazing Spider-Man", "Spider-Man") - 0.5).abs() < 1e-9);
        // {batman, year, one} vs {batman}: 1 / 3
        assert!((similarity("Batman Year One", "Batman") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(similarity("Saga", "Monstress"), 0.0);
    }

    #[test]
    fn test_similarity_repeated_tokens_stay_bounded() {
        let score = similarity("new new new", "new");
        assert!(score <= 1.0);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_issue_number() {
        assert_eq!(normalize_issue_number("001"), "1");
        assert_eq!(normalize_issue_number("#001"), "1");
        assert_eq!(normalize_issue_number("No. 12"), "12");
        assert_eq!(normalize_issue_number("no 7"), "7");
        assert_eq!(normalize_issue_number("1.5"), "1.5");
        assert_eq!(normalize_issue_number("0"), "0");
        assert_eq!(normalize_issue_number("000"), "0");
        assert_eq!(normalize_issue_number("0.5"), "0.5");
        assert_eq!(normalize_issue_number("  "), "");
        assert_eq!(normalize_issue_number("12A"), "12a");
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-0-306-40615-7"), "9780306406157");
        assert_eq!(normalize_isbn("0 8044 2957 x"), "080442957X");
    }
}
