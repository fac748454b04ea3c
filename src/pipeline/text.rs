//! Text helpers for article derivation. Every function here is total: bad
//! input degrades to an empty or `None` result, never an error.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::{Html, Node};
use sha2::{Digest, Sha256};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static NUMERIC_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("valid numeric reference regex")
});

static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[a-zA-Z][a-zA-Z0-9]*;").expect("valid entity regex"));

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid img regex")
});

static LATIN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+").expect("valid word regex"));

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that separate words when flattened to text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Plain text of an HTML fragment: hidden elements dropped, entities decoded,
/// whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => out.push(' '),
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    matches!(ancestor.value(), Node::Element(e) if HIDDEN_ELEMENTS.contains(&e.name()))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            _ => {}
        }
    }

    collapse_whitespace(&out)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Titles are cleaned with a lighter hand than bodies: tags go, numeric
/// references become characters, any other named entity becomes a space.
pub fn clean_title(raw: &str) -> String {
    let stripped = TAG.replace_all(raw, "");
    let decoded = NUMERIC_REF.replace_all(&stripped, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    let without_entities = NAMED_ENTITY.replace_all(&decoded, " ");
    collapse_whitespace(&without_entities)
}

/// First `<img src>` in an HTML string, found by attribute matching.
pub fn first_image_src(html: &str) -> Option<String> {
    IMG_SRC
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|src| !src.is_empty())
}

/// Up to `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2EBEF
        | 0x30000..=0x3134F)
}

/// Estimated minutes: CJK ideographs and Latin words are counted separately
/// against their own speeds, summed, and rounded up. Any non-blank text reads
/// in at least one minute; blank text in zero.
pub fn reading_time(text: &str, cjk_chars_per_minute: u32, words_per_minute: u32) -> u32 {
    if text.trim().is_empty() {
        return 0;
    }

    let cjk = text.chars().filter(|c| is_cjk_ideograph(*c)).count() as f64;
    let words = LATIN_WORD.find_iter(text).count() as f64;

    let minutes = cjk / f64::from(cjk_chars_per_minute.max(1))
        + words / f64::from(words_per_minute.max(1));

    (minutes.ceil() as u32).max(1)
}

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%A, %d %B %Y %H:%M:%S %z",
];

/// Permissive date parsing. Naive values are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Some feeds write "UTC"/"GMT" where a numeric offset belongs.
    let normalized = raw
        .trim_end_matches(" UTC")
        .trim_end_matches(" GMT")
        .trim_end_matches('Z');

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(normalized, format) {
            return Some(dt.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(normalized, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}
