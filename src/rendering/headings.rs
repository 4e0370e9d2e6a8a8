use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// ATX heading: 1 to 6 `#`, whitespace, then the heading text.
static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid html tag regex"));
static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static NON_ANCHOR_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid anchor regex"));

/// Deepest heading level recognised by the extractor.
pub const MAX_LEVEL: usize = 6;

/// A heading found in a markdown document.
///
/// Headings are derived on every parse and never persisted. Two versions
/// of a document can only be related through their cleaned `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Number of leading `#` (1..=6).
    pub level: u8,
    /// Heading text as written, markup included.
    pub raw_text: String,
    /// Heading text with markup stripped; the key used for matching.
    pub text: String,
    /// Hierarchical section number, e.g. `2.1.3`.
    pub number: String,
    /// Anchor id derived from the cleaned text.
    pub anchor_id: String,
    /// Element id the renderer gives this heading (`sec-1-2`), the target of
    /// table of contents entries and section links.
    pub section_id: String,
}

/// Per-level counters assigning hierarchical section numbers.
///
/// Seeing a heading of level `L` increments counter `L` and resets every
/// deeper counter. Zero counters (skipped levels) do not appear in the number.
#[derive(Debug, Default, Clone)]
pub struct SectionCounter {
    counters: [u32; MAX_LEVEL],
}

impl SectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heading of `level` and return its section number.
    ///
    /// Levels outside 1..=6 are clamped.
    pub fn next(&mut self, level: usize) -> String {
        let idx = level.clamp(1, MAX_LEVEL) - 1;
        self.counters[idx] += 1;
        for deeper in &mut self.counters[idx + 1..] {
            *deeper = 0;
        }

        self.counters[..=idx]
            .iter()
            .filter(|c| **c != 0)
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Extract all ATX headings from markdown, numbered hierarchically.
///
/// The scan is line based: every line matching the heading pattern counts,
/// everything else is ignored. Content without headings yields an empty list.
pub fn extract_headings(markdown: &str) -> Vec<Heading> {
    extract_headings_by_line(markdown)
        .into_iter()
        .map(|(_, heading)| heading)
        .collect()
}

/// Like [`extract_headings`], paired with the zero-based index of the line
/// each heading was found on.
pub fn extract_headings_by_line(markdown: &str) -> Vec<(usize, Heading)> {
    let mut counter = SectionCounter::new();
    let mut headings = Vec::new();

    for (line_idx, line) in markdown.lines().enumerate() {
        let Some(caps) = HEADING_LINE.captures(line) else {
            continue;
        };
        let level = caps[1].len();
        let raw_text = caps[2].to_string();
        let text = clean_heading_text(&raw_text);
        let anchor_id = anchor_id(&text);
        let number = counter.next(level);

        headings.push((
            line_idx,
            Heading {
                level: level as u8,
                section_id: section_anchor(&number),
                number,
                raw_text,
                text,
                anchor_id,
            },
        ));
    }

    headings
}

/// Strip markup from heading text.
///
/// Removes HTML tags, reduces `[text](url)` links to their text, drops
/// emphasis and code markers and collapses whitespace.
pub fn clean_heading_text(raw: &str) -> String {
    let without_tags = HTML_TAG.replace_all(raw, "");
    let without_links = MARKDOWN_LINK.replace_all(&without_tags, "$1");
    let without_markers: String = without_links
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '~'))
        .collect();

    WHITESPACE
        .replace_all(&without_markers, " ")
        .trim()
        .to_string()
}

/// Derive a navigation anchor from cleaned heading text.
///
/// Lowercases, keeps word characters (any script), hyphens and spaces,
/// then turns whitespace runs into hyphens.
pub fn anchor_id(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_ANCHOR_CHARS.replace_all(&lowered, "");
    WHITESPACE.replace_all(stripped.trim(), "-").into_owned()
}

/// Element id of the section with the given number (`1.2` -> `sec-1-2`).
pub fn section_anchor(number: &str) -> String {
    format!("sec-{}", number.trim().replace('.', "-"))
}
