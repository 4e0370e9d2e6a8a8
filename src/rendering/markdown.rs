use std::collections::HashMap;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};

use crate::db::models::DocumentSummary;
use crate::rendering::headings::{extract_headings, extract_headings_by_line, Heading};
use crate::rendering::links::{resolve_display_links, resolve_doc_links};

/// A document prepared for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Sanitized HTML body.
    pub html: String,
    /// Numbered headings, for the table of contents.
    pub headings: Vec<Heading>,
}

/// Render a raw Markdown string to sanitized HTML.
///
/// Supports GitHub Flavored Markdown (GFM) features: tables,
/// footnotes, strikethrough, task lists, and smart punctuation.
/// A heading found by [`extract_headings`] gets the `sec-1-2` id of its
/// section number, so section links land on it. Headings the extractor
/// does not count (setext, indented, nested in containers) get no id.
pub fn render_markdown(raw: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION;

    let section_ids: HashMap<usize, String> = extract_headings_by_line(raw)
        .into_iter()
        .map(|(line, heading)| (line, heading.section_id))
        .collect();
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(raw.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let parser = Parser::new_ext(raw, options)
        .into_offset_iter()
        .map(|(event, range)| match event {
            Event::Start(Tag::Heading {
                level,
                classes,
                attrs,
                ..
            }) => {
                let line = line_starts.partition_point(|&start| start <= range.start) - 1;
                Event::Start(Tag::Heading {
                    level,
                    id: section_ids.get(&line).cloned().map(CowStr::from),
                    classes,
                    attrs,
                })
            }
            other => other,
        });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    sanitize(&html_output)
}

fn sanitize(html: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(&["input"])
        .add_tag_attributes("input", &["type", "checked", "disabled"])
        .add_tag_attributes("a", &["class"]);
    for heading in ["h1", "h2", "h3", "h4", "h5", "h6"] {
        builder.add_tag_attributes(heading, &["id"]);
    }
    builder.clean(html).to_string()
}

/// Render a stored document for the viewer.
///
/// Resolves id-based links first, then title-based links, against the
/// documents visible to the viewer.
pub fn render_document(markdown: &str, documents: &[DocumentSummary]) -> RenderedDocument {
    let with_doc_links = resolve_doc_links(markdown, documents);
    let resolved = resolve_display_links(&with_doc_links, documents);

    RenderedDocument {
        html: render_markdown(&resolved),
        headings: extract_headings(markdown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_paragraph() {
        let result = render_markdown("Hello, world!");
        assert_eq!(result.trim(), "<p>Hello, world!</p>");
    }

    #[test]
    fn test_heading_carries_section_id() {
        let result = render_markdown("# Title");
        assert_eq!(result.trim(), "<h1 id=\"sec-1\">Title</h1>");
    }

    #[test]
    fn test_nested_heading_ids() {
        let result = render_markdown("# A\n\n## B\n\n### C\n\n## D\n\n# E");
        assert!(result.contains("<h2 id=\"sec-1-1\">B</h2>"));
        assert!(result.contains("<h3 id=\"sec-1-1-1\">C</h3>"));
        assert!(result.contains("<h2 id=\"sec-1-2\">D</h2>"));
        assert!(result.contains("<h1 id=\"sec-2\">E</h1>"));
    }

    #[test]
    fn test_section_ids_follow_extracted_numbering() {
        let md = "# Setup\n\n```bash\n# install deps\nnpm i\n```\n\n# Usage\n\nSetext\n======\n";
        let numbers: Vec<String> = extract_headings(md).into_iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);

        let result = render_markdown(md);
        assert!(result.contains("<h1 id=\"sec-1\">Setup</h1>"));
        assert!(result.contains("<h1 id=\"sec-3\">Usage</h1>"));
        assert!(result.contains("<h1>Setext</h1>"));
        assert!(!result.contains("id=\"sec-2\""));
        assert!(result.contains("# install deps"));
    }

    #[test]
    fn test_indented_heading_gets_no_section_id() {
        let result = render_markdown("# A\n\n  ## B\n\n## C");
        assert!(result.contains("<h2>B</h2>"));
        assert!(result.contains("<h2 id=\"sec-1-1\">C</h2>"));
    }

    #[test]
    fn test_bold_and_italic() {
        let result = render_markdown("**bold** and *italic*");
        assert!(result.contains("<strong>bold</strong>"));
        assert!(result.contains("<em>italic</em>"));
    }

    #[test]
    fn test_code_block() {
        let input = "```rust\nfn main() {}\n```";
        let result = render_markdown(input);
        assert!(result.contains("<code"));
        assert!(result.contains("fn main()"));
    }

    #[test]
    fn test_table() {
        let input = "| A | B |\n|---|---|\n| 1 | 2 |";
        let result = render_markdown(input);
        assert!(result.contains("<table>"));
        assert!(result.contains("<td>1</td>"));
    }

    #[test]
    fn test_strikethrough() {
        let result = render_markdown("~~deleted~~");
        assert!(result.contains("<del>deleted</del>"));
    }

    #[test]
    fn test_task_list() {
        let input = "- [x] done\n- [ ] not done";
        let result = render_markdown(input);
        assert!(result.contains("checked"));
        assert!(result.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_script_is_stripped() {
        let result = render_markdown("hi <script>alert(1)</script>");
        assert!(!result.contains("<script"));
    }

    #[test]
    fn test_empty_input() {
        let result = render_markdown("");
        assert_eq!(result, "");
    }

    #[test]
    fn test_render_document_resolves_both_link_kinds() {
        let docs = vec![
            DocumentSummary {
                id: 5,
                slug: "trip-1".to_string(),
                title: "Trip".to_string(),
            },
            DocumentSummary {
                id: 6,
                slug: "books-2".to_string(),
                title: "Books".to_string(),
            },
        ];
        let md = "# Today\n\nSee [[doc:5#1.1|the first day]] and [[Books#2]] or [[Missing]].";
        let rendered = render_document(md, &docs);

        assert!(rendered.html.contains("href=\"/wiki/trip-1#sec-1-1\""));
        assert!(rendered.html.contains("the first day</a>"));
        assert!(rendered.html.contains("href=\"/wiki/books-2#sec-2\""));
        assert!(rendered.html.contains("class=\"wiki-link\""));
        assert!(rendered.html.contains("[[Missing]]"));
        assert_eq!(rendered.headings.len(), 1);
        assert_eq!(rendered.headings[0].number, "1");
        assert!(rendered
            .html
            .contains(&format!("id=\"{}\"", rendered.headings[0].section_id)));
    }
}
