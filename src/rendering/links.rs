use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::db::models::DocumentSummary;
use crate::rendering::headings::section_anchor;
use crate::rendering::link_token::{find_link_tokens, LinkToken, TokenMatch, ENCODINGS};

/// `[[...]]` on a single line, with no nested brackets.
static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").expect("valid wiki link regex"));

/// CSS class carried by every resolved internal link.
pub const WIKI_LINK_CLASS: &str = "wiki-link";

/// Path prefix of the document viewer.
pub const WIKI_PATH: &str = "/wiki/";

/// Resolve title-based `[[Title]]` / `[[Title#Section]]` references.
///
/// Titles are matched after trimming. When two documents share a title the
/// first one in `documents` wins. References to unknown titles are left
/// untouched.
pub fn resolve_display_links(markdown: &str, documents: &[DocumentSummary]) -> String {
    let mut by_title: HashMap<&str, &DocumentSummary> = HashMap::new();
    for doc in documents {
        by_title.entry(doc.title.trim()).or_insert(doc);
    }

    WIKI_LINK
        .replace_all(markdown, |caps: &Captures| {
            let inner = &caps[1];
            let (title_part, section) = match inner.split_once('#') {
                Some((title, section)) => (title.trim(), Some(section.trim())),
                None => (inner.trim(), None),
            };
            let section = section.filter(|s| !s.is_empty());

            match by_title.get(title_part) {
                Some(doc) => {
                    let display = match section {
                        Some(section) => format!("{title_part}#{section}"),
                        None => title_part.to_string(),
                    };
                    wiki_anchor(&doc.slug, section, &display)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve id-based `[[doc:<id>#<section>|<label>]]` references, in either
/// encoding.
///
/// The display text is the label when present, otherwise the target title
/// (plus `#section`). Tokens pointing at unknown ids are left untouched.
pub fn resolve_doc_links(markdown: &str, documents: &[DocumentSummary]) -> String {
    let by_id: HashMap<i64, &DocumentSummary> = documents.iter().map(|d| (d.id, d)).collect();

    let mut matches: Vec<TokenMatch> = ENCODINGS
        .iter()
        .flat_map(|encoding| find_link_tokens(markdown, *encoding))
        .collect();
    matches.sort_by_key(|m| m.start);

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for m in matches {
        if m.start < cursor {
            continue;
        }
        let Some(doc) = by_id.get(&m.token.doc_id) else {
            continue;
        };
        out.push_str(&markdown[cursor..m.start]);
        out.push_str(&doc_anchor(doc, &m.token));
        cursor = m.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

fn doc_anchor(doc: &DocumentSummary, token: &LinkToken) -> String {
    let section = token.section.as_deref();
    let display = match (&token.label, section) {
        (Some(label), _) => label.clone(),
        (None, Some(section)) => format!("{}#{}", doc.title.trim(), section),
        (None, None) => doc.title.trim().to_string(),
    };
    wiki_anchor(&doc.slug, section, &display)
}

fn wiki_anchor(slug: &str, section: Option<&str>, display: &str) -> String {
    let mut href = format!("{WIKI_PATH}{slug}");
    if let Some(section) = section {
        href.push('#');
        href.push_str(&section_anchor(section));
    }
    format!(
        "<a href=\"{}\" class=\"{WIKI_LINK_CLASS}\">{}</a>",
        escape_html(&href),
        escape_html(display)
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<DocumentSummary> {
        vec![
            DocumentSummary {
                id: 5,
                slug: "travel-log-1700000000000".to_string(),
                title: "Travel Log".to_string(),
            },
            DocumentSummary {
                id: 9,
                slug: "reading-list-1700000000001".to_string(),
                title: " Reading List ".to_string(),
            },
        ]
    }

    #[test]
    fn test_unknown_title_passes_through() {
        assert_eq!(resolve_display_links("[[Nonexistent]]", &docs()), "[[Nonexistent]]");
        assert_eq!(resolve_display_links("[[Nonexistent]]", &[]), "[[Nonexistent]]");
    }

    #[test]
    fn test_title_link() {
        let out = resolve_display_links("Go to [[Travel Log]].", &docs());
        assert_eq!(
            out,
            "Go to <a href=\"/wiki/travel-log-1700000000000\" class=\"wiki-link\">Travel Log</a>."
        );
    }

    #[test]
    fn test_title_link_with_section() {
        let out = resolve_display_links("[[Reading List#2.1]]", &docs());
        assert_eq!(
            out,
            "<a href=\"/wiki/reading-list-1700000000001#sec-2-1\" class=\"wiki-link\">Reading List#2.1</a>"
        );
    }

    #[test]
    fn test_title_collision_first_wins() {
        let mut list = docs();
        list.push(DocumentSummary {
            id: 11,
            slug: "travel-log-duplicate".to_string(),
            title: "Travel Log".to_string(),
        });
        let out = resolve_display_links("[[Travel Log]]", &list);
        assert!(out.contains("/wiki/travel-log-1700000000000"));
        assert!(!out.contains("duplicate"));
    }

    #[test]
    fn test_nested_brackets_are_not_links() {
        let md = "[[a [b] c]]";
        assert_eq!(resolve_display_links(md, &docs()), md);
    }

    #[test]
    fn test_doc_link_after_stray_bracket() {
        assert_eq!(
            resolve_doc_links("[[[doc:5#1]]", &docs()),
            "[<a href=\"/wiki/travel-log-1700000000000#sec-1\" class=\"wiki-link\">Travel Log#1</a>"
        );
    }

    #[test]
    fn test_links_do_not_span_lines() {
        let md = "[[Travel\nLog]]";
        assert_eq!(resolve_display_links(md, &docs()), md);
    }

    #[test]
    fn test_display_text_is_escaped() {
        let list = vec![DocumentSummary {
            id: 1,
            slug: "tags-1".to_string(),
            title: "<b>Tags</b> & more".to_string(),
        }];
        let out = resolve_display_links("[[<b>Tags</b> & more]]", &list);
        assert!(out.contains(">&lt;b&gt;Tags&lt;/b&gt; &amp; more</a>"));
    }

    #[test]
    fn test_doc_link_with_label() {
        let out = resolve_doc_links("See [[doc:5#1.1|Intro]] for details.", &docs());
        assert_eq!(
            out,
            "See <a href=\"/wiki/travel-log-1700000000000#sec-1-1\" class=\"wiki-link\">Intro</a> for details."
        );
    }

    #[test]
    fn test_doc_link_without_label_uses_title() {
        let out = resolve_doc_links("[[doc:9]] and [[doc:5#3]]", &docs());
        assert!(out.contains(">Reading List</a>"));
        assert!(out.contains("#sec-3\" class=\"wiki-link\">Travel Log#3</a>"));
    }

    #[test]
    fn test_escaped_doc_link() {
        let out = resolve_doc_links(r"\[\[doc:5\#1\.2\|Day two\]\]", &docs());
        assert_eq!(
            out,
            "<a href=\"/wiki/travel-log-1700000000000#sec-1-2\" class=\"wiki-link\">Day two</a>"
        );
    }

    #[test]
    fn test_unknown_doc_id_passes_through() {
        let md = "[[doc:404#1|Gone]] [[Travel Log]]";
        assert_eq!(resolve_doc_links(md, &docs()), md);
    }
}
