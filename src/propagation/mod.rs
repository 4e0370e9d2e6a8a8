//! Keeps `[[doc:<id>#<section>]]` references valid after an edit renumbers
//! the sections of the referenced document.
//!
//! Work is split in three steps: compute the section diff, plan one
//! [`RewriteTask`] per referencing document, apply the tasks independently.

#[cfg(feature = "ssr")]
pub mod queue;

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::db::models::DocumentContent;
use crate::db::repository::DocumentRepository;
use crate::error::AppError;
use crate::rendering::link_token::{DOC_PREFIX, ENCODINGS};
use crate::rendering::section_diff::{diff_section_numbers, SectionMapping};

/// One saved edit whose section renumbering still has to be propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationJob {
    pub document_id: i64,
    pub old_content: String,
    pub new_content: String,
}

/// A pending content update for one referencing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTask {
    pub document_id: i64,
    /// Content with every stale section reference rewritten.
    pub content: String,
}

/// What a propagation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub mappings: Vec<SectionMapping>,
    /// Documents returned by the corpus scan, the edited one excluded.
    pub candidates: usize,
    pub updated: Vec<i64>,
    pub failed: Vec<i64>,
}

/// Substring every document referencing `document_id` must contain.
pub fn reference_needle(document_id: i64) -> String {
    format!("{DOC_PREFIX}{document_id}")
}

/// The literal forms a reference to `section` of `document_id` can take:
/// labelled and unlabelled, in every token encoding.
pub fn section_reference_patterns(document_id: i64, section: &str) -> Vec<String> {
    let mut patterns = Vec::with_capacity(ENCODINGS.len() * 2);
    for encoding in ENCODINGS.iter() {
        for terminator in ["|", "]]"] {
            let raw = format!("[[{DOC_PREFIX}{document_id}#{section}{terminator}");
            patterns.push(encoding.encode(&raw));
        }
    }
    patterns
}

/// Rewrite stale section numbers in references to `document_id`.
///
/// All replacements happen in one left-to-right pass, so chained renumbering
/// (`1 -> 2`, `2 -> 3`) never rewrites the same reference twice. Everything
/// outside the matched references is left byte-for-byte intact.
pub fn rewrite_section_references(
    content: &str,
    document_id: i64,
    mappings: &[SectionMapping],
) -> String {
    let mut replacements: BTreeMap<String, String> = BTreeMap::new();
    for mapping in mappings {
        let from = section_reference_patterns(document_id, &mapping.old_number);
        let to = section_reference_patterns(document_id, &mapping.new_number);
        for (from, to) in from.into_iter().zip(to) {
            replacements.entry(from).or_insert(to);
        }
    }
    if replacements.is_empty() {
        return content.to_string();
    }

    let alternation = replacements
        .keys()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = match Regex::new(&alternation) {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!("Cannot build section reference pattern for document {document_id}: {e}");
            return content.to_string();
        }
    };

    pattern
        .replace_all(content, |caps: &Captures| {
            replacements
                .get(&caps[0])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Plan the content updates needed in the referencing documents.
///
/// The edited document itself and candidates whose content does not change
/// are skipped. Each remaining candidate yields exactly one task no matter
/// how many of its references moved.
pub fn plan_rewrites(
    document_id: i64,
    candidates: Vec<DocumentContent>,
    mappings: &[SectionMapping],
) -> Vec<RewriteTask> {
    candidates
        .into_iter()
        .filter(|c| c.id != document_id)
        .filter_map(|c| {
            let rewritten = rewrite_section_references(&c.content, document_id, mappings);
            (rewritten != c.content).then_some(RewriteTask {
                document_id: c.id,
                content: rewritten,
            })
        })
        .collect()
}

/// Apply rewrite tasks concurrently.
///
/// A failed write is logged and reported; it never stops the other tasks.
/// Returns the ids that were updated and the ids that failed.
pub async fn apply_rewrites(
    repo: &dyn DocumentRepository,
    tasks: Vec<RewriteTask>,
) -> (Vec<i64>, Vec<i64>) {
    let writes = tasks.iter().map(|task| async move {
        let result = repo
            .update_document_content(task.document_id, &task.content)
            .await;
        (task.document_id, result)
    });

    let mut updated = Vec::new();
    let mut failed = Vec::new();
    for (id, result) in futures::future::join_all(writes).await {
        match result {
            Ok(_) => updated.push(id),
            Err(e) => {
                tracing::warn!("Failed to update section links in document {id}: {e}");
                failed.push(id);
            }
        }
    }
    (updated, failed)
}

/// Propagate the section renumbering of one edit to every referencing document.
///
/// Does nothing (and does not touch the store) when the edit changed no
/// section number. A failing corpus scan is returned as an error; failing
/// writes are only reported.
pub async fn propagate_section_renumbering(
    repo: &dyn DocumentRepository,
    document_id: i64,
    old_content: &str,
    new_content: &str,
) -> Result<PropagationReport, AppError> {
    let mappings = diff_section_numbers(old_content, new_content);
    if mappings.is_empty() {
        return Ok(PropagationReport::default());
    }

    let candidates = repo
        .find_documents_containing(&reference_needle(document_id))
        .await?;
    let candidate_count = candidates.iter().filter(|c| c.id != document_id).count();

    let tasks = plan_rewrites(document_id, candidates, &mappings);
    let (updated, failed) = apply_rewrites(repo, tasks).await;

    tracing::info!(
        "Propagated {} section change(s) of document {}: {} candidate(s), {} updated, {} failed",
        mappings.len(),
        document_id,
        candidate_count,
        updated.len(),
        failed.len()
    );

    Ok(PropagationReport {
        mappings,
        candidates: candidate_count,
        updated,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDocumentRepository;
    use crate::db::models::NewDocument;
    use crate::db::repository::MockDocumentRepository;

    fn mapping(old: &str, new: &str) -> SectionMapping {
        SectionMapping {
            text: format!("Heading {old}"),
            old_number: old.to_string(),
            new_number: new.to_string(),
        }
    }

    #[test]
    fn test_section_reference_patterns() {
        assert_eq!(
            section_reference_patterns(5, "1.1"),
            vec![
                "[[doc:5#1.1|".to_string(),
                "[[doc:5#1.1]]".to_string(),
                r"\[\[doc:5\#1\.1\|".to_string(),
                r"\[\[doc:5\#1\.1\]\]".to_string(),
            ]
        );
    }

    #[test]
    fn test_rewrite_labelled_reference() {
        let out = rewrite_section_references(
            "See [[doc:5#1.1|Intro]] for details.",
            5,
            &[mapping("1.1", "2.3")],
        );
        assert_eq!(out, "See [[doc:5#2.3|Intro]] for details.");
    }

    #[test]
    fn test_rewrite_unlabelled_reference() {
        let out = rewrite_section_references("[[doc:5#1.1]]", 5, &[mapping("1.1", "2.3")]);
        assert_eq!(out, "[[doc:5#2.3]]");
    }

    #[test]
    fn test_rewrite_escaped_reference() {
        let out = rewrite_section_references(
            r"\[\[doc:5\#1\.1\|Intro\]\]",
            5,
            &[mapping("1.1", "2.3")],
        );
        assert_eq!(out, r"\[\[doc:5\#2\.3\|Intro\]\]");
    }

    #[test]
    fn test_chained_renumbering_does_not_cascade() {
        let content = "[[doc:5#1]] [[doc:5#2|two]] [[doc:5#3]]";
        let out = rewrite_section_references(
            content,
            5,
            &[mapping("1", "2"), mapping("2", "3"), mapping("3", "4")],
        );
        assert_eq!(out, "[[doc:5#2]] [[doc:5#3|two]] [[doc:5#4]]");
    }

    #[test]
    fn test_other_documents_and_sections_untouched() {
        let content = "[[doc:55#1.1]] [[doc:5#1.10]] [[doc:5#1.1.2|deep]] [[doc:5]] doc:5#1.1";
        let out = rewrite_section_references(content, 5, &[mapping("1.1", "3")]);
        assert_eq!(out, content);
    }

    #[test]
    fn test_plan_skips_self_and_unchanged() {
        let candidates = vec![
            DocumentContent {
                id: 5,
                content: "[[doc:5#1]] self reference".to_string(),
            },
            DocumentContent {
                id: 7,
                content: "mentions doc:5 in prose only".to_string(),
            },
            DocumentContent {
                id: 9,
                content: "[[doc:5#1|a]] and [[doc:5#1.2]]".to_string(),
            },
        ];
        let tasks = plan_rewrites(5, candidates, &[mapping("1", "2"), mapping("1.2", "2.1")]);
        assert_eq!(
            tasks,
            vec![RewriteTask {
                document_id: 9,
                content: "[[doc:5#2|a]] and [[doc:5#2.1]]".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_no_changes_means_no_scan() {
        let mut repo = MockDocumentRepository::new();
        repo.expect_find_documents_containing().times(0);
        repo.expect_update_document_content().times(0);

        let md = "# A\n## B\ntext";
        let report = propagate_section_renumbering(&repo, 5, md, "# A\n## B\nother text")
            .await
            .unwrap();
        assert_eq!(report, PropagationReport::default());
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_others() {
        let mut repo = MockDocumentRepository::new();
        repo.expect_find_documents_containing()
            .withf(|needle| needle == "doc:5")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    DocumentContent {
                        id: 7,
                        content: "[[doc:5#1]]".to_string(),
                    },
                    DocumentContent {
                        id: 9,
                        content: "[[doc:5#1|x]]".to_string(),
                    },
                ])
            });
        repo.expect_update_document_content()
            .withf(|id, _| *id == 7)
            .times(1)
            .returning(|_, _| Err(AppError::Database("write conflict".into())));
        repo.expect_update_document_content()
            .withf(|id, content| *id == 9 && content == "[[doc:5#2|x]]")
            .times(1)
            .returning(|_, _| Ok(chrono::Utc::now()));

        let report = propagate_section_renumbering(&repo, 5, "# A", "# Z\n# A")
            .await
            .unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.updated, vec![9]);
        assert_eq!(report.failed, vec![7]);
    }

    #[tokio::test]
    async fn test_scan_failure_is_an_error() {
        let mut repo = MockDocumentRepository::new();
        repo.expect_find_documents_containing()
            .returning(|_| Err(AppError::Database("unreachable".into())));
        repo.expect_update_document_content().times(0);

        let result = propagate_section_renumbering(&repo, 5, "# A", "# Z\n# A").await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_propagation_end_to_end() {
        let repo = MemoryDocumentRepository::new();
        let target = repo.create(NewDocument::new("Target", "u1")).await.unwrap();
        let referrer = repo.create(NewDocument::new("Referrer", "u2")).await.unwrap();
        let escaped = repo.create(NewDocument::new("Legacy", "u3")).await.unwrap();

        let old = "# A\n## B\n## C";
        let new = "# Z\n# A\n## C\n## B";
        repo.update_document_content(target.id, old).await.unwrap();
        let referrer_content = format!(
            "See [[doc:{id}#1.1|B]], [[doc:{id}#1.2]] and [[doc:{id}#1|top]].",
            id = target.id
        );
        repo.update_document_content(referrer.id, &referrer_content)
            .await
            .unwrap();
        let escaped_content = format!(r"\[\[doc:{}\#1\.2\|C\]\]", target.id);
        repo.update_document_content(escaped.id, &escaped_content)
            .await
            .unwrap();

        let report = propagate_section_renumbering(&repo, target.id, old, new)
            .await
            .unwrap();
        assert_eq!(report.mappings.len(), 3);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.updated, vec![referrer.id, escaped.id]);
        assert!(report.failed.is_empty());

        let referrer = repo.get_document(referrer.id).await.unwrap().unwrap();
        assert_eq!(
            referrer.content,
            format!(
                "See [[doc:{id}#2.2|B]], [[doc:{id}#2.1]] and [[doc:{id}#2|top]].",
                id = target.id
            )
        );
        let escaped = repo.get_document(escaped.id).await.unwrap().unwrap();
        assert_eq!(escaped.content, format!(r"\[\[doc:{}\#2\.1\|C\]\]", target.id));
    }
}
