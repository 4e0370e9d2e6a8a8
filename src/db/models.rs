use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rendering::section_diff::SectionMapping;

/// A wiki document as stored by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Positive numeric id, referenced by `[[doc:<id>]]` tokens.
    pub id: i64,
    /// URL-safe slug derived from the title and creation time.
    pub slug: String,
    /// Human-readable title.
    pub title: String,
    /// Markdown content.
    #[serde(default)]
    pub content: String,
    /// The user who owns this document.
    pub owner: String,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last content update.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }
}

/// Input for creating a document. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub owner: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl NewDocument {
    /// Prepare a new, empty document with a slug derived from `title`.
    pub fn new(title: impl Into<String>, owner: impl Into<String>) -> Self {
        let title = title.into();
        let created_at = Utc::now();
        Self {
            slug: make_slug(&title, created_at),
            title,
            owner: owner.into(),
            created_at,
        }
    }
}

/// A row returned by the corpus content search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub id: i64,
    pub content: String,
}

/// The fields needed to resolve links at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// The request payload for creating a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub owner: String,
}

/// The request payload for saving a document's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveContentRequest {
    pub content: String,
}

/// The response from a successful save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub id: i64,
    pub updated_at: DateTime<Utc>,
    /// Sections whose number changed with this save. Links to them in
    /// other documents are rewritten in the background.
    pub section_changes: Vec<SectionMapping>,
}

/// Build a unique, URL-safe slug from a title and a timestamp.
///
/// Runs of anything that is not a letter or digit become a single `-`.
/// The creation time in milliseconds is appended for uniqueness.
pub fn make_slug(title: &str, at: DateTime<Utc>) -> String {
    let mut base = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            base.push(c);
        } else if !base.ends_with('-') {
            base.push('-');
        }
    }
    let base = base.trim_matches('-');
    let base = if base.is_empty() { "untitled" } else { base };

    format!("{}-{}", base, at.timestamp_millis())
}
