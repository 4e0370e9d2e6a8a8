use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Document, DocumentContent, DocumentSummary, NewDocument};
use crate::db::repository::DocumentRepository;
use crate::error::AppError;

/// Process-local document store.
///
/// Backs demo mode (no MongoDB configured) and the API tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentRepository {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    documents: BTreeMap<i64, Document>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> AppError {
        AppError::Internal("document store lock poisoned".into())
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn create(&self, new_doc: NewDocument) -> Result<Document, AppError> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        state.last_id += 1;

        let doc = Document {
            id: state.last_id,
            slug: new_doc.slug,
            title: new_doc.title,
            content: String::new(),
            owner: new_doc.owner,
            created_at: new_doc.created_at,
            updated_at: new_doc.created_at,
        };
        state.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.documents.get(&id).cloned())
    }

    async fn find_documents_containing(
        &self,
        needle: &str,
    ) -> Result<Vec<DocumentContent>, AppError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state
            .documents
            .values()
            .filter(|d| d.content.contains(needle))
            .map(|d| DocumentContent {
                id: d.id,
                content: d.content.clone(),
            })
            .collect())
    }

    async fn update_document_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<DateTime<Utc>, AppError> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        let doc = state
            .documents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("document {id}")))?;
        doc.content = content.to_string();
        doc.updated_at = Utc::now();
        Ok(doc.updated_at)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, AppError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.documents.values().map(Document::summary).collect())
    }
}
