use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Document, DocumentContent, DocumentSummary, NewDocument};
use crate::error::AppError;

/// Repository trait for document operations.
///
/// This trait allows mocking the database layer in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Store a new document with empty content and assign it an id.
    async fn create(&self, doc: NewDocument) -> Result<Document, AppError>;

    /// Find a document by its id.
    async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError>;

    /// Find every document, of any owner, whose content contains `needle`.
    ///
    /// The match is a case-sensitive substring match.
    async fn find_documents_containing(&self, needle: &str)
        -> Result<Vec<DocumentContent>, AppError>;

    /// Replace a document's content and bump its `updated_at`.
    ///
    /// Returns the new `updated_at`.
    async fn update_document_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<DateTime<Utc>, AppError>;

    /// List all documents, ordered by id.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, AppError>;
}

/// MongoDB implementation of the DocumentRepository.
///
/// This is only available when the `ssr` feature is enabled (i.e., server-side).
#[cfg(feature = "ssr")]
pub struct MongoDocumentRepository {
    collection: mongodb::Collection<Document>,
    counters: mongodb::Collection<IdCounter>,
}

/// Sequence document used to hand out document ids.
#[cfg(feature = "ssr")]
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct IdCounter {
    #[serde(rename = "_id")]
    pub name: String,
    pub seq: i64,
}

#[cfg(feature = "ssr")]
impl MongoDocumentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("documents"),
            counters: db.collection("counters"),
        }
    }

    async fn next_id(&self) -> Result<i64, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters
            .find_one_and_update(doc! { "_id": "documents" }, doc! { "$inc": { "seq": 1_i64 } })
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::Database("document id counter missing".into()))?;

        Ok(counter.seq)
    }
}

#[cfg(feature = "ssr")]
#[async_trait]
impl DocumentRepository for MongoDocumentRepository {
    async fn create(&self, new_doc: NewDocument) -> Result<Document, AppError> {
        let doc = Document {
            id: self.next_id().await?,
            slug: new_doc.slug,
            title: new_doc.title,
            content: String::new(),
            owner: new_doc.owner,
            created_at: new_doc.created_at,
            updated_at: new_doc.created_at,
        };

        self.collection
            .insert_one(&doc)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(doc)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_documents_containing(
        &self,
        needle: &str,
    ) -> Result<Vec<DocumentContent>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        // Escaped so the needle is matched literally.
        let filter = doc! { "content": { "$regex": regex::escape(needle) } };

        let mut cursor = self
            .collection
            .find(filter)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut documents = Vec::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            documents.push(DocumentContent {
                id: doc.id,
                content: doc.content,
            });
        }

        Ok(documents)
    }

    async fn update_document_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<DateTime<Utc>, AppError> {
        use mongodb::bson::doc;

        let updated_at = Utc::now();
        let result = self
            .collection
            .update_one(
                doc! { "id": id },
                doc! { "$set": { "content": content, "updated_at": updated_at.to_rfc3339() } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("document {id}")));
        }

        Ok(updated_at)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(doc! { "id": 1 }).build();

        let mut cursor = self
            .collection
            .find(doc! {})
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut documents = Vec::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            documents.push(doc.summary());
        }

        Ok(documents)
    }
}
