use serde::{Deserialize, Serialize};

use crate::db::models::{
    CreateDocumentRequest, Document, NewDocument, SaveContentRequest, SaveResponse,
};
use crate::db::repository::DocumentRepository;
use crate::error::AppError;
use crate::propagation::PropagationJob;
use crate::rendering::headings::{extract_headings, Heading};
use crate::rendering::link_token::{extract_link_tokens, LinkToken};
use crate::rendering::markdown::{render_document, RenderedDocument};
use crate::rendering::section_diff::{diff_section_numbers, SectionMapping};

/// Request body for previewing the section changes of an edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDiffRequest {
    pub old_content: String,
    pub new_content: String,
}

/// Outcome of a save: the response for the caller, plus the propagation
/// job to hand to the background queue when section numbers moved.
#[derive(Debug, Clone)]
pub struct SavedEdit {
    pub response: SaveResponse,
    pub job: Option<PropagationJob>,
}

async fn load_document(repo: &dyn DocumentRepository, id: i64) -> Result<Document, AppError> {
    repo.get_document(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document {id}")))
}

/// Create a new, empty document.
pub async fn process_create(
    repo: &dyn DocumentRepository,
    request: CreateDocumentRequest,
) -> Result<Document, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if request.owner.trim().is_empty() {
        return Err(AppError::BadRequest("Owner cannot be empty".into()));
    }

    let doc = repo
        .create(NewDocument::new(request.title.trim(), request.owner.trim()))
        .await?;
    tracing::info!("Created document {} ({})", doc.id, doc.slug);
    Ok(doc)
}

/// Core save logic, separated from the HTTP layer for testability.
///
/// The result only reflects the edited document. Rewriting references in
/// other documents is left to the returned job.
pub async fn process_save(
    repo: &dyn DocumentRepository,
    id: i64,
    request: SaveContentRequest,
) -> Result<SavedEdit, AppError> {
    let existing = load_document(repo, id).await?;
    let section_changes = diff_section_numbers(&existing.content, &request.content);

    let updated_at = repo.update_document_content(id, &request.content).await?;

    let job = (!section_changes.is_empty()).then(|| PropagationJob {
        document_id: id,
        old_content: existing.content,
        new_content: request.content,
    });

    Ok(SavedEdit {
        response: SaveResponse {
            id,
            updated_at,
            section_changes,
        },
        job,
    })
}

/// Numbered headings of a document (its table of contents).
pub async fn process_headings(
    repo: &dyn DocumentRepository,
    id: i64,
) -> Result<Vec<Heading>, AppError> {
    let doc = load_document(repo, id).await?;
    Ok(extract_headings(&doc.content))
}

/// Outgoing id-based references of a document.
pub async fn process_references(
    repo: &dyn DocumentRepository,
    id: i64,
) -> Result<Vec<LinkToken>, AppError> {
    let doc = load_document(repo, id).await?;
    Ok(extract_link_tokens(&doc.content))
}

/// Render a document with its links resolved against the whole corpus.
pub async fn process_render(
    repo: &dyn DocumentRepository,
    id: i64,
) -> Result<RenderedDocument, AppError> {
    let doc = load_document(repo, id).await?;
    let documents = repo.list_documents().await?;
    Ok(render_document(&doc.content, &documents))
}

/// Axum handlers.
///
/// Only available when the `ssr` feature is enabled.
#[cfg(feature = "ssr")]
mod handlers {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;

    use super::*;
    use crate::app::AppState;
    use crate::db::models::DocumentSummary;

    /// `POST /api/v1/documents`
    pub async fn create_document_handler(
        State(state): State<AppState>,
        Json(request): Json<CreateDocumentRequest>,
    ) -> Result<(StatusCode, Json<Document>), AppError> {
        let doc = process_create(state.document_repo.as_ref(), request).await?;
        Ok((StatusCode::CREATED, Json(doc)))
    }

    /// `GET /api/v1/documents`
    pub async fn list_documents_handler(
        State(state): State<AppState>,
    ) -> Result<Json<Vec<DocumentSummary>>, AppError> {
        Ok(Json(state.document_repo.list_documents().await?))
    }

    /// `GET /api/v1/documents/{id}`
    pub async fn get_document_handler(
        State(state): State<AppState>,
        Path(id): Path<i64>,
    ) -> Result<Json<Document>, AppError> {
        Ok(Json(load_document(state.document_repo.as_ref(), id).await?))
    }

    /// `PUT /api/v1/documents/{id}/content`
    ///
    /// Succeeds as soon as the document itself is stored; link propagation
    /// runs in the background and never affects the response.
    pub async fn save_content_handler(
        State(state): State<AppState>,
        Path(id): Path<i64>,
        Json(request): Json<SaveContentRequest>,
    ) -> Result<Json<SaveResponse>, AppError> {
        let saved = process_save(state.document_repo.as_ref(), id, request).await?;
        if let Some(job) = saved.job {
            state.propagation.enqueue(job);
        }
        Ok(Json(saved.response))
    }

    /// `GET /api/v1/documents/{id}/headings`
    pub async fn headings_handler(
        State(state): State<AppState>,
        Path(id): Path<i64>,
    ) -> Result<Json<Vec<Heading>>, AppError> {
        Ok(Json(process_headings(state.document_repo.as_ref(), id).await?))
    }

    /// `GET /api/v1/documents/{id}/references`
    pub async fn references_handler(
        State(state): State<AppState>,
        Path(id): Path<i64>,
    ) -> Result<Json<Vec<LinkToken>>, AppError> {
        Ok(Json(process_references(state.document_repo.as_ref(), id).await?))
    }

    /// `GET /api/v1/documents/{id}/render`
    pub async fn render_handler(
        State(state): State<AppState>,
        Path(id): Path<i64>,
    ) -> Result<Json<RenderedDocument>, AppError> {
        Ok(Json(process_render(state.document_repo.as_ref(), id).await?))
    }

    /// `POST /api/v1/sections/diff`
    pub async fn section_diff_handler(
        Json(request): Json<SectionDiffRequest>,
    ) -> Json<Vec<SectionMapping>> {
        Json(diff_section_numbers(&request.old_content, &request.new_content))
    }
}

#[cfg(feature = "ssr")]
pub use handlers::*;
