use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::documents;
use crate::db::repository::DocumentRepository;
use crate::propagation::queue::PropagationQueue;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub document_repo: Arc<dyn DocumentRepository>,
    /// Where saves drop their link propagation jobs.
    pub propagation: PropagationQueue,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/documents",
            get(documents::list_documents_handler).post(documents::create_document_handler),
        )
        .route("/api/v1/documents/{id}", get(documents::get_document_handler))
        .route(
            "/api/v1/documents/{id}/content",
            put(documents::save_content_handler),
        )
        .route(
            "/api/v1/documents/{id}/headings",
            get(documents::headings_handler),
        )
        .route(
            "/api/v1/documents/{id}/references",
            get(documents::references_handler),
        )
        .route(
            "/api/v1/documents/{id}/render",
            get(documents::render_handler),
        )
        .route(
            "/api/v1/sections/diff",
            post(documents::section_diff_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
