#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use folio::app::{build_router, AppState};
use folio::db::memory::MemoryDocumentRepository;
use folio::db::models::Document;
use folio::db::repository::DocumentRepository;
use folio::propagation::queue::PropagationQueue;

/// An API router wired to an in-memory store and a running propagation worker.
pub struct TestEnv {
    pub router: Router,
    pub repo: Arc<dyn DocumentRepository>,
}

impl TestEnv {
    pub fn start() -> Self {
        let repo: Arc<dyn DocumentRepository> = Arc::new(MemoryDocumentRepository::new());
        let (propagation, _worker) = PropagationQueue::start(repo.clone(), 64);

        let router = build_router(AppState {
            document_repo: repo.clone(),
            propagation,
        });

        Self { router, repo }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Helper: create a document via the API and set its content.
    pub async fn create_with_content(
        &self,
        server: &axum_test::TestServer,
        title: &str,
        content: &str,
    ) -> Document {
        let doc: Document = server
            .post("/api/v1/documents")
            .json(&serde_json::json!({ "title": title, "owner": "test-user" }))
            .await
            .json();

        if !content.is_empty() {
            server
                .put(&format!("/api/v1/documents/{}/content", doc.id))
                .json(&serde_json::json!({ "content": content }))
                .await;
        }

        doc
    }

    /// Helper: wait until the stored content of `id` satisfies `done`.
    ///
    /// Propagation runs on a background worker, so its effect is only
    /// eventually visible.
    pub async fn wait_for_content(&self, id: i64, done: impl Fn(&str) -> bool) -> String {
        for _ in 0..100 {
            let doc = self
                .repo
                .get_document(id)
                .await
                .unwrap()
                .expect("document exists");
            if done(&doc.content) {
                return doc.content;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("document {id} never reached the expected content");
    }
}
