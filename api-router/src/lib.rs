#![allow(clippy::missing_docs_in_private_items)]

use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{
    documents::{delete_document, list_documents, upload_document},
    history::get_history,
    liveness::live,
    query::ask_question,
    readiness::ready,
    stats::get_stats,
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    // Multipart framing overhead sits on top of the configured file ceiling;
    // the pipeline enforces the real limit with a typed error.
    let upload_body_limit =
        usize::try_from(app_state.config.max_file_size_bytes.saturating_mul(2))
            .unwrap_or(usize::MAX);

    // Protected API endpoints (require auth)
    let protected = Router::new()
        .route(
            "/documents",
            post(upload_document)
                .get(list_documents)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/documents/{id}", delete(delete_document))
        .route("/ask", post(ask_question))
        .route("/history", get(get_history))
        .route("/stats", get(get_stats))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{
        storage::{db::SurrealDbClient, types::system_settings::SystemSettings, types::user::User},
        utils::{
            config::AppConfig,
            embedding::{Embedder, EmbeddingProvider},
        },
    };
    use retrieval_pipeline::NO_DOCUMENTS_ANSWER;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const TEST_EMBEDDING_DIM: usize = 16;
    const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

    async fn setup_router() -> (Router, String, String) {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = Arc::new(
            SurrealDbClient::memory(namespace, database)
                .await
                .expect("Failed to start in-memory surrealdb"),
        );
        db.ensure_initialized(TEST_EMBEDDING_DIM)
            .await
            .expect("Failed to initialize schema");

        let config = AppConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            llm_retry_attempts: 0,
            openai_base_url: "http://127.0.0.1:1".into(),
            ..AppConfig::default()
        };

        SystemSettings::ensure_initialized(&db, &config, TEST_EMBEDDING_DIM as u32)
            .await
            .expect("Failed to seed settings");

        let user_a = User::new("a@example.com".to_string());
        let user_b = User::new("b@example.com".to_string());
        let key_a = user_a.api_key.clone().expect("key");
        let key_b = user_b.api_key.clone().expect("key");
        db.store_item(user_a).await.expect("store user a");
        db.store_item(user_b).await.expect("store user b");

        let openai_client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));
        let embedder: Arc<dyn Embedder> =
            Arc::new(EmbeddingProvider::new_hashed(TEST_EMBEDDING_DIM));

        let state = ApiState::new(db, openai_client, embedder, config).expect("state");
        let router = Router::new()
            .nest("/api/v1", api_routes_v1(&state))
            .with_state(state);

        (router, key_a, key_b)
    }

    fn multipart_upload(file_name: &str, content: &str, api_key: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/v1/documents")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("X-API-Key", api_key)
            .body(Body::from(body))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_probes_are_public() {
        let (router, _key_a, _key_b) = setup_router().await;

        let live = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(live.status(), StatusCode::OK);

        let ready = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_api_key() {
        let (router, _key_a, _key_b) = setup_router().await;

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/documents")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_list_delete_flow() {
        let (router, key_a, _key_b) = setup_router().await;

        let content = "abcdefghij".repeat(10);
        let upload = router
            .clone()
            .oneshot(multipart_upload("notes.txt", &content, &key_a))
            .await
            .expect("response");
        assert_eq!(upload.status(), StatusCode::CREATED);
        let uploaded = json_body(upload).await;
        let document_id = uploaded["document_id"].as_str().expect("id").to_string();
        let chunk_count = uploaded["chunk_count"].as_u64().expect("chunk count");
        assert_eq!(chunk_count, 3);

        let list = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/documents")
                    .header("X-API-Key", &key_a)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(list.status(), StatusCode::OK);
        let listed = json_body(list).await;
        assert_eq!(listed.as_array().expect("array").len(), 1);
        assert_eq!(listed[0]["id"].as_str(), Some(document_id.as_str()));
        assert_eq!(listed[0]["chunk_count"].as_u64(), Some(chunk_count));

        let delete = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/documents/{document_id}"))
                    .header("X-API-Key", &key_a)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(delete.status(), StatusCode::OK);
        let deleted = json_body(delete).await;
        assert_eq!(deleted["vector_records_deleted"].as_u64(), Some(chunk_count));

        let second_delete = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/documents/{document_id}"))
                    .header("X-API-Key", &key_a)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(second_delete.status(), StatusCode::NOT_FOUND);
        let body = json_body(second_delete).await;
        assert_eq!(body["kind"].as_str(), Some("not_found"));

        let empty_list = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/documents")
                    .header("X-API-Key", &key_a)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let listed = json_body(empty_list).await;
        assert!(listed.as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn test_ask_without_documents_short_circuits() {
        let (router, _key_a, key_b) = setup_router().await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ask")
                    .header("content-type", "application/json")
                    .header("X-API-Key", &key_b)
                    .body(Body::from(r#"{"question": "what does the report say?"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"].as_str(), Some(NO_DOCUMENTS_ANSWER));
        assert_eq!(body["confidence"].as_f64(), Some(0.0));
        assert!(body["sources"].as_array().expect("sources").is_empty());

        // The short-circuited ask still lands in the history log.
        let history = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/history?limit=5")
                    .header("X-API-Key", &key_b)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(history.status(), StatusCode::OK);
        let entries = json_body(history).await;
        assert_eq!(entries.as_array().expect("array").len(), 1);
        assert_eq!(
            entries[0]["question"].as_str(),
            Some("what does the report say?")
        );
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let (router, key_a, _key_b) = setup_router().await;

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ask")
                    .header("content-type", "application/json")
                    .header("X-API-Key", &key_a)
                    .body(Body::from(r#"{"question": "   "}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["kind"].as_str(), Some("empty_question"));
    }

    #[tokio::test]
    async fn test_ask_with_unreachable_llm_reports_failure() {
        let (router, key_a, _key_b) = setup_router().await;

        let upload = router
            .clone()
            .oneshot(multipart_upload(
                "facts.txt",
                "the capital of france is paris",
                &key_a,
            ))
            .await
            .expect("response");
        assert_eq!(upload.status(), StatusCode::CREATED);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ask")
                    .header("content-type", "application/json")
                    .header("X-API-Key", &key_a)
                    .body(Body::from(r#"{"question": "what is the capital of france?"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["kind"].as_str(), Some("answer_generation_failed"));
    }

    #[tokio::test]
    async fn test_stats_reflect_documents_and_queries() {
        let (router, key_a, key_b) = setup_router().await;

        let upload = router
            .clone()
            .oneshot(multipart_upload("notes.txt", "some plain text notes", &key_a))
            .await
            .expect("response");
        assert_eq!(upload.status(), StatusCode::CREATED);

        let ask = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ask")
                    .header("content-type", "application/json")
                    .header("X-API-Key", &key_b)
                    .body(Body::from(r#"{"question": "anything indexed?"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(ask.status(), StatusCode::OK);

        let stats_a = json_body(
            router
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/v1/stats")
                        .header("X-API-Key", &key_a)
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("response"),
        )
        .await;
        assert_eq!(stats_a["documents"]["total_documents"].as_u64(), Some(1));
        assert_eq!(stats_a["queries"]["total_queries"].as_u64(), Some(0));

        let stats_b = json_body(
            router
                .oneshot(
                    Request::builder()
                        .uri("/api/v1/stats")
                        .header("X-API-Key", &key_b)
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("response"),
        )
        .await;
        assert_eq!(stats_b["documents"]["total_documents"].as_u64(), Some(0));
        assert_eq!(stats_b["queries"]["total_queries"].as_u64(), Some(1));
    }

    #[tokio::test]
    async fn test_unsupported_upload_type_is_rejected() {
        let (router, key_a, _key_b) = setup_router().await;

        let response = router
            .oneshot(multipart_upload("image.png", "not really a png", &key_a))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["kind"].as_str(), Some("unsupported_file_type"));
    }
}
