// Full HTTP surface walk-through: ingest notes, structure a pasted block,
// ask a question, and clean up with a batch delete.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use workmemo::config::Config;
use workmemo::config::settings::EMBEDDING_DIMENSION;
use workmemo::database::lancedb::VectorStore;
use workmemo::database::sqlite::Database;
use workmemo::llm::OpenAiClient;
use workmemo::payments::PaymentClient;
use workmemo::server::{AppBuilder, AppState};

async fn test_router(temp_dir: &tempfile::TempDir, server: &MockServer) -> Router {
    let mut config = Config::default();
    config.base_dir = temp_dir.path().to_path_buf();
    config.openai.base_url = format!("{}/v1", server.uri());
    config.openai.api_key = "test-key".to_string();
    config.payments.base_url = server.uri();

    let database = Database::new(config.database_path())
        .await
        .expect("Failed to create database");
    let vector_store = VectorStore::new(config.vector_database_path())
        .await
        .expect("Failed to create vector store");
    let llm = OpenAiClient::new(&config.openai).expect("Failed to create client");
    let payments = PaymentClient::new(&config.payments);

    let state = AppState {
        config: Arc::new(config),
        database,
        vector_store: Arc::new(RwLock::new(vector_store)),
        llm: Arc::new(llm),
        payments: Arc::new(payments),
    };
    AppBuilder::new(state).with_trace_layer().with_cors_layer().build()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body was not JSON")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notes_flow_from_ingest_to_batch_delete() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("TEXT:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"purpose\": \"Handover note\"}"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Question:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"answer\": \"Submit it before Friday.\", \"used_context\": true, \"citations\": [1]}"
            }}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"embedding": vec![0.1f32; EMBEDDING_DIMENSION]}]
        })))
        .mount(&server)
        .await;

    let router = test_router(&temp_dir, &server).await;

    // Ingest two notes.
    let mut document_ids = Vec::new();
    for text in ["submit the report before Friday", "escalations go to the ops lead"] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ingest",
                serde_json::json!({"user_id": "user-1", "raw_text": text}),
            ))
            .await
            .expect("Request failed");
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        document_ids.push(body["document_id"].as_str().expect("Missing id").to_string());
    }

    // Ask against them.
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/ask",
            serde_json::json!({"user_id": "user-1", "question": "when is the report due?"}),
        ))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let answered = response_json(response).await;
    assert_eq!(answered["answer"], "Submit it before Friday.");
    assert_eq!(answered["citations"].as_array().expect("Expected array").len(), 1);

    // Batch delete both, plus an id the user does not own.
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/documents/delete",
            serde_json::json!({
                "user_id": "user-1",
                "ids": [document_ids[0], document_ids[1], "someone-elses-doc"]
            }),
        ))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = response_json(response).await;
    assert_eq!(deleted["deleted"], 2);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/documents?user_id=user-1")
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("Request failed");
    let documents = response_json(response).await;
    assert!(documents.as_array().expect("Expected array").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn structure_endpoint_returns_formatted_tasks() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let server = MockServer::start().await;

    // Classifier requests cap the reply length; extractor requests use
    // JSON mode.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"max_tokens": 10})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "PROCEDURE"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"tasks\": [{\"title\": \"Weekly report\", \"summary\": \"How to file it\", \"steps\": [{\"step\": 1, \"description\": \"Open the template\"}], \"key_points\": []}]}"
            }}]
        })))
        .mount(&server)
        .await;

    let router = test_router(&temp_dir, &server).await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/structure",
            serde_json::json!({"raw_text": "fill the weekly report template every Monday"}),
        ))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["tasks"][0]["title"], "Weekly report");
    assert!(
        body["tasks"][0]["manual"]
            .as_str()
            .expect("Missing manual")
            .contains("[Steps]\n1. Open the template")
    );
}
