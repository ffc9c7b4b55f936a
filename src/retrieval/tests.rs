use super::*;
use crate::config::OpenAiConfig;
use crate::config::settings::EMBEDDING_DIMENSION;
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord};
use crate::database::sqlite::models::{NewChunk, NewDocument};
use crate::database::sqlite::queries::DocumentQueries;

fn chunk(id: &str, similarity: Option<f32>) -> RetrievedChunk {
    RetrievedChunk {
        chunk_id: id.to_string(),
        document_id: "doc-1".to_string(),
        content: format!("content of {id}"),
        section: None,
        similarity,
    }
}

#[test]
fn keyword_patterns_wrap_each_term() {
    let patterns = keyword_patterns("invoice deadline", 5, 8);
    assert_eq!(
        patterns,
        vec![("%invoice%".to_string(), 4), ("%deadline%".to_string(), 4)]
    );
}

#[test]
fn keyword_patterns_cap_term_count() {
    let patterns = keyword_patterns("a b c d e f g", 5, 10);
    assert_eq!(patterns.len(), 5);
    assert_eq!(patterns[4].0, "%e%");
}

#[test]
fn keyword_patterns_use_ceiling_share() {
    // 5 rows over 2 terms rounds up to 3 per term.
    let patterns = keyword_patterns("alpha beta", 5, 5);
    assert!(patterns.iter().all(|(_, limit)| *limit == 3));
}

#[test]
fn blank_query_matches_everything_capped_at_k() {
    assert_eq!(keyword_patterns("", 5, 7), vec![("%".to_string(), 7)]);
    assert_eq!(keyword_patterns("   \t ", 5, 7), vec![("%".to_string(), 7)]);
}

#[test]
fn merge_puts_semantic_results_first() {
    let semantic = vec![chunk("s1", Some(0.9)), chunk("s2", Some(0.8))];
    let lexical = vec![chunk("l1", None), chunk("l2", None)];

    let merged = merge_candidates(semantic, lexical, 10);
    let ids: Vec<&str> = merged.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "l1", "l2"]);
}

#[test]
fn merge_dedupes_by_chunk_id_keeping_first() {
    let semantic = vec![chunk("a", Some(0.9))];
    let lexical = vec![chunk("a", None), chunk("b", None)];

    let merged = merge_candidates(semantic, lexical, 10);
    assert_eq!(merged.len(), 2);
    // The semantic occurrence of "a" survives, with its similarity.
    assert_eq!(merged[0].similarity, Some(0.9));
    assert_eq!(merged[1].chunk_id, "b");
}

#[test]
fn merge_truncates_to_k() {
    let semantic = vec![chunk("a", Some(0.9)), chunk("b", Some(0.8))];
    let lexical = vec![chunk("c", None), chunk("d", None)];

    let merged = merge_candidates(semantic, lexical, 3);
    assert_eq!(merged.len(), 3);
    assert_eq!(merged[2].chunk_id, "c");
}

#[test]
fn merge_of_empty_legs_is_empty() {
    assert!(merge_candidates(Vec::new(), Vec::new(), 5).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hybrid_search_combines_both_legs() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database = Database::new(temp_dir.path().join("test.db"))
        .await
        .expect("Failed to create database");
    let mut vector_store = VectorStore::new(temp_dir.path().join("vectors"))
        .await
        .expect("Failed to create vector store");

    let document = NewDocument {
        id: "doc-1".to_string(),
        user_id: "user-1".to_string(),
        title: "Shipping".to_string(),
        raw_text: "irrelevant".to_string(),
        structured_json: None,
    };
    DocumentQueries::create(database.pool(), &document)
        .await
        .expect("Failed to create document");

    // One chunk reachable by vector search, one only by keyword match.
    let mut embedded = vec![0.0; EMBEDDING_DIMENSION];
    embedded[0] = 1.0;
    for (id, index, content) in [
        ("chunk-vec", 0, "customs clearance procedure"),
        ("chunk-kw", 1, "invoice approval deadline"),
    ] {
        ChunkQueries::create(
            database.pool(),
            &NewChunk {
                id: id.to_string(),
                document_id: "doc-1".to_string(),
                user_id: "user-1".to_string(),
                chunk_index: index,
                content: content.to_string(),
                section: None,
                keywords: None,
                vector_id: format!("vec-{id}"),
            },
        )
        .await
        .expect("Failed to create chunk");
    }
    vector_store
        .store_embeddings_batch(vec![EmbeddingRecord {
            id: "vec-chunk-vec".to_string(),
            vector: embedded.clone(),
            metadata: ChunkMetadata {
                chunk_id: "chunk-vec".to_string(),
                document_id: "doc-1".to_string(),
                user_id: "user-1".to_string(),
                section: None,
                content: "customs clearance procedure".to_string(),
                chunk_index: 0,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        }])
        .await
        .expect("Failed to store embedding");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"embedding": embedded}]
        })))
        .mount(&server)
        .await;

    let llm_config = OpenAiConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: "test-key".to_string(),
        chat_model: "test-chat".to_string(),
        embedding_model: "test-embed".to_string(),
        embedding_batch_size: 16,
    };
    let llm = OpenAiClient::new(&llm_config).expect("Failed to create client");
    let config = RetrievalConfig::default();

    let results = hybrid_search(
        &database,
        &vector_store,
        &llm,
        &config,
        "user-1",
        "invoice",
        8,
    )
    .await
    .expect("Failed to run hybrid search");

    let ids: Vec<&str> = results.iter().map(|c| c.chunk_id.as_str()).collect();
    assert!(ids.contains(&"chunk-vec"));
    assert!(ids.contains(&"chunk-kw"));
    // The semantic hit arrives before the keyword-only hit.
    assert!(
        ids.iter().position(|id| *id == "chunk-vec") < ids.iter().position(|id| *id == "chunk-kw")
    );

    // Another user sees nothing.
    let other = hybrid_search(
        &database,
        &vector_store,
        &llm,
        &config,
        "user-2",
        "invoice",
        8,
    )
    .await
    .expect("Failed to run hybrid search");
    assert!(other.is_empty());
}
