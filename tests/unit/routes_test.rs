use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tower::ServiceExt;

use reply_relay::api::routes::{create_router, AppState};
use reply_relay::services::embedding_provider::MockProvider;
use reply_relay::services::embedding_service::EmbeddingService;
use reply_relay::storage::index::InMemoryIndex;
use reply_relay::storage::message_store::InMemoryMessageStore;
use reply_relay::suggest::ranker::SimilarityRanker;
use reply_relay::suggest::{SuggestionService, SuggestionSettings};

use reply_relay::storage::message_store::MessageStore;

use crate::{record_with_similarity, unit_query, FailingStore};

fn test_state(index: InMemoryIndex) -> AppState {
    test_state_with_store(index, Arc::new(InMemoryMessageStore::new()))
}

fn test_state_with_store(index: InMemoryIndex, store: Arc<dyn MessageStore>) -> AppState {
    // Config defaults are fine for routing behavior; only context_window is read.
    let config = reply_relay::Config::load().expect("default config");

    let provider = Arc::new(MockProvider::new_success(unit_query()));
    let index = Arc::new(index);

    let ranker = Arc::new(SimilarityRanker::new(
        index.clone(),
        "business_replies".to_string(),
        2,
        0.7,
        Duration::from_secs(1),
    ));

    let suggester = Arc::new(SuggestionService::new(
        provider.clone(),
        ranker,
        store.clone(),
        SuggestionSettings {
            suggestion_count: 3,
            context_candidates: 10,
            conversation_limit: 3,
            embed_timeout: Duration::from_secs(1),
        },
    ));

    let indexer = Arc::new(EmbeddingService::new(
        provider,
        index,
        "business_replies".to_string(),
        2,
        1,
    ));

    let (events, _) = broadcast::channel(16);

    AppState {
        config: Arc::new(RwLock::new(config)),
        store,
        suggester,
        indexer,
        events,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let app = create_router(test_state(InMemoryIndex::new()));

    let response = app
        .oneshot(post_json("/api/v1/suggestions", json!({ "message": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn suggestions_with_empty_index_is_ok_and_empty() {
    let app = create_router(test_state(InMemoryIndex::new()));

    let response = app
        .oneshot(post_json(
            "/api/v1/suggestions",
            json!({ "message": "do you ship abroad?", "conversationId": "c1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["suggestions"], json!([]));
    assert_eq!(body["metadata"]["similarityCount"], 0);
}

#[tokio::test]
async fn suggestions_return_ranked_texts() {
    let index = InMemoryIndex::with_records(vec![
        record_with_similarity("m1", 0.9, true, "c1"),
        record_with_similarity("m2", 0.3, true, "c2"),
    ]);
    let app = create_router(test_state(index));

    let response = app
        .oneshot(post_json(
            "/api/v1/suggestions",
            json!({ "message": "opening hours?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["suggestions"], json!(["reply m1"]));
}

#[tokio::test]
async fn ingest_then_read_back_conversation() {
    let app = create_router(test_state(InMemoryIndex::new()));

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/messages",
            json!({
                "id": "wamid.1",
                "conversationId": "491701234567",
                "sender": "491701234567",
                "content": "hi, is the blue one in stock?",
                "timestamp": "2025-06-01T12:00:00Z",
                "isFromBusiness": false
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/conversations/491701234567/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "wamid.1");
}

#[tokio::test]
async fn empty_message_without_media_is_rejected_on_ingest() {
    let app = create_router(test_state(InMemoryIndex::new()));

    let response = app
        .oneshot(post_json(
            "/api/v1/messages",
            json!({
                "id": "wamid.2",
                "conversationId": "c1",
                "sender": "c1",
                "content": "",
                "timestamp": "2025-06-01T12:00:00Z"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn context_for_unknown_message_is_not_found() {
    let app = create_router(test_state(InMemoryIndex::new()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/conversations/c1/context?messageId=missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_metrics_respond() {
    let app = create_router(test_state(InMemoryIndex::new()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("reply_relay_up 1"));
}

#[tokio::test]
async fn metrics_report_store_outage() {
    let app = create_router(test_state_with_store(
        InMemoryIndex::new(),
        Arc::new(FailingStore),
    ));

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("reply_relay_up 0"));
    assert!(text.contains("reply_relay_messages_total 0"));
}

#[tokio::test]
async fn broadcast_acks_subscriber_count() {
    let state = test_state(InMemoryIndex::new());
    let mut rx = state.events.subscribe();
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/v1/broadcast",
            json!({ "workflow": "anonymize", "status": "done" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deliveredTo"], 1);

    let event: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(event["event"], "external");
    assert_eq!(event["payload"]["workflow"], "anonymize");
}
