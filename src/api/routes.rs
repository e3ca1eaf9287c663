use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::dto::*;
use crate::api::relay::{self, RelayEvent};
use crate::config::Config;
use crate::models::internal::Message;
use crate::services::embedding_service::EmbeddingService;
use crate::storage::message_store::MessageStore;
use crate::suggest::assembler::AssemblerError;
use crate::suggest::{SuggestError, SuggestionService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub store: Arc<dyn MessageStore>,
    pub suggester: Arc<SuggestionService>,
    pub indexer: Arc<EmbeddingService>,
    pub events: broadcast::Sender<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: status.as_u16(),
        }),
    )
}

/// The fatal-versus-degrade split lives in the service; here every error kind
/// keeps a distinct status so the UI can tell "no similar history" (200 with
/// an empty list) from "backend is down".
fn suggest_error(err: SuggestError) -> ApiError {
    let status = match err {
        SuggestError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SuggestError::EmbeddingFailure(_) | SuggestError::IndexUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        SuggestError::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        SuggestError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    };
    api_error(status, err.to_string())
}

pub async fn get_suggestions(
    State(state): State<AppState>,
    Json(req): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let reply = state
        .suggester
        .get_suggestions(&req.message, req.conversation_id.as_deref())
        .await
        .map_err(suggest_error)?;

    let response = SuggestionResponse::from(&reply);

    relay::publish(
        &state.events,
        &RelayEvent::new(
            "suggestions",
            serde_json::to_value(&response).unwrap_or(Value::Null),
        ),
    );

    Ok(Json(response))
}

pub async fn ingest_message(
    State(state): State<AppState>,
    Json(req): Json<IngestMessageRequest>,
) -> Result<StatusCode, ApiError> {
    let message = Message::from(req);

    if !message.has_displayable_content() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "message content must not be empty unless it carries media".to_string(),
        ));
    }

    state
        .store
        .insert_message(&message)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    // Best-effort indexing: the message is stored either way, and the backfill
    // pass picks up anything missed here.
    if !message.content.trim().is_empty() {
        let is_business_conversation = match state
            .store
            .get_messages_by_conversation(&message.conversation_id)
            .await
        {
            Ok(messages) => messages.iter().any(|m| m.is_from_business),
            Err(_) => message.is_from_business,
        };

        if let Err(e) = state
            .indexer
            .process_message(&message, is_business_conversation)
            .await
        {
            tracing::warn!("Embedding on ingest failed for {}: {}", message.id, e);
        }
    }

    relay::publish(
        &state.events,
        &RelayEvent::new(
            "message",
            serde_json::to_value(MessageDto::from(&message)).unwrap_or(Value::Null),
        ),
    );

    Ok(StatusCode::CREATED)
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = state
        .store
        .get_messages_by_conversation(&conversation_id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(messages.iter().map(MessageDto::from).collect()))
}

pub async fn conversation_context(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(params): Query<ContextParams>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let window = match params.window {
        Some(w) => w,
        None => state.config.read().await.context_window,
    };

    let context = state
        .suggester
        .assembler()
        .conversation_context(&params.message_id, &conversation_id, window)
        .await
        .map_err(|e| match e {
            AssemblerError::MessageNotFound { .. } => {
                api_error(StatusCode::NOT_FOUND, e.to_string())
            }
            AssemblerError::Store(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        })?;

    Ok(Json(context.iter().map(MessageDto::from).collect()))
}

pub async fn rebuild_embeddings(State(state): State<AppState>) -> StatusCode {
    let indexer = state.indexer.clone();
    let store = state.store.clone();

    tokio::spawn(async move {
        match indexer.backfill(store.as_ref()).await {
            Ok(report) => tracing::info!(
                "Embedding rebuild done: {} indexed, {} skipped, {} failed",
                report.indexed,
                report.skipped,
                report.failed
            ),
            Err(e) => tracing::error!("Embedding rebuild failed: {}", e),
        }
    });

    StatusCode::ACCEPTED
}

/// Externally computed results (the automation tool posts here) are fanned out
/// to connected clients verbatim.
pub async fn broadcast_external(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<BroadcastAck> {
    let delivered_to = relay::publish(&state.events, &RelayEvent::new("external", payload));
    Json(BroadcastAck { delivered_to })
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics(State(state): State<AppState>) -> String {
    let (count, store_up) = match state.store.count_messages().await {
        Ok(n) => (n, 1),
        Err(e) => {
            tracing::warn!("Message store unreachable at metrics scrape: {}", e);
            (0, 0)
        }
    };
    let subscribers = state.events.receiver_count();

    format!(
        "# HELP reply_relay_messages_total Total number of stored messages\n\
         # TYPE reply_relay_messages_total gauge\n\
         reply_relay_messages_total {}\n\
         # HELP reply_relay_ws_subscribers Connected WebSocket subscribers\n\
         # TYPE reply_relay_ws_subscribers gauge\n\
         reply_relay_ws_subscribers {}\n\
         # HELP reply_relay_up Whether the service and its message store are up\n\
         # TYPE reply_relay_up gauge\n\
         reply_relay_up {}\n",
        count, subscribers, store_up
    )
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/suggestions", post(get_suggestions))
        .route("/api/v1/messages", post(ingest_message))
        .route(
            "/api/v1/conversations/{id}/messages",
            get(conversation_messages),
        )
        .route(
            "/api/v1/conversations/{id}/context",
            get(conversation_context),
        )
        .route("/api/v1/embeddings/rebuild", post(rebuild_embeddings))
        .route("/api/v1/broadcast", post(broadcast_external))
        .route("/ws", get(relay::ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
