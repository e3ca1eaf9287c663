//! Wire DTOs. JSON is camelCase because the React inbox consumes it directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::internal::{ConversationGroup, Message, ReplyMetadata, SuggestionReply};

// ==================== REQUEST DTOs ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMessageRequest {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_from_business: bool,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl From<IngestMessageRequest> for Message {
    fn from(req: IngestMessageRequest) -> Self {
        Message {
            id: req.id,
            conversation_id: req.conversation_id,
            sender: req.sender,
            content: req.content,
            timestamp: req.timestamp,
            is_from_business: req.is_from_business,
            media_type: req.media_type,
            filename: req.filename,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextParams {
    pub message_id: String,
    #[serde(default)]
    pub window: Option<usize>,
}

// ==================== RESPONSE DTOs ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
    pub similar_conversations: Vec<ConversationGroupDto>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub processed_at: DateTime<Utc>,
    pub similarity_count: usize,
    pub conversation_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationGroupDto {
    pub conversation_id: String,
    pub display_name: String,
    pub messages: Vec<MessageDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_business: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastAck {
    pub delivered_to: usize,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        MessageDto {
            id: m.id.clone(),
            sender: m.sender.clone(),
            content: m.content.clone(),
            timestamp: m.timestamp,
            is_from_business: m.is_from_business,
            media_type: m.media_type.clone(),
            filename: m.filename.clone(),
        }
    }
}

impl From<&ConversationGroup> for ConversationGroupDto {
    fn from(g: &ConversationGroup) -> Self {
        ConversationGroupDto {
            conversation_id: g.conversation_id.clone(),
            display_name: g.display_name.clone(),
            messages: g.messages.iter().map(MessageDto::from).collect(),
        }
    }
}

impl From<&ReplyMetadata> for ResponseMetadata {
    fn from(m: &ReplyMetadata) -> Self {
        ResponseMetadata {
            processed_at: m.processed_at,
            similarity_count: m.similarity_count,
            conversation_count: m.conversation_count,
        }
    }
}

impl From<&SuggestionReply> for SuggestionResponse {
    fn from(reply: &SuggestionReply) -> Self {
        SuggestionResponse {
            suggestions: reply
                .suggestions
                .iter()
                .map(|s| s.document.clone())
                .collect(),
            similar_conversations: reply
                .similar_conversations
                .iter()
                .map(ConversationGroupDto::from)
                .collect(),
            metadata: ResponseMetadata::from(&reply.metadata),
        }
    }
}
