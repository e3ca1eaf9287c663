use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One historical or live chat message. Immutable after ingestion.
///
/// `(id, conversation_id)` is the unique key: WhatsApp message ids are only
/// unique within their conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_from_business: bool,
    pub media_type: Option<String>,
    pub filename: Option<String>,
}

impl Message {
    /// Empty content is only valid for media messages.
    pub fn has_displayable_content(&self) -> bool {
        !self.content.trim().is_empty() || self.media_type.is_some()
    }
}

/// An ordered slice of one conversation, reconstructed on demand for display.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationGroup {
    pub conversation_id: String,
    pub display_name: String,
    pub messages: Vec<Message>,
}

/// One threshold-filtered nearest-neighbor match. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionResult {
    /// The suggested reply text (the embedded document).
    pub document: String,
    /// Similarity in [0,1]; always >= the threshold in effect for the query.
    pub similarity: f32,
    /// Flat metadata copied from the matched embedding record.
    pub metadata: Value,
}

/// End-to-end output of a single suggestion request.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionReply {
    pub suggestions: Vec<SuggestionResult>,
    pub similar_conversations: Vec<ConversationGroup>,
    pub metadata: ReplyMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyMetadata {
    pub processed_at: DateTime<Utc>,
    pub similarity_count: usize,
    pub conversation_count: usize,
}
