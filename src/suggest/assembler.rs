//! Conversation reconstruction for suggestion context.

use std::sync::Arc;
use thiserror::Error;

use crate::models::internal::{ConversationGroup, Message};
use crate::storage::message_store::{MessageStore, StoreError};

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("message {message_id} not found in conversation {conversation_id}")]
    MessageNotFound {
        message_id: String,
        conversation_id: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ConversationAssembler {
    store: Arc<dyn MessageStore>,
}

impl ConversationAssembler {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// The context window around `message_id`, oldest first.
    ///
    /// Window semantics are only-before-inclusive: the most recent
    /// `2 * window_size + 1` messages with `timestamp <= target`, ending at
    /// the target itself. Nothing after the target is included. This mirrors
    /// the historical query (order by `timestamp <=` then reverse) rather
    /// than a symmetric window; callers that need messages after the target
    /// fetch the full conversation instead.
    pub async fn conversation_context(
        &self,
        message_id: &str,
        conversation_id: &str,
        window_size: usize,
    ) -> Result<Vec<Message>, AssemblerError> {
        let messages = self.store.get_messages_by_conversation(conversation_id).await?;

        let target_idx = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| AssemblerError::MessageNotFound {
                message_id: message_id.to_string(),
                conversation_id: conversation_id.to_string(),
            })?;

        let take = 2 * window_size + 1;
        let end = target_idx + 1;
        let start = end.saturating_sub(take);

        Ok(messages[start..end].to_vec())
    }

    /// Partition a flat candidate list into per-conversation groups,
    /// preserving the first-seen order of conversation ids, up to `limit`
    /// groups. Best-effort display shaping; the ordering of groups carries no
    /// similarity meaning of its own.
    pub fn group_into_conversations(
        &self,
        messages: Vec<Message>,
        limit: usize,
    ) -> Vec<ConversationGroup> {
        let mut groups: Vec<ConversationGroup> = Vec::new();

        for message in messages {
            if let Some(group) = groups
                .iter_mut()
                .find(|g| g.conversation_id == message.conversation_id)
            {
                group.messages.push(message);
                continue;
            }

            if groups.len() == limit {
                continue;
            }

            groups.push(ConversationGroup {
                conversation_id: message.conversation_id.clone(),
                display_name: display_name_for(&message),
                messages: vec![message],
            });
        }

        groups
    }
}

/// Display name for a conversation group: the customer-side sender where one
/// is known, otherwise the conversation id.
fn display_name_for(message: &Message) -> String {
    if message.is_from_business {
        message.conversation_id.clone()
    } else {
        message.sender.clone()
    }
}
