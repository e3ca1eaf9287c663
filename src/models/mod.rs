pub mod internal;

pub use internal::{ConversationGroup, Message, ReplyMetadata, SuggestionReply, SuggestionResult};
