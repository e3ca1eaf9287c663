use std::sync::Arc;

use reply_relay::storage::message_store::{InMemoryMessageStore, MessageStore, SqliteMessageStore};
use reply_relay::storage::init_db;
use reply_relay::suggest::assembler::{AssemblerError, ConversationAssembler};

use crate::message;

#[tokio::test]
async fn window_larger_than_conversation_returns_all_messages() {
    // Three messages, window 5: all three come back, oldest first.
    let store = Arc::new(InMemoryMessageStore::with_messages(vec![
        message("m1", "c1", 0, false),
        message("m2", "c1", 1, true),
        message("m3", "c1", 2, false),
    ]));
    let assembler = ConversationAssembler::new(store);

    let context = assembler.conversation_context("m3", "c1", 5).await.unwrap();

    assert_eq!(context.len(), 3);
    assert_eq!(context[0].id, "m1");
    assert_eq!(context[2].id, "m3");
}

#[tokio::test]
async fn window_ends_at_target_message() {
    let store = Arc::new(InMemoryMessageStore::with_messages(vec![
        message("m1", "c1", 0, false),
        message("m2", "c1", 1, true),
        message("m3", "c1", 2, false),
        message("m4", "c1", 3, true),
        message("m5", "c1", 4, false),
        message("m6", "c1", 5, true),
    ]));
    let assembler = ConversationAssembler::new(store);

    let context = assembler.conversation_context("m4", "c1", 1).await.unwrap();

    // Most recent 2*1+1 messages at or before m4; nothing after it.
    let ids: Vec<&str> = context.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m3", "m4"]);
}

#[tokio::test]
async fn unknown_message_id_is_not_found() {
    let store = Arc::new(InMemoryMessageStore::with_messages(vec![message(
        "m1", "c1", 0, false,
    )]));
    let assembler = ConversationAssembler::new(store);

    let result = assembler.conversation_context("m1", "other", 3).await;

    assert!(matches!(result, Err(AssemblerError::MessageNotFound { .. })));
}

#[tokio::test]
async fn grouping_caps_group_count_but_keeps_members() {
    let store = Arc::new(InMemoryMessageStore::new());
    let assembler = ConversationAssembler::new(store);

    let flat = vec![
        message("a1", "conv-a", 0, false),
        message("b1", "conv-b", 1, false),
        message("c1", "conv-c", 2, false),
        message("a2", "conv-a", 3, true),
    ];

    let groups = assembler.group_into_conversations(flat, 2);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].conversation_id, "conv-a");
    assert_eq!(groups[1].conversation_id, "conv-b");
    // conv-a members past the cap still land in their existing group.
    assert_eq!(groups[0].messages.len(), 2);
}

#[tokio::test]
async fn sqlite_store_round_trip_preserves_order() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let url = format!("sqlite://{}", temp_dir.path().join("relay.db").display());
    let pool = init_db(&url, 2).await.unwrap();
    let store = SqliteMessageStore::new(pool);

    store.insert_message(&message("m2", "c1", 5, true)).await.unwrap();
    store.insert_message(&message("m1", "c1", 1, false)).await.unwrap();
    // Duplicate key is ignored, not overwritten.
    store.insert_message(&message("m1", "c1", 9, true)).await.unwrap();

    let messages = store.get_messages_by_conversation("c1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "m1");
    assert!(!messages[0].is_from_business);
    assert_eq!(messages[1].id, "m2");

    assert_eq!(store.count_messages().await.unwrap(), 2);
    assert_eq!(store.conversation_ids().await.unwrap(), vec!["c1"]);

    let found = store.find_message("c1", "m2").await.unwrap();
    assert!(found.is_some());
    assert!(store.find_message("c1", "m9").await.unwrap().is_none());
}
