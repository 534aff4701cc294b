use chronicle_store::{
    AppendEvent, CreateSession, EventQuery, EventStore, FtsQuery, LogQuery, LogRecord,
};
use chronicle_types::{EventType, SessionId};
use serde_json::json;

fn new_store() -> EventStore {
    EventStore::open_in_memory().unwrap()
}

fn new_session(store: &EventStore) -> chronicle_store::SessionRecord {
    let (session, root) = store
        .create_session(&CreateSession {
            workspace_path: "/projects/demo".to_string(),
            working_directory: "/projects/demo".to_string(),
            model: "claude-haiku-4-5-20251001".to_string(),
            provider: Some("anthropic".to_string()),
            ..CreateSession::default()
        })
        .unwrap();

    assert_eq!(root.sequence, 0);
    assert!(root.parent_id.is_none());
    assert_eq!(session.head_event_id.as_ref(), Some(&root.id));
    session
}

fn user_message(session_id: &SessionId, text: &str, turn: u32) -> AppendEvent {
    AppendEvent::new(
        session_id.clone(),
        EventType::MessageUser,
        json!({"content": text, "turn": turn}),
    )
}

#[test]
fn create_session_appends_root_event() {
    let store = new_store();
    let session = new_session(&store);

    let events = store
        .get_events_by_session(&session.id, &EventQuery::default())
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::SessionStart);
    assert_eq!(events[0].payload["model"], "claude-haiku-4-5-20251001");
}

#[test]
fn appends_build_a_single_chain() {
    let store = new_store();
    let session = new_session(&store);

    let mut last_id = session.head_event_id.clone().unwrap();
    for i in 0..5 {
        let evt = store
            .append(&user_message(&session.id, &format!("msg {i}"), i + 1))
            .unwrap();
        assert_eq!(evt.sequence, i as i64 + 1);
        assert_eq!(evt.parent_id.as_ref(), Some(&last_id));
        last_id = evt.id;
    }

    let chain = store.get_ancestors(&last_id).unwrap();
    assert_eq!(chain.len(), 6);
    for (i, evt) in chain.iter().enumerate() {
        assert_eq!(evt.sequence, i as i64);
        if i == 0 {
            assert!(evt.parent_id.is_none());
        } else {
            assert_eq!(evt.parent_id.as_ref(), Some(&chain[i - 1].id));
        }
    }
}

#[test]
fn expected_parent_mismatch_is_a_constraint_violation() {
    let store = new_store();
    let session = new_session(&store);
    let stale_head = session.head_event_id.clone().unwrap();

    store.append(&user_message(&session.id, "advance", 1)).unwrap();

    let mut req = user_message(&session.id, "stale", 2);
    req.expected_parent_id = Some(stale_head);
    let err = store.append(&req).unwrap_err();
    assert!(matches!(err, chronicle_store::Error::Constraint(_)));
}

#[test]
fn second_session_start_is_rejected() {
    let store = new_store();
    let session = new_session(&store);

    let err = store
        .append(&AppendEvent::new(
            session.id.clone(),
            EventType::SessionStart,
            json!({"workingDirectory": "/x", "model": "m"}),
        ))
        .unwrap_err();
    assert!(matches!(err, chronicle_store::Error::InvalidOperation(_)));
}

#[test]
fn assistant_events_update_aggregates() {
    let store = new_store();
    let session = new_session(&store);

    // Tool-use stop: no turn increment, tokens still counted.
    store
        .append(&AppendEvent::new(
            session.id.clone(),
            EventType::MessageAssistant,
            json!({
                "content": [{"type": "tool_use", "id": "toolu_01", "name": "Read", "arguments": {}}],
                "turn": 1, "model": "claude-haiku-4-5-20251001", "stopReason": "tool_use",
                "tokenUsage": {"inputTokens": 100, "outputTokens": 10, "cacheReadTokens": 40}
            }),
        ))
        .unwrap();

    // End-turn stop: turn increments.
    store
        .append(&AppendEvent::new(
            session.id.clone(),
            EventType::MessageAssistant,
            json!({
                "content": [{"type": "text", "text": "done"}],
                "turn": 1, "model": "claude-haiku-4-5-20251001", "stopReason": "end_turn",
                "tokenUsage": {"inputTokens": 150, "outputTokens": 20}
            }),
        ))
        .unwrap();

    let session = store.get_session(session.id.as_str()).unwrap().unwrap();
    assert_eq!(session.turn_count, 1);
    assert_eq!(session.total_input_tokens, 250);
    assert_eq!(session.total_output_tokens, 30);
    assert_eq!(session.total_cache_read_tokens, 40);
}

#[test]
fn model_switch_updates_latest_model() {
    let store = new_store();
    let session = new_session(&store);

    store
        .append(&AppendEvent::new(
            session.id.clone(),
            EventType::ConfigModelSwitch,
            json!({
                "previousModel": "claude-haiku-4-5-20251001",
                "newModel": "claude-sonnet-4-5-20250929"
            }),
        ))
        .unwrap();

    let session = store.get_session(session.id.as_str()).unwrap().unwrap();
    assert_eq!(session.model, "claude-sonnet-4-5-20250929");
}

#[test]
fn update_latest_model_does_not_create_events() {
    let store = new_store();
    let session = new_session(&store);

    store
        .update_latest_model(&session.id, "claude-sonnet-4-5-20250929")
        .unwrap();

    let session = store.get_session(session.id.as_str()).unwrap().unwrap();
    assert_eq!(session.model, "claude-sonnet-4-5-20250929");
    assert_eq!(store.count_events(&session.id).unwrap(), 1);
}

#[test]
fn session_prefix_resolution() {
    let store = new_store();
    let session = new_session(&store);

    let prefix = &session.id.as_str()[..12];
    let found = store.get_session(prefix).unwrap().unwrap();
    assert_eq!(found.id, session.id);

    // Every session ID shares the "ses_" prefix, so with two sessions the
    // bare prefix is ambiguous and resolves to nothing.
    new_session(&store);
    assert!(store.get_session("ses_").unwrap().is_none());

    assert!(store.get_session("nonexistent").unwrap().is_none());
}

#[test]
fn delete_message_validation() {
    let store = new_store();
    let session = new_session(&store);
    let root_id = session.head_event_id.clone().unwrap();

    let msg = store.append(&user_message(&session.id, "hide me", 1)).unwrap();

    // Root session.start is not deletable.
    let err = store.delete_message(&session.id, &root_id, None).unwrap_err();
    assert!(err.to_string().contains("Cannot delete"));

    // First deletion succeeds.
    let tombstone = store
        .delete_message(&session.id, &msg.id, Some("noise"))
        .unwrap();
    assert_eq!(tombstone.event_type, EventType::MessageDeleted);
    assert_eq!(tombstone.payload["targetEventId"], msg.id.as_str());
    assert_eq!(tombstone.payload["reason"], "noise");

    // Second deletion of the same target is rejected.
    let err = store.delete_message(&session.id, &msg.id, None).unwrap_err();
    assert!(err.to_string().contains("already deleted"));

    // Unknown target.
    let err = store
        .delete_message(&session.id, &chronicle_types::EventId::from_raw("evt_missing"), None)
        .unwrap_err();
    assert!(matches!(err, chronicle_store::Error::NotFound(_)));
}

#[test]
fn event_query_filters() {
    let store = new_store();
    let session = new_session(&store);

    for turn in 1..=3 {
        store.append(&user_message(&session.id, "q", turn)).unwrap();
        store
            .append(&AppendEvent::new(
                session.id.clone(),
                EventType::MessageAssistant,
                json!({
                    "content": [{"type": "text", "text": "a"}],
                    "turn": turn, "model": "m", "stopReason": "end_turn",
                    "tokenUsage": {"inputTokens": 1, "outputTokens": 1}
                }),
            ))
            .unwrap();
    }

    let users = store
        .get_events_by_session(
            &session.id,
            &EventQuery {
                types: Some(vec![EventType::MessageUser]),
                ..EventQuery::default()
            },
        )
        .unwrap();
    assert_eq!(users.len(), 3);

    let turn_two = store
        .get_events_by_session(
            &session.id,
            &EventQuery {
                turn: Some(2),
                ..EventQuery::default()
            },
        )
        .unwrap();
    assert_eq!(turn_two.len(), 2);

    let after = store
        .get_events_by_session(
            &session.id,
            &EventQuery {
                after_event_id: Some(users[1].id.clone()),
                ..EventQuery::default()
            },
        )
        .unwrap();
    assert!(after.iter().all(|e| e.sequence > users[1].sequence));

    let since = store.get_events_since(&session.id, 4, 100).unwrap();
    assert_eq!(since.first().unwrap().sequence, 5);

    let recent = store.get_recent_events(&session.id, 2).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].sequence < recent[1].sequence);

    assert_eq!(store.count_events(&session.id).unwrap(), 7);
}

#[test]
fn blob_store_deduplicates_by_hash() {
    let store = new_store();
    let bytes = vec![7u8; 4096];

    let id1 = store.blob_store(&bytes, Some("image/png")).unwrap();
    let id2 = store.blob_store(&bytes, Some("image/png")).unwrap();
    assert_eq!(id1, id2);

    let blob = store.blob_get(&id1).unwrap().unwrap();
    assert_eq!(blob.content, bytes);
    assert_eq!(blob.mime_type.as_deref(), Some("image/png"));
    assert_eq!(blob.size_original, 4096);

    let other = store.blob_store(b"different", None).unwrap();
    assert_ne!(other, id1);

    assert!(store
        .blob_get(&chronicle_types::BlobId::from_raw("blob_missing"))
        .unwrap()
        .is_none());
}

#[test]
fn fts_search_finds_message_content() {
    let store = new_store();
    let session = new_session(&store);

    store
        .append(&user_message(&session.id, "the reactor is overheating", 1))
        .unwrap();
    let other = new_session(&store);
    store
        .append(&user_message(&other.id, "reactor maintenance scheduled", 1))
        .unwrap();

    let hits = store.fts_search("reactor", &FtsQuery::default()).unwrap();
    assert_eq!(hits.len(), 2);

    let scoped = store
        .fts_search(
            "reactor",
            &FtsQuery {
                session_id: Some(session.id.clone()),
                ..FtsQuery::default()
            },
        )
        .unwrap();
    assert_eq!(scoped.len(), 1);

    // Punctuation in the query must not break the FTS parser.
    let hits = store
        .fts_search("overheating\"; DROP TABLE", &FtsQuery::default())
        .unwrap();
    assert!(!hits.is_empty());
}

#[test]
fn vector_search_orders_by_distance() {
    let store = new_store();
    let session = new_session(&store);

    let a = store.append(&user_message(&session.id, "a", 1)).unwrap();
    let b = store.append(&user_message(&session.id, "b", 2)).unwrap();

    store.vector_put(&a.id, &[0.0, 0.0, 1.0]).unwrap();
    store.vector_put(&b.id, &[1.0, 0.0, 0.0]).unwrap();

    let hits = store.vector_search(&[0.9, 0.0, 0.0], 10).unwrap();
    assert_eq!(hits[0].event_id, b.id);
    assert!(hits[0].distance < hits[1].distance);

    // Mismatched dimensionality is skipped, not compared.
    let hits = store.vector_search(&[1.0, 0.0], 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn logs_roundtrip_with_level_filter() {
    let store = new_store();
    let session = new_session(&store);

    store
        .log_append(&LogRecord::new(20, "info", "linearizer", "queue drained").for_session(session.id.clone()))
        .unwrap();
    store
        .log_append(&LogRecord::new(40, "error", "store", "append failed").for_session(session.id.clone()))
        .unwrap();
    store.log_append(&LogRecord::new(20, "info", "other", "unrelated")).unwrap();

    let all = store.logs_for_session(&session.id, &LogQuery::default()).unwrap();
    assert_eq!(all.len(), 2);

    let errors = store
        .logs_for_session(
            &session.id,
            &LogQuery {
                min_level: Some(30),
                ..LogQuery::default()
            },
        )
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].component, "store");
}

#[test]
fn fork_copies_chain_and_appends_marker() {
    let store = new_store();
    let session = new_session(&store);

    store.append(&user_message(&session.id, "one", 1)).unwrap();
    let mid = store
        .append(&AppendEvent::new(
            session.id.clone(),
            EventType::MessageAssistant,
            json!({
                "content": [{"type": "text", "text": "answer"}],
                "turn": 1, "model": "claude-haiku-4-5-20251001", "stopReason": "end_turn",
                "tokenUsage": {"inputTokens": 10, "outputTokens": 5}
            }),
        ))
        .unwrap();
    store.append(&user_message(&session.id, "after fork point", 2)).unwrap();

    let (forked, fork_event) = store
        .fork_session(&session.id, &mid.id, Some("experiment"), None)
        .unwrap();

    assert_ne!(forked.id, session.id);
    assert_eq!(fork_event.event_type, EventType::SessionFork);
    assert_eq!(fork_event.payload["sourceSessionId"], session.id.as_str());
    assert_eq!(fork_event.payload["sourceEventId"], mid.id.as_str());

    // Copied chain: session.start, message.user, message.assistant, then
    // the fork marker — the post-fork-point user message is not copied.
    let chain = store.get_ancestors(&fork_event.id).unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[0].event_type, EventType::SessionStart);
    assert_eq!(chain[3].event_type, EventType::SessionFork);

    // Fresh IDs, same payloads.
    assert_ne!(chain[1].id, mid.id);
    assert_eq!(chain[2].payload["content"], mid.payload["content"]);

    // Aggregates rebuilt from the copied events.
    assert_eq!(forked.turn_count, 1);
    assert_eq!(forked.total_input_tokens, 10);

    // Source session untouched.
    let source = store.get_session(session.id.as_str()).unwrap().unwrap();
    assert_eq!(source.turn_count, 1);
    assert_eq!(store.count_events(&source.id).unwrap(), 4);
}

#[test]
fn session_end_sets_ended_at() {
    let store = new_store();
    let session = new_session(&store);

    store
        .append(&AppendEvent::new(
            session.id.clone(),
            EventType::SessionEnd,
            json!({"reason": "completed"}),
        ))
        .unwrap();

    let session = store.get_session(session.id.as_str()).unwrap().unwrap();
    assert!(session.ended_at.is_some());
}

#[test]
fn reopen_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");

    let session_id;
    {
        let store = EventStore::open_or_create(&path).unwrap();
        let session = new_session(&store);
        store.append(&user_message(&session.id, "persisted", 1)).unwrap();
        session_id = session.id;
    }

    let store = EventStore::open_or_create(&path).unwrap();
    let session = store.get_session(session_id.as_str()).unwrap().unwrap();
    assert_eq!(store.count_events(&session.id).unwrap(), 2);
}
