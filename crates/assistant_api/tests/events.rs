use assistant_api::events::{classify_chat_record, classify_sync_record};
use assistant_api::{AffectKind, ChatStreamEvent, SyncStreamEvent};
use serde_json::json;

#[test]
fn chunk_and_affect_records_classify_with_content() {
    assert_eq!(
        classify_chat_record(&json!({"type": "chunk", "content": "Hel"})),
        vec![ChatStreamEvent::Chunk {
            text: "Hel".to_string(),
        }]
    );
    assert_eq!(
        classify_chat_record(&json!({"type": "mood", "content": "happy"})),
        vec![ChatStreamEvent::Affect {
            kind: AffectKind::Mood,
            value: "happy".to_string(),
        }]
    );
    assert_eq!(
        classify_chat_record(&json!({"type": "thought", "content": "hmm"})),
        vec![ChatStreamEvent::Affect {
            kind: AffectKind::Thought,
            value: "hmm".to_string(),
        }]
    );
}

#[test]
fn stop_is_a_non_error_terminal_distinct_from_done() {
    let stopped = classify_chat_record(&json!({"type": "stop"}));
    assert_eq!(stopped, vec![ChatStreamEvent::Stopped]);
    assert!(stopped[0].is_terminal());

    let done = classify_chat_record(&json!({"type": "done"}));
    assert_eq!(done, vec![ChatStreamEvent::Done]);
    assert!(done[0].is_terminal());
}

#[test]
fn error_record_carries_its_message_with_a_fallback() {
    assert_eq!(
        classify_chat_record(&json!({"type": "error", "content": "model unavailable"})),
        vec![ChatStreamEvent::Error {
            message: "model unavailable".to_string(),
        }]
    );
    assert_eq!(
        classify_chat_record(&json!({"type": "error"})),
        vec![ChatStreamEvent::Error {
            message: "generation failed".to_string(),
        }]
    );
}

#[test]
fn chunk_without_content_defaults_to_empty_text() {
    assert_eq!(
        classify_chat_record(&json!({"type": "chunk"})),
        vec![ChatStreamEvent::Chunk {
            text: String::new(),
        }]
    );
}

#[test]
fn non_terminal_events_report_not_terminal() {
    assert!(!ChatStreamEvent::Chunk {
        text: "x".to_string(),
    }
    .is_terminal());
    assert!(!ChatStreamEvent::Affect {
        kind: AffectKind::Mood,
        value: "sad".to_string(),
    }
    .is_terminal());
}

#[test]
fn sync_records_classify_by_status() {
    assert_eq!(
        classify_sync_record(&json!({"status": "progress", "file": "a.md"})),
        Some(SyncStreamEvent::Progress {
            file: "a.md".to_string(),
        })
    );
    assert_eq!(
        classify_sync_record(&json!({"status": "done", "total": 3})),
        Some(SyncStreamEvent::Done { total: 3 })
    );
    assert_eq!(classify_sync_record(&json!({"status": "warming-up"})), None);
    assert_eq!(classify_sync_record(&json!({"file": "orphan.md"})), None);
}
