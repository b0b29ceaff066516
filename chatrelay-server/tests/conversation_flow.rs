//! Start / chat / end flows against in-memory fakes.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chatrelay_core::{Role, RunStatus};
use chatrelay_server::subsystems::conversation::{StartResponse, NO_RESPONSE};
use chatrelay_server::subsystems::summarize::SummaryOutcome;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_start_without_message_creates_thread_but_no_row() {
    let h = harness().await;

    let resp = h.conversations.start(None).await.unwrap();
    let thread_id = match resp {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("Expected bare thread id, got {:?}", other),
    };

    assert!(h.platform.has_thread(&thread_id));
    assert!(h.store.rows_for(&thread_id).is_empty(), "no chat row without a user message");
    assert!(!h.active.contains(&thread_id).await, "greeting-only thread is not tracked");

    // seeded with the date context, then the agent greeted
    let messages = h.platform.messages(&thread_id);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert!(messages[0].text().unwrap().starts_with("System message: Vandaag is "));
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_start_with_message_stores_both_turns() {
    let h = harness().await;

    let resp = h
        .conversations
        .start(Some("Ik wil een afspraak maken".to_string()))
        .await
        .unwrap();
    let reply = match resp {
        StartResponse::Reply(r) => r,
        other => panic!("Expected reply, got {:?}", other),
    };
    let thread_id = reply.thread_id.clone().unwrap();

    assert_eq!(reply.message, json!(DEFAULT_REPLY));
    assert_eq!(reply.agent_id.as_deref(), Some(DATA_AGENT));
    assert!(h.active.contains(&thread_id).await);

    let rows = h.store.rows_for(&thread_id);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].role, Role::User);
    assert_eq!(rows[0].message, "Ik wil een afspraak maken");
    assert_eq!(rows[1].role, Role::Assistant);
    assert_eq!(rows[1].message, DEFAULT_REPLY);
}

#[tokio::test]
async fn test_chat_strips_citations_and_tracks_thread() {
    let h = harness().await;
    let thread_id = match h.conversations.start(None).await.unwrap() {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("unexpected {:?}", other),
    };

    h.platform
        .reply_with(DATA_AGENT, "We zijn open van 9 tot 17 uur【3:0†openingsuren.pdf】");
    let reply = h
        .conversations
        .chat(&thread_id, "Wanneer zijn jullie open?")
        .await
        .unwrap();

    assert_eq!(reply.message, json!("We zijn open van 9 tot 17 uur"));
    assert!(h.active.contains(&thread_id).await);

    let rows = h.store.rows_for(&thread_id);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].message, "We zijn open van 9 tot 17 uur");
}

#[tokio::test]
async fn test_chat_failed_run_is_a_message_payload() {
    let h = harness().await;
    let thread_id = match h.conversations.start(None).await.unwrap() {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("unexpected {:?}", other),
    };

    h.platform.fail_next_run("server_error", "Something went wrong");
    let reply = h.conversations.chat(&thread_id, "Hallo?").await.unwrap();

    assert_eq!(
        reply.message,
        json!("Run failed: server_error: Something went wrong")
    );
    let rows = h.store.rows_for(&thread_id);
    assert_eq!(rows.len(), 1, "only the user turn is stored");
    assert_eq!(rows[0].role, Role::User);
}

#[tokio::test]
async fn test_structured_reply_goes_to_booker_not_store() {
    let h = harness_with_booker(Arc::new(ConfirmingBooker)).await;
    let thread_id = match h.conversations.start(None).await.unwrap() {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("unexpected {:?}", other),
    };

    h.platform.reply_with(
        DATA_AGENT,
        "```json\n{\"name\": \"Jan\", \"date\": \"2026-10-20\", \"time\": \"10:00\"}\n```",
    );
    let reply = h
        .conversations
        .chat(&thread_id, "Dinsdag om 10 uur graag, Jan")
        .await
        .unwrap();

    assert_eq!(reply.message, json!(CONFIRMATION));

    let rows = h.store.rows_for(&thread_id);
    let assistant: Vec<_> = rows.iter().filter(|r| r.role == Role::Assistant).collect();
    assert_eq!(assistant.len(), 1, "raw JSON is not stored, the confirmation is");
    assert_eq!(assistant[0].message, CONFIRMATION);
}

#[tokio::test]
async fn test_record_reply_without_assistant_message() {
    let h = harness().await;
    let thread_id = match h.conversations.start(None).await.unwrap() {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("unexpected {:?}", other),
    };
    // a started thread already holds the greeting, so open a bare one
    let empty = chatrelay_core::AgentPlatform::create_thread(h.platform.as_ref())
        .await
        .unwrap();

    let reply = h.conversations.record_reply(&empty.id).await.unwrap();
    assert_eq!(reply.message, json!(NO_RESPONSE));
    assert!(h.store.rows_for(&empty.id).is_empty());
    assert!(!h.store.rows_for(&thread_id).iter().any(|r| r.message == NO_RESPONSE));
}

#[tokio::test]
async fn test_end_without_messages_untracks_and_skips_summary() {
    let h = harness().await;
    let thread_id = match h.conversations.start(None).await.unwrap() {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("unexpected {:?}", other),
    };
    h.active.touch(&thread_id).await;

    let resp = h.conversations.end(&thread_id).await;
    assert_eq!(resp.status, "ok");
    assert_eq!(resp.thread_id, thread_id);
    assert!(!h.active.contains(&thread_id).await);

    assert_eq!(
        h.summarizer.summarize(&thread_id).await.unwrap(),
        SummaryOutcome::Empty
    );
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.store.summaries().is_empty());
    assert!(h.platform.messages(h.summarizer.summary_thread_id()).is_empty());
}

#[tokio::test]
async fn test_end_unknown_thread_is_harmless() {
    let h = harness().await;
    let resp = h.conversations.end("thread_never_seen").await;
    assert_eq!(resp.status, "ok");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.store.summaries().is_empty());
}

#[tokio::test]
async fn test_end_archives_structured_summary() {
    let h = harness().await;
    let reply = match h
        .conversations
        .start(Some("Mijn naam is An".to_string()))
        .await
        .unwrap()
    {
        StartResponse::Reply(r) => r,
        other => panic!("unexpected {:?}", other),
    };
    let thread_id = reply.thread_id.unwrap();

    h.platform.reply_with(
        SUMMARY_AGENT,
        "{\"name\": \"An\", \"summary\": \"Vroeg naar een afspraak\"}【1:0†source】",
    );
    h.conversations.end(&thread_id).await;

    let store = h.store.clone();
    assert!(eventually(|| store.summaries().len() == 1).await, "summary stored");
    assert_eq!(
        h.store.summaries()[0],
        json!({"name": "An", "summary": "Vroeg naar een afspraak"})
    );

    // transcript went to the summary thread as role-prefixed lines
    let summary_msgs = h.platform.messages(h.summarizer.summary_thread_id());
    let transcript = summary_msgs[0].text().unwrap();
    assert_eq!(
        transcript,
        format!("user: Mijn naam is An\nassistant: {}\n", DEFAULT_REPLY)
    );
}

#[tokio::test]
async fn test_summary_in_plain_text_is_stored_as_message_row() {
    let h = harness().await;
    h.conversations
        .start(Some("Hallo".to_string()))
        .await
        .unwrap();
    let thread_id = h.store.rows.lock().unwrap()[0].thread_id.clone();

    h.platform
        .reply_with(SUMMARY_AGENT, "De gebruiker zei hallo.");
    let outcome = h.summarizer.summarize(&thread_id).await.unwrap();
    assert_eq!(outcome, SummaryOutcome::Unstructured);

    let summaries = h.store.summaries();
    assert_eq!(summaries[0]["message"], "De gebruiker zei hallo.");
    assert_eq!(summaries[0]["thread_id"], json!(thread_id));
    assert_eq!(summaries[0]["agent_id"], SUMMARY_AGENT);
}

#[tokio::test]
async fn test_summary_run_failure_stores_nothing() {
    let h = harness().await;
    h.conversations
        .start(Some("Hallo".to_string()))
        .await
        .unwrap();
    let thread_id = h.store.rows.lock().unwrap()[0].thread_id.clone();

    h.platform.fail_next_run("server_error", "down");
    let outcome = h.summarizer.summarize(&thread_id).await.unwrap();
    assert_eq!(
        outcome,
        SummaryOutcome::RunFailed("server_error: down".to_string())
    );
    assert!(h.store.summaries().is_empty());
}

#[tokio::test]
async fn test_each_turn_waits_for_previous_run() {
    let h = harness().await;
    let thread_id = match h.conversations.start(None).await.unwrap() {
        StartResponse::Thread { thread_id } => thread_id,
        other => panic!("unexpected {:?}", other),
    };
    h.conversations.chat(&thread_id, "een").await.unwrap();
    h.conversations.chat(&thread_id, "twee").await.unwrap();

    let runs = chatrelay_core::AgentPlatform::list_runs(h.platform.as_ref(), &thread_id)
        .await
        .unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
    // nothing ran on the summary thread
    assert_eq!(h.platform.runs_created.load(Ordering::SeqCst), 3);
}
