// SPDX-FileCopyrightText: 2026 ragstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end delivery tests driving a spawned controller through the
//! test harness. Time is paused; flushes fire when the runtime goes idle.

use std::time::Duration;

use ragstream_config::DeliveryConfig;
use ragstream_core::{
    ChatOptions, ChatResponse, ContextDocument, DeliveryError, Role, ScrollBehavior,
    TransportErrorKind, TransportEvent,
};
use ragstream_delivery::AutoFollow;
use ragstream_test_utils::{
    MockChatTransport, RecordingPersistence, ScriptedStreamTransport, TestHarness,
};
use tokio::time::Instant;
use tracing_test::traced_test;

fn reset() -> DeliveryError {
    DeliveryError::transport(TransportErrorKind::ConnectionReset, "connection reset by peer")
}

fn doc(name: &str) -> ContextDocument {
    ContextDocument {
        file_name: Some(name.to_string()),
        similarity: Some(0.87),
        ..ContextDocument::default()
    }
}

#[tokio::test(start_paused = true)]
async fn chunks_arriving_together_are_committed_in_one_flush() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("Hi").await.unwrap();
    let busy = harness.wait_until_busy().await.unwrap();
    assert!(busy.is_streaming);
    assert_eq!(busy.messages.len(), 2);

    let started = Instant::now();
    assert!(driver.chunk("He"));
    assert!(driver.chunk("llo "));
    assert!(driver.chunk("there"));

    let flushed = harness
        .wait_for(|s| s.last_assistant().is_some_and(|m| m.content == "Hello there"))
        .await
        .unwrap();
    assert_eq!(flushed.revision, busy.revision + 1);
    assert!(flushed.is_streaming);
    assert!(started.elapsed() >= Duration::from_millis(16));
    assert_eq!(harness.viewport.scrolls(), vec![ScrollBehavior::Auto]);

    assert!(driver.complete());
    let done = harness.wait_idle_after(flushed.revision).await.unwrap();
    let answer = done.last_assistant().unwrap();
    assert_eq!(answer.content, "Hello there");
    assert!(!answer.is_streaming);
    assert_eq!(
        harness.viewport.scrolls(),
        vec![ScrollBehavior::Auto, ScrollBehavior::Smooth]
    );

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn each_batch_of_chunks_costs_one_publish() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("count").await.unwrap();
    let mut revision = harness.wait_until_busy().await.unwrap().revision;

    let mut expected = String::new();
    for batch in [["one ", "two "], ["three ", "four "], ["five ", "six"]] {
        for chunk in batch {
            driver.chunk(chunk);
            expected.push_str(chunk);
        }
        let snapshot = harness
            .wait_for(|s| s.last_assistant().is_some_and(|m| m.content == expected))
            .await
            .unwrap();
        assert_eq!(snapshot.revision, revision + 1, "batch should flush once");
        revision = snapshot.revision;
    }

    driver.complete();
    harness.wait_idle_after(revision).await.unwrap();
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_commits_received_text_and_ignores_late_chunks() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("tell me").await.unwrap();
    let busy = harness.wait_until_busy().await.unwrap();
    driver.chunk("par");
    harness.settle().await;

    harness.handle.stop().await.unwrap();
    let stopped = harness.wait_idle_after(busy.revision).await.unwrap();
    let answer = stopped.last_assistant().unwrap();
    assert_eq!(answer.content, "par");
    assert!(!answer.is_streaming);
    assert!(stopped.error.is_none());

    let transport = harness.stream.clone().unwrap();
    assert!(transport.tokens()[0].is_cancelled());

    // A second stop is a no-op.
    harness.handle.stop().await.unwrap();
    harness.settle().await;
    assert_eq!(harness.snapshot().revision, stopped.revision);

    assert!(!driver.chunk("tial"), "stream should be dropped after stop");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after = harness.snapshot();
    assert_eq!(after.revision, stopped.revision);
    assert_eq!(after.last_assistant().unwrap().content, "par");

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transport_failure_replays_fallback_answer() {
    let stream = ScriptedStreamTransport::with_events(vec![
        TransportEvent::Chunk("Hel".into()),
        TransportEvent::Error(reset()),
    ]);
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(MockChatTransport::with_answers(&["Hello world"]))
        .build();

    let done = harness.run_to_idle("greet me").await.unwrap();
    assert!(done.error.is_none());
    assert_eq!(done.messages.len(), 2);
    let answer = done.last_assistant().unwrap();
    assert_eq!(answer.content, "Hello world");
    assert!(!answer.is_streaming);
    assert!(answer.error.is_none());

    let chat = harness.chat.clone().unwrap();
    let fallback_requests = chat.requests().await;
    assert_eq!(fallback_requests.len(), 1);
    assert_eq!(fallback_requests[0].text, "greet me");

    harness.settle().await;
    let calls = harness.persistence.calls().await;
    assert_eq!(calls.len(), 1);
    let (response, context) = &calls[0];
    assert_eq!(response.text(), "Hello world");
    assert!(!context.should_persist);
    assert!(context.resolved_thread_id.is_none());
    assert_eq!(context.user_message_id, done.messages[0].id);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn fallback_replay_is_paced_in_slices() {
    let stream = ScriptedStreamTransport::with_events(vec![TransportEvent::Error(reset())]);
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(MockChatTransport::with_answers(&["abcdefghijklmnopqrst"]))
        .build();

    let started = Instant::now();
    let done = harness.run_to_idle("slow").await.unwrap();
    assert_eq!(done.last_assistant().unwrap().content, "abcdefghijklmnopqrst");
    // Three slices of eight chars: the first immediately, then one per 24ms.
    assert!(started.elapsed() >= Duration::from_millis(48));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_fallback_removes_empty_message_and_reports_error() {
    let stream = ScriptedStreamTransport::with_events(vec![TransportEvent::Error(reset())]);
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(MockChatTransport::failing(DeliveryError::application(
            Some(503),
            "service unavailable",
        )))
        .build();

    let done = harness.run_to_idle("anyone?").await.unwrap();
    assert_eq!(done.error.as_deref(), Some("service unavailable"));
    assert_eq!(done.messages.len(), 1);
    assert_eq!(done.messages[0].role, Role::User);

    harness.settle().await;
    assert!(harness.persistence.calls().await.is_empty());
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn application_error_keeps_partial_text() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(MockChatTransport::new())
        .build();

    harness.submit("explain").await.unwrap();
    driver.chunk("partial");
    let flushed = harness
        .wait_for(|s| s.last_assistant().is_some_and(|m| m.content == "partial"))
        .await
        .unwrap();

    driver.error(DeliveryError::application(Some(500), "model overloaded"));
    let done = harness.wait_idle_after(flushed.revision).await.unwrap();
    assert_eq!(done.error.as_deref(), Some("model overloaded"));
    let answer = done.last_assistant().unwrap();
    assert_eq!(answer.content, "partial");
    assert!(!answer.is_streaming);
    assert_eq!(answer.error.as_deref(), Some("model overloaded"));

    let chat = harness.chat.clone().unwrap();
    assert_eq!(chat.request_count().await, 0, "semantic errors never fall back");
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disabled_fallback_fails_on_transport_error() {
    let config = DeliveryConfig {
        fallback_enabled: false,
        ..DeliveryConfig::default()
    };
    let stream = ScriptedStreamTransport::with_events(vec![TransportEvent::Error(
        DeliveryError::transport(TransportErrorKind::Io, "broken pipe"),
    )]);
    let harness = TestHarness::builder()
        .with_config(config)
        .with_stream_transport(stream)
        .with_chat_transport(MockChatTransport::new())
        .build();

    let done = harness.run_to_idle("hello").await.unwrap();
    let error = done.error.unwrap();
    assert!(error.contains("broken pipe"), "unexpected error: {error}");
    assert_eq!(done.messages.len(), 1);

    let chat = harness.chat.clone().unwrap();
    assert_eq!(chat.request_count().await, 0);
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_fallback_request_ignores_late_reply() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(
            MockChatTransport::with_answers(&["too late"]).with_latency(Duration::from_secs(1)),
        )
        .build();

    harness.submit("q").await.unwrap();
    let busy = harness.wait_until_busy().await.unwrap();
    driver.error(reset());
    harness.settle().await;
    let chat = harness.chat.clone().unwrap();
    assert_eq!(chat.request_count().await, 1, "fallback request should be in flight");

    harness.handle.stop().await.unwrap();
    let stopped = harness.wait_idle_after(busy.revision).await.unwrap();
    let shape: Vec<_> = stopped
        .messages
        .iter()
        .map(|m| (m.content.as_str(), m.is_streaming))
        .collect();
    assert_eq!(shape, vec![("q", false), ("", false)]);
    assert!(stopped.error.is_none());

    harness.handle.stop().await.unwrap();
    harness.settle().await;
    assert_eq!(harness.snapshot().revision, stopped.revision);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let after = harness.snapshot();
    assert_eq!(after.revision, stopped.revision);
    assert_eq!(after.last_assistant().unwrap().content, "");
    assert!(harness.persistence.calls().await.is_empty());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_mid_replay_freezes_replayed_text() {
    let stream = ScriptedStreamTransport::with_events(vec![TransportEvent::Error(reset())]);
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(MockChatTransport::with_answers(&["abcdefghijklmnopqrstuvwx"]))
        .build();

    harness.submit("replay").await.unwrap();
    let partial = harness
        .wait_for(|s| s.last_assistant().is_some_and(|m| m.content == "abcdefghijklmnop"))
        .await
        .unwrap();
    assert!(partial.is_streaming);

    harness.handle.stop().await.unwrap();
    let stopped = harness.wait_idle_after(partial.revision).await.unwrap();
    let answer = stopped.last_assistant().unwrap();
    assert_eq!(answer.content, "abcdefghijklmnop");
    assert!(!answer.is_streaming);
    assert!(!stopped.is_streaming);

    harness.handle.stop().await.unwrap();
    harness.settle().await;
    assert_eq!(harness.snapshot().revision, stopped.revision);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let after = harness.snapshot();
    assert_eq!(after.revision, stopped.revision);
    assert_eq!(after.last_assistant().unwrap().content, "abcdefghijklmnop");
    assert!(harness.persistence.calls().await.is_empty());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_persistence_hook_does_not_delay_stop() {
    let chat = MockChatTransport::new();
    chat.push_reply(Ok(ChatResponse {
        answer: Some("stored".into()),
        ..ChatResponse::default()
    }))
    .await;
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .with_chat_transport(chat)
        .with_persistence(RecordingPersistence::new().with_latency(Duration::from_secs(10)))
        .build();

    let options = ChatOptions {
        persist_conversation: true,
        ..ChatOptions::default()
    };
    let revision = harness.snapshot().revision;
    harness.handle.submit("keep", options).await.unwrap();
    harness.wait_idle_after(revision).await.unwrap();

    let started = Instant::now();
    harness.submit("next").await.unwrap();
    harness.wait_until_busy().await.unwrap();
    driver.chunk("on its way");
    harness.settle().await;
    harness.handle.stop().await.unwrap();
    let stopped = harness
        .wait_for(|s| s.is_idle() && s.last_assistant().is_some_and(|m| m.content == "on its way"))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(stopped.error.is_none());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn persisted_conversation_uses_single_shot_path() {
    let chat = MockChatTransport::new();
    chat.push_reply(Ok(ChatResponse {
        answer: Some("Saved answer".into()),
        documents: vec![doc("guide.pdf")],
        similarity: Some(0.91),
        assistant_message_id: Some("srv-42".into()),
        ..ChatResponse::default()
    }))
    .await;
    let harness = TestHarness::builder()
        .with_stream_transport(ScriptedStreamTransport::new())
        .with_chat_transport(chat)
        .build();

    let options = ChatOptions {
        persist_conversation: true,
        thread_id: Some("t-1".into()),
        ..ChatOptions::default()
    };
    let revision = harness.snapshot().revision;
    harness.handle.submit("remember this", options).await.unwrap();
    let done = harness.wait_idle_after(revision).await.unwrap();

    let answer = done.last_assistant().unwrap();
    assert_eq!(answer.content, "Saved answer");
    assert_eq!(answer.persisted_id.as_deref(), Some("srv-42"));
    assert_eq!(answer.similarity, Some(0.91));
    assert_eq!(answer.documents.len(), 1);
    assert!(!answer.is_streaming);

    let transport = harness.stream.clone().unwrap();
    assert_eq!(transport.subscription_count(), 0);

    harness.settle().await;
    let calls = harness.persistence.calls().await;
    assert_eq!(calls.len(), 1);
    let context = &calls[0].1;
    assert!(context.should_persist);
    assert_eq!(context.resolved_thread_id.as_deref(), Some("t-1"));
    assert_eq!(context.user_message_id, done.messages[0].id);
    assert_eq!(harness.viewport.scrolls(), vec![ScrollBehavior::Smooth]);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn regular_reply_skips_persistence_hook() {
    let harness = TestHarness::builder()
        .with_chat_transport(MockChatTransport::new())
        .build();

    let done = harness.run_to_idle("no stream here").await.unwrap();
    assert_eq!(done.last_assistant().unwrap().content, "mock response");

    harness.settle().await;
    assert!(harness.persistence.calls().await.is_empty());
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_does_not_fail_the_exchange() {
    let harness = TestHarness::builder()
        .with_stream_transport(ScriptedStreamTransport::with_events(vec![
            TransportEvent::Error(reset()),
        ]))
        .with_chat_transport(MockChatTransport::with_answers(&["still shown"]))
        .with_persistence(RecordingPersistence::failing("disk full"))
        .build();

    let done = harness.run_to_idle("q").await.unwrap();
    harness.settle().await;
    assert_eq!(harness.persistence.calls().await.len(), 1);
    assert!(harness.snapshot().error.is_none());
    assert_eq!(done.last_assistant().unwrap().content, "still shown");
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn context_event_flushes_immediately() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("sources?").await.unwrap();
    let started = Instant::now();
    driver.chunk("abc");
    driver.context(vec![doc("manual.pdf")]);

    let snapshot = harness
        .wait_for(|s| s.last_assistant().is_some_and(|m| !m.documents.is_empty()))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(16));
    let answer = snapshot.last_assistant().unwrap();
    assert_eq!(answer.content, "abc");
    assert_eq!(answer.documents[0].file_name.as_deref(), Some("manual.pdf"));
    assert_eq!(harness.viewport.scrolls(), vec![ScrollBehavior::Auto]);

    driver.complete();
    harness.wait_idle_after(snapshot.revision).await.unwrap();
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn history_excludes_streaming_and_blank_messages() {
    let stream = ScriptedStreamTransport::with_events(vec![
        TransportEvent::Chunk("answer one".into()),
        TransportEvent::Complete,
    ]);
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.run_to_idle("first").await.unwrap();
    harness.run_to_idle("second").await.unwrap();

    let transport = harness.stream.clone().unwrap();
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].options.conversation_history.is_empty());

    let history = &requests[1].options.conversation_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "first");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "answer one");

    // The second answer completed empty and stays out of later history.
    let third = harness.run_to_idle("third").await.unwrap();
    assert_eq!(third.messages.len(), 6);
    let requests = transport.requests();
    assert_eq!(requests[2].options.conversation_history.len(), 3);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn new_submission_supersedes_running_session() {
    let (stream, first) = ScriptedStreamTransport::live();
    let second = stream.push_live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("one").await.unwrap();
    first.chunk("first answer");
    harness
        .wait_for(|s| s.last_assistant().is_some_and(|m| m.content == "first answer"))
        .await
        .unwrap();
    first.chunk(" never shown");
    harness.settle().await;

    harness.submit("two").await.unwrap();
    harness.wait_for(|s| s.messages.len() == 4).await.unwrap();

    let transport = harness.stream.clone().unwrap();
    let tokens = transport.tokens();
    assert!(tokens[0].is_cancelled());
    assert!(!tokens[1].is_cancelled());
    assert!(!first.chunk("late"));

    second.chunk("second answer");
    second.complete();
    let done = harness
        .wait_for(|s| s.is_idle() && s.messages.len() == 4)
        .await
        .unwrap();

    assert_eq!(done.messages[1].content, "first answer");
    assert!(!done.messages[1].is_streaming);
    assert_eq!(done.messages[3].content, "second answer");
    assert!(!done.messages[3].is_streaming);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn clear_resets_the_conversation() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("something").await.unwrap();
    harness.wait_until_busy().await.unwrap();
    harness.handle.scrolled(500.0).await.unwrap();
    harness
        .wait_for(|s| s.auto_follow == AutoFollow::Detached)
        .await
        .unwrap();

    harness.handle.clear().await.unwrap();
    let cleared = harness.wait_for(|s| s.messages.is_empty()).await.unwrap();
    assert!(cleared.is_idle());
    assert!(cleared.error.is_none());
    assert_eq!(cleared.auto_follow, AutoFollow::Following);
    assert!(!driver.chunk("orphan"));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scrolling_away_suspends_auto_follow_until_idle_at_bottom() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("long answer please").await.unwrap();
    harness.wait_until_busy().await.unwrap();

    harness.handle.scrolled(200.0).await.unwrap();
    harness
        .wait_for(|s| s.auto_follow == AutoFollow::Detached)
        .await
        .unwrap();

    driver.chunk("paragraph");
    let flushed = harness
        .wait_for(|s| s.last_assistant().is_some_and(|m| m.content == "paragraph"))
        .await
        .unwrap();
    assert!(harness.viewport.scrolls().is_empty());

    // Returning to the bottom mid-stream does not re-engage.
    harness.handle.scrolled(0.0).await.unwrap();
    harness.settle().await;
    assert_eq!(harness.snapshot().auto_follow, AutoFollow::Detached);

    driver.complete();
    let done = harness.wait_idle_after(flushed.revision).await.unwrap();
    assert_eq!(done.auto_follow, AutoFollow::Detached);
    assert!(harness.viewport.scrolls().is_empty());

    harness.handle.scrolled(0.0).await.unwrap();
    harness
        .wait_for(|s| s.auto_follow == AutoFollow::Following)
        .await
        .unwrap();

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn new_session_re_engages_auto_follow() {
    let stream = ScriptedStreamTransport::new();
    let second = stream.push_live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.handle.scrolled(300.0).await.unwrap();
    harness
        .wait_for(|s| s.auto_follow == AutoFollow::Detached)
        .await
        .unwrap();

    harness.submit("again").await.unwrap();
    let busy = harness.wait_until_busy().await.unwrap();
    assert_eq!(busy.auto_follow, AutoFollow::Following);

    second.complete();
    harness.wait_idle_after(busy.revision).await.unwrap();
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn viewport_drift_detaches_instead_of_scrolling() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("drift").await.unwrap();
    harness.wait_until_busy().await.unwrap();
    harness.viewport.set_distance(400.0);

    driver.chunk("content");
    harness
        .wait_for(|s| s.auto_follow == AutoFollow::Detached)
        .await
        .unwrap();
    assert!(harness.viewport.scrolls().is_empty());

    driver.complete();
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn submit_without_transport_reports_error() {
    let harness = TestHarness::builder().build();

    harness.submit("hello?").await.unwrap();
    let snapshot = harness.wait_for(|s| s.error.is_some()).await.unwrap();
    assert_eq!(snapshot.error.as_deref(), Some("no chat transport configured"));
    assert!(snapshot.messages.is_empty());
    assert!(snapshot.is_idle());

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn blank_submission_is_ignored() {
    let harness = TestHarness::builder()
        .with_stream_transport(ScriptedStreamTransport::new())
        .build();

    harness.submit("   \n").await.unwrap();
    harness.settle().await;

    let snapshot = harness.snapshot();
    assert_eq!(snapshot.revision, 0);
    assert!(snapshot.messages.is_empty());
    let transport = harness.stream.clone().unwrap();
    assert_eq!(transport.subscription_count(), 0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_finalizes_running_session() {
    let (stream, driver) = ScriptedStreamTransport::live();
    let harness = TestHarness::builder()
        .with_stream_transport(stream)
        .build();

    harness.submit("bye").await.unwrap();
    harness.wait_until_busy().await.unwrap();
    driver.chunk("partial");
    harness.settle().await;

    let handle = harness.handle.clone();
    harness.shutdown().await;

    let last = handle.snapshot();
    assert!(last.is_idle());
    let answer = last.last_assistant().unwrap();
    assert!(!answer.is_streaming);
    assert!(handle.stop().await.is_err(), "controller should be gone");
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn fallback_is_logged() {
    let harness = TestHarness::builder()
        .with_stream_transport(ScriptedStreamTransport::with_events(vec![
            TransportEvent::Error(reset()),
        ]))
        .with_chat_transport(MockChatTransport::with_answers(&["ok"]))
        .build();

    harness.run_to_idle("log me").await.unwrap();
    assert!(logs_contain("falling back"));
    assert!(logs_contain("fallback replay completed"));
    harness.shutdown().await;
}
