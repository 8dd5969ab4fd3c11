//! Streaming completion and mid-stream fallback.

mod support;

use futures_util::StreamExt;
use llm_relay::prelude::*;
use support::{StreamScript, drain, harness, hello, network_error};

const CLAUDE: ProviderId = ProviderId::Claude;
const OPENAI: ProviderId = ProviderId::OpenAi;
const GEMINI: ProviderId = ProviderId::Gemini;

fn parts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn primary_stream_is_forwarded_until_finish() {
    let h = harness(&[CLAUDE, OPENAI]).await;
    h.backend(CLAUDE)
        .set_stream(StreamScript::Complete(parts(&["Hel", "lo", "!"])));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let mut stream = handle.stream;

    let mut deltas = Vec::new();
    let mut last = None;
    while let Some(item) = stream.next().await {
        let chunk = item.unwrap();
        deltas.push(chunk.delta.clone());
        last = Some(chunk);
    }
    let last = last.unwrap();
    assert_eq!(deltas, vec!["Hel", "lo", "!", ""]);
    assert_eq!(last.finish_reason, Some(FinishReason::Stop));
    let usage = last.usage.unwrap();
    assert_eq!(
        usage.total_tokens(),
        u64::from(usage.prompt_tokens()) + u64::from(usage.completion_tokens())
    );
    assert_eq!(h.backend(OPENAI).stream_calls(), 0);
}

#[tokio::test]
async fn partial_output_then_fresh_fallback_stream() {
    let h = harness(&[CLAUDE, OPENAI, GEMINI]).await;
    h.backend(CLAUDE).set_stream(StreamScript::FailAfter(
        parts(&["Once upon", " a time"]),
        network_error("connection reset"),
    ));
    h.backend(OPENAI)
        .set_stream(StreamScript::Complete(parts(&["In a galaxy", " far away"])));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let (deltas, err) = drain(handle.stream).await;

    assert!(err.is_none(), "unexpected error: {err:?}");
    // No stitching: the failed partial output is followed by the whole fallback stream.
    assert_eq!(
        deltas,
        vec!["Once upon", " a time", "In a galaxy", " far away"]
    );
    assert_eq!(h.backend(OPENAI).stream_calls(), 1);
    assert_eq!(h.backend(GEMINI).stream_calls(), 0);
}

#[tokio::test]
async fn stream_without_finish_reason_counts_as_failure() {
    let h = harness(&[CLAUDE, OPENAI]).await;
    h.backend(CLAUDE)
        .set_stream(StreamScript::EndEarly(parts(&["cut"])));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let (deltas, err) = drain(handle.stream).await;

    assert!(err.is_none());
    assert_eq!(deltas, vec!["cut", "openai:", " hello"]);
}

#[tokio::test]
async fn open_failure_falls_back() {
    let h = harness(&[CLAUDE, OPENAI]).await;
    h.backend(CLAUDE)
        .set_stream(StreamScript::OpenFail(TransportError::status(503, "overloaded")));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let (deltas, err) = drain(handle.stream).await;

    assert!(err.is_none());
    assert_eq!(deltas, vec!["openai:", " hello"]);
}

#[tokio::test]
async fn total_failure_ends_with_the_primary_error() {
    let h = harness(&[CLAUDE, OPENAI, GEMINI]).await;
    h.backend(CLAUDE).set_stream(StreamScript::FailAfter(
        parts(&["a"]),
        network_error("claude reset"),
    ));
    h.backend(OPENAI)
        .set_stream(StreamScript::OpenFail(TransportError::status(500, "boom")));
    h.backend(GEMINI).set_stream(StreamScript::FailAfter(
        parts(&["b"]),
        TransportError::timeout("gemini stalled"),
    ));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let (deltas, err) = drain(handle.stream).await;

    assert_eq!(deltas, vec!["a", "b"]);
    assert_eq!(
        err,
        Some(LlmError::NetworkError {
            provider: CLAUDE,
            message: "claude reset".to_string(),
        })
    );
}

#[tokio::test]
async fn error_is_the_last_item() {
    let h = harness(&[CLAUDE]).await;
    h.backend(CLAUDE)
        .set_stream(StreamScript::OpenFail(network_error("down")));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let mut stream = handle.stream;
    assert!(stream.next().await.unwrap().is_err());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn setup_errors_are_returned_eagerly() {
    let h = harness(&[]).await;
    let err = h.relay.stream_chat_completion(hello()).await.unwrap_err();
    assert_eq!(err, LlmError::NoActiveProvider);

    let h = harness(&[CLAUDE]).await;
    let err = h
        .relay
        .stream_chat_completion(ChatRequest::new(Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(h.backend(CLAUDE).stream_calls(), 0);
}

#[tokio::test]
async fn nothing_runs_until_polled() {
    let h = harness(&[CLAUDE]).await;
    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    assert_eq!(h.backend(CLAUDE).stream_calls(), 0);
    drop(handle);
    assert_eq!(h.backend(CLAUDE).stream_calls(), 0);
}

#[tokio::test]
async fn fallback_follows_updated_priority() {
    let h = harness(&[CLAUDE, ProviderId::Local, OPENAI]).await;
    h.relay
        .update_provider_priority(ProviderPriority::sequential(vec![
            CLAUDE,
            ProviderId::Local,
            OPENAI,
        ]))
        .await
        .unwrap();
    h.backend(CLAUDE)
        .set_stream(StreamScript::OpenFail(network_error("down")));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let (deltas, err) = drain(handle.stream).await;

    assert!(err.is_none());
    assert_eq!(deltas, vec!["local:", " hello"]);
    assert_eq!(h.backend(OPENAI).stream_calls(), 0);
}

#[tokio::test]
async fn upstream_abort_mid_stream_falls_back() {
    let h = harness(&[CLAUDE, OPENAI]).await;
    h.backend(CLAUDE).set_stream(StreamScript::FailAfter(
        parts(&["half"]),
        TransportError::new(TransportErrorKind::Cancelled, "upstream aborted the stream"),
    ));

    let handle = h.relay.stream_chat_completion(hello()).await.unwrap();
    let (deltas, err) = drain(handle.stream).await;

    assert!(err.is_none(), "unexpected error: {err:?}");
    assert_eq!(deltas, vec!["half", "openai:", " hello"]);
    assert_eq!(h.backend(OPENAI).stream_calls(), 1);
}
