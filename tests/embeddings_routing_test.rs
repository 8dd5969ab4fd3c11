//! Embedding requests are routed by capability.

mod support;

use llm_relay::prelude::*;
use support::{Reply, harness, network_error};

const CLAUDE: ProviderId = ProviderId::Claude;
const OPENAI: ProviderId = ProviderId::OpenAi;
const GEMINI: ProviderId = ProviderId::Gemini;

#[tokio::test]
async fn incapable_primary_is_bypassed() {
    let h = harness(&[CLAUDE, OPENAI]).await;
    h.backend(OPENAI).set_embed(Reply::Ok(vec![0.5, -0.25]));

    let (vector, report) = h
        .relay
        .generate_embeddings_with_report("hello", &new_cancel_handle())
        .await
        .unwrap();

    assert_eq!(vector, vec![0.5, -0.25]);
    assert_eq!(report.provider, OPENAI);
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, vec![(CLAUDE, SkipReason::MissingCapability)]);
    assert_eq!(h.backend(CLAUDE).total_calls(), 0);
}

#[tokio::test]
async fn embedding_model_is_the_provider_default() {
    let h = harness(&[OPENAI]).await;
    h.relay.generate_embeddings("hello").await.unwrap();
    let models = h.backend(OPENAI).models.lock().unwrap().clone();
    assert_eq!(models, vec!["text-embedding-3-small"]);
}

#[tokio::test]
async fn capable_primary_failure_falls_back_to_capable_candidate() {
    let h = harness(&[OPENAI, CLAUDE, GEMINI]).await;
    h.backend(OPENAI)
        .set_embed(Reply::Fail(TransportError::status(503, "unavailable")));

    let vector = h.relay.generate_embeddings("hello").await.unwrap();

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    assert_eq!(h.backend(OPENAI).embed_calls(), 1);
    assert_eq!(h.backend(CLAUDE).total_calls(), 0);
    assert_eq!(h.backend(GEMINI).embed_calls(), 1);
}

#[tokio::test]
async fn no_capable_provider_is_embeddings_not_supported() {
    let h = harness(&[CLAUDE, ProviderId::Local]).await;

    let err = h.relay.generate_embeddings("hello").await.unwrap_err();

    assert_eq!(err, LlmError::EmbeddingsNotSupported { provider: None });
    assert_eq!(h.backend(CLAUDE).total_calls(), 0);
}

#[tokio::test]
async fn all_capable_candidates_failing_reports_the_first() {
    let h = harness(&[CLAUDE, OPENAI, GEMINI]).await;
    h.backend(OPENAI).set_embed(Reply::Fail(network_error("openai down")));
    h.backend(GEMINI)
        .set_embed(Reply::Fail(TransportError::timeout("gemini slow")));

    let err = h.relay.generate_embeddings("hello").await.unwrap_err();

    assert_eq!(
        err,
        LlmError::NetworkError {
            provider: OPENAI,
            message: "openai down".to_string(),
        }
    );
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let h = harness(&[OPENAI]).await;
    let err = h.relay.generate_embeddings("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(h.backend(OPENAI).embed_calls(), 0);
}

#[tokio::test]
async fn direct_client_call_guards_capability() {
    let h = harness(&[CLAUDE]).await;
    let client = h.relay.registry().get(CLAUDE);

    let err = client.generate_embeddings("hello").await.unwrap_err();

    assert_eq!(
        err,
        LlmError::EmbeddingsNotSupported {
            provider: Some(CLAUDE)
        }
    );
}
