//! Scripted backends and a ready-made orchestrator for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use llm_relay::prelude::*;
use llm_relay::provider::ChunkStream;
use secrecy::SecretString;

/// What a scripted chat or embeddings call does.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail(TransportError),
    /// Never resolves; only cancellation gets the caller out.
    Hang,
}

/// What a scripted stream does.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit these deltas, then a final chunk with `FinishReason::Stop`.
    Complete(Vec<String>),
    /// Emit these deltas, then fail.
    FailAfter(Vec<String>, TransportError),
    /// Emit these deltas, then end without a finish reason.
    EndEarly(Vec<String>),
    /// Fail before any chunk.
    OpenFail(TransportError),
    /// Emit these deltas, then wait forever.
    HangAfter(Vec<String>),
}

#[derive(Debug)]
pub struct ScriptedBackend {
    provider: ProviderId,
    chat: Mutex<Reply<String>>,
    stream: Mutex<StreamScript>,
    embed: Mutex<Reply<Vec<f32>>>,
    probe: Mutex<Reply<()>>,
    pub chat_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub embed_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    /// Models the backend was asked for, in call order.
    pub models: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Succeeds at everything with provider-tagged output.
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            chat: Mutex::new(Reply::Ok(format!("reply from {provider}"))),
            stream: Mutex::new(StreamScript::Complete(vec![
                format!("{provider}:"),
                " hello".to_string(),
            ])),
            embed: Mutex::new(Reply::Ok(vec![0.1, 0.2, 0.3])),
            probe: Mutex::new(Reply::Ok(())),
            chat_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn set_chat(&self, reply: Reply<String>) {
        *self.chat.lock().unwrap() = reply;
    }

    pub fn set_stream(&self, script: StreamScript) {
        *self.stream.lock().unwrap() = script;
    }

    pub fn set_embed(&self, reply: Reply<Vec<f32>>) {
        *self.embed.lock().unwrap() = reply;
    }

    pub fn set_probe(&self, reply: Reply<()>) {
        *self.probe.lock().unwrap() = reply;
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.chat_calls() + self.stream_calls() + self.embed_calls()
    }

    async fn resolve<T: Clone>(reply: &Mutex<Reply<T>>) -> Result<T, TransportError> {
        let reply = reply.lock().unwrap().clone();
        match reply {
            Reply::Ok(v) => Ok(v),
            Reply::Fail(e) => Err(e),
            Reply::Hang => std::future::pending().await,
        }
    }
}

fn deltas(parts: Vec<String>) -> Vec<Result<StreamChunk, TransportError>> {
    parts.into_iter().map(|d| Ok(StreamChunk::delta(d))).collect()
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(
        &self,
        call: &BackendCall,
        _request: &ChatRequest,
    ) -> Result<ChatResponse, TransportError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(call.model.clone());
        let text = Self::resolve(&self.chat).await?;
        Ok(ChatResponse {
            id: format!("{}-response", self.provider),
            model: call.model.clone(),
            message: ChatMessage::assistant(text),
            usage: TokenUsage::new(12, 8),
            finish_reason: FinishReason::Stop,
        })
    }

    async fn stream(
        &self,
        call: &BackendCall,
        _request: &ChatRequest,
    ) -> Result<ChunkStream, TransportError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(call.model.clone());
        let script = self.stream.lock().unwrap().clone();
        let stream: ChunkStream = match script {
            StreamScript::Complete(parts) => {
                let n = parts.len() as u32;
                let mut items = deltas(parts);
                items.push(Ok(StreamChunk::finished(FinishReason::Stop)
                    .with_usage(TokenUsage::new(5, n))));
                futures_util::stream::iter(items).boxed()
            }
            StreamScript::FailAfter(parts, err) => {
                let mut items = deltas(parts);
                items.push(Err(err));
                futures_util::stream::iter(items).boxed()
            }
            StreamScript::EndEarly(parts) => futures_util::stream::iter(deltas(parts)).boxed(),
            StreamScript::OpenFail(err) => return Err(err),
            StreamScript::HangAfter(parts) => futures_util::stream::iter(deltas(parts))
                .chain(futures_util::stream::pending())
                .boxed(),
        };
        Ok(stream)
    }

    async fn embed(&self, call: &BackendCall, _input: &str) -> Result<Vec<f32>, TransportError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(call.model.clone());
        Self::resolve(&self.embed).await
    }

    async fn probe(&self, _call: &BackendCall) -> Result<(), TransportError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Self::resolve(&self.probe).await
    }
}

pub struct Harness {
    pub relay: Orchestrator,
    pub store: Arc<ConfigurationStore>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub storage: Arc<MemoryKeyValueStore>,
    pub backends: BTreeMap<ProviderId, Arc<ScriptedBackend>>,
}

impl Harness {
    pub fn backend(&self, id: ProviderId) -> &ScriptedBackend {
        &self.backends[&id]
    }
}

pub fn test_key(id: ProviderId) -> SecretString {
    format!("sk-test-{id}-0123456789abcdef").into()
}

/// Orchestrator over scripted backends with `configured` set up in order (the first
/// becomes active) and health tracking off.
pub async fn harness(configured: &[ProviderId]) -> Harness {
    harness_with_options(configured, OrchestratorOptions::new().without_health_tracking()).await
}

pub async fn harness_with_options(configured: &[ProviderId], options: OrchestratorOptions) -> Harness {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let storage = Arc::new(MemoryKeyValueStore::new());
    let store = Arc::new(ConfigurationStore::new(credentials.clone(), storage.clone()));

    let mut backends = BTreeMap::new();
    let mut builder = ProviderRegistry::builder(store.clone());
    for id in ProviderId::ALL {
        let backend = Arc::new(ScriptedBackend::new(id));
        builder = builder.backend(id, backend.clone());
        backends.insert(id, backend);
    }
    let registry = Arc::new(builder.build());

    for id in configured {
        store
            .configure_provider(*id, test_key(*id), None)
            .await
            .expect("configure provider");
    }

    Harness {
        relay: Orchestrator::with_options(store.clone(), registry, options),
        store,
        credentials,
        storage,
        backends,
    }
}

pub fn hello() -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user("Hello")])
}

/// Drain a stream, returning deltas of successful chunks and the error that ended it.
pub async fn drain(mut stream: ChatStream) -> (Vec<String>, Option<LlmError>) {
    let mut deltas = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if !chunk.delta.is_empty() {
                    deltas.push(chunk.delta);
                }
            }
            Err(e) => return (deltas, Some(e)),
        }
    }
    (deltas, None)
}

pub fn network_error(message: &str) -> TransportError {
    TransportError::connect(message)
}
