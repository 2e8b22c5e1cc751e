//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cartera_rag::{
    CustomerProfile, CustomerRecord, EmbeddingProvider, GenerationProvider, GenerationRequest,
    InMemoryVectorStore, RagConfig, RagError, RagService, RecordSource, Result, VectorStore,
};

pub const DIM: usize = 64;

/// Bag-of-words embedder: each distinct lowercase word gets its own dimension
/// in first-seen order, so texts sharing words are close and texts sharing
/// none are orthogonal.
#[derive(Default)]
pub struct VocabEmbedder {
    vocab: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    /// 1-based `embed_batch` call number that fails; 0 means never.
    fail_on_call: AtomicUsize,
    /// 1-based `embed_batch` call number that sleeps for `delay` first.
    slow_call: usize,
    delay: Duration,
}

impl VocabEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(call: usize) -> Self {
        let embedder = Self::default();
        embedder.fail_on_call.store(call, Ordering::SeqCst);
        embedder
    }

    pub fn slow_on_call(call: usize, delay: Duration) -> Self {
        Self { slow_call: call, delay, ..Self::default() }
    }

    pub fn stop_failing(&self) {
        self.fail_on_call.store(0, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut v = vec![0.0f32; DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let next = vocab.len();
            let slot = *vocab.entry(word.to_lowercase()).or_insert(next) % DIM;
            v[slot] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    fn name(&self) -> &str {
        "Vocab"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.slow_call {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on_call.load(Ordering::SeqCst) == call {
            return Err(RagError::ProviderError {
                provider: "Vocab".into(),
                message: "rate limited".into(),
            });
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Generator that records the last request and answers with the first
/// customer id found in the context.
#[derive(Default)]
pub struct RecordingGenerator {
    pub last_request: Mutex<Option<GenerationRequest>>,
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn name(&self) -> &str {
        "Recording"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        let cited = request
            .user_message
            .lines()
            .filter(|line| !line.starts_with("Customer context"))
            .find_map(|line| line.strip_prefix("Customer ").and_then(|rest| rest.split(':').next()))
            .map(str::to_string);
        Ok(match cited {
            Some(id) => format!("The best match is {id}."),
            None => "not available in the provided data".to_string(),
        })
    }
}

/// Generator that always fails.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn name(&self) -> &str {
        "Failing"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(RagError::ProviderError { provider: "Failing".into(), message: "unauthorized".into() })
    }
}

/// Record source over a fixed list that counts how often it is loaded.
pub struct CountingSource {
    records: Vec<CustomerRecord>,
    loads: AtomicUsize,
}

impl CountingSource {
    pub fn new(records: Vec<CustomerRecord>) -> Self {
        Self { records, loads: AtomicUsize::new(0) }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for CountingSource {
    async fn load(&self) -> Result<Vec<CustomerRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

pub fn record(id: &str, summary: &str) -> CustomerRecord {
    CustomerRecord { id: id.into(), summary: summary.into(), profile: CustomerProfile::default() }
}

/// The three-customer portfolio used throughout the scenario tests.
pub fn three_customers() -> Vec<CustomerRecord> {
    vec![
        record("C001", "young professional high income"),
        record("C002", "retired low income"),
        record("C003", "public sector mid income"),
    ]
}

pub struct Harness {
    pub service: Arc<RagService>,
    pub source: Arc<CountingSource>,
    pub embedder: Arc<VocabEmbedder>,
    pub generator: Arc<RecordingGenerator>,
    pub store: Arc<dyn VectorStore>,
}

pub fn harness(records: Vec<CustomerRecord>, config: RagConfig) -> Harness {
    harness_with(
        records,
        config,
        Arc::new(VocabEmbedder::new()),
        Arc::new(InMemoryVectorStore::new()),
    )
}

pub fn harness_with(
    records: Vec<CustomerRecord>,
    config: RagConfig,
    embedder: Arc<VocabEmbedder>,
    store: Arc<dyn VectorStore>,
) -> Harness {
    let source = Arc::new(CountingSource::new(records));
    let generator = Arc::new(RecordingGenerator::default());
    let service = RagService::builder()
        .config(config)
        .record_source(source.clone())
        .embedding_provider(embedder.clone())
        .generation_provider(generator.clone())
        .vector_store(store.clone())
        .build()
        .unwrap();
    Harness { service: Arc::new(service), source, embedder, generator, store }
}
