use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cartera_rag::{
    CustomerProfile, CustomerRecord, EmbeddingProvider, GenerationProvider, GenerationRequest,
    InMemoryVectorStore, RagError, RagService, RecordSource, Result,
};
use cartera_server::{AppState, ServiceFactory, app_router};
use serde_json::Value;

const VOCAB: [&str; 9] =
    ["young", "professional", "retired", "low", "income", "public", "sector", "employee", "high"];

/// Bag-of-words over a fixed vocabulary; unknown words share the last slot.
struct WordEmbedder;

#[async_trait]
impl EmbeddingProvider for WordEmbedder {
    fn name(&self) -> &str {
        "Words"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; VOCAB.len() + 1];
                for word in text.split_whitespace() {
                    let word = word.to_lowercase();
                    let slot = VOCAB.iter().position(|w| *w == word).unwrap_or(VOCAB.len());
                    v[slot] += 1.0;
                }
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        VOCAB.len() + 1
    }
}

struct CountingGenerator;

#[async_trait]
impl GenerationProvider for CountingGenerator {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let customers = request.user_message.matches("\nCustomer ").count();
        Ok(format!("answered from {customers} customers"))
    }
}

struct FixedSource(Vec<CustomerRecord>);

#[async_trait]
impl RecordSource for FixedSource {
    async fn load(&self) -> Result<Vec<CustomerRecord>> {
        Ok(self.0.clone())
    }
}

struct FakeFactory {
    configured: bool,
    builds: AtomicUsize,
}

impl FakeFactory {
    fn new(configured: bool) -> Arc<Self> {
        Arc::new(Self { configured, builds: AtomicUsize::new(0) })
    }
}

impl ServiceFactory for FakeFactory {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn build(&self) -> Result<RagService> {
        if !self.configured {
            return Err(RagError::ConfigError("no API key configured".into()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        let records = [
            ("C001", "young professional high income"),
            ("C002", "retired low income"),
            ("C003", "public sector employee"),
        ]
        .into_iter()
        .map(|(id, summary)| CustomerRecord {
            id: id.into(),
            summary: summary.into(),
            profile: CustomerProfile::default(),
        })
        .collect();
        RagService::builder()
            .record_source(Arc::new(FixedSource(records)))
            .embedding_provider(Arc::new(WordEmbedder))
            .generation_provider(Arc::new(CountingGenerator))
            .vector_store(Arc::new(InMemoryVectorStore::new()))
            .build()
    }
}

fn write_metrics_files(dir: &Path) {
    std::fs::write(
        dir.join("metrics_config.json"),
        r#"{"definitions":{"captaciones":["CE_SALDO","CDI_SALDO"],"colocaciones":["TC_SALDO"]}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("portfolio_totals.json"),
        r#"{"captaciones_total_crc":1000.004,"colocaciones_total_crc":400.0,"n_clientes":3,
            "cols_pasivas_detectadas":["CE_SALDO"],"cols_activas_detectadas":["TC_SALDO"]}"#,
    )
    .unwrap();
}

async fn spawn_server(
    data_dir: &Path,
    factory: Arc<FakeFactory>,
) -> (String, tokio::task::JoinHandle<()>) {
    let app = app_router(AppState::new(data_dir, factory));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{}", addr), handle)
}

async fn get_json(url: String) -> (u16, Value) {
    let response = reqwest::Client::new().get(url).send().await.expect("response");
    let status = response.status().as_u16();
    (status, response.json().await.expect("json body"))
}

#[tokio::test]
async fn health_reports_without_building_rag() {
    let tmp = tempfile::tempdir().unwrap();
    write_metrics_files(tmp.path());
    let factory = FakeFactory::new(true);
    let (base, handle) = spawn_server(tmp.path(), factory.clone()).await;

    let (status, body) = get_json(format!("{base}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["vector_docs"], 0);
    assert_eq!(body["services"]["rag"], "ready_to_init");
    assert_eq!(body["services"]["metrics"], "ready");
    assert_eq!(body["services"]["openai_configured"], true);
    assert_eq!(factory.builds.load(Ordering::SeqCst), 0);

    let (status, _) = get_json(format!("{base}/search?q=retired&top_k=1")).await;
    assert_eq!(status, 200);
    let (_, body) = get_json(format!("{base}/health")).await;
    assert_eq!(body["services"]["rag"], "ready");
    assert_eq!(body["vector_docs"], 3);

    handle.abort();
}

#[tokio::test]
async fn health_without_key_or_metrics() {
    let tmp = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(tmp.path(), FakeFactory::new(false)).await;

    let (status, body) = get_json(format!("{base}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["services"]["rag"], "needs_api_key");
    assert_eq!(body["services"]["metrics"], "unavailable");

    let (status, body) = get_json(format!("{base}/ask?q=retired")).await;
    assert_eq!(status, 500);
    assert!(body["detail"].as_str().unwrap().contains("no API key"));

    handle.abort();
}

#[tokio::test]
async fn ask_returns_grounded_answer_and_builds_once() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = FakeFactory::new(true);
    let (base, handle) = spawn_server(tmp.path(), factory.clone()).await;

    let (status, body) = get_json(format!("{base}/ask?q=public%20sector&top_k=2")).await;
    assert_eq!(status, 200);
    assert_eq!(body["context_used"], 2);
    assert_eq!(body["answer"], "answered from 2 customers");
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0]["customer_id"], "C003");
    assert_eq!(matches[0]["metadata"]["sex"], "UNKNOWN");

    let (status, body) = get_json(format!("{base}/ask?q=retired")).await;
    assert_eq!(status, 200);
    assert_eq!(body["context_used"], 3);
    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);

    handle.abort();
}

#[tokio::test]
async fn search_orders_by_distance() {
    let tmp = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(tmp.path(), FakeFactory::new(true)).await;

    let (status, body) = get_json(format!("{base}/search?q=retired%20low%20income&top_k=3")).await;
    assert_eq!(status, 200);
    assert_eq!(body["query"], "retired low income");
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches[0]["customer_id"], "C002");
    let distances: Vec<f64> = matches.iter().map(|m| m["distance"].as_f64().unwrap()).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));

    handle.abort();
}

#[tokio::test]
async fn invalid_queries_are_bad_requests() {
    let tmp = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(tmp.path(), FakeFactory::new(true)).await;

    for path in [
        "/ask?q=retired&top_k=0",
        "/ask?q=retired&top_k=21",
        "/ask?q=%20%20",
        "/ask",
        "/search?q=retired&top_k=abc",
        "/metrics/saldo?tipo=bruto",
        "/metrics/saldo",
    ] {
        let (status, body) = get_json(format!("{base}{path}")).await;
        assert_eq!(status, 400, "{path}");
        assert!(body["detail"].is_string(), "{path}");
    }

    handle.abort();
}

#[tokio::test]
async fn metrics_endpoints_report_rounded_balances() {
    let tmp = tempfile::tempdir().unwrap();
    write_metrics_files(tmp.path());
    let (base, handle) = spawn_server(tmp.path(), FakeFactory::new(false)).await;

    let (status, body) = get_json(format!("{base}/metrics/saldo?tipo=neto")).await;
    assert_eq!(status, 200);
    assert_eq!(body["tipo"], "neto");
    assert_eq!(body["crc"], 600.0);
    assert_eq!(body["captaciones_crc"], 1000.0);
    assert_eq!(body["n_clientes"], 3);

    let (_, body) = get_json(format!("{base}/metrics/saldo?tipo=Captaciones")).await;
    assert_eq!(body["cols"], serde_json::json!(["CE_SALDO", "CDI_SALDO"]));

    let (status, body) = get_json(format!("{base}/metrics/saldo_por_producto")).await;
    assert_eq!(status, 200);
    assert_eq!(body["captaciones"]["cols_detectadas"], serde_json::json!(["CE_SALDO"]));
    assert_eq!(body["colocaciones"]["definicion"], serde_json::json!(["TC_SALDO"]));

    let (status, body) = get_json(format!("{base}/metrics/summary")).await;
    assert_eq!(status, 200);
    assert_eq!(body["neto_crc"], 600.0);

    handle.abort();
}

#[tokio::test]
async fn missing_metrics_files_are_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(tmp.path(), FakeFactory::new(false)).await;

    let (status, body) = get_json(format!("{base}/metrics/summary")).await;
    assert_eq!(status, 503);
    assert!(body["detail"].as_str().unwrap().contains("metrics_config.json"));

    handle.abort();
}
