//! HTTP routes, handlers and the server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};
use cartera_rag::{AnswerResult, Match, SaldoKind, SaldoReport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    error::ApiError,
    state::{AppState, OpenAIServiceFactory},
};

const API_NAME: &str = "cartera-server";

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ask", get(ask))
        .route("/search", get(search))
        .route("/metrics/saldo", get(saldo))
        .route("/metrics/saldo_por_producto", get(saldo_por_producto))
        .route("/metrics/summary", get(metrics_summary))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for cartera-server")?;
    let state = AppState::new(config.data_dir.clone(), Arc::new(OpenAIServiceFactory::new(config)));
    if !state.rag_configured() {
        warn!("no OpenAI API key configured; /ask and /search will fail until one is set");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("cartera-server listening on http://{}", addr);
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("cartera-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "name": API_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "ask": "/ask?q=question&top_k=5",
            "search": "/search?q=question&top_k=5",
            "metrics_saldo": "/metrics/saldo?tipo=neto|captaciones|colocaciones",
            "metrics_productos": "/metrics/saldo_por_producto",
            "metrics_summary": "/metrics/summary",
        },
    }))
}

/// Health of one backing service as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagHealth {
    NotInitialized,
    NeedsApiKey,
    ReadyToInit,
    Empty,
    Ready,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthServices {
    pub metrics: String,
    pub rag: RagHealth,
    pub openai_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub vector_docs: usize,
    pub services: HealthServices,
}

/// Never builds the RAG service or triggers indexing.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = state.rag_configured();
    let (rag, vector_docs) = match state.rag_if_built() {
        Some(service) => match service.index_stats().await {
            Ok(stats) if stats.total_documents > 0 => (RagHealth::Ready, stats.total_documents),
            Ok(_) => (RagHealth::Empty, 0),
            Err(e) => {
                warn!(error = %e, "index stats unavailable");
                (RagHealth::NotInitialized, 0)
            }
        },
        None if configured => (RagHealth::ReadyToInit, 0),
        None => (RagHealth::NeedsApiKey, 0),
    };
    let metrics = match state.metrics().await {
        Ok(_) => "ready",
        Err(e) => {
            warn!(error = %e, "portfolio metrics unavailable");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        vector_docs,
        services: HealthServices {
            metrics: metrics.to_string(),
            rag,
            openai_configured: configured,
        },
    })
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    q: String,
    top_k: Option<usize>,
}

async fn ask(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<AnswerResult>, ApiError> {
    let Query(params) = params?;
    let service = state.rag().await?;
    let k = params.top_k.unwrap_or(service.config().default_top_k);
    Ok(Json(service.answer(&params.q, k).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub matches: Vec<Match>,
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let service = state.rag().await?;
    let k = params.top_k.unwrap_or(service.config().default_top_k);
    let matches = service.search(&params.q, k).await?;
    Ok(Json(SearchResponse { query: params.q, matches }))
}

#[derive(Debug, Deserialize)]
struct SaldoParams {
    tipo: String,
}

async fn saldo(
    State(state): State<AppState>,
    params: Result<Query<SaldoParams>, QueryRejection>,
) -> Result<Json<SaldoReport>, ApiError> {
    let Query(params) = params?;
    let kind: SaldoKind = params.tipo.parse()?;
    let metrics = state.metrics().await?;
    Ok(Json(metrics.saldo(kind)))
}

async fn saldo_por_producto(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let metrics = state.metrics().await?;
    Ok(Json(metrics.saldo_por_producto()))
}

async fn metrics_summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let metrics = state.metrics().await?;
    Ok(Json(metrics.summary()))
}
