//! HTTP surface for the portfolio assistant.
//!
//! Question answering and search delegate to [`cartera_rag::RagService`];
//! balance figures come from [`cartera_rag::PortfolioMetrics`]. Both are
//! constructed on first use.

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{app_router, run_server};
pub use state::{AppState, OpenAIServiceFactory, ServiceFactory};
