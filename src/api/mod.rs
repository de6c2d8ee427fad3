//! REST API over the results of one scenario run.
//!
//! Provides three GET endpoints:
//! - `/summary`: economic summary and forecast holdout metrics
//! - `/model`: the fitted forecast model
//! - `/plan`: per-step dispatch decisions with optional range filtering

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::dispatch::DispatchPlan;
use crate::economics::EconomicSummary;
use crate::forecast::{ForecastMetrics, ForecastModel};
use crate::pipeline::PipelineOutput;

pub use types::{ErrorResponse, PlanQuery, PlanStep, SummaryResponse};

/// Immutable application state shared across all request handlers.
///
/// Built once after the pipeline completes and wrapped in `Arc`; all data
/// is read-only, so no locks are needed.
pub struct AppState {
    pub model: ForecastModel,
    pub metrics: ForecastMetrics,
    pub plan: DispatchPlan,
    pub summary: EconomicSummary,
}

impl From<PipelineOutput> for AppState {
    fn from(out: PipelineOutput) -> Self {
        Self {
            model: out.model,
            metrics: out.metrics,
            plan: out.plan,
            summary: out.summary,
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/summary", get(handlers::get_summary))
        .route("/model", get(handlers::get_model))
        .route("/plan", get(handlers::get_plan))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the server stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}
