//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, PlanQuery, PlanStep, SummaryResponse};
use crate::forecast::ForecastModel;

/// `GET /summary` → 200 + `SummaryResponse` JSON
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    Json(SummaryResponse {
        summary: state.summary,
        metrics: state.metrics,
        steps: state.plan.len(),
        step_minutes: state.plan.step_minutes(),
        final_soc_kwh: state.plan.final_soc_kwh(),
    })
}

/// `GET /model` → 200 + `ForecastModel` JSON
pub async fn get_model(State(state): State<Arc<AppState>>) -> Json<ForecastModel> {
    Json(state.model.clone())
}

/// Returns plan steps, optionally filtered by step index.
///
/// `GET /plan` → 200 + `Vec<PlanStep>` JSON
/// `GET /plan?from=N&to=M` → filtered range (inclusive)
/// `GET /plan?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlanQuery>,
) -> impl IntoResponse {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(usize::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    let steps: Vec<PlanStep> = state
        .plan
        .decisions()
        .iter()
        .enumerate()
        .filter(|(i, _)| (from..=to).contains(i))
        .map(|(step, d)| PlanStep {
            step,
            decision: *d,
        })
        .collect();

    Ok(Json(steps))
}
