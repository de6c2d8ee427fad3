//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchDecision;
use crate::economics::EconomicSummary;
use crate::forecast::ForecastMetrics;

/// Economic outcome of the plan together with forecast quality.
#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: EconomicSummary,
    pub metrics: ForecastMetrics,
    /// Number of planned steps.
    pub steps: usize,
    pub step_minutes: u32,
    /// State of charge after the last step (kWh).
    pub final_soc_kwh: Option<f64>,
}

/// One plan decision tagged with its step index.
///
/// Decision fields use the same names as the plan CSV columns.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: usize,
    #[serde(flatten)]
    pub decision: DispatchDecision,
}

/// Optional range query parameters for the plan endpoint.
#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    /// First step index (inclusive).
    pub from: Option<usize>,
    /// Last step index (inclusive).
    pub to: Option<usize>,
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
