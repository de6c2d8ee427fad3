//! End-to-end run of one scenario: synthetic history, forecast, plan and
//! evaluation.

use tracing::{debug, info, instrument};

use crate::config::ScenarioConfig;
use crate::dispatch::{DispatchPlan, DispatchPlanner};
use crate::economics::{EconomicSummary, evaluate_with};
use crate::error::Result;
use crate::features::{FeatureBuilder, TrainingSet};
use crate::forecast::{self, ForecastMetrics, ForecastModel};
use crate::series::ForecastSeries;

/// Everything one scenario run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Model fitted on the whole history and used for the forecast.
    pub model: ForecastModel,
    /// Holdout scores of a model fitted on the leading history only.
    pub metrics: ForecastMetrics,
    pub forecast: ForecastSeries,
    /// Forecast minus PV output; the load the plan was built for.
    pub net_load: ForecastSeries,
    pub plan: DispatchPlan,
    pub summary: EconomicSummary,
}

/// Runs `config` from history generation through economic evaluation.
///
/// # Errors
///
/// Returns the first configuration violation found by
/// [`ScenarioConfig::validate`], or any error raised by the stages.
pub fn run(config: &ScenarioConfig) -> Result<PipelineOutput> {
    if let Some(first) = config.validate().into_iter().next() {
        return Err(first);
    }
    run_validated(config)
}

/// [`run`] for a configuration the caller has already validated.
///
/// # Errors
///
/// Returns any error raised by the stages. An invalid `config` that slips
/// through surfaces as the error of the first stage it breaks.
#[instrument(skip_all, fields(seed = config.synthetic.seed))]
pub fn run_validated(config: &ScenarioConfig) -> Result<PipelineOutput> {
    let horizon = &config.horizon;
    let history_steps = horizon.history_steps();
    let mut history = config.synthetic.generate(
        horizon.history_start()?,
        horizon.step_minutes,
        history_steps + horizon.horizon_steps(),
    )?;
    info!(
        base_load_kw = config.synthetic.base_load_kw(),
        rows = history.weather.len(),
        "synthetic history generated"
    );

    let mut rows = FeatureBuilder::new(config.tariff.clone())
        .build(&history.weather, &config.synthetic.poi_counts());
    let horizon_rows = rows.split_off(history_steps);
    let horizon_weather = history.weather.split_off(history_steps);
    let training_set = TrainingSet::from_rows(rows, &history.load_kw[..history_steps])?;

    let fc = &config.forecast;
    let (_, metrics) = forecast::holdout(&training_set, fc.lambda, &fc.ridge, fc.train_fraction)?;
    let model = forecast::fit(&training_set, fc.lambda, &fc.ridge)?;
    let forecast = forecast::predict_series(&model, &horizon_rows, horizon.step_minutes)?;
    let net_load = config.pv.net_load(&forecast, &horizon_weather)?;
    debug!(
        forecast_peak_kw = forecast.peak_kw(),
        net_peak_kw = net_load.peak_kw(),
        "pv netted off forecast"
    );

    let tariff = config.tariff_schedule();
    let plan = DispatchPlanner::new(config.dispatch.thresholds.clone()).plan(
        &net_load,
        &tariff,
        &config.storage,
    )?;
    let summary = evaluate_with(&net_load, &plan, &tariff, &config.economics)?;

    Ok(PipelineOutput {
        model,
        metrics,
        forecast,
        net_load,
        plan,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_end_to_end() {
        let config = ScenarioConfig::demo();
        let out = run(&config).expect("demo pipeline");
        assert_eq!(out.forecast.len(), config.horizon.horizon_steps());
        assert_eq!(out.plan.len(), out.forecast.len());
        assert_eq!(out.forecast.start(), config.horizon.start);
        assert!(out.metrics.test_rows > 0);
        assert!(out.summary.baseline_cost > 0.0);
    }

    #[test]
    fn pv_lowers_the_planned_load() {
        let mut config = ScenarioConfig::demo();
        config.pv.capacity_kw = 2_000.0;
        let out = run(&config).expect("pipeline with pv");
        let generation: Vec<f64> = out
            .forecast
            .loads()
            .zip(out.net_load.loads())
            .map(|(gross, net)| gross - net)
            .collect();
        assert!(generation.iter().all(|&kw| (0.0..=2_000.0 + 1e-9).contains(&kw)));
        assert!(generation.iter().any(|&kw| kw > 0.0));
        assert!(
            out.plan
                .decisions()
                .iter()
                .zip(out.net_load.loads())
                .all(|(d, net)| d.load_kw == net)
        );

        let without = run(&ScenarioConfig::demo()).expect("pipeline without pv");
        assert_eq!(without.net_load, without.forecast);
        assert_eq!(without.forecast, out.forecast);
    }

    #[test]
    fn prevalidated_run_matches_checked_run() {
        let config = ScenarioConfig::tight_storage();
        assert!(config.validate().is_empty());
        let checked = run(&config).expect("checked run");
        let direct = run_validated(&config).expect("direct run");
        assert_eq!(checked.plan, direct.plan);
        assert_eq!(checked.summary, direct.summary);
    }

    #[test]
    fn invalid_scenario_is_rejected_before_running() {
        let mut config = ScenarioConfig::demo();
        config.horizon.history_days = 0;
        let err = run(&config).expect_err("no history");
        assert_eq!(err.field(), Some("horizon.history_days"));
    }
}
