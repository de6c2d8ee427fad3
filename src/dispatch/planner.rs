//! Threshold-based planner: a single ordered fold carrying the state of charge.

use tracing::{debug, info, instrument};

use super::thresholds::{ThresholdPolicy, Thresholds};
use super::{Action, DispatchDecision, DispatchPlan};
use crate::error::Result;
use crate::series::{ForecastPoint, ForecastSeries};
use crate::storage::StorageAsset;
use crate::tariff::TariffSchedule;

/// Plans with the default policy (80th/20th percentile per day).
///
/// # Errors
///
/// See [`DispatchPlanner::plan`].
pub fn plan(
    series: &ForecastSeries,
    tariff: &TariffSchedule,
    storage: &StorageAsset,
) -> Result<DispatchPlan> {
    DispatchPlanner::default().plan(series, tariff, storage)
}

/// Peak-shaving / valley-filling planner.
///
/// Discharges while the forecast load is strictly above the shave threshold
/// and charges while it is strictly below the fill threshold. Requests that
/// exceed the rate limits, the stored energy or the remaining headroom are
/// clamped, so every plan is feasible.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchPlanner {
    policy: ThresholdPolicy,
}

impl DispatchPlanner {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Produces one decision per step of `series`.
    ///
    /// All inputs are validated before the first step is taken.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the storage parameters or threshold policy
    /// are invalid, or `tariff` does not price every step of `series`.
    #[instrument(skip_all, fields(steps = series.len(), start = %series.start()))]
    pub fn plan(
        &self,
        series: &ForecastSeries,
        tariff: &TariffSchedule,
        storage: &StorageAsset,
    ) -> Result<DispatchPlan> {
        storage.validate()?;
        tariff.prices_for(series)?;
        let thresholds = self.policy.resolve(series)?;

        let dt = series.step_hours();
        let decisions: Vec<DispatchDecision> = series
            .points()
            .iter()
            .zip(&thresholds)
            .scan(storage.initial_soc_kwh, |soc, (point, t)| {
                let decision = step(*soc, point, *t, storage, dt);
                *soc = decision.soc_kwh;
                Some(decision)
            })
            .collect();

        let plan = DispatchPlan::new(series.step_minutes(), decisions);
        info!(
            peak_load_kw = series.peak_kw(),
            peak_import_kw = plan.peak_import_kw(),
            charged_kwh = plan.energy_charged_kwh(),
            discharged_kwh = plan.energy_discharged_kwh(),
            "dispatch plan ready"
        );
        Ok(plan)
    }
}

/// One transition of the state-of-charge machine.
fn step(
    soc: f64,
    point: &ForecastPoint,
    t: Thresholds,
    storage: &StorageAsset,
    dt: f64,
) -> DispatchDecision {
    let load = point.load_kw;
    let mut charge = 0.0;
    let mut discharge = 0.0;

    if load > t.shave_kw {
        // Never discharge below zero import.
        discharge = storage
            .max_discharge_kw
            .min(((soc - storage.min_soc_kwh()) / dt).max(0.0))
            .min(load - t.shave_kw)
            .min(load.max(0.0));
    } else if load < t.fill_kw {
        charge = storage
            .max_charge_kw
            .min(((storage.max_soc_kwh() - soc) / dt).max(0.0))
            .min(t.fill_kw - load);
    }

    let next_soc = (soc + charge * dt * storage.efficiency - discharge * dt)
        .clamp(0.0, storage.capacity_kwh);

    let action = if discharge > 0.0 {
        Action::Discharge
    } else if charge > 0.0 {
        Action::Charge
    } else {
        Action::Idle
    };
    if action == Action::Idle && (load > t.shave_kw || load < t.fill_kw) {
        debug!(timestamp = %point.timestamp, load, soc, "threshold crossed but battery cannot act");
    }

    DispatchDecision {
        timestamp: point.timestamp,
        load_kw: load,
        action,
        charge_kw: charge,
        discharge_kw: discharge,
        soc_kwh: next_soc,
        grid_import_kw: load + charge - discharge,
        shave_threshold_kw: t.shave_kw,
        fill_threshold_kw: t.fill_kw,
    }
}
