//! Baseline-versus-dispatch cost comparison.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dispatch::DispatchPlan;
use crate::error::{Error, Result};
use crate::series::ForecastSeries;
use crate::tariff::{Period, TariffSchedule};

/// Resale terms of the energy delivered to the region.
///
/// # Examples
///
/// ```
/// use vpp_dispatch::economics::Pricing;
///
/// let pricing = Pricing::default();
/// assert_eq!(pricing.markup, 1.10);
/// assert!(pricing.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pricing {
    /// Sales price as a multiple of the grid price.
    pub markup: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self { markup: 1.10 }
    }
}

impl Pricing {
    /// # Errors
    ///
    /// Returns `Error::Config` if the markup is not finite and positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.markup.is_finite() && self.markup > 0.0) {
            return Err(Error::config(
                "economics.markup",
                format!("must be finite and > 0, got {}", self.markup),
            ));
        }
        Ok(())
    }
}

/// Economic effect of a dispatch plan over one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicSummary {
    /// Cost of importing the forecast load with no storage.
    pub baseline_cost: f64,
    /// Cost of the grid import left after battery action.
    pub dispatched_cost: f64,
    /// `baseline_cost - dispatched_cost`.
    pub savings: f64,
    /// `max(load) - max(grid import)` (kW).
    pub peak_demand_reduction_kw: f64,
    pub baseline_peak_kw: f64,
    pub dispatched_peak_kw: f64,
    pub energy_charged_kwh: f64,
    pub energy_discharged_kwh: f64,
    /// Sales of the delivered load at the marked-up price, without storage.
    pub baseline_revenue: f64,
    /// Sales of the delivered load (`import - charge + discharge`) with the plan.
    pub dispatched_revenue: f64,
    /// `baseline_revenue - baseline_cost`.
    pub baseline_margin: f64,
    /// `dispatched_revenue - dispatched_cost`.
    pub dispatched_margin: f64,
    /// Import avoided during peak-period hours (kWh), time-of-use tariffs only.
    pub peak_period_import_reduction_kwh: Option<f64>,
}

impl fmt::Display for EconomicSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Economic Summary ---")?;
        writeln!(f, "Baseline cost:          {:.2}", self.baseline_cost)?;
        writeln!(f, "Dispatched cost:        {:.2}", self.dispatched_cost)?;
        writeln!(f, "Savings:                {:.2}", self.savings)?;
        writeln!(
            f,
            "Peak demand:            {:.2} kW -> {:.2} kW (-{:.2} kW)",
            self.baseline_peak_kw, self.dispatched_peak_kw, self.peak_demand_reduction_kw
        )?;
        writeln!(
            f,
            "Revenue:                {:.2} -> {:.2}",
            self.baseline_revenue, self.dispatched_revenue
        )?;
        writeln!(
            f,
            "Margin:                 {:.2} -> {:.2}",
            self.baseline_margin, self.dispatched_margin
        )?;
        write!(
            f,
            "Battery energy:         {:.2} kWh in, {:.2} kWh out",
            self.energy_charged_kwh, self.energy_discharged_kwh
        )?;
        if let Some(kwh) = self.peak_period_import_reduction_kwh {
            write!(f, "\nPeak-period import cut: {kwh:.2} kWh")?;
        }
        Ok(())
    }
}

/// Compares the cost of serving `series` without storage to the cost of the
/// grid import left by `plan`, at the default [`Pricing`].
///
/// # Errors
///
/// Returns `Error::Config` if `plan` does not cover exactly the steps and
/// loads of `series`, or `tariff` misses one of them.
pub fn evaluate(
    series: &ForecastSeries,
    plan: &DispatchPlan,
    tariff: &TariffSchedule,
) -> Result<EconomicSummary> {
    evaluate_with(series, plan, tariff, &Pricing::default())
}

/// [`evaluate`] with explicit resale terms.
///
/// # Errors
///
/// As [`evaluate`], plus `Error::Config` for an invalid `pricing`.
pub fn evaluate_with(
    series: &ForecastSeries,
    plan: &DispatchPlan,
    tariff: &TariffSchedule,
    pricing: &Pricing,
) -> Result<EconomicSummary> {
    pricing.validate()?;
    if plan.len() != series.len() {
        return Err(Error::config(
            "plan",
            format!("{} decisions for {} forecast steps", plan.len(), series.len()),
        ));
    }
    if plan.step_minutes() != series.step_minutes() {
        return Err(Error::config(
            "plan.step_minutes",
            format!(
                "plan step {} min, forecast step {} min",
                plan.step_minutes(),
                series.step_minutes()
            ),
        ));
    }
    if let Some((i, (a, b))) = series
        .timestamps()
        .zip(plan.timestamps())
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(Error::config(
            format!("plan[{i}].timestamp"),
            format!("plan has {b}, forecast has {a}"),
        ));
    }
    if let Some((i, (p, d))) = series
        .points()
        .iter()
        .zip(plan.decisions())
        .enumerate()
        .find(|(_, (p, d))| p.load_kw != d.load_kw)
    {
        return Err(Error::config(
            format!("plan[{i}].load_kw"),
            format!("plan has {} kW, forecast has {} kW", d.load_kw, p.load_kw),
        ));
    }
    let prices = tariff.prices_for(series)?;

    let dt = series.step_hours();
    let mut baseline_cost = 0.0;
    let mut dispatched_cost = 0.0;
    let mut baseline_revenue = 0.0;
    let mut dispatched_revenue = 0.0;
    let mut peak_period_cut = 0.0;
    for ((point, decision), price) in series.points().iter().zip(plan.decisions()).zip(&prices) {
        let sales_price = price * pricing.markup;
        let delivered_kw = decision.grid_import_kw - decision.charge_kw + decision.discharge_kw;
        baseline_cost += price * point.load_kw * dt;
        dispatched_cost += price * decision.grid_import_kw * dt;
        baseline_revenue += sales_price * point.load_kw * dt;
        dispatched_revenue += sales_price * delivered_kw * dt;
        if tariff.period_at(point.timestamp) == Some(Period::Peak) {
            peak_period_cut += ((point.load_kw - decision.grid_import_kw) * dt).max(0.0);
        }
    }

    let baseline_peak_kw = series.peak_kw();
    let dispatched_peak_kw = plan.peak_import_kw();
    let summary = EconomicSummary {
        baseline_cost,
        dispatched_cost,
        savings: baseline_cost - dispatched_cost,
        peak_demand_reduction_kw: baseline_peak_kw - dispatched_peak_kw,
        baseline_peak_kw,
        dispatched_peak_kw,
        energy_charged_kwh: plan.energy_charged_kwh(),
        energy_discharged_kwh: plan.energy_discharged_kwh(),
        baseline_revenue,
        dispatched_revenue,
        baseline_margin: baseline_revenue - baseline_cost,
        dispatched_margin: dispatched_revenue - dispatched_cost,
        peak_period_import_reduction_kwh: matches!(tariff, TariffSchedule::TimeOfUse(_))
            .then_some(peak_period_cut),
    };
    info!(
        savings = summary.savings,
        margin = summary.dispatched_margin,
        peak_reduction_kw = summary.peak_demand_reduction_kw,
        "economic evaluation complete"
    );
    Ok(summary)
}
