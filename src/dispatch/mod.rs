//! Peak-shaving / valley-filling battery dispatch.

mod planner;
pub mod thresholds;

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use planner::{DispatchPlanner, plan};
pub use thresholds::{ThresholdPolicy, Thresholds, Window};

/// What the battery did during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Charge,
    Discharge,
    Idle,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Charge => "charge",
            Self::Discharge => "discharge",
            Self::Idle => "idle",
        })
    }
}

/// Battery decision for one timestep.
///
/// At most one of `charge_kw` and `discharge_kw` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub timestamp: NaiveDateTime,
    /// Forecast load before battery action (kW).
    pub load_kw: f64,
    pub action: Action,
    /// Grid-side charging power (kW, >= 0).
    pub charge_kw: f64,
    /// Discharging power (kW, >= 0).
    pub discharge_kw: f64,
    /// State of charge after the step (kWh).
    pub soc_kwh: f64,
    /// Grid import after battery action (kW).
    pub grid_import_kw: f64,
    /// Thresholds the decision was taken against.
    pub shave_threshold_kw: f64,
    pub fill_threshold_kw: f64,
}

impl fmt::Display for DispatchDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | load={:>9.2} kW  import={:>9.2} kW | {:<9} chg={:>8.2} dis={:>8.2} \
             | SoC={:>10.2} kWh | fill={:.2} shave={:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.load_kw,
            self.grid_import_kw,
            self.action,
            self.charge_kw,
            self.discharge_kw,
            self.soc_kwh,
            self.fill_threshold_kw,
            self.shave_threshold_kw,
        )
    }
}

/// Decisions for one horizon, aligned one-to-one with the forecast series.
///
/// Built whole by [`DispatchPlanner::plan`]; read-only afterwards. Plans
/// read back from JSON or CSV are checked with the same rules as
/// [`DispatchPlan::from_decisions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct DispatchPlan {
    step_minutes: u32,
    decisions: Vec<DispatchDecision>,
}

#[derive(Deserialize)]
struct RawPlan {
    step_minutes: u32,
    decisions: Vec<DispatchDecision>,
}

impl TryFrom<RawPlan> for DispatchPlan {
    type Error = Error;

    fn try_from(raw: RawPlan) -> Result<Self> {
        Self::from_decisions(raw.step_minutes, raw.decisions)
    }
}

/// Slack allowed in `grid_import = load + charge - discharge`.
const BALANCE_TOLERANCE: f64 = 1e-9;

impl DispatchPlan {
    pub(crate) fn new(step_minutes: u32, decisions: Vec<DispatchDecision>) -> Self {
        Self {
            step_minutes,
            decisions,
        }
    }

    /// Builds a plan from decisions produced elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` naming the first offending `plan[i].*` field
    /// when the plan is empty, a value is non-finite, a power or the state
    /// of charge is negative, a step both charges and discharges, the action
    /// disagrees with the powers, the grid import does not equal
    /// `load + charge - discharge`, or the timestamps are not
    /// `step_minutes` apart.
    pub fn from_decisions(step_minutes: u32, decisions: Vec<DispatchDecision>) -> Result<Self> {
        if step_minutes == 0 {
            return Err(Error::data("plan.step_minutes", "must be > 0"));
        }
        if decisions.is_empty() {
            return Err(Error::data("plan", "no decisions"));
        }
        for (i, d) in decisions.iter().enumerate() {
            check_decision(d)
                .map_err(|(field, message)| Error::data(format!("plan[{i}].{field}"), message))?;
        }
        let step = TimeDelta::minutes(i64::from(step_minutes));
        if let Some(i) = decisions
            .windows(2)
            .position(|w| w[1].timestamp - w[0].timestamp != step)
        {
            return Err(Error::data(
                format!("plan[{}].timestamp", i + 1),
                format!("expected a {step_minutes}-minute step"),
            ));
        }
        Ok(Self::new(step_minutes, decisions))
    }

    pub fn decisions(&self) -> &[DispatchDecision] {
        &self.decisions
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn step_hours(&self) -> f64 {
        f64::from(self.step_minutes) / 60.0
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.decisions.iter().map(|d| d.timestamp)
    }

    pub fn grid_import_kw(&self) -> impl Iterator<Item = f64> + '_ {
        self.decisions.iter().map(|d| d.grid_import_kw)
    }

    pub fn peak_import_kw(&self) -> f64 {
        self.grid_import_kw().fold(f64::NEG_INFINITY, f64::max)
    }

    /// State of charge after the last step.
    pub fn final_soc_kwh(&self) -> Option<f64> {
        self.decisions.last().map(|d| d.soc_kwh)
    }

    /// Grid energy drawn into the battery (kWh).
    pub fn energy_charged_kwh(&self) -> f64 {
        self.decisions.iter().map(|d| d.charge_kw).sum::<f64>() * self.step_hours()
    }

    /// Energy released by the battery (kWh).
    pub fn energy_discharged_kwh(&self) -> f64 {
        self.decisions.iter().map(|d| d.discharge_kw).sum::<f64>() * self.step_hours()
    }
}

fn check_decision(d: &DispatchDecision) -> std::result::Result<(), (&'static str, String)> {
    for (field, value) in [
        ("load_kw", d.load_kw),
        ("charge_kw", d.charge_kw),
        ("discharge_kw", d.discharge_kw),
        ("soc_kwh", d.soc_kwh),
        ("grid_import_kw", d.grid_import_kw),
        ("shave_threshold_kw", d.shave_threshold_kw),
        ("fill_threshold_kw", d.fill_threshold_kw),
    ] {
        if !value.is_finite() {
            return Err((field, format!("must be finite, got {value}")));
        }
    }
    for (field, value) in [
        ("charge_kw", d.charge_kw),
        ("discharge_kw", d.discharge_kw),
        ("soc_kwh", d.soc_kwh),
    ] {
        if value < 0.0 {
            return Err((field, format!("must be >= 0, got {value}")));
        }
    }
    if d.charge_kw > 0.0 && d.discharge_kw > 0.0 {
        return Err(("discharge_kw", "cannot charge and discharge in one step".into()));
    }
    let expected = match (d.charge_kw > 0.0, d.discharge_kw > 0.0) {
        (true, _) => Action::Charge,
        (_, true) => Action::Discharge,
        _ => Action::Idle,
    };
    if d.action != expected {
        return Err((
            "action",
            format!("{} does not match the powers, expected {expected}", d.action),
        ));
    }
    let balance = d.load_kw + d.charge_kw - d.discharge_kw;
    let scale = d.load_kw.abs() + d.charge_kw + d.discharge_kw;
    if (d.grid_import_kw - balance).abs() > BALANCE_TOLERANCE * scale.max(1.0) {
        return Err((
            "grid_import_kw",
            format!("{} != load + charge - discharge = {balance}", d.grid_import_kw),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn decision(hour: u32, load_kw: f64, charge_kw: f64, discharge_kw: f64) -> DispatchDecision {
        let action = if charge_kw > 0.0 {
            Action::Charge
        } else if discharge_kw > 0.0 {
            Action::Discharge
        } else {
            Action::Idle
        };
        DispatchDecision {
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|d| d.and_hms_opt(hour, 0, 0))
                .expect("valid timestamp"),
            load_kw,
            action,
            charge_kw,
            discharge_kw,
            soc_kwh: 10.0,
            grid_import_kw: load_kw + charge_kw - discharge_kw,
            shave_threshold_kw: 40.0,
            fill_threshold_kw: 20.0,
        }
    }

    #[test]
    fn consistent_decisions_build_a_plan() {
        let plan = DispatchPlan::from_decisions(
            60,
            vec![decision(0, 10.0, 5.0, 0.0), decision(1, 50.0, 0.0, 7.0)],
        )
        .expect("valid plan");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.energy_discharged_kwh(), 7.0);
    }

    #[test]
    fn simultaneous_charge_and_discharge_is_rejected() {
        let mut d = decision(0, 10.0, 5.0, 0.0);
        d.discharge_kw = 7.0;
        d.grid_import_kw = 8.0;
        let err = DispatchPlan::from_decisions(60, vec![d]).expect_err("both directions");
        assert!(err.is_data());
        assert_eq!(err.field(), Some("plan[0].discharge_kw"));
    }

    #[test]
    fn negative_soc_and_broken_balance_are_rejected() {
        let mut low = decision(0, 10.0, 0.0, 0.0);
        low.soc_kwh = -3.0;
        let err = DispatchPlan::from_decisions(60, vec![low]).expect_err("negative SoC");
        assert_eq!(err.field(), Some("plan[0].soc_kwh"));

        let mut off = decision(1, 10.0, 5.0, 0.0);
        off.grid_import_kw = 12.0;
        let err = DispatchPlan::from_decisions(60, vec![decision(0, 1.0, 0.0, 0.0), off])
            .expect_err("import off balance");
        assert_eq!(err.field(), Some("plan[1].grid_import_kw"));
    }

    #[test]
    fn action_must_match_powers() {
        let mut d = decision(0, 10.0, 5.0, 0.0);
        d.action = Action::Idle;
        let err = DispatchPlan::from_decisions(60, vec![d]).expect_err("wrong action");
        assert_eq!(err.field(), Some("plan[0].action"));
    }

    #[test]
    fn invalid_plan_json_fails_to_deserialize() {
        let valid = DispatchPlan::from_decisions(60, vec![decision(0, 10.0, 5.0, 0.0)])
            .expect("valid plan");
        let json = serde_json::to_string(&valid).expect("serialize");
        assert_eq!(serde_json::from_str::<DispatchPlan>(&json).ok(), Some(valid));

        let broken = json
            .replace("\"discharge_kw\":0.0", "\"discharge_kw\":7.0")
            .replace("\"soc_kwh\":10.0", "\"soc_kwh\":-3.0");
        assert!(serde_json::from_str::<DispatchPlan>(&broken).is_err());
    }

    #[test]
    fn gap_between_steps_is_rejected() {
        let err = DispatchPlan::from_decisions(
            60,
            vec![decision(0, 1.0, 0.0, 0.0), decision(2, 1.0, 0.0, 0.0)],
        )
        .expect_err("gap");
        assert_eq!(err.field(), Some("plan[1].timestamp"));
    }
}
