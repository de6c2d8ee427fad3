use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A stationary battery the planner dispatches.
///
/// Rates are powers (kW) sustained over a whole step; energy moved in a step
/// is the rate times the step length. Round-trip losses are charged on the
/// way in: storing `c` kWh from the grid raises the state of charge by
/// `c * efficiency`.
///
/// # Examples
///
/// ```
/// use vpp_dispatch::storage::StorageAsset;
///
/// let asset = StorageAsset::new(100.0, 30.0, 30.0, 0.9, 0.0);
/// assert!(asset.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageAsset {
    /// Usable energy capacity (kWh, > 0).
    pub capacity_kwh: f64,
    /// Maximum charging power (kW, > 0).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW, > 0).
    pub max_discharge_kw: f64,
    /// Round-trip efficiency η in (0, 1].
    pub efficiency: f64,
    /// State of charge before the first step (kWh, 0..=capacity).
    pub initial_soc_kwh: f64,
    /// Discharging stops at this share of capacity.
    pub min_soc_fraction: f64,
    /// Charging stops at this share of capacity.
    pub max_soc_fraction: f64,
}

impl Default for StorageAsset {
    /// 15 MWh / 3 MW industrial-park battery, starting at 60 %.
    fn default() -> Self {
        Self {
            capacity_kwh: 15_000.0,
            max_charge_kw: 3_000.0,
            max_discharge_kw: 3_000.0,
            efficiency: 0.9,
            initial_soc_kwh: 9_000.0,
            min_soc_fraction: 0.0,
            max_soc_fraction: 1.0,
        }
    }
}

impl StorageAsset {
    pub fn new(
        capacity_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        efficiency: f64,
        initial_soc_kwh: f64,
    ) -> Self {
        Self {
            capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
            efficiency,
            initial_soc_kwh,
            min_soc_fraction: 0.0,
            max_soc_fraction: 1.0,
        }
    }

    /// Restricts operation to `[min, max]` as shares of capacity.
    pub fn with_soc_window(mut self, min: f64, max: f64) -> Self {
        self.min_soc_fraction = min;
        self.max_soc_fraction = max;
        self
    }

    /// Lowest state of charge discharging may reach (kWh).
    pub fn min_soc_kwh(&self) -> f64 {
        self.min_soc_fraction * self.capacity_kwh
    }

    /// Highest state of charge charging may reach (kWh).
    pub fn max_soc_kwh(&self) -> f64 {
        self.max_soc_fraction * self.capacity_kwh
    }

    /// Checks every parameter, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending `storage.*` field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("storage.capacity_kwh", self.capacity_kwh),
            ("storage.max_charge_kw", self.max_charge_kw),
            ("storage.max_discharge_kw", self.max_discharge_kw),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::config(
                    field,
                    format!("must be finite and > 0, got {value}"),
                ));
            }
        }
        if !(self.efficiency > 0.0 && self.efficiency <= 1.0) {
            return Err(Error::config(
                "storage.efficiency",
                format!("must be in (0, 1], got {}", self.efficiency),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_soc_fraction) {
            return Err(Error::config(
                "storage.min_soc_fraction",
                format!("must be in [0, 1], got {}", self.min_soc_fraction),
            ));
        }
        if !(self.max_soc_fraction <= 1.0 && self.max_soc_fraction > self.min_soc_fraction) {
            return Err(Error::config(
                "storage.max_soc_fraction",
                format!(
                    "must be in ({}, 1], got {}",
                    self.min_soc_fraction, self.max_soc_fraction
                ),
            ));
        }
        if !(0.0..=self.capacity_kwh).contains(&self.initial_soc_kwh) {
            return Err(Error::config(
                "storage.initial_soc_kwh",
                format!(
                    "must be in [0, {}], got {}",
                    self.capacity_kwh, self.initial_soc_kwh
                ),
            ));
        }
        Ok(())
    }
}
