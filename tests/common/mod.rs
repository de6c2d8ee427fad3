//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use vpp_dispatch::dispatch::{DispatchPlan, DispatchPlanner, ThresholdPolicy};
use vpp_dispatch::series::ForecastSeries;
use vpp_dispatch::storage::StorageAsset;
use vpp_dispatch::tariff::{TariffSchedule, TouTariff};

/// Midnight, 1 June 2024.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid timestamp")
}

/// Timestamp `h` hours after [`start`].
pub fn hour(h: i64) -> NaiveDateTime {
    start() + TimeDelta::hours(h)
}

/// Hourly forecast series from [`start`].
pub fn hourly(loads: Vec<f64>) -> ForecastSeries {
    ForecastSeries::from_loads(start(), 60, loads).expect("valid series")
}

/// Same price at every hour.
pub fn flat_tariff(price: f64) -> TariffSchedule {
    TouTariff::flat(price).into()
}

/// 100 kWh battery, 30 kW both ways, 90 % efficient, empty.
pub fn small_battery() -> StorageAsset {
    StorageAsset::new(100.0, 30.0, 30.0, 0.9, 0.0)
}

/// Planner with fixed shave/fill thresholds (kW).
pub fn fixed_planner(shave_kw: f64, fill_kw: f64) -> DispatchPlanner {
    DispatchPlanner::new(ThresholdPolicy::Fixed { shave_kw, fill_kw })
}

/// Asserts every decision respects the battery's physical limits.
pub fn assert_feasible(plan: &DispatchPlan, storage: &StorageAsset) {
    let eps = 1e-9;
    for (i, d) in plan.decisions().iter().enumerate() {
        assert!(
            d.soc_kwh >= -eps && d.soc_kwh <= storage.capacity_kwh + eps,
            "step {i}: SoC {} outside [0, {}]",
            d.soc_kwh,
            storage.capacity_kwh
        );
        assert!(
            (0.0..=storage.max_charge_kw + eps).contains(&d.charge_kw),
            "step {i}: charge {} exceeds {}",
            d.charge_kw,
            storage.max_charge_kw
        );
        assert!(
            (0.0..=storage.max_discharge_kw + eps).contains(&d.discharge_kw),
            "step {i}: discharge {} exceeds {}",
            d.discharge_kw,
            storage.max_discharge_kw
        );
        assert!(
            d.charge_kw == 0.0 || d.discharge_kw == 0.0,
            "step {i}: charging and discharging at once"
        );
        assert!(
            d.load_kw < 0.0 || d.grid_import_kw >= -eps,
            "step {i}: negative import {}",
            d.grid_import_kw
        );
    }
}
