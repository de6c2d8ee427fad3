//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::dispatch::{ThresholdPolicy, Window};
use crate::economics::Pricing;
use crate::error::{Error, Result};
use crate::forecast::RidgeOptions;
use crate::pv::PvArray;
use crate::storage::StorageAsset;
use crate::synthetic::SyntheticRegion;
use crate::tariff::{TariffSchedule, TouTariff};

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults matching the `demo` scenario. Load from TOML
/// with [`ScenarioConfig::from_toml_file`] or pick a built-in preset with
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// History and planning horizon layout.
    pub horizon: HorizonConfig,
    /// Ridge forecaster settings.
    pub forecast: ForecastConfig,
    /// Planner threshold policy.
    pub dispatch: DispatchConfig,
    /// Battery parameters.
    pub storage: StorageAsset,
    /// Time-of-use tariff.
    pub tariff: TouTariff,
    /// On-site PV netted off the forecast before planning.
    pub pv: PvArray,
    /// Resale markup for revenue and margin.
    pub economics: Pricing,
    /// Synthetic region driving the demo inputs.
    pub synthetic: SyntheticRegion,
}

/// History and planning horizon layout.
///
/// Training history covers the `history_days` before `start`; the plan
/// covers the `horizon_days` from `start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HorizonConfig {
    /// First planned step, e.g. `"2024-06-15T00:00:00"`.
    pub start: NaiveDateTime,
    /// Step length in minutes (must divide a day).
    pub step_minutes: u32,
    pub history_days: u32,
    pub horizon_days: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 6, 15)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            step_minutes: 60,
            history_days: 14,
            horizon_days: 1,
        }
    }
}

impl HorizonConfig {
    pub fn steps_per_day(&self) -> usize {
        (24 * 60 / self.step_minutes.max(1)) as usize
    }

    pub fn history_steps(&self) -> usize {
        self.steps_per_day() * self.history_days as usize
    }

    pub fn horizon_steps(&self) -> usize {
        self.steps_per_day() * self.horizon_days as usize
    }

    /// Timestamp of the first history step.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the history reaches before the earliest
    /// representable date.
    pub fn history_start(&self) -> Result<NaiveDateTime> {
        TimeDelta::try_days(i64::from(self.history_days))
            .and_then(|back| self.start.checked_sub_signed(back))
            .ok_or_else(|| {
                Error::config(
                    "horizon.start",
                    format!(
                        "{} history days before {} is out of range",
                        self.history_days, self.start
                    ),
                )
            })
    }

    /// First timestamp after the planned horizon.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the horizon runs past the latest
    /// representable date.
    pub fn horizon_end(&self) -> Result<NaiveDateTime> {
        TimeDelta::try_days(i64::from(self.horizon_days))
            .and_then(|ahead| self.start.checked_add_signed(ahead))
            .ok_or_else(|| {
                Error::config(
                    "horizon.start",
                    format!(
                        "{} horizon days after {} is out of range",
                        self.horizon_days, self.start
                    ),
                )
            })
    }
}

/// Longest training history accepted, in days.
pub const MAX_HISTORY_DAYS: u32 = 3_660;
/// Longest planning horizon accepted, in days.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Ridge forecaster settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Requested regularization strength (>= 0).
    pub lambda: f64,
    /// Leading share of the history used for training; the rest is held out.
    pub train_fraction: f64,
    pub ridge: RidgeOptions,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            train_fraction: 0.75,
            ridge: RidgeOptions::default(),
        }
    }
}

/// Planner settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub thresholds: ThresholdPolicy,
}

impl ScenarioConfig {
    /// Returns the demo scenario: two weeks of hourly history, one planned day.
    pub fn demo() -> Self {
        Self::default()
    }

    /// Returns the industrial-park preset: manufacturing-heavy region with
    /// rooftop PV, a larger battery kept between 20 % and 90 % charge, and
    /// two planned days sharing one threshold window.
    pub fn industrial_park() -> Self {
        Self {
            horizon: HorizonConfig {
                step_minutes: 30,
                history_days: 21,
                horizon_days: 2,
                ..HorizonConfig::default()
            },
            dispatch: DispatchConfig {
                thresholds: ThresholdPolicy::Percentile {
                    shave_percentile: 85.0,
                    fill_percentile: 25.0,
                    window: Window::Horizon,
                },
            },
            storage: StorageAsset::new(30_000.0, 6_000.0, 6_000.0, 0.92, 15_000.0)
                .with_soc_window(0.2, 0.9),
            pv: PvArray::new(5_000.0),
            synthetic: SyntheticRegion {
                poi: [
                    ("logistics", 15),
                    ("manufacturing", 30),
                    ("office", 5),
                    ("retail_catering", 4),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
                registered_capital: 120.0,
                ..SyntheticRegion::default()
            },
            ..Self::default()
        }
    }

    /// Returns the tight-storage preset: a small, slow battery that runs out
    /// before the peak is fully shaved.
    pub fn tight_storage() -> Self {
        Self {
            dispatch: DispatchConfig {
                thresholds: ThresholdPolicy::Percentile {
                    shave_percentile: 70.0,
                    fill_percentile: 30.0,
                    window: Window::Day,
                },
            },
            storage: StorageAsset::new(1_500.0, 400.0, 400.0, 0.85, 0.0),
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo", "industrial_park", "tight_storage"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self> {
        match name {
            "demo" => Ok(Self::demo()),
            "industrial_park" => Ok(Self::industrial_park()),
            "tight_storage" => Ok(Self::tight_storage()),
            _ => Err(Error::config(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::config("toml", e.to_string()))
    }

    /// The configured tariff as a schedule.
    pub fn tariff_schedule(&self) -> TariffSchedule {
        self.tariff.clone().into()
    }

    /// Validates all sections and returns every violation.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        let h = &self.horizon;

        if h.step_minutes == 0 || (24 * 60) % h.step_minutes != 0 {
            errors.push(Error::config(
                "horizon.step_minutes",
                format!("must be > 0 and divide 1440, got {}", h.step_minutes),
            ));
        }
        let mut days_in_range = true;
        for (field, days, max) in [
            ("horizon.history_days", h.history_days, MAX_HISTORY_DAYS),
            ("horizon.horizon_days", h.horizon_days, MAX_HORIZON_DAYS),
        ] {
            if !(1..=max).contains(&days) {
                days_in_range = false;
                errors.push(Error::config(
                    field,
                    format!("must be in [1, {max}], got {days}"),
                ));
            }
        }
        if days_in_range {
            if let Err(e) = h.history_start().and_then(|_| h.horizon_end()) {
                errors.push(e);
            }
        }

        let f = &self.forecast;
        if !(f.lambda.is_finite() && f.lambda >= 0.0) {
            errors.push(Error::config("forecast.lambda", "must be finite and >= 0"));
        }
        if !(f.train_fraction > 0.0 && f.train_fraction < 1.0) {
            errors.push(Error::config("forecast.train_fraction", "must be in (0, 1)"));
        }

        let checks = [
            f.ridge.validate(),
            self.dispatch.thresholds.validate(),
            self.storage.validate(),
            self.tariff_schedule().validate(),
            self.pv.validate(),
            self.economics.validate(),
            self.synthetic.validate(),
        ];
        errors.extend(checks.into_iter().filter_map(Result::err));

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_preset_valid() {
        let cfg = ScenarioConfig::demo();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "demo should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent").expect_err("unknown preset");
        assert_eq!(err.field(), Some("preset"));
        assert!(err.to_string().contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn tight_storage_has_smaller_battery() {
        let demo = ScenarioConfig::demo();
        let tight = ScenarioConfig::tight_storage();
        assert!(tight.storage.capacity_kwh < demo.storage.capacity_kwh);
        assert!(tight.storage.max_discharge_kw < demo.storage.max_discharge_kw);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[horizon]
start = "2024-07-01T00:00:00"
step_minutes = 15
history_days = 7
horizon_days = 2

[forecast]
lambda = 0.5
train_fraction = 0.8

[forecast.ridge]
max_backoff_attempts = 4

[dispatch.thresholds]
mode = "fixed"
shave_kw = 14000.0
fill_kw = 11000.0

[storage]
capacity_kwh = 5000.0
max_charge_kw = 1000.0
max_discharge_kw = 1000.0
efficiency = 0.95
initial_soc_kwh = 2500.0

[tariff]
flat_price = 0.7

[tariff.peak]
hours = [18, 19, 20]
price = 1.5

[synthetic]
seed = 7
poi = { manufacturing = 3, office = 10 }
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.horizon.step_minutes, 15);
        assert_eq!(cfg.horizon.horizon_steps(), 192);
        assert_eq!(cfg.forecast.ridge.max_backoff_attempts, 4);
        assert_eq!(
            cfg.dispatch.thresholds,
            ThresholdPolicy::Fixed {
                shave_kw: 14_000.0,
                fill_kw: 11_000.0
            }
        );
        assert_eq!(cfg.tariff.peak.price, 1.5);
        // Valley kept from the default tariff.
        assert_eq!(cfg.tariff.valley, TouTariff::default().valley);
        assert_eq!(cfg.synthetic.poi.get("office"), Some(&10));
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[storage]
capacity_kwh = 100.0
bogus_field = true
"#;
        let err = ScenarioConfig::from_toml_str(toml).expect_err("unknown field");
        assert_eq!(err.field(), Some("toml"));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[synthetic]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("partial TOML");
        assert_eq!(cfg.synthetic.seed, 99);
        assert_eq!(cfg.horizon, HorizonConfig::default());
        assert_eq!(cfg.storage, StorageAsset::default());
    }

    #[test]
    fn validation_reports_every_violation() {
        let mut cfg = ScenarioConfig::demo();
        cfg.horizon.step_minutes = 7;
        cfg.forecast.train_fraction = 1.0;
        cfg.storage.efficiency = 0.0;
        let errors = cfg.validate();
        let fields: Vec<_> = errors.iter().filter_map(Error::field).collect();
        assert_eq!(
            fields,
            [
                "horizon.step_minutes",
                "forecast.train_fraction",
                "storage.efficiency"
            ]
        );
    }

    #[test]
    fn horizon_layout() {
        let h = HorizonConfig::default();
        assert_eq!(h.steps_per_day(), 24);
        assert_eq!(h.history_steps(), 14 * 24);
        assert_eq!(
            h.history_start().expect("in range").date(),
            NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
        );
    }

    #[test]
    fn oversized_history_is_rejected() {
        let cfg = ScenarioConfig::from_toml_str("[horizon]\nhistory_days = 200000000\n")
            .expect("parses");
        let errors = cfg.validate();
        let fields: Vec<_> = errors.iter().filter_map(Error::field).collect();
        assert_eq!(fields, ["horizon.history_days"]);
    }

    #[test]
    fn horizon_past_the_calendar_is_rejected() {
        let mut cfg = ScenarioConfig::demo();
        cfg.horizon.start = NaiveDate::MAX
            .and_hms_opt(0, 0, 0)
            .expect("valid timestamp");
        let errors = cfg.validate();
        assert!(
            errors.iter().any(|e| e.field() == Some("horizon.start")),
            "{errors:?}"
        );
        assert!(cfg.horizon.horizon_end().is_err());

        cfg.horizon.start = NaiveDate::MIN
            .and_hms_opt(0, 0, 0)
            .expect("valid timestamp");
        assert!(cfg.horizon.history_start().is_err_and(|e| e.is_config()));
    }

    #[test]
    fn pv_business_and_markup_sections_parse() {
        let toml = r#"
[storage]
min_soc_fraction = 0.2
max_soc_fraction = 0.9

[pv]
capacity_kw = 800.0

[economics]
markup = 1.25

[[synthetic.businesses]]
name = "Harbor Cold Chain"
credit_code = "91310000MA1K"
scope = "refrigerated warehousing"
registered_capital = 500.0
scale = "L"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.pv.capacity_kw, 800.0);
        assert_eq!(cfg.pv.conversion_efficiency, 0.2);
        assert_eq!(cfg.economics.markup, 1.25);
        assert_eq!(cfg.storage.min_soc_kwh(), 0.2 * cfg.storage.capacity_kwh);
        assert_eq!(cfg.synthetic.businesses.len(), 1);
        assert_eq!(cfg.synthetic.businesses[0].classified_industry(), "logistics");
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn bad_pv_and_markup_are_reported() {
        let mut cfg = ScenarioConfig::demo();
        cfg.pv.capacity_kw = -5.0;
        cfg.economics.markup = f64::NAN;
        let errors = cfg.validate();
        let fields: Vec<_> = errors.iter().filter_map(Error::field).collect();
        assert_eq!(fields, ["pv.capacity_kw", "economics.markup"]);
    }

    #[test]
    fn industrial_park_keeps_a_soc_reserve() {
        let cfg = ScenarioConfig::industrial_park();
        assert_eq!(cfg.storage.min_soc_fraction, 0.2);
        assert_eq!(cfg.storage.max_soc_fraction, 0.9);
        assert!(cfg.pv.capacity_kw > 0.0);
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }
}
