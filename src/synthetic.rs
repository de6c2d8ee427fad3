//! Seeded regional history for demos and tests.
//!
//! Stands in for the external weather and POI collectors: diurnal weather
//! curves with noise, and an observed load driven by weather around a base
//! derived from the region's POI mix and its listed businesses.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::business::{self, Business};
use crate::error::{Error, Result};
use crate::features::{PoiCounts, WeatherObservation};

/// Load added per W/m² of irradiance (kW).
const RADIATION_LOAD_KW: f64 = 0.8;
/// Observed load never drops below this share of the base load.
const LOAD_FLOOR_FRACTION: f64 = 0.1;

/// Parameters of a synthetic region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticRegion {
    /// Master random seed.
    pub seed: u64,
    /// Businesses per industry.
    pub poi: PoiCounts,
    /// Registered capital of a typical business.
    pub registered_capital: f64,
    /// Individually listed businesses, on top of `poi`.
    pub businesses: Vec<Business>,
    /// Daily mean temperature (°C).
    pub mean_temperature_c: f64,
    /// Half the day/night temperature range (°C).
    pub temperature_swing_c: f64,
    pub temperature_noise_c: f64,
    /// Clear-sky irradiance at solar noon (W/m²).
    pub peak_radiation_wm2: f64,
    /// Load change per °C, as a fraction of the base load.
    pub temperature_coef: f64,
    /// Standard deviation of load noise, as a fraction of the base load.
    pub load_noise: f64,
}

impl Default for SyntheticRegion {
    fn default() -> Self {
        Self {
            seed: 42,
            poi: BTreeMap::from([
                ("logistics".to_string(), 8),
                ("manufacturing".to_string(), 12),
                ("office".to_string(), 15),
                ("retail_catering".to_string(), 20),
            ]),
            registered_capital: 100.0,
            businesses: Vec::new(),
            mean_temperature_c: 15.0,
            temperature_swing_c: 5.0,
            temperature_noise_c: 0.5,
            peak_radiation_wm2: 800.0,
            temperature_coef: 0.005,
            load_noise: 0.01,
        }
    }
}

/// Generated weather with the load observed alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticHistory {
    pub weather: Vec<WeatherObservation>,
    /// Observed load per weather row (kW).
    pub load_kw: Vec<f64>,
}

impl SyntheticRegion {
    /// Sum of the industry base loads scaled by registered capital, plus the
    /// predicted peak of each distinct listed business (kW).
    pub fn base_load_kw(&self) -> f64 {
        let scale = self.registered_capital / 100.0;
        let aggregate: f64 = self
            .poi
            .iter()
            .map(|(industry, &n)| f64::from(n) * business::industry_profile(industry).0 * scale)
            .sum();
        let listed: f64 = business::predict_peak_loads(&self.businesses)
            .iter()
            .map(|b| b.peak_kw)
            .sum();
        aggregate + listed
    }

    /// POI counts seen by the forecaster: `poi` plus listed businesses by
    /// classified industry.
    pub fn poi_counts(&self) -> PoiCounts {
        let mut counts = self.poi.clone();
        for (industry, n) in business::poi_counts(&self.businesses) {
            *counts.entry(industry).or_default() += n;
        }
        counts
    }

    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid `synthetic.*` field.
    pub fn validate(&self) -> Result<()> {
        if self.poi.values().all(|&n| n == 0) && self.businesses.is_empty() {
            return Err(Error::config(
                "synthetic.poi",
                "at least one industry needs businesses",
            ));
        }
        for b in &self.businesses {
            b.validate()?;
        }
        if !(self.registered_capital.is_finite() && self.registered_capital > 0.0) {
            return Err(Error::config("synthetic.registered_capital", "must be > 0"));
        }
        for (field, value) in [
            ("synthetic.mean_temperature_c", self.mean_temperature_c),
            ("synthetic.temperature_swing_c", self.temperature_swing_c),
            ("synthetic.temperature_noise_c", self.temperature_noise_c),
            ("synthetic.peak_radiation_wm2", self.peak_radiation_wm2),
            ("synthetic.temperature_coef", self.temperature_coef),
            ("synthetic.load_noise", self.load_noise),
        ] {
            if !value.is_finite() {
                return Err(Error::config(field, "must be finite"));
            }
        }
        for (field, value) in [
            ("synthetic.temperature_noise_c", self.temperature_noise_c),
            ("synthetic.peak_radiation_wm2", self.peak_radiation_wm2),
            ("synthetic.load_noise", self.load_noise),
        ] {
            if value < 0.0 {
                return Err(Error::config(field, "must be >= 0"));
            }
        }
        Ok(())
    }

    /// Generates `steps` rows starting at `start`, `step_minutes` apart.
    ///
    /// The same region and arguments always give the same history.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the rows would run past the last
    /// representable timestamp.
    pub fn generate(
        &self,
        start: NaiveDateTime,
        step_minutes: u32,
        steps: usize,
    ) -> Result<SyntheticHistory> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let step = TimeDelta::minutes(i64::from(step_minutes));

        let timestamps: Vec<NaiveDateTime> = (0..steps)
            .scan(Some(start), |ts, _| {
                let now = (*ts)?;
                *ts = now.checked_add_signed(step);
                Some(now)
            })
            .collect();
        if timestamps.len() != steps {
            return Err(Error::config(
                "horizon",
                format!("{steps} steps of {step_minutes} min from {start} leave the calendar"),
            ));
        }

        let weather: Vec<WeatherObservation> = timestamps
            .into_iter()
            .map(|timestamp| {
                let hour = f64::from(timestamp.hour()) + f64::from(timestamp.minute()) / 60.0;
                WeatherObservation {
                    timestamp,
                    temperature_c: self.temperature(hour, &mut rng),
                    radiation_wm2: self.radiation(hour, &mut rng),
                }
            })
            .collect();

        let base = self.base_load_kw();
        let mean_temp = if weather.is_empty() {
            0.0
        } else {
            weather.iter().map(|w| w.temperature_c).sum::<f64>() / weather.len() as f64
        };
        let load_kw = weather
            .iter()
            .map(|w| {
                let kw = base
                    + (w.temperature_c - mean_temp) * base * self.temperature_coef
                    + w.radiation_wm2 * RADIATION_LOAD_KW
                    + gaussian_noise(&mut rng, base * self.load_noise);
                kw.max(base * LOAD_FLOOR_FRACTION)
            })
            .collect();

        Ok(SyntheticHistory { weather, load_kw })
    }

    /// Coolest near 03:00, warmest near 15:00.
    fn temperature(&self, hour: f64, rng: &mut StdRng) -> f64 {
        self.mean_temperature_c
            + self.temperature_swing_c * (2.0 * PI * (hour - 9.0) / 24.0).sin()
            + gaussian_noise(rng, self.temperature_noise_c)
    }

    /// Sun between 06:00 and 18:00, dimmed by a random cloud factor.
    fn radiation(&self, hour: f64, rng: &mut StdRng) -> f64 {
        if (6.0..=18.0).contains(&hour) {
            let cloud: f64 = rng.random_range(0.6..=1.0);
            (self.peak_radiation_wm2 * (PI * (hour - 6.0) / 12.0).sin() * cloud).max(0.0)
        } else {
            0.0
        }
    }
}

/// Box-Muller sample from N(0, std²).
fn gaussian_noise(rng: &mut StdRng, std: f64) -> f64 {
    if std <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std
}
