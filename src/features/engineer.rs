//! Turns resolved weather observations and POI counts into feature rows.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{Feature, FeatureRow};
use crate::tariff::{Period, TouTariff};

/// Weather at one timestep, as delivered by the external weather collector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub timestamp: NaiveDateTime,
    /// Air temperature (°C).
    pub temperature_c: f64,
    /// Global horizontal irradiance (W/m²).
    pub radiation_wm2: f64,
}

/// Points of interest per industry in the region.
pub type PoiCounts = BTreeMap<String, u32>;

/// Builds the regional feature table.
///
/// Columns, in order: `temperature`, `radiation`, `hour_sin`, `hour_cos`,
/// `is_peak`, `is_valley`, then one `cnt_<industry>` per POI industry in
/// sorted order. POI counts are constant across the table, so they are
/// collinear with the intercept; the ridge penalty keeps the fit well posed.
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    tou: TouTariff,
}

impl FeatureBuilder {
    /// Uses `tou` to derive the peak/valley indicator columns.
    pub fn new(tou: TouTariff) -> Self {
        Self { tou }
    }

    pub fn build(&self, weather: &[WeatherObservation], poi: &PoiCounts) -> Vec<FeatureRow> {
        weather.iter().map(|w| self.row(w, poi)).collect()
    }

    fn row(&self, w: &WeatherObservation, poi: &PoiCounts) -> FeatureRow {
        let hour = f64::from(w.timestamp.hour()) + f64::from(w.timestamp.minute()) / 60.0;
        let angle = 2.0 * PI * hour / 24.0;
        let period = self.tou.period_for_hour(w.timestamp.hour());

        let mut features = vec![
            feature("temperature", w.temperature_c),
            feature("radiation", w.radiation_wm2),
            feature("hour_sin", angle.sin()),
            feature("hour_cos", angle.cos()),
            feature("is_peak", indicator(period == Period::Peak)),
            feature("is_valley", indicator(period == Period::Valley)),
        ];
        features.extend(
            poi.iter()
                .map(|(industry, &count)| feature(format!("cnt_{industry}"), f64::from(count))),
        );
        FeatureRow::new(w.timestamp, features)
    }
}

fn feature(name: impl Into<String>, value: f64) -> Feature {
    Feature {
        name: name.into(),
        value,
    }
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}
