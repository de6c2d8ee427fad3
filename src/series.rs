//! Fixed-step forecast load series.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Forecast load at one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: NaiveDateTime,
    /// Average load over the step (kW).
    pub load_kw: f64,
}

/// Contiguous, strictly increasing, fixed-step series of forecast loads.
///
/// Construction validates the invariants, so every holder of a
/// `ForecastSeries` may rely on them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSeries {
    step_minutes: u32,
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    /// # Errors
    ///
    /// Returns `Error::Data` if the series is empty, a load is non-finite,
    /// the step is zero, or consecutive timestamps are not exactly one step
    /// apart.
    pub fn new(points: Vec<ForecastPoint>, step_minutes: u32) -> Result<Self> {
        if step_minutes == 0 {
            return Err(Error::data("series.step_minutes", "must be > 0"));
        }
        if points.is_empty() {
            return Err(Error::data("series", "must contain at least one step"));
        }
        let step = TimeDelta::minutes(i64::from(step_minutes));
        for (i, p) in points.iter().enumerate() {
            if !p.load_kw.is_finite() {
                return Err(Error::data(
                    format!("series[{i}].load_kw"),
                    format!("non-finite load {}", p.load_kw),
                ));
            }
            if i > 0 && p.timestamp - points[i - 1].timestamp != step {
                return Err(Error::data(
                    format!("series[{i}].timestamp"),
                    format!(
                        "{} does not follow {} by {step_minutes} min",
                        p.timestamp,
                        points[i - 1].timestamp
                    ),
                ));
            }
        }
        Ok(Self {
            step_minutes,
            points,
        })
    }

    /// Lays `loads` out from `start` at a fixed step.
    ///
    /// # Errors
    ///
    /// Same as [`ForecastSeries::new`].
    pub fn from_loads(start: NaiveDateTime, step_minutes: u32, loads: Vec<f64>) -> Result<Self> {
        let step = TimeDelta::minutes(i64::from(step_minutes));
        let mut timestamp = start;
        let points = loads
            .into_iter()
            .map(|load_kw| {
                let p = ForecastPoint { timestamp, load_kw };
                timestamp += step;
                p
            })
            .collect();
        Self::new(points, step_minutes)
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.points.iter().map(|p| p.timestamp)
    }

    pub fn loads(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.load_kw)
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    /// Step length in hours; energy moved in a step is power times this.
    pub fn step_hours(&self) -> f64 {
        f64::from(self.step_minutes) / 60.0
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> NaiveDateTime {
        self.points[0].timestamp
    }

    pub fn peak_kw(&self) -> f64 {
        self.loads().fold(f64::NEG_INFINITY, f64::max)
    }
}

impl<'de> Deserialize<'de> for ForecastSeries {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            step_minutes: u32,
            points: Vec<ForecastPoint>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.points, raw.step_minutes).map_err(serde::de::Error::custom)
    }
}
