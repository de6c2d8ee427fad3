//! Shave/fill thresholds, fixed per planning window before stepping begins.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::{ForecastPoint, ForecastSeries};

/// Group of steps sharing one pair of thresholds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// One window per calendar day.
    #[default]
    Day,
    /// The whole horizon is one window.
    Horizon,
}

/// How the planner derives its thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Percentiles (0-100) of the forecast load inside each window.
    Percentile {
        shave_percentile: f64,
        fill_percentile: f64,
        #[serde(default)]
        window: Window,
    },
    /// The same absolute thresholds for every step (kW).
    Fixed { shave_kw: f64, fill_kw: f64 },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::Percentile {
            shave_percentile: 80.0,
            fill_percentile: 20.0,
            window: Window::Day,
        }
    }
}

/// Thresholds in force at one step (kW).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Discharge when the load is strictly above this.
    pub shave_kw: f64,
    /// Charge when the load is strictly below this.
    pub fill_kw: f64,
}

impl ThresholdPolicy {
    /// # Errors
    ///
    /// Returns `Error::Config` for percentiles outside [0, 100], non-finite
    /// fixed thresholds, or a fill threshold not below the shave threshold.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Percentile {
                shave_percentile,
                fill_percentile,
                ..
            } => {
                for (field, p) in [
                    ("dispatch.thresholds.shave_percentile", shave_percentile),
                    ("dispatch.thresholds.fill_percentile", fill_percentile),
                ] {
                    if !(0.0..=100.0).contains(&p) {
                        return Err(Error::config(field, format!("must be in [0, 100], got {p}")));
                    }
                }
                if fill_percentile >= shave_percentile {
                    return Err(Error::config(
                        "dispatch.thresholds.fill_percentile",
                        "must be < shave_percentile",
                    ));
                }
            }
            Self::Fixed { shave_kw, fill_kw } => {
                if !(shave_kw.is_finite() && fill_kw.is_finite()) {
                    return Err(Error::config(
                        "dispatch.thresholds",
                        "fixed thresholds must be finite",
                    ));
                }
                if fill_kw > shave_kw {
                    return Err(Error::config(
                        "dispatch.thresholds.fill_kw",
                        "must be <= shave_kw",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolves one `Thresholds` per step of `series`.
    ///
    /// # Errors
    ///
    /// See [`ThresholdPolicy::validate`].
    pub fn resolve(&self, series: &ForecastSeries) -> Result<Vec<Thresholds>> {
        self.validate()?;
        let thresholds = match *self {
            Self::Fixed { shave_kw, fill_kw } => {
                vec![Thresholds { shave_kw, fill_kw }; series.len()]
            }
            Self::Percentile {
                shave_percentile,
                fill_percentile,
                window,
            } => {
                let window_of = |p: &ForecastPoint| -> Option<NaiveDate> {
                    match window {
                        Window::Day => Some(p.timestamp.date()),
                        Window::Horizon => None,
                    }
                };

                let mut loads: BTreeMap<Option<NaiveDate>, Vec<f64>> = BTreeMap::new();
                for p in series.points() {
                    loads.entry(window_of(p)).or_default().push(p.load_kw);
                }
                let per_window = loads
                    .into_iter()
                    .map(|(key, mut values)| {
                        values.sort_by(f64::total_cmp);
                        let t = percentile(&values, shave_percentile)
                            .zip(percentile(&values, fill_percentile))
                            .map(|(shave_kw, fill_kw)| Thresholds { shave_kw, fill_kw })
                            .ok_or_else(|| Error::data("forecast", "empty planning window"))?;
                        Ok((key, t))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;

                series
                    .points()
                    .iter()
                    .map(|p| per_window[&window_of(p)])
                    .collect()
            }
        };
        Ok(thresholds)
    }
}

/// Linear-interpolated percentile of ascending `sorted`, `None` when empty.
///
/// `pct` is clamped into [0, 100].
///
/// # Examples
///
/// ```
/// use vpp_dispatch::dispatch::thresholds::percentile;
///
/// assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0, 50.0], 50.0), Some(30.0));
/// assert_eq!(percentile(&[10.0, 20.0], 25.0), Some(12.5));
/// assert_eq!(percentile(&[], 50.0), None);
/// ```
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = pct.clamp(0.0, 100.0) / 100.0 * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}
