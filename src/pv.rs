//! On-site photovoltaic generation netted off the forecast load.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::WeatherObservation;
use crate::series::{ForecastPoint, ForecastSeries};

/// A PV array with a linear irradiance-to-power response.
///
/// # Examples
///
/// ```
/// use vpp_dispatch::pv::PvArray;
///
/// let pv = PvArray::new(1_000.0);
/// assert_eq!(pv.output_kw(800.0), 160.0);
/// assert_eq!(pv.output_kw(-5.0), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvArray {
    /// Installed capacity (kWp, >= 0). Zero disables PV.
    pub capacity_kw: f64,
    /// Share of irradiance converted to power, in (0, 1].
    pub conversion_efficiency: f64,
}

impl Default for PvArray {
    fn default() -> Self {
        Self {
            capacity_kw: 0.0,
            conversion_efficiency: 0.2,
        }
    }
}

impl PvArray {
    pub fn new(capacity_kw: f64) -> Self {
        Self {
            capacity_kw,
            ..Self::default()
        }
    }

    /// Output at `radiation_wm2`, between zero and the installed capacity.
    pub fn output_kw(&self, radiation_wm2: f64) -> f64 {
        let kw = radiation_wm2 * self.conversion_efficiency * self.capacity_kw / 1000.0;
        kw.clamp(0.0, self.capacity_kw.max(0.0))
    }

    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid `pv.*` field.
    pub fn validate(&self) -> Result<()> {
        if !(self.capacity_kw.is_finite() && self.capacity_kw >= 0.0) {
            return Err(Error::config(
                "pv.capacity_kw",
                format!("must be finite and >= 0, got {}", self.capacity_kw),
            ));
        }
        if !(self.conversion_efficiency > 0.0 && self.conversion_efficiency <= 1.0) {
            return Err(Error::config(
                "pv.conversion_efficiency",
                format!("must be in (0, 1], got {}", self.conversion_efficiency),
            ));
        }
        Ok(())
    }

    /// Load left for the grid and the battery once PV output is subtracted.
    ///
    /// The result can go negative around noon when PV exceeds demand.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if `weather` does not cover exactly the
    /// timestamps of `load`.
    pub fn net_load(
        &self,
        load: &ForecastSeries,
        weather: &[WeatherObservation],
    ) -> Result<ForecastSeries> {
        if weather.len() != load.len() {
            return Err(Error::data(
                "weather",
                format!("{} observations for {} load steps", weather.len(), load.len()),
            ));
        }
        let points = load
            .points()
            .iter()
            .zip(weather)
            .enumerate()
            .map(|(i, (p, w))| {
                if w.timestamp != p.timestamp {
                    return Err(Error::data(
                        format!("weather[{i}].timestamp"),
                        format!("observation at {}, load step at {}", w.timestamp, p.timestamp),
                    ));
                }
                Ok(ForecastPoint {
                    timestamp: p.timestamp,
                    load_kw: p.load_kw - self.output_kw(w.radiation_wm2),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        ForecastSeries::new(points, load.step_minutes())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::*;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(11, 0, 0))
            .expect("valid timestamp")
    }

    fn weather(radiation: &[f64]) -> Vec<WeatherObservation> {
        radiation
            .iter()
            .enumerate()
            .map(|(i, &radiation_wm2)| WeatherObservation {
                timestamp: start() + TimeDelta::hours(i as i64),
                temperature_c: 20.0,
                radiation_wm2,
            })
            .collect()
    }

    #[test]
    fn output_is_capped_at_capacity() {
        let pv = PvArray {
            capacity_kw: 100.0,
            conversion_efficiency: 1.0,
        };
        assert_eq!(pv.output_kw(500.0), 50.0);
        assert_eq!(pv.output_kw(5_000.0), 100.0);
    }

    #[test]
    fn net_load_subtracts_generation() {
        let load = ForecastSeries::from_loads(start(), 60, vec![500.0, 100.0, 300.0])
            .expect("valid series");
        let net = PvArray::new(1_000.0)
            .net_load(&load, &weather(&[1_000.0, 900.0, 0.0]))
            .expect("aligned");
        let loads: Vec<f64> = net.loads().collect();
        // 200 kW and 180 kW of PV.
        assert_eq!(loads, [300.0, -80.0, 300.0]);
        assert_eq!(net.start(), load.start());
    }

    #[test]
    fn zero_capacity_leaves_load_unchanged() {
        let load = ForecastSeries::from_loads(start(), 60, vec![5.0, 6.0]).expect("valid");
        let net = PvArray::default()
            .net_load(&load, &weather(&[800.0, 800.0]))
            .expect("aligned");
        assert_eq!(net, load);
    }

    #[test]
    fn misaligned_weather_is_data_error() {
        let load = ForecastSeries::from_loads(start(), 60, vec![5.0, 6.0]).expect("valid");
        let mut w = weather(&[800.0, 800.0]);
        w[1].timestamp += TimeDelta::minutes(30);
        let err = PvArray::new(10.0).net_load(&load, &w).expect_err("shifted");
        assert_eq!(err.field(), Some("weather[1].timestamp"));

        let err = PvArray::new(10.0)
            .net_load(&load, &w[..1])
            .expect_err("short");
        assert_eq!(err.field(), Some("weather"));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let err = PvArray::new(-1.0).validate().expect_err("negative");
        assert_eq!(err.field(), Some("pv.capacity_kw"));
        let pv = PvArray {
            conversion_efficiency: 0.0,
            ..PvArray::default()
        };
        assert_eq!(pv.validate().expect_err("zero").field(), Some("pv.conversion_efficiency"));
    }
}
