//! Energy price schedules used to value grid import.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::ForecastSeries;

/// Time-of-use bucket a timestamp falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Peak,
    Flat,
    Valley,
}

/// Hours of the day sharing one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TouPeriod {
    /// Hours of day (0-23) belonging to this period.
    pub hours: Vec<u32>,
    /// Price per kWh.
    pub price: f64,
}

/// Peak/flat/valley tariff keyed by hour of day.
///
/// Hours named by neither `peak` nor `valley` are priced at `flat_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TouTariff {
    pub peak: TouPeriod,
    pub flat_price: f64,
    pub valley: TouPeriod,
}

impl TouTariff {
    /// A single price for every hour.
    pub fn flat(price: f64) -> Self {
        Self {
            peak: TouPeriod {
                hours: Vec::new(),
                price,
            },
            flat_price: price,
            valley: TouPeriod {
                hours: Vec::new(),
                price,
            },
        }
    }

    pub fn period_for_hour(&self, hour: u32) -> Period {
        if self.peak.hours.contains(&hour) {
            Period::Peak
        } else if self.valley.hours.contains(&hour) {
            Period::Valley
        } else {
            Period::Flat
        }
    }

    pub fn price_for_hour(&self, hour: u32) -> f64 {
        match self.period_for_hour(hour) {
            Period::Peak => self.peak.price,
            Period::Flat => self.flat_price,
            Period::Valley => self.valley.price,
        }
    }
}

impl Default for TouTariff {
    /// Provincial commercial time-of-use structure: 1.20 peak, 0.80 flat,
    /// 0.40 valley.
    fn default() -> Self {
        Self {
            peak: TouPeriod {
                hours: vec![8, 9, 10, 11, 17, 18, 19, 20, 21],
                price: 1.20,
            },
            flat_price: 0.80,
            valley: TouPeriod {
                hours: vec![0, 1, 2, 3, 4, 5, 6, 23],
                price: 0.40,
            },
        }
    }
}

/// Price per kWh for every timestamp of a planning horizon.
#[derive(Debug, Clone, PartialEq)]
pub enum TariffSchedule {
    /// One price per exact timestamp.
    Explicit(BTreeMap<NaiveDateTime, f64>),
    /// Prices by hour-of-day bucket; covers any timestamp.
    TimeOfUse(TouTariff),
}

impl TariffSchedule {
    pub fn explicit(prices: impl IntoIterator<Item = (NaiveDateTime, f64)>) -> Self {
        Self::Explicit(prices.into_iter().collect())
    }

    /// Price at `timestamp`, or `None` if the schedule does not cover it.
    pub fn price_at(&self, timestamp: NaiveDateTime) -> Option<f64> {
        match self {
            Self::Explicit(prices) => prices.get(&timestamp).copied(),
            Self::TimeOfUse(tou) => Some(tou.price_for_hour(timestamp.hour())),
        }
    }

    /// TOU period at `timestamp`; explicit schedules have no periods.
    pub fn period_at(&self, timestamp: NaiveDateTime) -> Option<Period> {
        match self {
            Self::Explicit(_) => None,
            Self::TimeOfUse(tou) => Some(tou.period_for_hour(timestamp.hour())),
        }
    }

    /// Checks internal consistency of the schedule itself.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for non-finite prices, hours outside 0-23, or
    /// an hour assigned to both peak and valley.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Explicit(prices) => {
                if let Some((ts, price)) = prices.iter().find(|(_, p)| !p.is_finite()) {
                    return Err(Error::config(
                        format!("tariff[{ts}]"),
                        format!("non-finite price {price}"),
                    ));
                }
            }
            Self::TimeOfUse(tou) => {
                for (field, price) in [
                    ("tariff.peak.price", tou.peak.price),
                    ("tariff.flat_price", tou.flat_price),
                    ("tariff.valley.price", tou.valley.price),
                ] {
                    if !price.is_finite() {
                        return Err(Error::config(field, format!("non-finite price {price}")));
                    }
                }
                for (field, hours) in [
                    ("tariff.peak.hours", &tou.peak.hours),
                    ("tariff.valley.hours", &tou.valley.hours),
                ] {
                    if let Some(h) = hours.iter().find(|&&h| h > 23) {
                        return Err(Error::config(field, format!("hour {h} outside 0-23")));
                    }
                }
                if let Some(h) = tou.peak.hours.iter().find(|h| tou.valley.hours.contains(h)) {
                    return Err(Error::config(
                        "tariff.valley.hours",
                        format!("hour {h} is also a peak hour"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolves one price per step of `series`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the schedule is invalid or misses any
    /// timestamp of the horizon.
    pub fn prices_for(&self, series: &ForecastSeries) -> Result<Vec<f64>> {
        self.validate()?;
        series
            .timestamps()
            .map(|ts| {
                self.price_at(ts).ok_or_else(|| {
                    Error::config("tariff", format!("no price for horizon timestamp {ts}"))
                })
            })
            .collect()
    }
}

impl From<TouTariff> for TariffSchedule {
    fn from(tou: TouTariff) -> Self {
        Self::TimeOfUse(tou)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn default_tou_buckets() {
        let tou = TouTariff::default();
        assert_eq!(tou.period_for_hour(3), Period::Valley);
        assert_eq!(tou.period_for_hour(9), Period::Peak);
        assert_eq!(tou.period_for_hour(13), Period::Flat);
        assert_eq!(tou.price_for_hour(19), 1.20);
        assert_eq!(tou.price_for_hour(23), 0.40);
    }

    #[test]
    fn explicit_schedule_misses_unknown_timestamps() {
        let tariff = TariffSchedule::explicit([(at(0), 0.5)]);
        assert_eq!(tariff.price_at(at(0)), Some(0.5));
        assert_eq!(tariff.price_at(at(1)), None);
        assert_eq!(tariff.period_at(at(0)), None);
    }

    #[test]
    fn overlapping_peak_and_valley_is_invalid() {
        let mut tou = TouTariff::default();
        tou.valley.hours.push(9);
        let err = TariffSchedule::from(tou).validate().expect_err("overlap");
        assert_eq!(err.field(), Some("tariff.valley.hours"));
    }

    #[test]
    fn hour_out_of_range_is_invalid() {
        let mut tou = TouTariff::default();
        tou.peak.hours.push(24);
        assert!(TariffSchedule::from(tou).validate().is_err());
    }

    #[test]
    fn prices_for_reports_uncovered_step() {
        let series = ForecastSeries::from_loads(at(0), 60, vec![1.0, 2.0]).expect("valid series");
        let tariff = TariffSchedule::explicit([(at(0), 0.5)]);
        let err = tariff.prices_for(&series).expect_err("missing 01:00");
        assert!(err.is_config());
    }
}
