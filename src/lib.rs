//! Load forecasting and battery dispatch for a virtual power plant.
//!
//! A ridge forecaster predicts regional load from weather and POI features,
//! a threshold planner shaves peaks and fills valleys with a storage asset,
//! and an evaluator prices the result against the no-storage baseline.

#[cfg(feature = "api")]
pub mod api;
pub mod business;
pub mod config;
pub mod dispatch;
pub mod economics;
pub mod error;
pub mod features;
pub mod forecast;
pub mod io;
/// End-to-end scenario runs.
pub mod pipeline;
pub mod pv;
pub mod series;
pub mod storage;
/// Seeded synthetic inputs standing in for the external data collectors.
pub mod synthetic;
pub mod tariff;

pub use error::{Error, Result};
