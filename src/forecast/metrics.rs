//! Goodness-of-fit metrics and chronological holdout evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ForecastModel, RidgeOptions, fit, predict};
use crate::error::{Error, Result};
use crate::features::TrainingSet;

/// Holdout accuracy of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Coefficient of determination.
    pub r2: f64,
    /// Mean absolute percentage error, as a fraction (0.05 = 5 %).
    pub mape: f64,
    /// Root-mean-square error (kW).
    pub rmse: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R²={:.4}  MAPE={:.2}%  RMSE={:.3} kW  (train={}, test={})",
            self.r2,
            self.mape * 100.0,
            self.rmse,
            self.train_rows,
            self.test_rows
        )
    }
}

/// Scores `model` against every sample of `test`.
///
/// # Errors
///
/// Returns `Error::Data` if a test row does not satisfy the model schema.
pub fn score(model: &ForecastModel, test: &TrainingSet) -> Result<ForecastMetrics> {
    let n = test.len() as f64;
    let mean = test.samples().iter().map(|s| s.target).sum::<f64>() / n;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    let mut ape_sum = 0.0;
    for sample in test.samples() {
        let err = sample.target - predict(model, &sample.row)?;
        ss_res += err * err;
        ss_tot += (sample.target - mean).powi(2);
        ape_sum += err.abs() / sample.target.abs().max(f64::EPSILON);
    }

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(ForecastMetrics {
        r2,
        mape: ape_sum / n,
        rmse: (ss_res / n).sqrt(),
        train_rows: 0,
        test_rows: test.len(),
    })
}

/// Fits on the leading `train_fraction` of the samples and scores the rest.
///
/// The split is chronological; at least one sample lands on each side.
///
/// # Errors
///
/// - `Error::Config` if `train_fraction` is outside (0, 1).
/// - `Error::Data` if fewer than two samples are available.
/// - Any error from [`fit`].
pub fn holdout(
    training_set: &TrainingSet,
    lambda: f64,
    options: &RidgeOptions,
    train_fraction: f64,
) -> Result<(ForecastModel, ForecastMetrics)> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::config(
            "forecast.train_fraction",
            format!("must be in (0, 1), got {train_fraction}"),
        ));
    }
    let n = training_set.len();
    if n < 2 {
        return Err(Error::data(
            "training_set",
            format!("holdout needs at least 2 samples, got {n}"),
        ));
    }

    let split = ((n as f64 * train_fraction).floor() as usize).clamp(1, n - 1);
    let (train, test) = training_set.split_at(split);
    let model = fit(&train, lambda, options)?;
    let metrics = ForecastMetrics {
        train_rows: train.len(),
        ..score(&model, &test)?
    };
    info!(%metrics, lambda = model.lambda(), "holdout evaluation");
    Ok((model, metrics))
}
