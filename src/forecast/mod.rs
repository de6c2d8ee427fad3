//! Ridge-regression load forecaster.
//!
//! [`fit`] solves the regularized normal equations
//! `(XᵗX + λD) w = Xᵗy` where `X` carries a leading bias column and `D` is
//! the identity with the bias entry zeroed, so the intercept is never
//! shrunk. With `λ = 0` this is ordinary least squares.
//!
//! Near-singular systems are not fatal: the effective `λ` is raised by
//! [`RidgeOptions::backoff_factor`] until the factorization succeeds or
//! [`RidgeOptions::max_backoff_attempts`] is spent.

pub mod metrics;

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::features::{FeatureRow, FeatureSchema, TrainingSet};
use crate::series::{ForecastPoint, ForecastSeries};

pub use metrics::{ForecastMetrics, holdout, score};

/// Regularization backoff policy for [`fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RidgeOptions {
    /// Multiplier applied to λ after a failed factorization (must be > 1).
    pub backoff_factor: f64,
    /// Smallest λ tried after a failure, relative to the mean diagonal of
    /// `XᵗX` over the feature columns.
    pub min_backoff_lambda: f64,
    /// Retries allowed after the first solve.
    pub max_backoff_attempts: usize,
    /// Pivot threshold relative to the pivot's diagonal entry.
    pub pivot_tolerance: f64,
}

impl Default for RidgeOptions {
    fn default() -> Self {
        Self {
            backoff_factor: 10.0,
            min_backoff_lambda: 1e-8,
            max_backoff_attempts: 12,
            pivot_tolerance: 1e-10,
        }
    }
}

impl RidgeOptions {
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid `forecast.ridge.*`
    /// field.
    pub fn validate(&self) -> Result<()> {
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 1.0) {
            return Err(Error::config("forecast.ridge.backoff_factor", "must be finite and > 1"));
        }
        if !(self.min_backoff_lambda.is_finite() && self.min_backoff_lambda > 0.0) {
            return Err(Error::config("forecast.ridge.min_backoff_lambda", "must be finite and > 0"));
        }
        if !(self.pivot_tolerance.is_finite() && self.pivot_tolerance > 0.0) {
            return Err(Error::config("forecast.ridge.pivot_tolerance", "must be finite and > 0"));
        }
        Ok(())
    }
}

/// A fitted linear load model.
///
/// Plain immutable value: refitting produces a new model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModel")]
pub struct ForecastModel {
    schema: FeatureSchema,
    weights: Vec<f64>,
    intercept: f64,
    /// Effective regularization strength, after any backoff.
    lambda: f64,
    requested_lambda: f64,
    backoff_steps: usize,
}

#[derive(Deserialize)]
struct RawModel {
    schema: FeatureSchema,
    weights: Vec<f64>,
    intercept: f64,
    lambda: f64,
    requested_lambda: f64,
    backoff_steps: usize,
}

impl TryFrom<RawModel> for ForecastModel {
    type Error = Error;

    fn try_from(raw: RawModel) -> Result<Self> {
        if raw.weights.len() != raw.schema.len() {
            return Err(Error::data(
                "model.weights",
                format!(
                    "{} weights for {} features",
                    raw.weights.len(),
                    raw.schema.len()
                ),
            ));
        }
        if !raw.intercept.is_finite() || raw.weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::data("model.weights", "non-finite coefficient"));
        }
        Ok(Self {
            schema: raw.schema,
            weights: raw.weights,
            intercept: raw.intercept,
            lambda: raw.lambda,
            requested_lambda: raw.requested_lambda,
            backoff_steps: raw.backoff_steps,
        })
    }
}

impl ForecastModel {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// One weight per schema feature, in schema order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Regularization strength actually used.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn requested_lambda(&self) -> f64 {
        self.requested_lambda
    }

    /// Number of times λ was raised before the solve succeeded.
    pub fn backoff_steps(&self) -> usize {
        self.backoff_steps
    }

    /// Weight of the named feature.
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.schema
            .names()
            .iter()
            .position(|n| n == name)
            .map(|i| self.weights[i])
    }
}

/// Fits a ridge model on `training_set` with regularization `lambda`.
///
/// # Errors
///
/// - `Error::Config` if `lambda` is negative or non-finite, or `options` are
///   invalid.
/// - `Error::Numeric` if no usable solution is found within the backoff
///   budget.
pub fn fit(
    training_set: &TrainingSet,
    lambda: f64,
    options: &RidgeOptions,
) -> Result<ForecastModel> {
    if !(lambda.is_finite() && lambda >= 0.0) {
        return Err(Error::config(
            "forecast.lambda",
            format!("must be finite and >= 0, got {lambda}"),
        ));
    }
    options.validate()?;

    let schema = training_set.schema().clone();
    let p = schema.len() + 1;
    let mut xtx = Mat::<f64>::zeros(p, p);
    let mut xty = Mat::<f64>::zeros(p, 1);
    let mut x = vec![0.0; p];

    for sample in training_set.samples() {
        x[0] = 1.0;
        for (slot, f) in x[1..].iter_mut().zip(sample.row.features()) {
            *slot = f.value;
        }
        for i in 0..p {
            for j in 0..p {
                xtx.write(i, j, xtx.read(i, j) + x[i] * x[j]);
            }
            xty.write(i, 0, xty.read(i, 0) + x[i] * sample.target);
        }
    }

    let mean_diag = if p > 1 {
        (1..p).map(|i| xtx.read(i, i)).sum::<f64>() / (p - 1) as f64
    } else {
        0.0
    };
    let floor = options.min_backoff_lambda * if mean_diag > 0.0 { mean_diag } else { 1.0 };

    let mut effective = lambda;
    for attempt in 0..=options.max_backoff_attempts {
        let mut a = xtx.clone();
        for i in 1..p {
            a.write(i, i, a.read(i, i) + effective);
        }

        match solve_spd(&a, &xty, options.pivot_tolerance) {
            Some(w) if w.iter().all(|v| v.is_finite()) => {
                debug!(
                    rows = training_set.len(),
                    features = schema.len(),
                    lambda = effective,
                    backoff_steps = attempt,
                    "ridge fit converged"
                );
                return Ok(ForecastModel {
                    schema,
                    intercept: w[0],
                    weights: w[1..].to_vec(),
                    lambda: effective,
                    requested_lambda: lambda,
                    backoff_steps: attempt,
                });
            }
            _ => {
                let next = (effective * options.backoff_factor).max(floor);
                warn!(
                    lambda = effective,
                    next_lambda = next,
                    attempt,
                    "normal equations near-singular, increasing regularization"
                );
                effective = next;
            }
        }
    }

    Err(Error::Numeric {
        message: "normal equations remain singular".to_string(),
        lambda: effective,
        attempts: options.max_backoff_attempts + 1,
    })
}

/// Solves `a w = b` for symmetric positive-definite `a` by Cholesky.
///
/// `None` when the factorization fails or any pivot `l_ii²` falls to
/// `rel_tol * a_ii` or below.
fn solve_spd(a: &Mat<f64>, b: &Mat<f64>, rel_tol: f64) -> Option<Vec<f64>> {
    let llt = a.cholesky(Side::Lower).ok()?;
    let l = llt.compute_l();
    let near_singular = (0..a.nrows()).any(|i| {
        let pivot = l.read(i, i);
        let diag = a.read(i, i);
        diag <= 0.0 || pivot * pivot <= rel_tol * diag
    });
    if near_singular {
        return None;
    }
    let w = llt.solve(b);
    Some((0..w.nrows()).map(|i| w.read(i, 0)).collect())
}

/// Predicts the load (kW) for one row.
///
/// # Errors
///
/// Returns `Error::Data` if a schema feature is missing from `row` or
/// non-finite.
pub fn predict(model: &ForecastModel, row: &FeatureRow) -> Result<f64> {
    let values = model.schema.extract(row)?;
    Ok(values
        .iter()
        .zip(&model.weights)
        .fold(model.intercept, |acc, (x, w)| acc + x * w))
}

/// Predicts every row and lays the results out as a forecast series.
///
/// # Errors
///
/// Returns `Error::Data` if any row fails [`predict`] or the rows are not a
/// contiguous `step_minutes` grid.
pub fn predict_series(
    model: &ForecastModel,
    rows: &[FeatureRow],
    step_minutes: u32,
) -> Result<ForecastSeries> {
    let points = rows
        .iter()
        .map(|row| {
            Ok(ForecastPoint {
                timestamp: row.timestamp(),
                load_kw: predict(model, row)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ForecastSeries::new(points, step_minutes)
}
