//! Error taxonomy shared by the forecaster, planner and evaluator.
//!
//! Every contract validates its inputs eagerly and reports the first violated
//! constraint. Scenario-level validation collects all violations instead, see
//! [`crate::config::ScenarioConfig::validate`].

use thiserror::Error;

/// Errors returned by the analytical pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed, missing or non-finite feature/target values, or a schema
    /// mismatch between fit time and predict time.
    #[error("data error: {field}: {message}")]
    Data {
        /// Offending feature, row or series (e.g. `"row[3].temperature"`).
        field: String,
        /// Human-readable constraint description.
        message: String,
    },

    /// Invalid or inconsistent storage, tariff, threshold or horizon
    /// configuration.
    #[error("config error: {field}: {message}")]
    Config {
        /// Dotted field path (e.g. `"storage.efficiency"`).
        field: String,
        /// Human-readable constraint description.
        message: String,
    },

    /// The ridge fit produced no usable solution even after regularization
    /// backoff.
    #[error("numeric error: {message} (last lambda {lambda:e} after {attempts} attempts)")]
    Numeric {
        message: String,
        /// Last regularization strength tried.
        lambda: f64,
        /// Number of solves attempted.
        attempts: usize,
    },
}

impl Error {
    pub fn data(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Data {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Field path of a `Data` or `Config` error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Data { field, .. } | Self::Config { field, .. } => Some(field),
            Self::Numeric { .. } => None,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
