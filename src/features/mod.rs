//! Per-timestep feature rows and the training set the forecaster is fitted on.

pub mod engineer;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use engineer::{FeatureBuilder, PoiCounts, WeatherObservation};

/// One named numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value: f64,
}

/// Features observed or forecast for a single timestep.
///
/// Feature order is preserved; lookups by name are linear, which is fine for
/// the handful of weather and POI columns a region carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    timestamp: NaiveDateTime,
    features: Vec<Feature>,
}

impl FeatureRow {
    pub fn new(timestamp: NaiveDateTime, features: Vec<Feature>) -> Self {
        Self {
            timestamp,
            features,
        }
    }

    /// Builds a row from `(name, value)` pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use vpp_dispatch::features::FeatureRow;
    ///
    /// let ts = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    /// let row = FeatureRow::from_pairs(ts, [("temperature", 21.5), ("radiation", 0.0)]);
    /// assert_eq!(row.get("temperature"), Some(21.5));
    /// assert_eq!(row.get("humidity"), None);
    /// ```
    pub fn from_pairs<N: Into<String>>(
        timestamp: NaiveDateTime,
        pairs: impl IntoIterator<Item = (N, f64)>,
    ) -> Self {
        let features = pairs
            .into_iter()
            .map(|(name, value)| Feature {
                name: name.into(),
                value,
            })
            .collect();
        Self::new(timestamp, features)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value)
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }
}

/// Ordered feature names a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    /// # Errors
    ///
    /// Returns `Error::Data` if a name is empty or repeated.
    pub fn new(names: Vec<String>) -> Result<Self> {
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::data(format!("schema[{i}]"), "feature name is empty"));
            }
            if names[..i].contains(name) {
                return Err(Error::data(
                    format!("schema[{i}]"),
                    format!("duplicate feature \"{name}\""),
                ));
            }
        }
        Ok(Self(names))
    }

    pub fn of(row: &FeatureRow) -> Result<Self> {
        Self::new(row.names().map(str::to_string).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn matches(&self, row: &FeatureRow) -> bool {
        row.features.len() == self.0.len() && row.names().zip(&self.0).all(|(a, b)| a == b)
    }

    /// Extracts the schema features of `row` in schema order.
    ///
    /// Features the schema does not name are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if a schema feature is missing or non-finite.
    pub fn extract(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        self.0
            .iter()
            .map(|name| {
                let value = row.get(name).ok_or_else(|| {
                    Error::data(
                        name.clone(),
                        format!("missing from row at {}", row.timestamp),
                    )
                })?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(Error::data(
                        name.clone(),
                        format!("non-finite value {value} at {}", row.timestamp),
                    ))
                }
            })
            .collect()
    }
}

/// A feature row paired with the observed load delta (kW).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub row: FeatureRow,
    pub target: f64,
}

/// Ordered, schema-consistent training samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    schema: FeatureSchema,
    samples: Vec<TrainingSample>,
}

impl TrainingSet {
    /// Validates and wraps the samples.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` if the set is empty, rows disagree on feature
    /// names or order, or any value or target is non-finite.
    pub fn new(samples: Vec<TrainingSample>) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| Error::data("training_set", "must contain at least one sample"))?;
        let schema = FeatureSchema::of(&first.row)?;

        for (i, sample) in samples.iter().enumerate() {
            if !schema.matches(&sample.row) {
                return Err(Error::data(
                    format!("row[{i}]"),
                    format!(
                        "schema mismatch: expected [{}], got [{}]",
                        schema.0.join(", "),
                        sample.row.names().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
            if let Some(f) = sample.row.features.iter().find(|f| !f.value.is_finite()) {
                return Err(Error::data(
                    format!("row[{i}].{}", f.name),
                    format!("non-finite value {}", f.value),
                ));
            }
            if !sample.target.is_finite() {
                return Err(Error::data(
                    format!("row[{i}].target"),
                    format!("non-finite target {}", sample.target),
                ));
            }
        }

        Ok(Self { schema, samples })
    }

    /// Pairs rows with targets positionally.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` on a length mismatch or any [`TrainingSet::new`]
    /// violation.
    pub fn from_rows(rows: Vec<FeatureRow>, targets: &[f64]) -> Result<Self> {
        if rows.len() != targets.len() {
            return Err(Error::data(
                "targets",
                format!("{} targets for {} rows", targets.len(), rows.len()),
            ));
        }
        let samples = rows
            .into_iter()
            .zip(targets)
            .map(|(row, &target)| TrainingSample { row, target })
            .collect();
        Self::new(samples)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Splits chronologically at `at`; both halves keep the schema.
    pub(crate) fn split_at(&self, at: usize) -> (Self, Self) {
        let (head, tail) = self.samples.split_at(at);
        (
            Self {
                schema: self.schema.clone(),
                samples: head.to_vec(),
            },
            Self {
                schema: self.schema.clone(),
                samples: tail.to_vec(),
            },
        )
    }
}
