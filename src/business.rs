//! Registered businesses and their expected peak load.
//!
//! A business declares an industry and a free-text business scope; both are
//! matched against keyword lists to pick one of the four load profiles. The
//! peak estimate scales the profile's base load by registered capital and by
//! the declared business size.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::PoiCounts;

/// Industries with a load profile, in keyword-matching order.
pub const INDUSTRIES: [&str; 4] = ["manufacturing", "retail_catering", "logistics", "office"];

const KEYWORDS: [(&str, &[&str]); 4] = [
    (
        "manufacturing",
        &[
            "manufactur",
            "processing",
            "factory",
            "machinery",
            "electronic",
            "printing",
        ],
    ),
    (
        "retail_catering",
        &[
            "catering",
            "restaurant",
            "supermarket",
            "convenience store",
            "retail",
            "trading",
            "food sales",
        ],
    ),
    (
        "logistics",
        &[
            "warehous",
            "logistics",
            "distribution",
            "storage",
            "transport",
            "courier",
            "express",
        ],
    ),
    (
        "office",
        &[
            "consult",
            "service",
            "software",
            "design",
            "training",
            "advertis",
            "accounting",
            "law",
            "human resources",
        ],
    ),
];

/// Daily shape of an industry's demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadProfile {
    /// Around the clock near the peak.
    StableHigh,
    /// Midday and evening peaks.
    DualPeak,
    Flat,
    /// Office hours only.
    DayHigh,
}

impl fmt::Display for LoadProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StableHigh => "stable high",
            Self::DualPeak => "dual peak",
            Self::Flat => "flat",
            Self::DayHigh => "day high",
        })
    }
}

/// Base load (kW per 100 units of registered capital) and daily shape of an
/// industry. Unknown industries get the `office` profile.
pub fn industry_profile(industry: &str) -> (f64, LoadProfile) {
    match industry {
        "manufacturing" => (500.0, LoadProfile::StableHigh),
        "retail_catering" => (150.0, LoadProfile::DualPeak),
        "logistics" => (80.0, LoadProfile::Flat),
        _ => (200.0, LoadProfile::DayHigh),
    }
}

/// Maps a declared industry and business scope to one of [`INDUSTRIES`].
///
/// Keywords are matched case-insensitively against both texts, industry
/// lists first to last. Without a keyword hit a declared industry that is
/// already one of [`INDUSTRIES`] is kept; anything else becomes `office`.
///
/// # Examples
///
/// ```
/// use vpp_dispatch::business::classify_industry;
///
/// assert_eq!(classify_industry("", "Cold-chain warehousing"), "logistics");
/// assert_eq!(classify_industry("Food processing plant", ""), "manufacturing");
/// assert_eq!(classify_industry("retail_catering", "n/a"), "retail_catering");
/// assert_eq!(classify_industry("", ""), "office");
/// ```
pub fn classify_industry(declared: &str, scope: &str) -> &'static str {
    let text = format!("{declared} {scope}").to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(industry, _)| *industry)
        .or_else(|| INDUSTRIES.iter().copied().find(|i| *i == declared.trim()))
        .unwrap_or("office")
}

/// Declared business size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    #[serde(rename = "S")]
    Small,
    #[default]
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Large,
}

impl Scale {
    /// Multiplier on the industry base load.
    pub fn factor(self) -> f64 {
        match self {
            Self::Small => 0.8,
            Self::Medium => 1.0,
            Self::Large => 1.2,
        }
    }
}

/// A business registered in the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Business {
    pub name: String,
    /// Unified credit code; businesses sharing one are counted once.
    pub credit_code: Option<String>,
    /// Declared industry, free text.
    pub industry: String,
    /// Business scope, free text.
    pub scope: String,
    /// Registered capital (same unit as the profile's 100-unit reference).
    pub registered_capital: f64,
    pub scale: Scale,
}

impl Default for Business {
    fn default() -> Self {
        Self {
            name: String::new(),
            credit_code: None,
            industry: String::new(),
            scope: String::new(),
            registered_capital: 100.0,
            scale: Scale::Medium,
        }
    }
}

/// Expected peak load of one business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessLoad {
    pub name: String,
    /// Classified industry, one of [`INDUSTRIES`].
    pub industry: String,
    pub profile: LoadProfile,
    pub peak_kw: f64,
}

impl Business {
    /// Classified industry, one of [`INDUSTRIES`].
    pub fn classified_industry(&self) -> &'static str {
        classify_industry(&self.industry, &self.scope)
    }

    /// Profile base load × capital / 100 × size factor.
    pub fn predict_peak(&self) -> BusinessLoad {
        let industry = self.classified_industry();
        let (base_kw, profile) = industry_profile(industry);
        BusinessLoad {
            name: self.name.clone(),
            industry: industry.to_string(),
            profile,
            peak_kw: base_kw * (self.registered_capital / 100.0) * self.scale.factor(),
        }
    }

    /// # Errors
    ///
    /// Returns `Error::Config` if the registered capital is not finite and
    /// positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.registered_capital.is_finite() && self.registered_capital > 0.0) {
            return Err(Error::config(
                "business.registered_capital",
                format!(
                    "\"{}\": must be finite and > 0, got {}",
                    self.name, self.registered_capital
                ),
            ));
        }
        Ok(())
    }
}

/// Drops repeated credit codes, keeping the first listing.
pub fn dedup_by_credit_code(businesses: &[Business]) -> Vec<&Business> {
    let mut seen = BTreeSet::new();
    businesses
        .iter()
        .filter(|&b| {
            b.credit_code
                .as_deref()
                .is_none_or(|code| seen.insert(code))
        })
        .collect()
}

/// Peak estimate per distinct business.
pub fn predict_peak_loads(businesses: &[Business]) -> Vec<BusinessLoad> {
    dedup_by_credit_code(businesses)
        .into_iter()
        .map(Business::predict_peak)
        .collect()
}

/// Distinct businesses per classified industry.
pub fn poi_counts(businesses: &[Business]) -> PoiCounts {
    let mut counts = PoiCounts::new();
    for b in dedup_by_credit_code(businesses) {
        *counts.entry(b.classified_industry().to_string()).or_default() += 1;
    }
    counts
}
