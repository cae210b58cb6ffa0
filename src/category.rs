//! AQI severity bands.
//!
//! Bands use inclusive upper bounds on the 0–500 scale: a value equal to
//! a bound belongs to the lower band.

use std::fmt;

/// Severity categories, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

/// (inclusive upper bound, category), ascending. Anything above the last
/// bound is `Severe`.
pub const BANDS: [(f64, AqiCategory); 5] = [
    (50.0, AqiCategory::Good),
    (100.0, AqiCategory::Satisfactory),
    (200.0, AqiCategory::Moderate),
    (300.0, AqiCategory::Poor),
    (400.0, AqiCategory::VeryPoor),
];

impl AqiCategory {
    pub fn from_aqi(aqi: f64) -> Self {
        BANDS
            .iter()
            .find(|(upper, _)| aqi <= *upper)
            .map(|(_, category)| *category)
            .unwrap_or(AqiCategory::Severe)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Satisfactory => "Satisfactory",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Poor => "Poor",
            AqiCategory::VeryPoor => "Very Poor",
            AqiCategory::Severe => "Severe",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
