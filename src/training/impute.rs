//! Mean imputation of missing feature values.
//!
//! The column means are a fresh statistic of the dataset being trained on;
//! nothing here is persisted between runs.

use crate::model::FEATURE_COUNT;

/// Per-column means of the present values.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    pub means: [f64; FEATURE_COUNT],
    /// Columns with no present value at all. Their mean is taken as 0.0.
    pub empty_columns: Vec<usize>,
}

impl MeanImputer {
    pub fn fit(rows: &[[Option<f64>; FEATURE_COUNT]]) -> Self {
        let mut sums = [0.0; FEATURE_COUNT];
        let mut counts = [0usize; FEATURE_COUNT];
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                if let Some(v) = value {
                    sums[col] += v;
                    counts[col] += 1;
                }
            }
        }

        let mut means = [0.0; FEATURE_COUNT];
        let mut empty_columns = Vec::new();
        for col in 0..FEATURE_COUNT {
            if counts[col] == 0 {
                empty_columns.push(col);
            } else {
                means[col] = sums[col] / counts[col] as f64;
            }
        }

        Self { means, empty_columns }
    }

    pub fn transform(&self, row: &[Option<f64>; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (col, value) in row.iter().enumerate() {
            out[col] = value.unwrap_or(self.means[col]);
        }
        out
    }

    pub fn fit_transform(rows: &[[Option<f64>; FEATURE_COUNT]]) -> (Self, Vec<[f64; FEATURE_COUNT]>) {
        let imputer = Self::fit(rows);
        let filled = rows.iter().map(|row| imputer.transform(row)).collect();
        (imputer, filled)
    }
}
