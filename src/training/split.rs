//! Train/evaluation split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices for fitting and for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub eval: Vec<usize>,
    /// `false` when the full set is used for both, so the error estimate is
    /// not a true holdout.
    pub holdout: bool,
}

/// Splits `n` rows.
///
/// Fewer than `min_rows` rows: every row is used for both fitting and
/// evaluation. Otherwise the rows are shuffled with `seed` and the first
/// `ceil(n * test_fraction)` become the evaluation set (at least one row,
/// and at least one row is left for fitting).
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64, min_rows: usize) -> Split {
    if n < min_rows || n < 2 {
        let all: Vec<usize> = (0..n).collect();
        return Split {
            train: all.clone(),
            eval: all,
            holdout: false,
        };
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(test_size);

    Split {
        train,
        eval: indices,
        holdout: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_dataset_uses_full_set_for_both() {
        let split = train_test_split(9, 0.2, 42, 10);
        assert!(!split.holdout);
        assert_eq!(split.train, (0..9).collect::<Vec<_>>());
        assert_eq!(split.eval, split.train);
    }

    #[test]
    fn test_single_row_is_full_set() {
        let split = train_test_split(1, 0.2, 42, 10);
        assert_eq!(split.train, vec![0]);
        assert_eq!(split.eval, vec![0]);
    }

    #[test]
    fn test_eighty_twenty_split_is_disjoint_and_complete() {
        let split = train_test_split(12, 0.2, 42, 10);
        assert!(split.holdout);
        assert_eq!(split.eval.len(), 3, "ceil(12 * 0.2) = 3");
        assert_eq!(split.train.len(), 9);

        let mut all: Vec<usize> = split.train.iter().chain(&split.eval).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        assert_eq!(train_test_split(50, 0.2, 42, 10), train_test_split(50, 0.2, 42, 10));
        assert_ne!(
            train_test_split(50, 0.2, 42, 10).eval,
            train_test_split(50, 0.2, 7, 10).eval
        );
    }
}
