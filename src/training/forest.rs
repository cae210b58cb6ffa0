//! Random forest regressor.
//!
//! Each tree is a CART regression tree grown on a bootstrap sample of the
//! training rows. Splits minimise the squared error of the children, every
//! feature is considered at every split, and a tree is grown until its
//! leaves are pure or too small to split. The forest predicts the mean of
//! its trees.
//!
//! All randomness comes from one `StdRng` seeded from `ForestParams::seed`,
//! and trees are grown sequentially, so a fit is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::{FEATURE_COUNT, PipelineError};

pub type FeatureRow = [f64; FEATURE_COUNT];

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            tree: TreeParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Regression tree
// ---------------------------------------------------------------------------

/// Nodes live in a flat arena; children are indices into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree over the rows named by `samples` (indices may repeat).
    pub fn fit(x: &[FeatureRow], y: &[f64], samples: Vec<usize>, params: &TreeParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        if !samples.is_empty() {
            tree.grow(x, y, samples, 0, params);
        }
        tree
    }

    fn grow(&mut self, x: &[FeatureRow], y: &[f64], samples: Vec<usize>, depth: usize, params: &TreeParams) -> usize {
        let node = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean_of(y, &samples) });

        let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
        if samples.len() < params.min_samples_split.max(2) || depth_reached || is_pure(y, &samples) {
            return node;
        }

        let Some((feature, threshold)) = best_split(x, y, &samples) else {
            return node;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&i| x[i][feature] <= threshold);
        if left_samples.is_empty() || right_samples.is_empty() {
            return node;
        }

        let left = self.grow(x, y, left_samples, depth + 1, params);
        let right = self.grow(x, y, right_samples, depth + 1, params);
        self.nodes[node] = Node::Split { feature, threshold, left, right };
        node
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split { feature, threshold, left, right }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }
}

fn mean_of(y: &[f64], samples: &[usize]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
}

fn is_pure(y: &[f64], samples: &[usize]) -> bool {
    let first = y[samples[0]];
    samples.iter().all(|&i| y[i] == first)
}

/// Best (feature, threshold) by squared-error reduction, if any split helps.
///
/// Minimising the children's summed squared error is the same as
/// maximising `sum_l² / n_l + sum_r² / n_r`, which avoids cancellation in
/// the squared terms. Thresholds sit midway between adjacent distinct values.
fn best_split(x: &[FeatureRow], y: &[f64], samples: &[usize]) -> Option<(usize, f64)> {
    let n = samples.len();
    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order = samples.to_vec();

    for feature in 0..FEATURE_COUNT {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += y[order[k - 1]];
            let lo = x[order[k - 1]][feature];
            let hi = x[order[k]][feature];
            if lo == hi {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
            let improves = score > parent_score + 1e-12 * parent_score.abs().max(1.0);
            if improves && best.is_none_or(|(_, _, s)| score > s) {
                let mut threshold = lo / 2.0 + hi / 2.0;
                if threshold >= hi || threshold < lo {
                    threshold = lo;
                }
                if !threshold.is_finite() {
                    continue;
                }
                best = Some((feature, threshold, score));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(x: &[FeatureRow], y: &[f64], params: &ForestParams) -> Result<Self, PipelineError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(PipelineError::ModelFormat(format!(
                "cannot fit on {} feature rows and {} labels",
                x.len(),
                y.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(PipelineError::ModelFormat("forest needs at least one tree".to_string()));
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, bootstrap, &params.tree)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, row: &FeatureRow) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
