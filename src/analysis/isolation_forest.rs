//! Isolation forest outlier model.
//!
//! Points that random axis-aligned splits isolate in few steps are anomalous.
//! Scores follow the usual `-2^(-E[h(x)] / c(n))` convention, so lower means
//! more anomalous, and the decision offset is the contamination percentile of
//! the training scores.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub trees: usize,
    pub max_samples: usize,
    /// Expected share of outliers in the training data.
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

/// Average path length of an unsuccessful search in a binary tree of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl IsolationForest {
    /// Fit on `data` (rows of equal width). `None` for an empty input.
    pub fn fit(data: &[Vec<f64>], params: &ForestParams) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let sample_size = params.max_samples.clamp(1, data.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.trees.max(1))
            .map(|_| {
                let sample = index::sample(&mut rng, data.len(), sample_size).into_vec();
                build_tree(data, sample, 0, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        let mut scores: Vec<f64> = data.iter().map(|row| forest.score_sample(row)).collect();
        scores.sort_by(f64::total_cmp);
        forest.offset = percentile(&scores, params.contamination * 100.0);
        Some(forest)
    }

    /// Raw anomaly score in [-1, 0); lower is more anomalous.
    pub fn score_sample(&self, row: &[f64]) -> f64 {
        let depth: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = match average_path_length(self.sample_size) {
            c if c > 0.0 => c,
            _ => 1.0,
        };
        -(2f64.powf(-depth / normalizer))
    }

    /// Score shifted by the fitted offset; negative values are outliers.
    pub fn decision_function(&self, row: &[f64]) -> f64 {
        self.score_sample(row) - self.offset
    }

    pub fn is_outlier(&self, row: &[f64]) -> bool {
        self.decision_function(row) < 0.0
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

fn build_tree(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let width = data[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (min, max) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
                let value = data[i][feature];
                (lo.min(value), hi.max(value))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    // Identical points cannot be separated any further.
    if splittable.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Linear-interpolated percentile of an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
