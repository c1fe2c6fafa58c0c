//! Random forest of CART decision trees
//!
//! Pure Rust, no external ML dependencies. Each tree is grown on a
//! bootstrap sample and considers a random subset of √d features at every
//! split. The forest's probability is the mean of the leaf positive
//! fractions across trees. Every random draw comes from a seeded ChaCha
//! stream, so a fit is reproducible from its seed alone.

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Minimum impurity decrease for a split to be kept
const MIN_GAIN: f64 = 1e-12;

/// Impurity measure used to score splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    Gini,
    Entropy,
}

impl SplitCriterion {
    fn impurity(&self, positives: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let p = positives as f64 / total as f64;
        let q = 1.0 - p;
        match self {
            SplitCriterion::Gini => 1.0 - p * p - q * q,
            SplitCriterion::Entropy => {
                let h = |x: f64| if x > 0.0 { -x * x.log2() } else { 0.0 };
                h(p) + h(q)
            }
        }
    }
}

impl std::fmt::Display for SplitCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitCriterion::Gini => write!(f, "gini"),
            SplitCriterion::Entropy => write!(f, "entropy"),
        }
    }
}

impl std::str::FromStr for SplitCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gini" => Ok(SplitCriterion::Gini),
            "entropy" => Ok(SplitCriterion::Entropy),
            other => Err(format!("unknown split criterion '{other}'")),
        }
    }
}

/// Hyperparameters of one forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub criterion: SplitCriterion,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            criterion: SplitCriterion::Gini,
        }
    }
}

impl std::fmt::Display for ForestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        write!(
            f,
            "trees={} max_depth={} min_samples_split={} criterion={}",
            self.n_trees, depth, self.min_samples_split, self.criterion
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        positive: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART tree stored as a flat node array (root at 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

struct GrowContext<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [bool],
    params: &'a ForestParams,
    num_features: usize,
    features_per_split: usize,
}

impl DecisionTree {
    fn grow(ctx: &GrowContext<'_>, sample_idx: Vec<usize>, rng: &mut ChaCha8Rng) -> Self {
        let mut tree = DecisionTree { nodes: Vec::new() };
        tree.build(ctx, sample_idx, 0, rng);
        tree
    }

    fn build(
        &mut self,
        ctx: &GrowContext<'_>,
        idx: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n = idx.len();
        let positives = idx.iter().filter(|&&i| ctx.labels[i]).count();
        let leaf = TreeNode::Leaf {
            positive: if n == 0 {
                0.0
            } else {
                positives as f64 / n as f64
            },
            samples: n,
        };

        let too_small = n < ctx.params.min_samples_split.max(2);
        let pure = positives == 0 || positives == n;
        let too_deep = ctx.params.max_depth.is_some_and(|d| depth >= d);
        if too_small || pure || too_deep {
            return self.push(leaf);
        }

        let Some((feature, threshold)) = best_split(ctx, &idx, positives, rng) else {
            return self.push(leaf);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
            .iter()
            .partition(|&&i| ctx.rows[i][feature] <= threshold);

        let node = self.push(TreeNode::Split {
            feature,
            threshold,
            left: 0,
            right: 0,
        });
        let left = self.build(ctx, left_idx, depth + 1, rng);
        let right = self.build(ctx, right_idx, depth + 1, rng);
        self.nodes[node] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    fn push(&mut self, node: TreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Positive fraction of the leaf `values` falls into.
    pub fn predict(&self, values: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes.get(at) {
                Some(TreeNode::Leaf { positive, .. }) => return *positive,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = values.get(*feature).copied().unwrap_or(0.0);
                    at = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], at: usize) -> usize {
            match nodes.get(at) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Child indices must point forward, so a loaded tree cannot loop.
    fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                TreeNode::Leaf { positive, .. } => (0.0..=1.0).contains(positive),
                TreeNode::Split { left, right, .. } => {
                    *left > i && *right > i && *left < self.nodes.len() && *right < self.nodes.len()
                }
            })
    }
}

/// Best (feature, threshold) among a random subset of features.
fn best_split(
    ctx: &GrowContext<'_>,
    idx: &[usize],
    positives: usize,
    rng: &mut ChaCha8Rng,
) -> Option<(usize, f64)> {
    let n = idx.len();
    let parent = ctx.params.criterion.impurity(positives, n);

    let mut features = sample(rng, ctx.num_features, ctx.features_per_split).into_vec();
    features.sort_unstable();

    let mut best: Option<(f64, usize, f64)> = None;
    let mut column: Vec<(f64, bool)> = Vec::with_capacity(n);
    for feature in features {
        column.clear();
        column.extend(idx.iter().map(|&i| (ctx.rows[i][feature], ctx.labels[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0;
        for k in 1..n {
            if column[k - 1].1 {
                left_pos += 1;
            }
            if column[k].0 <= column[k - 1].0 {
                continue;
            }
            let (left_n, right_n) = (k, n - k);
            let right_pos = positives - left_pos;
            let weighted = (left_n as f64 * ctx.params.criterion.impurity(left_pos, left_n)
                + right_n as f64 * ctx.params.criterion.impurity(right_pos, right_n))
                / n as f64;
            let gain = parent - weighted;
            if best.is_none_or(|(g, _, _)| gain > g + MIN_GAIN) {
                let threshold = (column[k - 1].0 + column[k].0) / 2.0;
                best = Some((gain, feature, threshold));
            }
        }
    }

    best.filter(|(gain, _, _)| *gain > MIN_GAIN)
        .map(|(_, feature, threshold)| (feature, threshold))
}

/// Derive an independent stream seed from a base seed.
pub(crate) fn derive_seed(base: u64, stream: u64) -> u64 {
    // splitmix64 finaliser
    let mut z = base ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    num_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on `rows`/`labels`. Trees grow in parallel; each has its
    /// own seed derived from `seed`, so results do not depend on scheduling.
    pub fn fit(rows: &[Vec<f64>], labels: &[bool], params: &ForestParams, seed: u64) -> Self {
        let num_features = rows.first().map_or(0, Vec::len);
        let n_trees = params.n_trees.max(1);
        let ctx = GrowContext {
            rows,
            labels,
            params,
            num_features,
            features_per_split: ((num_features as f64).sqrt() as usize).clamp(1, num_features.max(1)),
        };

        let trees = (0..n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(seed, t as u64));
                let n = rows.len();
                let bootstrap: Vec<usize> = if num_features == 0 {
                    (0..n).collect()
                } else {
                    (0..n).map(|_| rng.random_range(0..n)).collect()
                };
                if num_features == 0 {
                    let positives = bootstrap.iter().filter(|&&i| labels[i]).count();
                    return DecisionTree {
                        nodes: vec![TreeNode::Leaf {
                            positive: if n == 0 { 0.0 } else { positives as f64 / n as f64 },
                            samples: n,
                        }],
                    };
                }
                DecisionTree::grow(&ctx, bootstrap, &mut rng)
            })
            .collect();

        Self {
            params: *params,
            num_features,
            trees,
        }
    }

    /// Mean positive probability across trees.
    pub fn predict_proba(&self, values: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|t| t.predict(values)).sum();
        total / self.trees.len() as f64
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural sanity check for deserialised forests.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        match self.trees.iter().position(|t| !t.is_well_formed()) {
            Some(i) => Err(format!("tree {i} is malformed")),
            None => Ok(()),
        }
    }
}
