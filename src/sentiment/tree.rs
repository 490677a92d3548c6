//! Gradient-boosted regression trees for binary classification.
//!
//! Logistic loss, leaf-wise growth with a leaf budget, histogram split
//! search over pre-binned sparse features, Newton leaf outputs.

use serde::{Deserialize, Serialize};

use super::featurize::SparseVector;
use super::SentimentError;

/// Regularizer added to hessian sums in gains and leaf outputs.
const HESSIAN_EPSILON: f64 = 1e-9;
/// Leaf outputs are clamped to this magnitude before shrinkage.
const MAX_LEAF_OUTPUT: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastTreeOptions {
    pub number_of_leaves: usize,
    pub minimum_example_count_per_leaf: usize,
    pub number_of_trees: usize,
    pub learning_rate: f64,
    pub max_bins: usize,
}

impl Default for FastTreeOptions {
    fn default() -> Self {
        Self {
            number_of_leaves: 50,
            minimum_example_count_per_leaf: 20,
            number_of_trees: 100,
            learning_rate: 0.2,
            max_bins: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: u32,
        threshold: f32,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f64,
    },
}

/// One regression tree; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn evaluate(&self, features: &SparseVector) -> f64 {
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features.get(*feature) <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Additive ensemble: `score = bias + Σ tree(x)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    bias: f64,
    trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    /// Raw (logit) score.
    pub fn score(&self, features: &SparseVector) -> f64 {
        self.bias + self.trees.iter().map(|t| t.evaluate(features)).sum::<f64>()
    }

    pub fn probability(&self, features: &SparseVector) -> f64 {
        sigmoid(self.score(features))
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Fit the ensemble. `rows[i]` is labeled `labels[i]`.
    pub fn fit(
        rows: &[SparseVector],
        labels: &[bool],
        dimension: usize,
        options: &FastTreeOptions,
    ) -> Result<Self, SentimentError> {
        if rows.is_empty() {
            return Err(SentimentError::EmptyDataset("no training rows".into()));
        }
        let positives = labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == labels.len() {
            return Err(SentimentError::SingleClass);
        }

        let bins = FeatureBins::build(rows, dimension, options.max_bins.max(2));
        let binned: Vec<Vec<(u32, u16)>> = rows.iter().map(|r| bins.bin_row(r)).collect();
        let targets: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();

        let prior = positives as f64 / labels.len() as f64;
        let bias = (prior / (1.0 - prior)).ln();
        let mut scores = vec![bias; rows.len()];
        let mut trees = Vec::with_capacity(options.number_of_trees);

        for iteration in 0..options.number_of_trees {
            let mut gradients = Vec::with_capacity(rows.len());
            let mut hessians = Vec::with_capacity(rows.len());
            for (score, target) in scores.iter().zip(&targets) {
                let p = sigmoid(*score);
                gradients.push(p - target);
                hessians.push((p * (1.0 - p)).max(HESSIAN_EPSILON));
            }

            let grower = TreeGrower {
                bins: &bins,
                binned: &binned,
                gradients: &gradients,
                hessians: &hessians,
                options,
            };
            let (tree, assignments) = grower.grow();

            for (leaf_value, docs) in assignments {
                for doc in docs {
                    scores[doc] += leaf_value;
                }
            }

            if iteration % 20 == 0 {
                tracing::debug!(
                    iteration,
                    leaves = tree.leaf_count(),
                    log_loss = mean_log_loss(&scores, &targets),
                    "Boosting iteration"
                );
            }
            trees.push(tree);
        }

        Ok(Self { bias, trees })
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn mean_log_loss(scores: &[f64], targets: &[f64]) -> f64 {
    let total: f64 = scores
        .iter()
        .zip(targets)
        .map(|(s, t)| {
            let p = sigmoid(*s).clamp(1e-15, 1.0 - 1e-15);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    total / scores.len() as f64
}

// ──────────────────────────────────────────────
// Feature quantization
// ──────────────────────────────────────────────

/// Per-feature bin upper bounds. A value `v` falls in the first bin `k`
/// with `v <= bounds[k]`, or in bin `bounds.len()` if it exceeds them all.
struct FeatureBins {
    bounds: Vec<Vec<f32>>,
    zero_bin: Vec<u16>,
}

impl FeatureBins {
    fn build(rows: &[SparseVector], dimension: usize, max_bins: usize) -> Self {
        let mut columns: Vec<Vec<f32>> = vec![Vec::new(); dimension];
        for row in rows {
            for (feature, value) in row.iter() {
                if let Some(column) = columns.get_mut(feature as usize) {
                    column.push(value);
                }
            }
        }

        let mut bounds = Vec::with_capacity(dimension);
        let mut zero_bin = Vec::with_capacity(dimension);
        for mut column in columns {
            if column.len() < rows.len() {
                column.push(0.0);
            }
            let b = quantize(column, max_bins);
            zero_bin.push(bin_of(&b, 0.0));
            bounds.push(b);
        }
        Self { bounds, zero_bin }
    }

    fn bin(&self, feature: u32, value: f32) -> u16 {
        bin_of(&self.bounds[feature as usize], value)
    }

    /// Non-default bins of a row, sorted by feature.
    fn bin_row(&self, row: &SparseVector) -> Vec<(u32, u16)> {
        row.iter()
            .filter(|(feature, _)| (*feature as usize) < self.bounds.len())
            .map(|(feature, value)| (feature, self.bin(feature, value)))
            .filter(|(feature, bin)| *bin != self.zero_bin[*feature as usize])
            .collect()
    }

    fn threshold(&self, feature: u32, bin: u16) -> f32 {
        self.bounds[feature as usize][bin as usize]
    }
}

fn bin_of(bounds: &[f32], value: f32) -> u16 {
    bounds.partition_point(|&b| b < value) as u16
}

/// Bin boundaries for one column: midpoints between distinct values, or
/// between quantile cut points when there are more distinct values than bins.
fn quantize(mut values: Vec<f32>, max_bins: usize) -> Vec<f32> {
    values.sort_by(|a, b| a.total_cmp(b));
    let mut distinct = values.clone();
    distinct.dedup();
    if distinct.len() <= 1 {
        return Vec::new();
    }

    let cuts: Vec<f32> = if distinct.len() <= max_bins {
        distinct
    } else {
        let mut picked: Vec<f32> = (1..max_bins)
            .map(|q| values[q * values.len() / max_bins])
            .collect();
        picked.push(values[values.len() - 1]);
        picked.dedup();
        if picked.first() != Some(&values[0]) {
            picked.insert(0, values[0]);
        }
        picked
    };

    cuts.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

// ──────────────────────────────────────────────
// Tree growth
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: u32,
    bin: u16,
    gain: f64,
}

struct GrowingLeaf {
    node: usize,
    docs: Vec<usize>,
    sum_g: f64,
    sum_h: f64,
    best: Option<SplitCandidate>,
}

struct TreeGrower<'a> {
    bins: &'a FeatureBins,
    binned: &'a [Vec<(u32, u16)>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    options: &'a FastTreeOptions,
}

impl TreeGrower<'_> {
    /// Grow one tree. Returns the tree and, per leaf, its shrunk output
    /// and member documents.
    fn grow(&self) -> (RegressionTree, Vec<(f64, Vec<usize>)>) {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut leaves = vec![self.make_leaf(0, (0..self.binned.len()).collect())];

        while leaves.len() < self.options.number_of_leaves.max(1) {
            let candidate = leaves
                .iter()
                .enumerate()
                .filter_map(|(i, leaf)| leaf.best.map(|b| (i, b)))
                .max_by(|a, b| a.1.gain.total_cmp(&b.1.gain).then(b.0.cmp(&a.0)));
            let Some((leaf_index, split)) = candidate else {
                break;
            };

            let leaf = leaves.swap_remove(leaf_index);
            let (left_docs, right_docs): (Vec<usize>, Vec<usize>) = leaf
                .docs
                .iter()
                .partition(|&&doc| self.doc_bin(doc, split.feature) <= split.bin);

            let left_node = nodes.len();
            let right_node = left_node + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: self.bins.threshold(split.feature, split.bin),
                left: left_node as u32,
                right: right_node as u32,
            };

            leaves.push(self.make_leaf(left_node, left_docs));
            leaves.push(self.make_leaf(right_node, right_docs));
        }

        let mut assignments = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let raw = -leaf.sum_g / (leaf.sum_h + HESSIAN_EPSILON);
            let value = raw.clamp(-MAX_LEAF_OUTPUT, MAX_LEAF_OUTPUT) * self.options.learning_rate;
            nodes[leaf.node] = Node::Leaf { value };
            assignments.push((value, leaf.docs));
        }

        (RegressionTree { nodes }, assignments)
    }

    fn make_leaf(&self, node: usize, docs: Vec<usize>) -> GrowingLeaf {
        let sum_g = docs.iter().map(|&d| self.gradients[d]).sum();
        let sum_h = docs.iter().map(|&d| self.hessians[d]).sum();
        let best = self.best_split(&docs, sum_g, sum_h);
        GrowingLeaf {
            node,
            docs,
            sum_g,
            sum_h,
            best,
        }
    }

    fn doc_bin(&self, doc: usize, feature: u32) -> u16 {
        let row = &self.binned[doc];
        match row.binary_search_by_key(&feature, |&(f, _)| f) {
            Ok(pos) => row[pos].1,
            Err(_) => self.bins.zero_bin[feature as usize],
        }
    }

    fn best_split(&self, docs: &[usize], sum_g: f64, sum_h: f64) -> Option<SplitCandidate> {
        let min_leaf = self.options.minimum_example_count_per_leaf.max(1);
        if docs.len() < 2 * min_leaf {
            return None;
        }

        // (feature, bin, g, h) for every non-default cell, grouped by feature.
        let mut cells: Vec<(u32, u16, f64, f64)> = Vec::new();
        for &doc in docs {
            for &(feature, bin) in &self.binned[doc] {
                cells.push((feature, bin, self.gradients[doc], self.hessians[doc]));
            }
        }
        cells.sort_unstable_by_key(|&(f, b, _, _)| (f, b));

        let parent_score = sum_g * sum_g / (sum_h + HESSIAN_EPSILON);
        let mut best: Option<SplitCandidate> = None;

        let mut start = 0;
        while start < cells.len() {
            let feature = cells[start].0;
            let mut end = start;
            while end < cells.len() && cells[end].0 == feature {
                end += 1;
            }

            let histogram = self.feature_histogram(&cells[start..end], docs.len(), sum_g, sum_h);
            let total = histogram.len();
            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
            for (i, &(bin, g, h, n)) in histogram.iter().enumerate() {
                gl += g;
                hl += h;
                nl += n;
                if i + 1 == total {
                    break;
                }
                let nr = docs.len() - nl;
                if nl < min_leaf || nr < min_leaf {
                    continue;
                }
                let (gr, hr) = (sum_g - gl, sum_h - hl);
                let gain = gl * gl / (hl + HESSIAN_EPSILON) + gr * gr / (hr + HESSIAN_EPSILON)
                    - parent_score;
                if gain > best.map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }

            start = end;
        }
        best
    }

    /// Per-bin (bin, Σg, Σh, count) for one feature in bin order, with the
    /// default bin filled from the leaf totals.
    fn feature_histogram(
        &self,
        cells: &[(u32, u16, f64, f64)],
        doc_count: usize,
        sum_g: f64,
        sum_h: f64,
    ) -> Vec<(u16, f64, f64, usize)> {
        let feature = cells[0].0;
        let mut histogram: Vec<(u16, f64, f64, usize)> = Vec::new();
        for &(_, bin, g, h) in cells {
            match histogram.last_mut() {
                Some(last) if last.0 == bin => {
                    last.1 += g;
                    last.2 += h;
                    last.3 += 1;
                }
                _ => histogram.push((bin, g, h, 1)),
            }
        }

        let (ng, nh, nn) = histogram
            .iter()
            .fold((0.0, 0.0, 0usize), |acc, c| (acc.0 + c.1, acc.1 + c.2, acc.2 + c.3));
        let default_count = doc_count - nn;
        if default_count > 0 {
            let zero = self.bins.zero_bin[feature as usize];
            let pos = histogram.partition_point(|c| c.0 < zero);
            histogram.insert(pos, (zero, sum_g - ng, sum_h - nh, default_count));
        }
        histogram
    }
}
