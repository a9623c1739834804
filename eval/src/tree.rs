// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Second-order regression trees for boosting
//!
//! Trees are grown on per-row gradients and hessians of the loss. A split
//! is kept only when its gain is strictly positive after the
//! `min_split_gain` penalty, and leaves predict `-G / (H + l2_leaf)`.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Growth limits for one tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// Minimum loss reduction (γ) required to split
    pub min_split_gain: f64,
    /// L2 penalty on leaf values (λ)
    pub l2_leaf: f64,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Sample view shared by every node of one tree
struct Growth<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    columns: &'a [usize],
    params: TreeParams,
}

impl RegressionTree {
    /// Grow a tree on the given `rows`, considering only `columns`
    ///
    /// Split gains are added to `importances`, indexed by original column.
    pub fn fit(
        x: &Array2<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        columns: &[usize],
        params: TreeParams,
        importances: &mut [f64],
    ) -> Self {
        let growth = Growth {
            x,
            grad,
            hess,
            columns,
            params,
        };
        let root = growth.grow(rows.to_vec(), 0, importances);
        Self { root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    pub fn n_leaves(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        walk(&self.root)
    }
}

impl Growth<'_> {
    fn grow(&self, rows: Vec<usize>, depth: usize, importances: &mut [f64]) -> TreeNode {
        let (g, h) = self.sums(&rows);

        if depth >= self.params.max_depth || rows.len() < 2 {
            return self.leaf(g, h);
        }

        match self.best_split(&rows, g, h) {
            Some(split) => {
                importances[split.feature] += split.gain;
                let left = self.grow(split.left, depth + 1, importances);
                let right = self.grow(split.right, depth + 1, importances);
                TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    gain: split.gain,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => self.leaf(g, h),
        }
    }

    fn leaf(&self, g: f64, h: f64) -> TreeNode {
        TreeNode::Leaf {
            value: -g / (h + self.params.l2_leaf),
        }
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]))
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.l2_leaf)
    }

    /// Exact greedy search over every column and distinct value boundary
    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent = self.score(g_total, h_total);
        let mut best: Option<(usize, f64, f64)> = None;

        for &feature in self.columns {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pair in sorted.windows(2) {
                let (row, next) = (pair[0], pair[1]);
                g_left += self.grad[row];
                h_left += self.hess[row];

                let (value, next_value) = (self.x[[row, feature]], self.x[[next, feature]]);
                if value == next_value {
                    continue;
                }

                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                    - self.params.min_split_gain;

                if gain > 0.0 && best.map_or(true, |(_, _, b)| gain > b) {
                    best = Some((feature, (value + next_value) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, gain)| {
            let (left, right) = rows.iter().partition(|&&r| self.x[[r, feature]] <= threshold);
            SplitCandidate {
                feature,
                threshold,
                gain,
                left,
                right,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_split_gain: 0.0,
            l2_leaf: 1.0,
            min_child_weight: 0.0,
        }
    }

    #[test]
    fn test_stump_splits_on_informative_column() {
        // Column 1 separates the gradient signs; column 0 is noise
        let x = Array2::from_shape_fn((8, 2), |(i, j)| if j == 0 { (i % 3) as f64 } else { i as f64 });
        let grad: Vec<f64> = (0..8).map(|i| if i < 4 { 0.5 } else { -0.5 }).collect();
        let hess = vec![0.25; 8];
        let rows: Vec<usize> = (0..8).collect();
        let mut importances = vec![0.0; 2];

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &[0, 1], params(1), &mut importances);

        match tree.root() {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 1);
                assert!((threshold - 3.5).abs() < 1e-12);
            }
            leaf => panic!("expected a split, got {:?}", leaf),
        }
        assert!(importances[1] > 0.0);
        assert_eq!(importances[0], 0.0);

        // Leaves push scores against the gradient
        assert!(tree.predict_row(x.row(0)) < 0.0);
        assert!(tree.predict_row(x.row(7)) > 0.0);
        let expected = -(4.0 * 0.5) / (4.0 * 0.25 + 1.0);
        assert!((tree.predict_row(x.row(0)) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_depth_limit_and_gain_threshold() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let grad: Vec<f64> = (0..16).map(|i| ((i * 5) % 7) as f64 - 3.0).collect();
        let hess = vec![1.0; 16];
        let rows: Vec<usize> = (0..16).collect();
        let mut importances = vec![0.0];

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &[0], params(2), &mut importances);
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);

        let strict = TreeParams {
            min_split_gain: 1e9,
            ..params(3)
        };
        let stump = RegressionTree::fit(&x, &grad, &hess, &rows, &[0], strict, &mut importances);
        assert_eq!(stump.n_leaves(), 1);
    }

    #[test]
    fn test_constant_column_never_splits() {
        let x = Array2::from_elem((6, 1), 2.0);
        let grad = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let hess = vec![0.25; 6];
        let rows: Vec<usize> = (0..6).collect();
        let mut importances = vec![0.0];

        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &[0], params(3), &mut importances);
        assert_eq!(tree.depth(), 0);
    }
}
